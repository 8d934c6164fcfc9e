//! Command-line driver for the shared device buffer
//!
//! `devbuf_cli shell` reads one command per line from stdin.
//! `devbuf_cli selftest` replays the classic device test sequence.

mod command;

use devbuf::{Device, DeviceConfig, DeviceService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::command::{run_selftest, Command, Shell};

fn usage() -> &'static str {
    "usage: devbuf_cli [shell|selftest]\n\
     environment: DEVBUF_NAME, DEVBUF_CAPACITY, DEVBUF_MAX_CAPACITY, DEVBUF_MODE, RUST_LOG"
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "shell".to_string());

    let config = match DeviceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "bad configuration");
            std::process::exit(2);
        }
    };
    let device = match Device::new(&config) {
        Ok(device) => device,
        Err(e) => {
            error!(error = %e, "failed to create device");
            std::process::exit(1);
        }
    };

    let service = DeviceService::new(device);
    let client = service.client();
    let service_task = tokio::spawn(service.run());

    let ok = match mode.as_str() {
        "shell" => {
            let mut shell = Shell::new(client);
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            println!("devbuf shell, 'help' for commands");
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => println!("{}", shell.execute(command).await),
                    Ok(None) => {}
                    Err(msg) => println!("error: {msg}"),
                }
            }
            shell.close_all().await;
            true
        }
        "selftest" => run_selftest(client).await,
        _ => {
            drop(client);
            eprintln!("{}", usage());
            false
        }
    };

    match service_task.await {
        Ok(device) => debug!(open_count = device.get_open_count(), "service finished"),
        Err(e) => error!(error = %e, "service task failed"),
    }

    if !ok {
        std::process::exit(1);
    }
}
