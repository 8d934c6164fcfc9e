//! Device CLI Demo
//!
//! Lines typed on stdin are written to the device in append mode; three
//! sessions read them back through their own cursors.

use devbuf::{Device, DeviceConfig, DeviceFile, WriteMode};
use std::io::{self, BufRead, Read};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = DeviceConfig::from_env()?.with_mode(WriteMode::Append);
    let device = Device::new(&config)?;

    let mut reader1 = DeviceFile::open(&device)?;
    let mut reader2 = DeviceFile::open(&device)?;
    let mut reader3 = DeviceFile::open(&device)?;

    println!("Enter text (empty line to quit):");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        match device.write(trimmed.as_bytes()) {
            Ok(n) => println!("wrote {n} bytes"),
            Err(e) => {
                eprintln!("Write error: {e}");
                break;
            }
        }

        read_all("r1", &mut reader1, 4)?;
        read_all("r2", &mut reader2, 8)?;
        if trimmed.len() % 2 == 0 {
            read_all("r3", &mut reader3, 16)?;
        }
    }

    let status = device.get_status();
    println!(
        "used {} bytes, free {} bytes, opened {} times",
        status.used,
        status.free,
        device.get_open_count()
    );
    Ok(())
}

fn read_all(name: &str, reader: &mut impl Read, chunk: usize) -> io::Result<()> {
    let mut buf = vec![0u8; chunk];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            println!("({name}) caught up");
            return Ok(());
        }
        println!("({name}): {}", String::from_utf8_lossy(&buf[..n]));
    }
}
