//! Shell commands and the scripted self-test

use std::collections::BTreeSet;
use std::fmt::Write as _;

use devbuf::{
    BufferStatus, ControlRequest, ControlResponse, DeviceClient, DeviceError, SessionHandle,
    WriteMode,
};
use tracing::{info, warn};

const HELP: &str = "\
open                     open a session and make it current
close [id]               close a session
read [id] <n>            read up to n bytes at the session cursor
write <text>             write text
status                   used and free bytes
clear                    zero the buffer
reset [id]               rewind the session cursor
resize <n>               set the buffer size
count                    how many times the device was opened
mirror                   used bytes, reversed
clear-range <a> <b>      zero bytes a..=b
mode append|overwrite    set the write mode
ioctl <cmd> [int...]     raw control command (hex or decimal)
quit";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Open,
    Close(Option<u64>),
    Read(Option<u64>, usize),
    Write(String),
    Status,
    Clear,
    Reset(Option<u64>),
    Resize(i32),
    Count,
    Mirror,
    ClearRange(i32, i32),
    Mode(WriteMode),
    Ioctl(u32, Vec<i32>),
    Quit,
}

impl Command {
    /// Parse a line; `Ok(None)` for blank lines
    ///
    /// # Errors
    /// A message describing what is wrong with the line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word {
            "" => return Ok(None),
            "help" | "?" => Self::Help,
            "open" => Self::Open,
            "close" => Self::Close(opt_id(&args)?),
            "read" => match args.as_slice() {
                [n] => Self::Read(None, num(n)?),
                [id, n] => Self::Read(Some(num(id)?), num(n)?),
                _ => return Err("read [id] <n>".to_string()),
            },
            "write" => Self::Write(rest.to_string()),
            "status" => Self::Status,
            "clear" => Self::Clear,
            "reset" => Self::Reset(opt_id(&args)?),
            "resize" => match args.as_slice() {
                [n] => Self::Resize(num(n)?),
                _ => return Err("resize <n>".to_string()),
            },
            "count" => Self::Count,
            "mirror" => Self::Mirror,
            "clear-range" => match args.as_slice() {
                [a, b] => Self::ClearRange(num(a)?, num(b)?),
                _ => return Err("clear-range <a> <b>".to_string()),
            },
            "mode" => match args.as_slice() {
                ["append"] => Self::Mode(WriteMode::Append),
                ["overwrite"] => Self::Mode(WriteMode::Overwrite),
                _ => return Err("mode append|overwrite".to_string()),
            },
            "ioctl" => match args.split_first() {
                Some((cmd, ints)) => Self::Ioctl(
                    parse_code(cmd)?,
                    ints.iter().map(|s| num(s)).collect::<Result<_, _>>()?,
                ),
                None => return Err("ioctl <cmd> [int...]".to_string()),
            },
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(command))
    }
}

fn num<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse().map_err(|_| format!("not a number: {s}"))
}

fn opt_id(args: &[&str]) -> Result<Option<u64>, String> {
    args.first().map(|s| num(s)).transpose()
}

fn parse_code(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| format!("bad command: {s}")),
        None => num(s),
    }
}

/// Interactive state: the client plus the sessions this shell opened
pub struct Shell {
    client: DeviceClient,
    open: BTreeSet<SessionHandle>,
    current: Option<SessionHandle>,
}

impl Shell {
    #[must_use]
    pub fn new(client: DeviceClient) -> Self {
        Self {
            client,
            open: BTreeSet::new(),
            current: None,
        }
    }

    fn session(&self, id: Option<u64>) -> Result<SessionHandle, String> {
        id.map(SessionHandle::new)
            .or(self.current)
            .ok_or_else(|| "no open session, use 'open' first".to_string())
    }

    async fn control(&self, request: ControlRequest) -> Result<ControlResponse, String> {
        let session = self.session(None)?;
        self.client
            .control(session, request)
            .await
            .map_err(|e| describe(&e))
    }

    /// Run one command and render its outcome
    pub async fn execute(&mut self, command: Command) -> String {
        match self.try_execute(command).await {
            Ok(out) => out,
            Err(msg) => format!("error: {msg}"),
        }
    }

    async fn try_execute(&mut self, command: Command) -> Result<String, String> {
        let out = match command {
            Command::Help => HELP.to_string(),
            Command::Open => {
                let session = self.client.open().await.map_err(|e| describe(&e))?;
                self.open.insert(session);
                self.current = Some(session);
                format!("opened {session}")
            }
            Command::Close(id) => {
                let session = self.session(id)?;
                self.client.close(session).await.map_err(|e| describe(&e))?;
                self.open.remove(&session);
                if self.current == Some(session) {
                    self.current = self.open.iter().next_back().copied();
                }
                format!("closed {session}")
            }
            Command::Read(id, n) => {
                let session = self.session(id)?;
                let data = self.client.read(session, n).await.map_err(|e| describe(&e))?;
                if data.is_empty() {
                    "(no more data)".to_string()
                } else {
                    render(&data)
                }
            }
            Command::Write(text) => {
                let n = self.client.write(text).await.map_err(|e| describe(&e))?;
                format!("wrote {n} bytes")
            }
            Command::Status => match self.control(ControlRequest::GetStatus).await? {
                ControlResponse::Status(status) => render_status(status),
                other => format!("{other:?}"),
            },
            Command::Clear => {
                self.control(ControlRequest::ClearBuffer).await?;
                "buffer cleared".to_string()
            }
            Command::Reset(id) => {
                let session = self.session(id)?;
                self.client
                    .control(session, ControlRequest::ResetOffset)
                    .await
                    .map_err(|e| describe(&e))?;
                format!("{session} rewound")
            }
            Command::Resize(n) => {
                self.control(ControlRequest::SetBufferSize(n)).await?;
                format!("buffer size set to {n}")
            }
            Command::Count => match self.control(ControlRequest::GetOpenCount).await? {
                ControlResponse::OpenCount(n) => format!("opened {n} times"),
                other => format!("{other:?}"),
            },
            Command::Mirror => match self.control(ControlRequest::GetMirror).await? {
                ControlResponse::Mirror(bytes) => render(&bytes),
                other => format!("{other:?}"),
            },
            Command::ClearRange(a, b) => {
                self.control(ControlRequest::ClearRange { start: a, end: b })
                    .await?;
                format!("range [{a}, {b}] cleared")
            }
            Command::Mode(mode) => {
                self.control(ControlRequest::SetMode(mode)).await?;
                format!("mode set to {mode:?}")
            }
            Command::Ioctl(cmd, ints) => {
                let session = self.session(None)?;
                let arg: Vec<u8> = ints.iter().flat_map(|i| i.to_ne_bytes()).collect();
                let reply = self
                    .client
                    .ioctl(session, cmd, &arg)
                    .await
                    .map_err(|e| describe(&e))?;
                format!("ok, {} reply bytes: {reply:02x?}", reply.len())
            }
            Command::Quit => String::new(),
        };
        Ok(out)
    }

    /// Close every session this shell still holds
    pub async fn close_all(&mut self) {
        for session in std::mem::take(&mut self.open) {
            if let Err(e) = self.client.close(session).await {
                warn!(session = %session, error = %e, "close on exit failed");
            }
        }
        self.current = None;
    }
}

fn describe(e: &DeviceError) -> String {
    format!("{e} (errno {})", e.errno())
}

fn render(bytes: &[u8]) -> String {
    let mut out = format!("{} bytes: ", bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        for b in chunk.invalid() {
            let _ = write!(out, "\\x{b:02x}");
        }
    }
    out.replace('\0', "\\0")
}

fn render_status(status: BufferStatus) -> String {
    format!("used {} bytes, free {} bytes", status.used, status.free)
}

/// Replay the classic device test: status, write, read, mirror, range clear,
/// offset reset, resize, clear, open count
pub async fn run_selftest(client: DeviceClient) -> bool {
    match selftest(&client).await {
        Ok(()) => {
            info!("selftest passed");
            true
        }
        Err(msg) => {
            println!("selftest failed: {msg}");
            false
        }
    }
}

async fn selftest(client: &DeviceClient) -> Result<(), String> {
    let mut shell = Shell::new(client.clone());
    let data = "測試數據";

    let script = [
        Command::Open,
        Command::Status,
        Command::Write(data.to_string()),
        Command::Status,
        Command::Read(None, 256),
        Command::Mirror,
        Command::ClearRange(0, 4),
        Command::Reset(None),
        Command::Resize(2048),
        Command::Clear,
        Command::Count,
    ];
    for command in script {
        let label = format!("{command:?}");
        let out = shell.try_execute(command).await?;
        println!("{label}: {out}");
    }

    let session = shell.session(None)?;
    let status = client
        .control(session, ControlRequest::GetStatus)
        .await
        .map_err(|e| describe(&e))?;
    if status != ControlResponse::Status(BufferStatus { used: 0, free: 2048 }) {
        return Err(format!("unexpected final status {status:?}"));
    }
    shell.close_all().await;
    Ok(())
}
