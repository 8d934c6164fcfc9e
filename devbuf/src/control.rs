//! Administrative commands and their ioctl-style wire form
//!
//! Command numbers follow the Linux `_IO`/`_IOR`/`_IOW` layout with magic
//! `'c'`. Integer arguments and results are native-endian `i32`s.

use core::ffi::c_int;

use crate::error::{DeviceError, Result};
use crate::io::{BufferStatus, WriteMode};

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const MAGIC: u8 = b'c';
const INT: u32 = std::mem::size_of::<c_int>() as u32;

const fn ioc(dir: u32, nr: u32, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((MAGIC as u32) << IOC_TYPESHIFT)
        | (nr << IOC_NRSHIFT)
        | (size << IOC_SIZESHIFT)
}

pub const CLEAR_BUFFER: u32 = ioc(IOC_NONE, 1, 0);
pub const GET_STATUS: u32 = ioc(IOC_READ, 2, 2 * INT);
pub const RESET_OFFSET: u32 = ioc(IOC_NONE, 3, 0);
pub const SET_BUFFER_SIZE: u32 = ioc(IOC_WRITE, 4, INT);
pub const GET_OPEN_COUNT: u32 = ioc(IOC_READ, 5, INT);
pub const GET_MIRROR: u32 = ioc(IOC_READ, 6, 1024);
pub const CLEAR_RANGE: u32 = ioc(IOC_WRITE, 7, 2 * INT);
pub const SET_APPEND_MODE: u32 = ioc(IOC_WRITE, 8, INT);

/// A decoded administrative command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    ClearBuffer,
    GetStatus,
    /// Rewind the calling session's cursor
    ResetOffset,
    /// Signed so that non-positive sizes reach validation
    SetBufferSize(i32),
    GetOpenCount,
    GetMirror,
    ClearRange { start: i32, end: i32 },
    SetMode(WriteMode),
}

impl ControlRequest {
    /// Decode a raw command number plus the argument bytes copied from the caller
    ///
    /// # Errors
    /// `UnknownCommand` for an unrecognized number, `TransferFailure` when the
    /// argument is shorter than the command's payload.
    pub fn decode(cmd: u32, arg: &[u8]) -> Result<Self> {
        let request = match cmd {
            CLEAR_BUFFER => Self::ClearBuffer,
            GET_STATUS => Self::GetStatus,
            RESET_OFFSET => Self::ResetOffset,
            SET_BUFFER_SIZE => Self::SetBufferSize(read_int(arg, 0)?),
            GET_OPEN_COUNT => Self::GetOpenCount,
            GET_MIRROR => Self::GetMirror,
            CLEAR_RANGE => Self::ClearRange {
                start: read_int(arg, 0)?,
                end: read_int(arg, 1)?,
            },
            SET_APPEND_MODE => Self::SetMode(if read_int(arg, 0)? == 0 {
                WriteMode::Overwrite
            } else {
                WriteMode::Append
            }),
            other => return Err(DeviceError::UnknownCommand(other)),
        };
        Ok(request)
    }

    /// Command number of this request
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::ClearBuffer => CLEAR_BUFFER,
            Self::GetStatus => GET_STATUS,
            Self::ResetOffset => RESET_OFFSET,
            Self::SetBufferSize(_) => SET_BUFFER_SIZE,
            Self::GetOpenCount => GET_OPEN_COUNT,
            Self::GetMirror => GET_MIRROR,
            Self::ClearRange { .. } => CLEAR_RANGE,
            Self::SetMode(_) => SET_APPEND_MODE,
        }
    }

    /// Argument bytes a caller would pass along with `code()`
    #[must_use]
    pub fn encode_arg(&self) -> Vec<u8> {
        match *self {
            Self::SetBufferSize(size) => size.to_ne_bytes().to_vec(),
            Self::ClearRange { start, end } => {
                let mut arg = start.to_ne_bytes().to_vec();
                arg.extend_from_slice(&end.to_ne_bytes());
                arg
            }
            Self::SetMode(mode) => i32::from(mode == WriteMode::Append).to_ne_bytes().to_vec(),
            _ => Vec::new(),
        }
    }
}

/// Result of a successful control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    Done,
    Status(BufferStatus),
    OpenCount(u64),
    Mirror(Vec<u8>),
}

impl ControlResponse {
    /// Bytes copied back to the caller
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Done => Vec::new(),
            Self::Status(status) => {
                let mut out = clamp_int(status.used).to_ne_bytes().to_vec();
                out.extend_from_slice(&clamp_int(status.free).to_ne_bytes());
                out
            }
            Self::OpenCount(count) => i32::try_from(*count)
                .unwrap_or(i32::MAX)
                .to_ne_bytes()
                .to_vec(),
            Self::Mirror(bytes) => bytes.clone(),
        }
    }
}

fn read_int(arg: &[u8], index: usize) -> Result<i32> {
    let start = index * INT as usize;
    let bytes = arg
        .get(start..start + INT as usize)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .ok_or_else(|| {
            DeviceError::TransferFailure(format!(
                "control argument too short: {} bytes, need {}",
                arg.len(),
                start + INT as usize
            ))
        })?;
    Ok(i32::from_ne_bytes(bytes))
}

fn clamp_int(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_numbers_match_linux_encoding() {
        assert_eq!(CLEAR_BUFFER, 0x6301);
        assert_eq!(GET_STATUS, 0x8008_6302);
        assert_eq!(RESET_OFFSET, 0x6303);
        assert_eq!(SET_BUFFER_SIZE, 0x4004_6304);
        assert_eq!(GET_OPEN_COUNT, 0x8004_6305);
        assert_eq!(GET_MIRROR, 0x8400_6306);
        assert_eq!(CLEAR_RANGE, 0x4008_6307);
    }

    #[test]
    fn test_decode_clear_range() {
        let request = ControlRequest::ClearRange { start: 0, end: 4 };
        let decoded = ControlRequest::decode(request.code(), &request.encode_arg()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_short_argument() {
        let err = ControlRequest::decode(CLEAR_RANGE, &[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, DeviceError::TransferFailure(_)));
        assert_eq!(err.errno(), 14);
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(
            ControlRequest::decode(0xdead, &[]),
            Err(DeviceError::UnknownCommand(0xdead))
        );
    }

    #[test]
    fn test_status_encoding() {
        let bytes = ControlResponse::Status(BufferStatus { used: 5, free: 1019 }).encode();
        assert_eq!(&bytes[..4], &5i32.to_ne_bytes());
        assert_eq!(&bytes[4..], &1019i32.to_ne_bytes());
    }
}
