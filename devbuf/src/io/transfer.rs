//! Caller boundary: copying bytes in from and out to a caller
//!
//! The device never touches caller memory directly. A transport hands it a
//! `UserSource` on write and a `UserSink` on read; a failed copy surfaces as
//! `DeviceError::TransferFailure` and is not retried.

use crate::error::{DeviceError, Result};

/// "Read N bytes from caller"
pub trait UserSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `dst.len()` offered bytes into `dst`
    ///
    /// # Errors
    /// `TransferFailure` if the caller memory cannot be read.
    fn copy_from_user(&mut self, dst: &mut [u8]) -> Result<()>;
}

/// "Write N bytes to caller"
pub trait UserSink {
    /// Copy `src` out to the caller
    ///
    /// # Errors
    /// `TransferFailure` if the caller memory cannot be written.
    fn copy_to_user(&mut self, src: &[u8]) -> Result<()>;
}

impl UserSource for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_user(&mut self, dst: &mut [u8]) -> Result<()> {
        let src = self.get(..dst.len()).ok_or_else(|| {
            DeviceError::TransferFailure(format!(
                "source holds {} bytes, {} requested",
                <[u8]>::len(self),
                dst.len()
            ))
        })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserSink for Vec<u8> {
    fn copy_to_user(&mut self, src: &[u8]) -> Result<()> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// Fixed-size caller buffer, filled from the front
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    filled: usize,
}

impl<'a> SliceSink<'a> {
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, filled: 0 }
    }

    /// Bytes copied so far
    #[must_use]
    pub fn filled(&self) -> usize {
        self.filled
    }
}

impl UserSink for SliceSink<'_> {
    fn copy_to_user(&mut self, src: &[u8]) -> Result<()> {
        let room = self.buf.len() - self.filled;
        let end = self.filled + src.len();
        let dst = self.buf.get_mut(self.filled..end).ok_or_else(|| {
            DeviceError::TransferFailure(format!(
                "sink has room for {room} bytes, {} offered",
                src.len()
            ))
        })?;
        dst.copy_from_slice(src);
        self.filled = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source() {
        let mut src: &[u8] = b"hello";
        let mut dst = [0u8; 3];
        src.copy_from_user(&mut dst).unwrap();
        assert_eq!(&dst, b"hel");

        let mut big = [0u8; 8];
        assert!(matches!(
            src.copy_from_user(&mut big),
            Err(DeviceError::TransferFailure(_))
        ));
    }

    #[test]
    fn test_slice_sink_overflow() {
        let mut buf = [0u8; 4];
        let mut sink = SliceSink::new(&mut buf);
        sink.copy_to_user(b"ab").unwrap();
        sink.copy_to_user(b"cd").unwrap();
        assert_eq!(sink.filled(), 4);
        let err = sink.copy_to_user(b"e").unwrap_err();
        assert_eq!(
            err,
            DeviceError::TransferFailure("sink has room for 0 bytes, 1 offered".to_string())
        );
        assert_eq!(&buf, b"abcd");
    }
}
