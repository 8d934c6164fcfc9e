//! Session bound to a device, closed on drop
//!
//! `DeviceFile` is what a transport hands to a caller after `open`: reads go
//! through the session cursor, writes go to the shared buffer, and dropping
//! it closes the session.

use std::fmt;

use crate::control::{ControlRequest, ControlResponse};
use crate::device::Device;
use crate::error::{DeviceError, Result};
use crate::idgen::SessionHandle;
use crate::io::SliceSink;

pub struct DeviceFile<'a> {
    device: &'a Device,
    session: SessionHandle,
    closed: bool,
}

impl<'a> DeviceFile<'a> {
    /// Open a new session on `device`
    ///
    /// # Errors
    /// As [`Device::open`].
    pub fn open(device: &'a Device) -> Result<Self> {
        Ok(Self {
            device,
            session: device.open()?,
            closed: false,
        })
    }

    #[must_use]
    pub fn session(&self) -> SessionHandle {
        self.session
    }

    /// Send an administrative command for this session
    ///
    /// # Errors
    /// As [`Device::control`].
    pub fn control(&self, request: ControlRequest) -> Result<ControlResponse> {
        self.device.control(self.session, request)
    }

    /// Close explicitly; a second close is a no-op
    ///
    /// # Errors
    /// As [`Device::close`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.device.close(self.session)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len();
        let mut sink = SliceSink::new(buf);
        self.device.read_to(self.session, len, &mut sink)
    }
}

impl fmt::Debug for DeviceFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceFile(session={}, cursor={:?}, closed={})",
            self.session,
            self.device.sessions().cursor(self.session),
            self.closed
        )
    }
}

impl Drop for DeviceFile<'_> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

impl std::io::Read for DeviceFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl std::io::Write for DeviceFile<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.device.write(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl embedded_io::ErrorType for DeviceFile<'_> {
    type Error = DeviceError;
}

impl embedded_io::Read for DeviceFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_into(buf)
    }
}

impl embedded_io::Write for DeviceFile<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.device.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
