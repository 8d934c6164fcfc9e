//! Device facade: the single buffer and its sessions
//!
//! A `Device` is created once from a `DeviceConfig` and handed around
//! explicitly (by reference, `Arc`, or through `DeviceService`). It exposes
//! the five transport entry points: `open`, `read`, `write`, `control`,
//! `close`. Dropping it releases every session and the storage.

use tracing::{debug, info, trace, warn};

use crate::config::DeviceConfig;
use crate::control::{ControlRequest, ControlResponse};
use crate::error::{DeviceError, Result};
use crate::idgen::SessionHandle;
use crate::io::{
    Buffer, BufferStatus, BufferStore, UserSink, UserSource, WriteMode, MAX_CAPACITY,
};
use crate::session::SessionRegistry;

pub struct Device {
    name: String,
    registry: SessionRegistry,
}

impl Device {
    /// Allocate the buffer described by `config`
    ///
    /// # Errors
    /// `InvalidSize` if the configured capacities are out of bounds,
    /// `AllocationFailure` if the storage cannot be allocated.
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let store =
            BufferStore::with_limits(config.initial_capacity, config.max_capacity, config.mode)?;
        info!(
            device = %config.name,
            capacity = store.capacity(),
            max_capacity = store.max_capacity(),
            mode = ?store.mode(),
            "device initialized"
        );
        Ok(Self {
            name: config.name.clone(),
            registry: SessionRegistry::new(Buffer::from_store(store)),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        self.registry.buffer()
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a new session
    ///
    /// # Errors
    /// `AllocationFailure` if the session state cannot be allocated.
    pub fn open(&self) -> Result<SessionHandle> {
        let handle = self.registry.open().inspect_err(|e| {
            warn!(device = %self.name, error = %e, "open failed");
        })?;
        debug!(
            device = %self.name,
            session = %handle,
            open_count = self.registry.get_open_count(),
            "session opened"
        );
        Ok(handle)
    }

    /// Read up to `max_len` bytes at the session cursor
    ///
    /// # Errors
    /// `BadHandle` for an unknown session.
    pub fn read(&self, session: SessionHandle, max_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to(session, max_len, &mut out)?;
        Ok(out)
    }

    /// Read up to `max_len` bytes at the session cursor into a caller sink
    ///
    /// Returns 0 at end of data. The cursor stays put if the sink fails.
    ///
    /// # Errors
    /// `BadHandle` for an unknown session, `TransferFailure` from the sink.
    pub fn read_to(
        &self,
        session: SessionHandle,
        max_len: usize,
        sink: &mut dyn UserSink,
    ) -> Result<usize> {
        let n = self
            .registry
            .read_with(session, max_len, sink)
            .inspect_err(|e| warn!(device = %self.name, session = %session, error = %e, "read failed"))?;
        if n == 0 {
            trace!(device = %self.name, session = %session, "no more data to read");
        } else {
            trace!(device = %self.name, session = %session, bytes = n, "read");
        }
        Ok(n)
    }

    /// Write according to the current mode
    ///
    /// # Errors
    /// `OutOfSpace` when the buffer has no writable capacity.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        match self.buffer().write(data) {
            Ok(n) => {
                trace!(device = %self.name, bytes = n, offered = data.len(), "written");
                Ok(n)
            }
            Err(e) => {
                debug!(device = %self.name, error = %e, "write rejected");
                Err(e)
            }
        }
    }

    /// Copy the caller's bytes in, then write them
    ///
    /// No write can exceed `MAX_CAPACITY`, so at most that much is copied.
    ///
    /// # Errors
    /// `TransferFailure` from the source (buffer untouched), else as [`Device::write`].
    pub fn write_from(&self, source: &mut dyn UserSource) -> Result<usize> {
        let mut data = vec![0u8; source.len().min(MAX_CAPACITY)];
        source.copy_from_user(&mut data).inspect_err(|e| {
            warn!(device = %self.name, error = %e, "copy from caller failed");
        })?;
        self.write(&data)
    }

    /// Execute an administrative command on behalf of `session`
    ///
    /// Only `ResetOffset` looks at the session.
    ///
    /// # Errors
    /// Whatever the command reports; see the individual methods.
    pub fn control(
        &self,
        session: SessionHandle,
        request: ControlRequest,
    ) -> Result<ControlResponse> {
        trace!(device = %self.name, session = %session, ?request, "control");
        let response = match request {
            ControlRequest::ClearBuffer => {
                self.clear_buffer();
                ControlResponse::Done
            }
            ControlRequest::GetStatus => ControlResponse::Status(self.get_status()),
            ControlRequest::ResetOffset => {
                self.reset_offset(session)?;
                ControlResponse::Done
            }
            ControlRequest::SetBufferSize(size) => {
                self.set_buffer_size(i64::from(size))?;
                ControlResponse::Done
            }
            ControlRequest::GetOpenCount => ControlResponse::OpenCount(self.get_open_count()),
            ControlRequest::GetMirror => ControlResponse::Mirror(self.get_mirror()),
            ControlRequest::ClearRange { start, end } => {
                self.clear_range(i64::from(start), i64::from(end))?;
                ControlResponse::Done
            }
            ControlRequest::SetMode(mode) => {
                self.set_mode(mode);
                ControlResponse::Done
            }
        };
        Ok(response)
    }

    /// Raw ioctl-style entry: decode, execute, encode the reply
    ///
    /// # Errors
    /// `UnknownCommand`/`TransferFailure` from decoding, else as [`Device::control`].
    pub fn ioctl(&self, session: SessionHandle, cmd: u32, arg: &[u8]) -> Result<Vec<u8>> {
        let request = ControlRequest::decode(cmd, arg).inspect_err(|e| {
            warn!(device = %self.name, cmd, error = %e, "bad control request");
        })?;
        Ok(self.control(session, request)?.encode())
    }

    pub fn clear_buffer(&self) {
        self.buffer().clear();
        debug!(device = %self.name, "buffer cleared");
    }

    #[must_use]
    pub fn get_status(&self) -> BufferStatus {
        self.buffer().status()
    }

    /// # Errors
    /// `BadHandle` for an unknown session.
    pub fn reset_offset(&self, session: SessionHandle) -> Result<()> {
        self.registry.reset_offset(session)?;
        debug!(device = %self.name, session = %session, "offset reset");
        Ok(())
    }

    /// Resize the buffer; signed so that non-positive requests are reported as such
    ///
    /// # Errors
    /// `InvalidSize` outside `1..=max_capacity`, `AllocationFailure` on OOM.
    pub fn set_buffer_size(&self, requested: i64) -> Result<()> {
        let buffer = self.buffer();
        let result = usize::try_from(requested)
            .map_err(|_| DeviceError::InvalidSize {
                requested,
                max: buffer.max_capacity(),
            })
            .and_then(|size| buffer.resize(size));
        match &result {
            Ok(()) => debug!(device = %self.name, capacity = requested, "buffer resized"),
            Err(e) => warn!(device = %self.name, error = %e, "resize rejected"),
        }
        result
    }

    #[must_use]
    pub fn get_open_count(&self) -> u64 {
        self.registry.get_open_count()
    }

    #[must_use]
    pub fn get_mirror(&self) -> Vec<u8> {
        self.buffer().mirror()
    }

    /// Zero `[start, end]` inclusive without touching the used length
    ///
    /// # Errors
    /// `InvalidRange` unless `0 <= start <= end < capacity`.
    pub fn clear_range(&self, start: i64, end: i64) -> Result<()> {
        let buffer = self.buffer();
        let result = match (usize::try_from(start), usize::try_from(end)) {
            (Ok(s), Ok(e)) => buffer.clear_range(s, e),
            _ => Err(DeviceError::InvalidRange {
                start,
                end,
                capacity: buffer.capacity(),
            }),
        };
        match &result {
            Ok(()) => debug!(device = %self.name, start, end, "range cleared"),
            Err(e) => warn!(device = %self.name, error = %e, "clear range rejected"),
        }
        result
    }

    pub fn set_mode(&self, mode: WriteMode) {
        self.buffer().set_mode(mode);
        debug!(device = %self.name, ?mode, "write mode set");
    }

    /// Close a session
    ///
    /// # Errors
    /// `BadHandle` if the session is not open.
    pub fn close(&self, session: SessionHandle) -> Result<()> {
        self.registry.close(session)?;
        debug!(device = %self.name, session = %session, "session closed");
        Ok(())
    }

    /// Drop every open session; returns how many were still open
    pub fn shutdown(&self) -> usize {
        let dropped = self.registry.close_all();
        if dropped > 0 {
            debug!(device = %self.name, sessions = dropped, "open sessions dropped");
        }
        dropped
    }
}

impl Default for Device {
    fn default() -> Self {
        Self {
            name: DeviceConfig::default().name,
            registry: SessionRegistry::new(Buffer::new()),
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Device(name={}, {:?})", self.name, self.registry)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let dropped = self.shutdown();
        info!(device = %self.name, sessions = dropped, "device released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_dispatch() {
        let device = Device::default();
        let s = device.open().unwrap();
        device.write(b"HELLO").unwrap();

        assert_eq!(
            device.control(s, ControlRequest::GetStatus).unwrap(),
            ControlResponse::Status(BufferStatus { used: 5, free: 1019 })
        );
        assert_eq!(
            device.control(s, ControlRequest::GetMirror).unwrap(),
            ControlResponse::Mirror(b"OLLEH".to_vec())
        );
        assert_eq!(
            device.control(s, ControlRequest::GetOpenCount).unwrap(),
            ControlResponse::OpenCount(1)
        );
    }

    #[test]
    fn test_negative_arguments() {
        let device = Device::default();
        assert!(matches!(
            device.set_buffer_size(-5),
            Err(DeviceError::InvalidSize { requested: -5, .. })
        ));
        assert!(matches!(
            device.clear_range(-1, 3),
            Err(DeviceError::InvalidRange { start: -1, end: 3, .. })
        ));
    }
}
