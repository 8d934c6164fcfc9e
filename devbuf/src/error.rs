//! Error types for device operations

use core::ffi::c_int;

use crate::idgen::SessionHandle;

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors reported by the buffer, the session registry and the device facade.
///
/// Every failed operation leaves the prior state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Write found no writable capacity
    #[error("no space left in buffer")]
    OutOfSpace,

    /// Resize argument outside `1..=max`
    #[error("invalid buffer size {requested} (allowed 1..={max})")]
    InvalidSize { requested: i64, max: usize },

    /// `clear_range` bounds violate `0 <= start <= end < capacity`
    #[error("invalid range [{start}, {end}] for capacity {capacity}")]
    InvalidRange {
        start: i64,
        end: i64,
        capacity: usize,
    },

    /// Copy across the caller boundary failed
    #[error("transfer failed: {0}")]
    TransferFailure(String),

    /// Backing storage or session state could not be allocated
    #[error("failed to allocate {requested} bytes")]
    AllocationFailure { requested: usize },

    /// Session handle is unknown or already closed
    #[error("bad session handle: {0:?}")]
    BadHandle(SessionHandle),

    /// Control command number is not recognized
    #[error("unknown control command {0:#x}")]
    UnknownCommand(u32),

    /// The owning service task is gone
    #[error("device service stopped")]
    ServiceStopped,
}

const EBADF: c_int = 9;
const ENOMEM: c_int = 12;
const EFAULT: c_int = 14;
const EINVAL: c_int = 22;
const ENOSPC: c_int = 28;
const EPIPE: c_int = 32;

impl DeviceError {
    /// Positive errno a kernel-style transport would report for this error
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::OutOfSpace => ENOSPC,
            Self::InvalidSize { .. } | Self::InvalidRange { .. } | Self::UnknownCommand(_) => {
                EINVAL
            }
            Self::TransferFailure(_) => EFAULT,
            Self::AllocationFailure { .. } => ENOMEM,
            Self::BadHandle(_) => EBADF,
            Self::ServiceStopped => EPIPE,
        }
    }

    /// Map to the closest `embedded_io` error kind
    #[must_use]
    pub fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::OutOfSpace | Self::AllocationFailure { .. } => embedded_io::ErrorKind::OutOfMemory,
            Self::InvalidSize { .. }
            | Self::InvalidRange { .. }
            | Self::UnknownCommand(_)
            | Self::BadHandle(_) => embedded_io::ErrorKind::InvalidInput,
            Self::ServiceStopped => embedded_io::ErrorKind::BrokenPipe,
            Self::TransferFailure(_) => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::Error for DeviceError {
    fn kind(&self) -> embedded_io::ErrorKind {
        DeviceError::kind(self)
    }
}

impl From<DeviceError> for std::io::Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::ServiceStopped => {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, e.to_string())
            }
            DeviceError::InvalidSize { .. }
            | DeviceError::InvalidRange { .. }
            | DeviceError::UnknownCommand(_)
            | DeviceError::BadHandle(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
            }
            _ => std::io::Error::from_raw_os_error(e.errno()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(DeviceError::OutOfSpace.errno(), 28);
        assert_eq!(
            DeviceError::InvalidSize {
                requested: 0,
                max: 8192
            }
            .errno(),
            22
        );
        assert_eq!(DeviceError::TransferFailure("x".into()).errno(), 14);
        assert_eq!(DeviceError::AllocationFailure { requested: 1 }.errno(), 12);
        assert_eq!(DeviceError::BadHandle(SessionHandle::new(3)).errno(), 9);
    }

    #[test]
    fn test_errno_is_positive() {
        let errors = [
            DeviceError::OutOfSpace,
            DeviceError::UnknownCommand(0),
            DeviceError::TransferFailure("x".into()),
            DeviceError::AllocationFailure { requested: 1 },
            DeviceError::BadHandle(SessionHandle::new(1)),
            DeviceError::ServiceStopped,
        ];
        for e in errors {
            assert!(e.errno() > 0, "{e}: {}", e.errno());
        }
        let e: std::io::Error = DeviceError::AllocationFailure { requested: 1 }.into();
        assert_eq!(e.raw_os_error(), Some(12));
    }

    #[test]
    fn test_display() {
        let e = DeviceError::InvalidRange {
            start: 4,
            end: 2,
            capacity: 1024,
        };
        assert_eq!(e.to_string(), "invalid range [4, 2] for capacity 1024");
    }

    #[test]
    fn test_into_io_error() {
        let e: std::io::Error = DeviceError::OutOfSpace.into();
        assert_eq!(e.raw_os_error(), Some(28));
        let e: std::io::Error = DeviceError::ServiceStopped.into();
        assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
