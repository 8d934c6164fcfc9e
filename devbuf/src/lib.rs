pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod file;
pub mod idgen;
pub mod io;
pub mod service;
pub mod session;

// Re-export error types for convenience
pub use error::{DeviceError, Result};

// Re-export idgen types for convenience
pub use idgen::{IdGen, SessionHandle};

// Re-export Buffer types for convenience
pub use io::{Buffer, BufferReadGuard, BufferStatus, BufferStore, WriteMode};

// Re-export the device facade and its session wrapper
pub use config::{ConfigError, DeviceConfig};
pub use control::{ControlRequest, ControlResponse};
pub use device::Device;
pub use file::DeviceFile;
pub use session::SessionRegistry;

// Re-export service types
pub use service::{DeviceClient, DeviceRequest, DeviceService};
