//! I/O module for devbuf
//!
//! Contains the byte store and the caller-boundary traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  SessionRegistry (cursors)          │
//! │  - one cursor per open session      │
//! │  - open counter                     │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ reads through Buffer
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Buffer (shared storage)            │
//! │  - Arc<Mutex<BufferStore>>          │
//! │  - write/resize/clear under lock    │
//! │  - lock() for reading               │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ bytes cross via
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  UserSource / UserSink (transfer)   │
//! └─────────────────────────────────────┘
//! ```

pub mod buffer;
pub mod transfer;

pub use buffer::{
    Buffer, BufferReadGuard, BufferStatus, BufferStore, WriteMode, DEFAULT_CAPACITY, MAX_CAPACITY,
};
pub use transfer::{SliceSink, UserSink, UserSource};
