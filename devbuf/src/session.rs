//! Per-session read cursors over the shared buffer
//!
//! Each session reads the buffer at its own position, the same way several
//! readers of one writer never disturb each other. Writes and administrative
//! commands go straight to the `Buffer`; only reads need a cursor.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DeviceError, Result};
use crate::idgen::{IdGen, SessionHandle};
use crate::io::{Buffer, UserSink};

/// Cursor state owned by one open session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    cursor: usize,
    rewinds: u64,
}

impl Session {
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// Registry of open sessions and the open counter
///
/// # Thread Safety
///
/// - Cursors live in one `parking_lot::Mutex`. A session read locks the
///   cursor table first and the buffer second, takes a copy of the chunk at
///   the cursor, and releases both before handing the copy to the sink. The
///   buffer never calls back into the registry, which keeps the lock order
///   fixed.
/// - The cursor is advanced afterwards, and only if the sink succeeded and
///   nothing moved the cursor in the meantime.
/// - `open_count` is atomic and only ever incremented.
pub struct SessionRegistry {
    buffer: Buffer,
    sessions: Mutex<HashMap<SessionHandle, Session>>,
    open_count: AtomicU64,
    ids: IdGen,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            sessions: Mutex::new(HashMap::new()),
            open_count: AtomicU64::new(0),
            ids: IdGen::new(),
        }
    }

    /// The buffer all sessions read from
    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Open a session with its cursor at 0
    ///
    /// # Errors
    /// `AllocationFailure` if the session table cannot grow.
    pub fn open(&self) -> Result<SessionHandle> {
        let mut sessions = self.sessions.lock();
        sessions
            .try_reserve(1)
            .map_err(|_| DeviceError::AllocationFailure {
                requested: std::mem::size_of::<Session>(),
            })?;

        let handle = self.ids.next_handle();
        sessions.insert(handle, Session::default());
        self.open_count.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    /// Read up to `max_len` bytes at the session cursor and advance it
    ///
    /// An empty result means the cursor reached the end of the used data.
    ///
    /// # Errors
    /// `BadHandle` if the session is not open.
    pub fn read(&self, handle: SessionHandle, max_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_with(handle, max_len, &mut out)?;
        Ok(out)
    }

    /// Hand up to `max_len` bytes at the session cursor to `sink`
    ///
    /// The cursor only advances when the sink accepted the bytes.
    ///
    /// # Errors
    /// `BadHandle` if the session is not open, or the sink's error.
    pub fn read_with(
        &self,
        handle: SessionHandle,
        max_len: usize,
        sink: &mut dyn UserSink,
    ) -> Result<usize> {
        let (before, chunk) = {
            let sessions = self.sessions.lock();
            let session = sessions.get(&handle).ok_or(DeviceError::BadHandle(handle))?;
            let guard = self.buffer.lock();
            let chunk = guard.store().slice_from(session.cursor, max_len).to_vec();
            (*session, chunk)
        };
        if chunk.is_empty() {
            return Ok(0);
        }

        // Both locks are released here: a slow or re-entrant sink only
        // blocks its own caller.
        sink.copy_to_user(&chunk)?;

        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&handle) {
            // A concurrent reset or read on the same session wins.
            if *session == before {
                session.cursor = before.cursor + chunk.len();
            }
        }
        Ok(chunk.len())
    }

    /// Rewind the session cursor to 0
    ///
    /// # Errors
    /// `BadHandle` if the session is not open.
    pub fn reset_offset(&self, handle: SessionHandle) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&handle)
            .ok_or(DeviceError::BadHandle(handle))?;
        session.cursor = 0;
        session.rewinds += 1;
        Ok(())
    }

    /// Current cursor of a session
    #[must_use]
    pub fn cursor(&self, handle: SessionHandle) -> Option<usize> {
        self.sessions.lock().get(&handle).map(Session::cursor)
    }

    /// Total number of opens since creation; closes do not decrease it
    #[must_use]
    pub fn get_open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Number of sessions currently open
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Release the session's cursor state
    ///
    /// # Errors
    /// `BadHandle` if the session was never opened or is already closed.
    pub fn close(&self, handle: SessionHandle) -> Result<()> {
        if self.sessions.lock().remove(&handle).is_none() {
            log::warn!("SessionRegistry::close() called on unknown session: {handle}");
            return Err(DeviceError::BadHandle(handle));
        }
        Ok(())
    }

    /// Drop every session, returning how many were open
    pub fn close_all(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let n = sessions.len();
        sessions.clear();
        n
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionRegistry(open={}, open_count={}, buffer={:?})",
            self.session_count(),
            self.get_open_count(),
            self.buffer
        )
    }
}
