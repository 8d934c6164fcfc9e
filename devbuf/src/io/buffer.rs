//! Resizable byte store and its shared, lock-guarded handle
//!
//! `BufferStore` is the plain data structure: fixed-capacity storage, a
//! used-length counter and a write mode. `Buffer` wraps one store in
//! `Arc<Mutex<..>>` so every clone observes and mutates the same bytes.

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{DeviceError, Result};

/// Capacity of a freshly created store
pub const DEFAULT_CAPACITY: usize = 1024;

/// Hard upper bound for any capacity
pub const MAX_CAPACITY: usize = 8192;

/// Write placement policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Every write replaces the contents starting at offset 0
    #[default]
    Overwrite,
    /// Writes land after the currently used bytes
    Append,
}

/// Snapshot returned by `status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub used: usize,
    pub free: usize,
}

/// Backing storage of the device
///
/// Invariant: `used <= storage.len()`. The length of `storage` is the
/// capacity; bytes past `used` may hold stale data but are never readable.
pub struct BufferStore {
    storage: Vec<u8>,
    used: usize,
    mode: WriteMode,
    max_capacity: usize,
}

impl BufferStore {
    /// Create a zero-filled store with the given capacity and the default limits
    ///
    /// # Errors
    /// `InvalidSize` if `capacity` is outside `1..=MAX_CAPACITY`,
    /// `AllocationFailure` if the storage cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_limits(capacity, MAX_CAPACITY, WriteMode::default())
    }

    /// Create a store with an explicit capacity ceiling and write mode
    ///
    /// `max_capacity` is itself clamped to `MAX_CAPACITY`.
    ///
    /// # Errors
    /// Same as [`BufferStore::new`].
    pub fn with_limits(capacity: usize, max_capacity: usize, mode: WriteMode) -> Result<Self> {
        let max_capacity = max_capacity.min(MAX_CAPACITY);
        check_capacity(capacity, max_capacity)?;
        Ok(Self {
            storage: allocate(capacity)?,
            used: 0,
            mode,
            max_capacity,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of leading bytes holding valid data
    #[must_use]
    pub fn len(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    #[must_use]
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: WriteMode) {
        self.mode = mode;
    }

    /// The used bytes
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.storage[..self.used]
    }

    /// The whole storage including the logically unused tail
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.storage
    }

    /// Write data according to the current mode, truncating silently
    ///
    /// Returns the number of bytes stored. In overwrite mode the used length
    /// becomes exactly that number, so an empty overwrite empties the buffer.
    ///
    /// # Errors
    /// `OutOfSpace` when no byte can be written, even for empty input.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let offset = match self.mode {
            WriteMode::Append => self.used,
            WriteMode::Overwrite => 0,
        };
        let writable = self.capacity() - offset;
        if writable == 0 {
            return Err(DeviceError::OutOfSpace);
        }

        let n = data.len().min(writable);
        self.storage[offset..offset + n].copy_from_slice(&data[..n]);
        self.used = match self.mode {
            WriteMode::Append => self.used + n,
            WriteMode::Overwrite => n,
        };
        Ok(n)
    }

    /// Copy up to `buf.len()` used bytes starting at `offset` into `buf`
    ///
    /// Returns 0 when `offset` is at or past the used length.
    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> usize {
        let chunk = self.slice_from(offset, buf.len());
        buf[..chunk.len()].copy_from_slice(chunk);
        chunk.len()
    }

    /// Owned copy of up to `max_len` used bytes starting at `offset`
    #[must_use]
    pub fn read_range(&self, offset: usize, max_len: usize) -> Vec<u8> {
        self.slice_from(offset, max_len).to_vec()
    }

    pub(crate) fn slice_from(&self, offset: usize, max_len: usize) -> &[u8] {
        if offset >= self.used {
            return &[];
        }
        let n = max_len.min(self.used - offset);
        &self.storage[offset..offset + n]
    }

    /// Zero the whole storage and forget the contents
    pub fn clear(&mut self) {
        self.storage.fill(0);
        self.used = 0;
    }

    /// Zero `storage[start..=end]`
    ///
    /// The used length is left as is: zeroed bytes below it stay readable.
    ///
    /// # Errors
    /// `InvalidRange` unless `start <= end < capacity`; nothing is touched then.
    pub fn clear_range(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end || end >= self.capacity() {
            return Err(DeviceError::InvalidRange {
                start: to_i64(start),
                end: to_i64(end),
                capacity: self.capacity(),
            });
        }
        self.storage[start..=end].fill(0);
        Ok(())
    }

    /// Reallocate the storage to `new_capacity` bytes
    ///
    /// The first `min(old, new)` bytes survive, the used length is clamped.
    ///
    /// # Errors
    /// `InvalidSize` outside `1..=max_capacity`, `AllocationFailure` if the new
    /// storage cannot be reserved. The old storage is intact on failure.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        check_capacity(new_capacity, self.max_capacity)?;
        let mut storage = allocate(new_capacity)?;
        let keep = self.capacity().min(new_capacity);
        storage[..keep].copy_from_slice(&self.storage[..keep]);
        self.storage = storage;
        self.used = self.used.min(new_capacity);
        Ok(())
    }

    /// Byte-reversed copy of the used contents
    #[must_use]
    pub fn mirror(&self) -> Vec<u8> {
        self.contents().iter().rev().copied().collect()
    }

    #[must_use]
    pub fn status(&self) -> BufferStatus {
        BufferStatus {
            used: self.used,
            free: self.capacity() - self.used,
        }
    }
}

impl Default for BufferStore {
    fn default() -> Self {
        Self {
            storage: vec![0; DEFAULT_CAPACITY],
            used: 0,
            mode: WriteMode::default(),
            max_capacity: MAX_CAPACITY,
        }
    }
}

impl fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferStore(capacity={}, used={}, mode={:?}, max={})",
            self.capacity(),
            self.used,
            self.mode,
            self.max_capacity
        )
    }
}

fn check_capacity(capacity: usize, max_capacity: usize) -> Result<()> {
    if capacity == 0 || capacity > max_capacity {
        return Err(DeviceError::InvalidSize {
            requested: to_i64(capacity),
            max: max_capacity,
        });
    }
    Ok(())
}

fn allocate(capacity: usize) -> Result<Vec<u8>> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(capacity)
        .map_err(|_| DeviceError::AllocationFailure {
            requested: capacity,
        })?;
    storage.resize(capacity, 0);
    Ok(storage)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Read-only guard to the used contents
///
/// Holds the lock and provides read-only access to the underlying data.
/// The lock is released when the guard is dropped.
pub struct BufferReadGuard<'a>(MutexGuard<'a, BufferStore>);

impl BufferReadGuard<'_> {
    /// The whole store behind the guard
    #[must_use]
    pub fn store(&self) -> &BufferStore {
        &self.0
    }
}

impl Deref for BufferReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0.contents()
    }
}

impl AsRef<[u8]> for BufferReadGuard<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.contents()
    }
}

/// Shared buffer with internal locking
///
/// A thread-safe handle backed by `Arc<Mutex<BufferStore>>`. Multiple clones
/// share the same underlying store.
///
/// # Thread Safety
///
/// Every operation takes the single `parking_lot::Mutex` for its whole
/// duration, so a resize never interleaves with a write or a read and the
/// used length is never updated concurrently.
///
/// # Example
///
/// ```
/// use devbuf::io::Buffer;
///
/// let buffer = Buffer::new();
/// buffer.write(b"hello").unwrap();
///
/// let guard = buffer.lock();
/// assert_eq!(&*guard, b"hello");
/// ```
#[derive(Clone)]
pub struct Buffer(Arc<Mutex<BufferStore>>);

impl Buffer {
    /// Create a buffer with the default capacity and overwrite mode
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(BufferStore::default())
    }

    #[must_use]
    pub fn from_store(store: BufferStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    /// See [`BufferStore::write`]
    ///
    /// # Errors
    /// `OutOfSpace` when the buffer has no writable capacity.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.0.lock().write(data)
    }

    #[must_use]
    pub fn read_range(&self, offset: usize, max_len: usize) -> Vec<u8> {
        self.0.lock().read_range(offset, max_len)
    }

    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> usize {
        self.0.lock().read_into(offset, buf)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// See [`BufferStore::clear_range`]
    ///
    /// # Errors
    /// `InvalidRange` on bad bounds.
    pub fn clear_range(&self, start: usize, end: usize) -> Result<()> {
        self.0.lock().clear_range(start, end)
    }

    /// See [`BufferStore::resize`]
    ///
    /// # Errors
    /// `InvalidSize` or `AllocationFailure`.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        self.0.lock().resize(new_capacity)
    }

    #[must_use]
    pub fn mirror(&self) -> Vec<u8> {
        self.0.lock().mirror()
    }

    #[must_use]
    pub fn status(&self) -> BufferStatus {
        self.0.lock().status()
    }

    #[must_use]
    pub fn mode(&self) -> WriteMode {
        self.0.lock().mode()
    }

    pub fn set_mode(&self, mode: WriteMode) {
        self.0.lock().set_mode(mode);
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.0.lock().capacity()
    }

    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.0.lock().max_capacity()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Lock the buffer for reading
    ///
    /// The lock is held until the guard is dropped.
    ///
    /// ```
    /// use devbuf::io::Buffer;
    ///
    /// let buffer = Buffer::new();
    /// buffer.write(b"hello world").unwrap();
    ///
    /// let guard = buffer.lock();
    /// assert_eq!(&guard[0..5], b"hello");
    /// ```
    #[must_use]
    pub fn lock(&self) -> BufferReadGuard<'_> {
        BufferReadGuard(self.0.lock())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({:?})", *self.0.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(data: &[u8]) -> BufferStore {
        let mut store = BufferStore::default();
        store.write(data).unwrap();
        store
    }

    #[test]
    fn test_new_store_defaults() {
        let store = BufferStore::default();
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);
        assert_eq!(store.mode(), WriteMode::Overwrite);
        assert!(store.is_empty());
        assert!(store.raw().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_new_rejects_bad_capacity() {
        assert!(matches!(
            BufferStore::new(0),
            Err(DeviceError::InvalidSize { requested: 0, .. })
        ));
        assert!(BufferStore::new(MAX_CAPACITY + 1).is_err());
        assert_eq!(BufferStore::new(MAX_CAPACITY).unwrap().capacity(), MAX_CAPACITY);
    }

    #[test]
    fn test_overwrite_replaces_from_start() {
        let mut store = store_with(b"HELLO");
        assert_eq!(store.write(b"AB").unwrap(), 2);
        assert_eq!(store.contents(), b"AB");
        // old tail still sits in storage
        assert_eq!(&store.raw()[..5], b"ABLLO");
    }

    #[test]
    fn test_empty_overwrite_empties() {
        let mut store = store_with(b"HELLO");
        assert_eq!(store.write(b"").unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_truncates_then_out_of_space() {
        let mut store = BufferStore::with_limits(4, MAX_CAPACITY, WriteMode::Append).unwrap();
        assert_eq!(store.write(b"abc").unwrap(), 3);
        assert_eq!(store.write(b"defg").unwrap(), 1);
        assert_eq!(store.contents(), b"abcd");
        assert_eq!(store.write(b"x"), Err(DeviceError::OutOfSpace));
        assert_eq!(store.write(b""), Err(DeviceError::OutOfSpace));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_read_past_used_is_empty() {
        let store = store_with(b"abc");
        assert_eq!(store.read_range(1, 10), b"bc");
        assert!(store.read_range(3, 10).is_empty());
        assert!(store.read_range(500, 10).is_empty());

        let mut buf = [0u8; 2];
        assert_eq!(store.read_into(0, &mut buf), 2);
        assert_eq!(&buf, b"ab");
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let mut store = store_with(b"abc");
        store.clear();
        assert!(store.is_empty());
        assert!(store.raw().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_clear_range_keeps_used_length() {
        let mut store = store_with(b"HELLO");
        store.clear_range(0, 1).unwrap();
        assert_eq!(store.contents(), b"\0\0LLO");
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_clear_range_rejects_bad_bounds() {
        let mut store = store_with(b"HELLO");
        assert!(store.clear_range(3, 2).is_err());
        assert!(store.clear_range(0, DEFAULT_CAPACITY).is_err());
        assert_eq!(store.contents(), b"HELLO");
        store.clear_range(DEFAULT_CAPACITY - 1, DEFAULT_CAPACITY - 1).unwrap();
    }

    #[test]
    fn test_resize_shrink_clamps_used() {
        let mut store = store_with(b"HELLO");
        store.resize(3).unwrap();
        assert_eq!(store.capacity(), 3);
        assert_eq!(store.contents(), b"HEL");
    }

    #[test]
    fn test_resize_grow_preserves_and_zero_fills() {
        let mut store = store_with(b"HELLO");
        store.resize(2048).unwrap();
        assert_eq!(store.capacity(), 2048);
        assert_eq!(store.contents(), b"HELLO");
        assert!(store.raw()[DEFAULT_CAPACITY..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_resize_respects_configured_ceiling() {
        let mut store = BufferStore::with_limits(16, 64, WriteMode::Overwrite).unwrap();
        assert!(store.resize(65).is_err());
        assert_eq!(store.capacity(), 16);
        store.resize(64).unwrap();
    }

    #[test]
    fn test_mirror() {
        assert_eq!(store_with(b"ABC").mirror(), b"CBA");
        assert!(BufferStore::default().mirror().is_empty());
    }

    #[test]
    fn test_status() {
        let store = store_with(b"HELLO");
        assert_eq!(store.status(), BufferStatus { used: 5, free: 1019 });
    }

    #[test]
    fn test_clone_shares_data() {
        let buffer1 = Buffer::new();
        let buffer2 = buffer1.clone();

        buffer1.write(b"from buffer1").unwrap();

        let guard = buffer2.lock();
        assert_eq!(&*guard, b"from buffer1");
    }

    #[test]
    fn test_read_guard_as_ref() {
        let buffer = Buffer::new();
        buffer.write(b"test").unwrap();

        let guard = buffer.lock();
        let slice: &[u8] = guard.as_ref();
        assert_eq!(slice, b"test");
        assert_eq!(guard.store().capacity(), DEFAULT_CAPACITY);
    }
}
