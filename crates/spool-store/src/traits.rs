use std::fmt;

use crate::error::StoreResult;

/// A random-access file with an explicit durability barrier.
///
/// All implementations must satisfy these invariants:
/// - Writes become durable only after a successful `sync()`. A crash may
///   lose anything written since the last sync.
/// - `read_at` observes every prior write on the same handle, synced or not.
/// - Writing past the end extends the file; the gap reads as zeros.
/// - All I/O errors are propagated, never silently ignored.
pub trait StoreFile: Send + Sync + fmt::Debug {
    /// Fill `buf` from `offset`. Fails with `ShortRead` past end of file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()>;

    /// Write all of `data` at `offset`.
    fn write_at(&self, offset: u64, data: &[u8]) -> StoreResult<()>;

    /// Current length in bytes, including unsynced writes.
    fn len(&self) -> StoreResult<u64>;

    /// Truncate or zero-extend to `len` bytes.
    fn set_len(&self, len: u64) -> StoreResult<()>;

    /// Make every prior write durable.
    fn sync(&self) -> StoreResult<()>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read `len` bytes at `offset` into a fresh buffer.
    fn read_vec(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// A flat namespace of [`StoreFile`]s.
pub trait StoreDir: Send + Sync + fmt::Debug {
    /// Open the named file, creating it empty if it does not exist.
    fn open(&self, name: &str) -> StoreResult<Box<dyn StoreFile>>;

    /// Check whether the named file exists.
    fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Delete the named file. Returns `true` if it existed.
    fn remove(&self, name: &str) -> StoreResult<bool>;
}
