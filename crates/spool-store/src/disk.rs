use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{StoreDir, StoreFile};

/// A directory of files on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskDir {
    root: PathBuf,
}

impl DiskDir {
    /// Use `root` as the pool directory, creating it if necessary.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StoreDir for DiskDir {
    fn open(&self, name: &str) -> StoreResult<Box<dyn StoreFile>> {
        Ok(Box::new(DiskFile::open(&self.root.join(name))?))
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.root.join(name).try_exists()?)
    }

    fn remove(&self, name: &str) -> StoreResult<bool> {
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// A single file on disk. Positioned I/O is serialized through a mutex.
#[derive(Debug)]
pub struct DiskFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl DiskFile {
    /// Open (or create) the file at `path` for reading and writing.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        debug!(path = %path.display(), "opened store file");
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreFile for DiskFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        let mut file = self.file.lock().expect("file mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        match file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(StoreError::ShortRead {
                offset,
                wanted: buf.len(),
                available: file.metadata()?.len(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StoreResult<()> {
        let mut file = self.file.lock().expect("file mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn len(&self) -> StoreResult<u64> {
        let file = self.file.lock().expect("file mutex poisoned");
        Ok(file.metadata()?.len())
    }

    fn set_len(&self, len: u64) -> StoreResult<()> {
        let file = self.file.lock().expect("file mutex poisoned");
        file.set_len(len)?;
        Ok(())
    }

    fn sync(&self) -> StoreResult<()> {
        let file = self.file.lock().expect("file mutex poisoned");
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskDir::new(dir.path()).unwrap();
        let f = store.open("data").unwrap();
        f.write_at(0, b"hello world").unwrap();
        f.sync().unwrap();
        assert_eq!(f.len().unwrap(), 11);
        assert_eq!(f.read_vec(6, 5).unwrap(), b"world");
    }

    #[test]
    fn write_past_end_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let f = DiskDir::new(dir.path()).unwrap().open("gap").unwrap();
        f.write_at(4, b"x").unwrap();
        assert_eq!(f.read_vec(0, 5).unwrap(), b"\0\0\0\0x");
    }

    #[test]
    fn short_read_reports_available() {
        let dir = tempfile::tempdir().unwrap();
        let f = DiskDir::new(dir.path()).unwrap().open("short").unwrap();
        f.write_at(0, b"abc").unwrap();
        match f.read_vec(1, 8) {
            Err(StoreError::ShortRead { offset: 1, wanted: 8, available: 3 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn set_len_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let f = DiskDir::new(dir.path()).unwrap().open("t").unwrap();
        f.write_at(0, &[7u8; 32]).unwrap();
        f.set_len(8).unwrap();
        assert_eq!(f.len().unwrap(), 8);
        assert!(f.read_vec(0, 9).is_err());
    }

    #[test]
    fn reopen_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskDir::new(dir.path().join("nested")).unwrap();
        store.open("keep").unwrap().write_at(0, b"persist").unwrap();
        let again = store.open("keep").unwrap();
        assert_eq!(again.read_vec(0, 7).unwrap(), b"persist");
    }

    #[test]
    fn exists_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskDir::new(dir.path()).unwrap();
        assert!(!store.exists("f").unwrap());
        store.open("f").unwrap();
        assert!(store.exists("f").unwrap());
        assert!(store.remove("f").unwrap());
        assert!(!store.remove("f").unwrap());
    }
}
