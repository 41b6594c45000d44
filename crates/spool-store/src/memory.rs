use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{StoreError, StoreResult};
use crate::traits::{StoreDir, StoreFile};

type FileId = usize;

/// Contents of one in-memory file: what survives a crash and what the
/// process currently sees.
#[derive(Default, Debug)]
struct MemData {
    synced: Vec<u8>,
    live: Vec<u8>,
}

/// Operations recorded by the in-memory filesystem, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemEvent {
    Create(String),
    Write { file: String, offset: u64, len: usize },
    SetLen { file: String, len: u64 },
    Sync(String),
    Remove(String),
}

#[derive(Debug, Default)]
struct MemFs {
    names: HashMap<String, FileId>,
    paths: Vec<String>,
    data: Vec<MemData>,
    events: Vec<MemEvent>,
    /// Mutating operations left before the filesystem goes down.
    /// `Some(0)` means it is down.
    time_to_crash: Option<usize>,
    /// Mutating operations left before one of them fails with
    /// [`StoreError::Fault`].
    time_to_fault: Option<usize>,
}

impl MemFs {
    fn check_crashed(&self) -> StoreResult<()> {
        if self.time_to_crash == Some(0) {
            Err(StoreError::Crashed)
        } else {
            Ok(())
        }
    }

    /// Count one mutating operation against the crash budget.
    fn perform_op(&mut self) -> StoreResult<()> {
        self.check_crashed()?;
        match self.time_to_fault {
            Some(0) => {
                self.time_to_fault = None;
                return Err(StoreError::Fault);
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        if let Some(left) = self.time_to_crash.as_mut() {
            *left -= 1;
        }
        Ok(())
    }

    fn open(&mut self, name: &str) -> StoreResult<FileId> {
        self.check_crashed()?;
        if let Some(&id) = self.names.get(name) {
            return Ok(id);
        }
        self.perform_op()?;
        let id = self.data.len();
        self.data.push(MemData::default());
        self.paths.push(name.to_string());
        self.names.insert(name.to_string(), id);
        self.events.push(MemEvent::Create(name.to_string()));
        Ok(id)
    }

    fn write(&mut self, id: FileId, offset: u64, bytes: &[u8]) -> StoreResult<()> {
        self.perform_op()?;
        let start = offset as usize;
        let end = start + bytes.len();
        let live = &mut self.data[id].live;
        if live.len() < end {
            live.resize(end, 0);
        }
        live[start..end].copy_from_slice(bytes);
        self.events.push(MemEvent::Write {
            file: self.paths[id].clone(),
            offset,
            len: bytes.len(),
        });
        Ok(())
    }

    fn set_len(&mut self, id: FileId, len: u64) -> StoreResult<()> {
        self.perform_op()?;
        self.data[id].live.resize(len as usize, 0);
        self.events.push(MemEvent::SetLen {
            file: self.paths[id].clone(),
            len,
        });
        Ok(())
    }

    fn sync(&mut self, id: FileId) -> StoreResult<()> {
        self.perform_op()?;
        let file = &mut self.data[id];
        file.synced.clone_from(&file.live);
        self.events.push(MemEvent::Sync(self.paths[id].clone()));
        Ok(())
    }
}

/// An in-memory [`StoreDir`] that can simulate a crash.
///
/// Every file keeps the image last made durable by `sync()` next to the live
/// image. [`schedule_crash`](Self::schedule_crash) makes the filesystem fail
/// every operation after a number of mutating calls;
/// [`reboot`](Self::reboot) then throws away everything that was not synced.
/// Clones share the same filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemDir {
    fs: Arc<Mutex<MemFs>>,
}

impl MemDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// After `ops` more mutating operations (create, write, set_len, sync)
    /// every call fails with [`StoreError::Crashed`].
    pub fn schedule_crash(&self, ops: usize) {
        self.fs.lock().expect("memfs poisoned").time_to_crash = Some(ops);
    }

    /// Let `ops` mutating operations through, fail the next one, and keep
    /// working afterwards. Nothing is lost: unlike a crash, the live images
    /// stay as they are.
    pub fn fail_once(&self, ops: usize) {
        self.fs.lock().expect("memfs poisoned").time_to_fault = Some(ops);
    }

    pub fn is_crashed(&self) -> bool {
        self.fs.lock().expect("memfs poisoned").time_to_crash == Some(0)
    }

    /// Discard all unsynced state and bring the filesystem back up.
    pub fn reboot(&self) {
        let mut fs = self.fs.lock().expect("memfs poisoned");
        for f in fs.data.iter_mut() {
            f.live.clone_from(&f.synced);
        }
        fs.time_to_crash = None;
    }

    /// Length of the durable image of `name`, if the file exists.
    pub fn synced_len(&self, name: &str) -> Option<u64> {
        let fs = self.fs.lock().expect("memfs poisoned");
        fs.names.get(name).map(|&id| fs.data[id].synced.len() as u64)
    }

    /// Drain the recorded operation log.
    pub fn take_events(&self) -> Vec<MemEvent> {
        std::mem::take(&mut self.fs.lock().expect("memfs poisoned").events)
    }
}

impl StoreDir for MemDir {
    fn open(&self, name: &str) -> StoreResult<Box<dyn StoreFile>> {
        let id = self.fs.lock().expect("memfs poisoned").open(name)?;
        Ok(Box::new(MemFile {
            id,
            fs: Arc::clone(&self.fs),
        }))
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        let fs = self.fs.lock().expect("memfs poisoned");
        fs.check_crashed()?;
        Ok(fs.names.contains_key(name))
    }

    fn remove(&self, name: &str) -> StoreResult<bool> {
        let mut fs = self.fs.lock().expect("memfs poisoned");
        fs.perform_op()?;
        let existed = fs.names.remove(name).is_some();
        fs.events.push(MemEvent::Remove(name.to_string()));
        Ok(existed)
    }
}

/// Handle to one file of a [`MemDir`].
#[derive(Debug)]
pub struct MemFile {
    id: FileId,
    fs: Arc<Mutex<MemFs>>,
}

impl StoreFile for MemFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        let fs = self.fs.lock().expect("memfs poisoned");
        fs.check_crashed()?;
        let live = &fs.data[self.id].live;
        let start = offset as usize;
        let end = start.saturating_add(buf.len());
        if end > live.len() {
            return Err(StoreError::ShortRead {
                offset,
                wanted: buf.len(),
                available: live.len() as u64,
            });
        }
        buf.copy_from_slice(&live[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StoreResult<()> {
        self.fs
            .lock()
            .expect("memfs poisoned")
            .write(self.id, offset, data)
    }

    fn len(&self) -> StoreResult<u64> {
        let fs = self.fs.lock().expect("memfs poisoned");
        fs.check_crashed()?;
        Ok(fs.data[self.id].live.len() as u64)
    }

    fn set_len(&self, len: u64) -> StoreResult<()> {
        self.fs.lock().expect("memfs poisoned").set_len(self.id, len)
    }

    fn sync(&self) -> StoreResult<()> {
        self.fs.lock().expect("memfs poisoned").sync(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsynced_writes_lost_on_reboot() {
        let dir = MemDir::new();
        let f = dir.open("log").unwrap();
        f.write_at(0, b"durable").unwrap();
        f.sync().unwrap();
        f.write_at(7, b"volatile").unwrap();
        assert_eq!(f.len().unwrap(), 15);

        dir.reboot();
        assert_eq!(f.len().unwrap(), 7);
        assert_eq!(f.read_vec(0, 7).unwrap(), b"durable");
    }

    #[test]
    fn truncate_is_volatile_until_sync() {
        let dir = MemDir::new();
        let f = dir.open("log").unwrap();
        f.write_at(0, &[1u8; 16]).unwrap();
        f.sync().unwrap();
        f.set_len(4).unwrap();
        dir.reboot();
        assert_eq!(f.len().unwrap(), 16);
    }

    #[test]
    fn scheduled_crash_fails_later_operations() {
        let dir = MemDir::new();
        let f = dir.open("a").unwrap();
        dir.schedule_crash(2);
        f.write_at(0, b"1").unwrap();
        f.sync().unwrap();
        assert!(dir.is_crashed());
        assert!(matches!(f.write_at(1, b"2"), Err(StoreError::Crashed)));
        assert!(matches!(f.len(), Err(StoreError::Crashed)));
        assert!(matches!(dir.open("b"), Err(StoreError::Crashed)));

        dir.reboot();
        assert!(!dir.is_crashed());
        assert_eq!(f.read_vec(0, 1).unwrap(), b"1");
    }

    #[test]
    fn single_fault_then_recovers() {
        let dir = MemDir::new();
        let f = dir.open("a").unwrap();
        dir.fail_once(1);
        f.write_at(0, b"1").unwrap();
        assert!(matches!(f.sync(), Err(StoreError::Fault)));
        assert!(!dir.is_crashed());
        f.sync().unwrap();
        assert_eq!(dir.synced_len("a"), Some(1));
    }

    #[test]
    fn clones_share_files() {
        let dir = MemDir::new();
        let other = dir.clone();
        dir.open("x").unwrap().write_at(0, b"shared").unwrap();
        assert_eq!(other.open("x").unwrap().read_vec(0, 6).unwrap(), b"shared");
        assert_eq!(other.synced_len("x"), Some(0));
    }

    #[test]
    fn short_read() {
        let f = MemDir::new().open("s").unwrap();
        f.write_at(0, b"ab").unwrap();
        assert!(matches!(
            f.read_vec(1, 4),
            Err(StoreError::ShortRead { available: 2, .. })
        ));
    }

    #[test]
    fn events_recorded() {
        let dir = MemDir::new();
        let f = dir.open("e").unwrap();
        f.write_at(0, b"abc").unwrap();
        f.sync().unwrap();
        assert_eq!(
            dir.take_events(),
            vec![
                MemEvent::Create("e".into()),
                MemEvent::Write { file: "e".into(), offset: 0, len: 3 },
                MemEvent::Sync("e".into()),
            ]
        );
        assert!(dir.take_events().is_empty());
    }

    #[test]
    fn remove_forgets_name() {
        let dir = MemDir::new();
        dir.open("gone").unwrap();
        assert!(dir.remove("gone").unwrap());
        assert!(!dir.exists("gone").unwrap());
        assert!(!dir.remove("gone").unwrap());
    }
}
