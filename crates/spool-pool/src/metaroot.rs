//! Double-buffered transaction roots.
//!
//! The metaroot file holds two fixed-size slots. Each slot describes one
//! durable generation of the pool:
//!
//! ```text
//! [4 bytes: magic 0xa5f3f4f6]
//! [4 bytes: format version]
//! [4 bytes: valid flag]
//! [4 bytes: phase number]
//! [8 bytes: value log end]
//! [8 bytes: next blank counter]
//! [8 bytes: index entry count]
//! [8 bytes: index snapshot length]
//! [4 bytes: index snapshot CRC32]
//! [4 bytes: reserved]
//! ```
//!
//! All integers are big-endian. A new generation is published with
//! [`MetarootFile::publish`]: the slot is written and forced with the valid
//! flag clear, then the flag is set and forced again. A crash between the
//! two forces leaves the slot invalid, never half-valid.

use spool_store::StoreFile;
use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{PoolError, PoolResult};

pub const FILE_MAGIC: u32 = 0xa5f3_f4f6;
pub const FILE_VERSION: u32 = 1;
pub const SLOT_SIZE: usize = 56;
pub const NR_SLOTS: usize = 2;

/// Where a generation's index snapshot lives and how to verify it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexRoot {
    pub entry_count: u64,
    pub byte_len: u64,
    pub crc: u32,
}

/// One metaroot slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metaroot {
    pub valid: bool,
    pub phase_number: u32,
    pub log_end: u64,
    pub next_blank: u64,
    pub index_root: IndexRoot,
}

impl Metaroot {
    pub fn encode(&self) -> [u8; SLOT_SIZE] {
        let mut buf = [0u8; SLOT_SIZE];
        buf[0..4].copy_from_slice(&FILE_MAGIC.to_be_bytes());
        buf[4..8].copy_from_slice(&FILE_VERSION.to_be_bytes());
        buf[8..12].copy_from_slice(&(self.valid as u32).to_be_bytes());
        buf[12..16].copy_from_slice(&self.phase_number.to_be_bytes());
        buf[16..24].copy_from_slice(&self.log_end.to_be_bytes());
        buf[24..32].copy_from_slice(&self.next_blank.to_be_bytes());
        buf[32..40].copy_from_slice(&self.index_root.entry_count.to_be_bytes());
        buf[40..48].copy_from_slice(&self.index_root.byte_len.to_be_bytes());
        buf[48..52].copy_from_slice(&self.index_root.crc.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; SLOT_SIZE]) -> PoolResult<Self> {
        check_header(buf)?;
        let u32_at = |i: usize| u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        let u64_at = |i: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[i..i + 8]);
            u64::from_be_bytes(b)
        };
        Ok(Self {
            valid: u32_at(8) != 0,
            phase_number: u32_at(12),
            log_end: u64_at(16),
            next_blank: u64_at(24),
            index_root: IndexRoot {
                entry_count: u64_at(32),
                byte_len: u64_at(40),
                crc: u32_at(48),
            },
        })
    }
}

fn check_header(buf: &[u8]) -> PoolResult<()> {
    let magic = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != FILE_MAGIC {
        return Err(PoolError::BadMagic { found: magic });
    }
    let version = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != FILE_VERSION {
        return Err(PoolError::UnsupportedVersion {
            found: version,
            expected: FILE_VERSION,
        });
    }
    Ok(())
}

/// The two metaroot slots and the file that holds them.
#[derive(Debug)]
pub struct MetarootFile {
    file: Box<dyn StoreFile>,
    slots: [Metaroot; NR_SLOTS],
    sync_mode: SyncMode,
    loaded: bool,
}

impl MetarootFile {
    /// Wrap the metaroot file without reading it.
    pub fn new(file: Box<dyn StoreFile>, sync_mode: SyncMode) -> Self {
        Self {
            file,
            slots: [Metaroot::default(); NR_SLOTS],
            sync_mode,
            loaded: false,
        }
    }

    /// Validate magic and version of an existing metaroot file.
    ///
    /// An empty file passes: it has not been formatted yet.
    pub fn check(file: &dyn StoreFile) -> PoolResult<()> {
        if file.is_empty()? {
            return Ok(());
        }
        let expected = (SLOT_SIZE * NR_SLOTS) as u64;
        let len = file.len()?;
        if len != expected {
            return Err(PoolError::corrupt(
                0,
                format!("metaroot file is {len} bytes, expected {expected}"),
            ));
        }
        let mut head = [0u8; 8];
        file.read_at(0, &mut head)?;
        check_header(&head)
    }

    /// Read both slots, formatting the file with two invalid slots if it is
    /// empty.
    pub fn load(&mut self) -> PoolResult<()> {
        Self::check(&*self.file)?;
        if self.file.is_empty()? {
            warn!("metaroot file is empty; formatting with two invalid slots");
            return self.reset();
        }
        for i in 0..NR_SLOTS {
            let mut buf = [0u8; SLOT_SIZE];
            self.file.read_at((i * SLOT_SIZE) as u64, &mut buf)?;
            self.slots[i] = Metaroot::decode(&buf)?;
        }
        self.loaded = true;
        Ok(())
    }

    /// Overwrite both slots as invalid and force.
    pub fn reset(&mut self) -> PoolResult<()> {
        self.slots = [Metaroot::default(); NR_SLOTS];
        for i in 0..NR_SLOTS {
            self.write_slot(i)?;
        }
        self.force()?;
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn slot(&self, i: usize) -> &Metaroot {
        &self.slots[i]
    }

    /// Phase numbers of the valid slots, in slot order.
    pub fn valid_phases(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|m| m.valid)
            .map(|m| m.phase_number)
            .collect()
    }

    /// The slot holding a valid generation numbered `phase_number`.
    pub fn find_valid(&self, phase_number: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|m| m.valid && m.phase_number == phase_number)
    }

    /// Make `metaroot` the durable contents of slot `i`.
    ///
    /// Writes the slot with the valid flag clear and forces, then sets the
    /// flag and forces again.
    pub fn publish(&mut self, i: usize, metaroot: Metaroot) -> PoolResult<()> {
        self.slots[i] = Metaroot {
            valid: false,
            ..metaroot
        };
        self.write_slot(i)?;
        self.force()?;
        self.slots[i].valid = true;
        self.write_slot(i)?;
        self.force()?;
        debug!(slot = i, phase = metaroot.phase_number, "metaroot published");
        Ok(())
    }

    /// Clear the valid flag of slot `i` and force.
    pub fn invalidate(&mut self, i: usize) -> PoolResult<()> {
        self.slots[i].valid = false;
        self.write_slot(i)?;
        self.force()
    }

    fn write_slot(&self, i: usize) -> PoolResult<()> {
        self.file
            .write_at((i * SLOT_SIZE) as u64, &self.slots[i].encode())?;
        Ok(())
    }

    fn force(&self) -> PoolResult<()> {
        self.sync_mode.force(&*self.file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_store::{MemDir, StoreDir};

    fn sample(phase_number: u32) -> Metaroot {
        Metaroot {
            valid: true,
            phase_number,
            log_end: 4096,
            next_blank: 12,
            index_root: IndexRoot {
                entry_count: 3,
                byte_len: 90,
                crc: 0xdead_beef,
            },
        }
    }

    fn open(dir: &MemDir) -> MetarootFile {
        let mut m = MetarootFile::new(dir.open("mr").unwrap(), SyncMode::Full);
        m.load().unwrap();
        m
    }

    #[test]
    fn slot_layout() {
        let buf = sample(7).encode();
        assert_eq!(&buf[0..4], &[0xa5, 0xf3, 0xf4, 0xf6]);
        assert_eq!(&buf[8..12], &[0, 0, 0, 1]);
        assert_eq!(&buf[12..16], &[0, 0, 0, 7]);
        assert_eq!(Metaroot::decode(&buf).unwrap(), sample(7));
    }

    #[test]
    fn bad_magic_and_version() {
        let mut buf = sample(1).encode();
        buf[5] = 9;
        assert!(matches!(
            Metaroot::decode(&buf),
            Err(PoolError::UnsupportedVersion { found, expected: 1 }) if found == 0x0009_0001
        ));
        buf[0] = 0;
        assert!(matches!(Metaroot::decode(&buf), Err(PoolError::BadMagic { .. })));
    }

    #[test]
    fn empty_file_formats_invalid() {
        let dir = MemDir::new();
        let m = open(&dir);
        assert!(m.valid_phases().is_empty());
        assert_eq!(dir.synced_len("mr"), Some((SLOT_SIZE * NR_SLOTS) as u64));
    }

    #[test]
    fn publish_then_reload() {
        let dir = MemDir::new();
        let mut m = open(&dir);
        m.publish(0, sample(5)).unwrap();
        let again = open(&dir);
        assert_eq!(again.valid_phases(), vec![5]);
        assert_eq!(again.find_valid(5), Some(0));
        assert_eq!(*again.slot(0), sample(5));
    }

    #[test]
    fn crash_between_forces_leaves_slot_invalid() {
        let dir = MemDir::new();
        let mut m = open(&dir);
        // publish = write, sync, write, sync. Let the first pair through.
        dir.schedule_crash(2);
        assert!(m.publish(1, sample(3)).is_err());
        dir.reboot();
        let recovered = open(&dir);
        assert!(recovered.valid_phases().is_empty());
        assert_eq!(recovered.slot(1).phase_number, 3);
        assert!(!recovered.slot(1).valid);
    }

    #[test]
    fn crash_before_first_force_keeps_old_contents() {
        let dir = MemDir::new();
        let mut m = open(&dir);
        m.publish(0, sample(1)).unwrap();
        dir.schedule_crash(1);
        assert!(m.publish(0, sample(2)).is_err());
        dir.reboot();
        assert_eq!(open(&dir).valid_phases(), vec![1]);
    }

    #[test]
    fn invalidate_slot() {
        let dir = MemDir::new();
        let mut m = open(&dir);
        m.publish(0, sample(1)).unwrap();
        m.publish(1, sample(2)).unwrap();
        assert_eq!(m.valid_phases(), vec![1, 2]);
        m.invalidate(0).unwrap();
        assert_eq!(open(&dir).valid_phases(), vec![2]);
    }

    #[test]
    fn wrong_size_file_is_corrupt() {
        let dir = MemDir::new();
        dir.open("mr").unwrap().write_at(0, &[1, 2, 3]).unwrap();
        let mut m = MetarootFile::new(dir.open("mr").unwrap(), SyncMode::Full);
        assert!(matches!(m.load(), Err(PoolError::CorruptData { .. })));
    }

    #[test]
    fn check_rejects_foreign_file() {
        let dir = MemDir::new();
        let f = dir.open("mr").unwrap();
        f.write_at(0, &[0x42; SLOT_SIZE * NR_SLOTS]).unwrap();
        assert!(matches!(MetarootFile::check(&*f), Err(PoolError::BadMagic { .. })));
    }
}
