use std::sync::Mutex;

use spool_store::StoreFile;
use spool_types::NodeId;
use tracing::{debug, info};

use crate::config::SyncMode;
use crate::error::{PoolError, PoolResult};
use crate::record::{remainder_offset, Record, RecordHeader, HEADER_SIZE, INLINE_MAX};

/// Internal mutable state for the log appender.
#[derive(Debug)]
struct LogWriter {
    /// Offset the next record will be written at.
    end: u64,
}

/// Append-only file of encoded value records.
///
/// A record's identifier is its offset plus [`NodeId::MIN`], so reads by id
/// go straight to the file. Records are never rewritten. The only way bytes
/// leave the log is `truncate`, which rollback and phase selection use to
/// drop an uncommitted tail.
#[derive(Debug)]
pub struct ValueLog {
    file: Box<dyn StoreFile>,
    writer: Mutex<LogWriter>,
    sync_mode: SyncMode,
}

impl ValueLog {
    /// Wrap an open log file. New records go after whatever it already holds.
    pub fn open(file: Box<dyn StoreFile>, sync_mode: SyncMode) -> PoolResult<Self> {
        let end = file.len()?;
        Ok(Self {
            file,
            writer: Mutex::new(LogWriter { end }),
            sync_mode,
        })
    }

    /// Append an encoded, padded record. Returns the offset it was written at.
    pub fn append(&self, record: &[u8]) -> PoolResult<u64> {
        debug_assert_eq!(record.len() % 8, 0, "records are 8-byte aligned");
        let mut w = self.writer.lock().expect("value log mutex poisoned");
        let offset = w.end;
        self.file.write_at(offset, record)?;
        w.end += record.len() as u64;
        debug!(offset, len = record.len(), "value log append");
        Ok(offset)
    }

    /// Offset one past the last record.
    pub fn end(&self) -> u64 {
        self.writer.lock().expect("value log mutex poisoned").end
    }

    /// Whether `node` names a record below the current end.
    pub fn contains(&self, node: NodeId) -> bool {
        match node.to_offset() {
            Ok(offset) => offset < self.end(),
            Err(_) => false,
        }
    }

    pub fn read_header(&self, offset: u64) -> PoolResult<RecordHeader> {
        let end = self.end();
        if offset + HEADER_SIZE as u64 > end {
            return Err(PoolError::corrupt(offset, "record header past end of log"));
        }
        let mut head = [0u8; HEADER_SIZE];
        self.file.read_at(offset, &mut head)?;
        RecordHeader::decode(&head, offset)
    }

    /// Read the full record at `offset`.
    pub fn read_record(&self, offset: u64) -> PoolResult<Record> {
        let header = self.read_header(offset)?;
        if offset + header.record_len() > self.end() {
            return Err(PoolError::corrupt(
                offset,
                format!("record of {} bytes runs past end of log", header.data_len),
            ));
        }
        let bytes = self
            .file
            .read_vec(offset, HEADER_SIZE + header.data_len())?;
        Record::decode_full(&bytes, offset)
    }

    /// The payload bytes after the inline prefix of the record at `offset`.
    pub fn read_remainder(&self, offset: u64, header: &RecordHeader) -> PoolResult<Vec<u8>> {
        let len = header.data_len().saturating_sub(INLINE_MAX);
        if len == 0 {
            return Ok(Vec::new());
        }
        Ok(self.file.read_vec(remainder_offset(offset), len)?)
    }

    /// Like [`read_remainder`](Self::read_remainder), addressed by node.
    pub fn read_node_remainder(&self, node: NodeId, header: &RecordHeader) -> PoolResult<Vec<u8>> {
        self.read_remainder(node.to_offset()?, header)
    }

    /// Discard everything at and after `len`.
    ///
    /// Fails if the file is shorter than `len`: committed records are missing.
    pub fn truncate(&self, len: u64) -> PoolResult<()> {
        let mut w = self.writer.lock().expect("value log mutex poisoned");
        let file_len = self.file.len()?;
        if len > file_len {
            return Err(PoolError::corrupt(
                file_len,
                format!("value log is {file_len} bytes but {len} were committed"),
            ));
        }
        if len != file_len {
            self.file.set_len(len)?;
            info!(from = file_len, to = len, "value log truncated");
        }
        w.end = len;
        Ok(())
    }

    /// Durability barrier for everything appended so far.
    pub fn force(&self) -> PoolResult<()> {
        self.sync_mode.force(&*self.file)?;
        Ok(())
    }
}
