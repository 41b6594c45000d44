//! Generations ("phases") of the ordered value index.
//!
//! A phase is a sorted run of [`IndexEntry`]s behind an `Arc`. Readers pin a
//! phase by taking a [`PhaseToken`], which shares the same allocation. The
//! writer mutates through `Arc::make_mut`, so a write to a pinned phase first
//! copies it and the pinned generation stays exactly as the reader saw it.
//! A superseded generation is freed when its last token drops.
//!
//! Snapshot format (one file per metaroot slot):
//!
//! ```text
//! repeated entry_count times:
//!   [8 bytes: record header]
//!   [8 bytes: node id (big-endian u64)]
//!   [min(len, 64) bytes: payload prefix]
//! ```
//!
//! The metaroot records the entry count, byte length and CRC32 of the
//! snapshot as its [`IndexRoot`].

use std::cmp::Ordering;
use std::sync::Arc;

use spool_store::StoreFile;
use spool_types::NodeId;
use tracing::debug;

use crate::error::{PoolError, PoolResult};
use crate::metaroot::IndexRoot;
use crate::record::{RecordHeader, HEADER_SIZE, INLINE_MAX};

/// One index entry: the record header, the inline payload prefix, and the
/// node the value was stored as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub header: RecordHeader,
    pub prefix: Box<[u8]>,
    pub node: NodeId,
}

impl IndexEntry {
    pub fn new(header: RecordHeader, data: &[u8], node: NodeId) -> Self {
        let inline = data.len().min(INLINE_MAX);
        Self {
            header,
            prefix: data[..inline].into(),
            node,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.node.as_u64().to_be_bytes());
        out.extend_from_slice(&self.prefix);
    }

    fn decode_from(buf: &[u8], pos: &mut usize) -> PoolResult<Self> {
        let at = *pos as u64;
        let fixed = buf
            .get(*pos..*pos + HEADER_SIZE + 8)
            .ok_or_else(|| PoolError::corrupt(at, "truncated index entry"))?;
        let mut head = [0u8; HEADER_SIZE];
        head.copy_from_slice(&fixed[..HEADER_SIZE]);
        let header = RecordHeader::decode(&head, at)?;
        let mut node = [0u8; 8];
        node.copy_from_slice(&fixed[HEADER_SIZE..]);
        let start = *pos + HEADER_SIZE + 8;
        let inline = header.data_len().min(INLINE_MAX);
        let prefix = buf
            .get(start..start + inline)
            .ok_or_else(|| PoolError::corrupt(at, "truncated index entry prefix"))?;
        *pos = start + inline;
        Ok(Self {
            header,
            prefix: prefix.into(),
            node: NodeId::new(u64::from_be_bytes(node)),
        })
    }
}

/// Outcome of a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// The key matched the entry at this index.
    Found(usize),
    /// No match; the key belongs before the entry at this index.
    Insert(usize),
}

impl Position {
    pub fn index(self) -> usize {
        match self {
            Position::Found(i) | Position::Insert(i) => i,
        }
    }
}

/// Binary search with a fallible comparator returning the key's order
/// relative to each visited entry.
pub fn search<F>(entries: &[IndexEntry], mut cmp: F) -> PoolResult<Position>
where
    F: FnMut(&IndexEntry) -> PoolResult<Ordering>,
{
    let (mut lo, mut hi) = (0, entries.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match cmp(&entries[mid])? {
            Ordering::Less => hi = mid,
            Ordering::Greater => lo = mid + 1,
            Ordering::Equal => return Ok(Position::Found(mid)),
        }
    }
    Ok(Position::Insert(lo))
}

/// The writable generation of the index.
#[derive(Debug, Clone, Default)]
pub struct IndexPhase {
    entries: Arc<Vec<IndexEntry>>,
}

impl IndexPhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new phase starting from the generation `token` pins.
    pub fn from_token(token: &PhaseToken) -> Self {
        Self {
            entries: Arc::clone(&token.entries),
        }
    }

    /// Pin this generation.
    pub fn use_phase(&self) -> PhaseToken {
        PhaseToken {
            entries: Arc::clone(&self.entries),
        }
    }

    /// Whether any token (or another phase) shares this generation.
    pub fn is_in_use(&self) -> bool {
        Arc::strong_count(&self.entries) > 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn find<F>(&self, cmp: F) -> PoolResult<Position>
    where
        F: FnMut(&IndexEntry) -> PoolResult<Ordering>,
    {
        search(&self.entries, cmp)
    }

    /// Insert at `pos`, copying the generation first if it is pinned.
    pub fn insert(&mut self, pos: usize, entry: IndexEntry) {
        if self.is_in_use() {
            debug!(entries = self.entries.len(), "copying pinned index phase");
        }
        Arc::make_mut(&mut self.entries).insert(pos, entry);
    }

    /// Write this generation to `file` and return its root. The caller forces
    /// the file.
    pub fn write_snapshot(&self, file: &dyn StoreFile) -> PoolResult<IndexRoot> {
        let mut buf = Vec::new();
        for entry in self.entries.iter() {
            entry.encode_into(&mut buf);
        }
        file.write_at(0, &buf)?;
        file.set_len(buf.len() as u64)?;
        let root = IndexRoot {
            entry_count: self.entries.len() as u64,
            byte_len: buf.len() as u64,
            crc: crc32fast::hash(&buf),
        };
        debug!(entries = root.entry_count, bytes = root.byte_len, "index snapshot written");
        Ok(root)
    }

    /// Load the generation `root` describes from `file`.
    pub fn read_snapshot(file: &dyn StoreFile, root: &IndexRoot) -> PoolResult<Self> {
        let file_len = file.len()?;
        if root.byte_len > file_len {
            return Err(PoolError::corrupt(
                0,
                format!(
                    "metaroot claims a {}-byte index snapshot; file holds {file_len}",
                    root.byte_len
                ),
            ));
        }
        // Every entry takes at least a header and a node id.
        if root.entry_count > root.byte_len / (HEADER_SIZE as u64 + 8) {
            return Err(PoolError::corrupt(
                0,
                format!(
                    "{} index entries cannot fit in {} bytes",
                    root.entry_count, root.byte_len
                ),
            ));
        }
        let len = usize::try_from(root.byte_len)
            .map_err(|_| PoolError::corrupt(0, "index snapshot too large"))?;
        let buf = file.read_vec(0, len)?;
        let actual = crc32fast::hash(&buf);
        if actual != root.crc {
            return Err(PoolError::corrupt(
                0,
                format!(
                    "index snapshot CRC mismatch: expected {:#010x}, got {actual:#010x}",
                    root.crc
                ),
            ));
        }
        let mut entries = Vec::with_capacity(root.entry_count as usize);
        let mut pos = 0;
        for _ in 0..root.entry_count {
            entries.push(IndexEntry::decode_from(&buf, &mut pos)?);
        }
        if pos != buf.len() {
            return Err(PoolError::corrupt(
                pos as u64,
                "trailing bytes after index snapshot",
            ));
        }
        Ok(Self {
            entries: Arc::new(entries),
        })
    }
}

/// A pin on one index generation.
///
/// While a token lives, the generation it pins is neither mutated nor freed.
#[derive(Debug, Clone)]
pub struct PhaseToken {
    entries: Arc<Vec<IndexEntry>>,
}

impl PhaseToken {
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find<F>(&self, cmp: F) -> PoolResult<Position>
    where
        F: FnMut(&IndexEntry) -> PoolResult<Ordering>,
    {
        search(&self.entries, cmp)
    }

    /// Whether both tokens pin the same generation.
    #[cfg(test)]
    pub fn same_phase(&self, other: &PhaseToken) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}
