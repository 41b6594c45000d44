use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Bit 62 marks an identifier as a blank node.
pub const BLANK_TAG: u64 = 1 << 62;

/// Mask for the low 62 bits (the blank counter).
pub const COUNTER_MASK: u64 = BLANK_TAG - 1;

/// Record alignment in the value log. Every record starts on this boundary.
pub const RECORD_ALIGN: u64 = 8;

/// Stable identifier for a stored value or a blank node.
///
/// A value-log identifier is the byte offset of its record plus [`NodeId::MIN`],
/// so lookups by id never consult the index. A blank identifier carries
/// [`BLANK_TAG`] and a counter in the low 62 bits. Identifiers are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// "No node". Returned by lookups that find nothing.
    pub const NONE: NodeId = NodeId(0);

    /// Smallest value-log identifier (the record at offset 0).
    pub const MIN: NodeId = NodeId(1);

    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Identifier for a blank node with the given counter.
    pub const fn blank(counter: u64) -> Self {
        Self(BLANK_TAG | (counter & COUNTER_MASK))
    }

    /// Identifier for the record written at `offset` in the value log.
    pub const fn from_offset(offset: u64) -> Self {
        Self(offset + Self::MIN.0)
    }

    /// The raw integer.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn is_none(&self) -> bool {
        self.0 == Self::NONE.0
    }

    /// Returns `true` if bit 62 is set. No I/O.
    pub const fn is_blank(&self) -> bool {
        self.0 & BLANK_TAG != 0
    }

    /// The blank counter, if this is a blank identifier.
    pub const fn blank_counter(&self) -> Option<u64> {
        if self.is_blank() {
            Some(self.0 & COUNTER_MASK)
        } else {
            None
        }
    }

    /// Convert back to a value-log byte offset.
    ///
    /// Fails for `NONE`, blank identifiers, and identifiers that do not land
    /// on a record boundary.
    pub fn to_offset(&self) -> Result<u64, TypeError> {
        if self.0 < Self::MIN.0 || self.is_blank() {
            return Err(TypeError::NotAnOffset(self.0));
        }
        let offset = self.0 - Self::MIN.0;
        if offset % RECORD_ALIGN != 0 {
            return Err(TypeError::NotAnOffset(self.0));
        }
        Ok(offset)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.blank_counter() {
            Some(c) => write!(f, "NodeId(_:b{c})"),
            None => write!(f, "NodeId({})", self.0),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}
