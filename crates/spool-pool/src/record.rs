//! Binary record format shared by the value log and the index.
//!
//! ```text
//! [1 byte: reserved, always 0]
//! [1 byte: category id]
//! [1 byte: type id]
//! [1 byte: subtype id]
//! [4 bytes: payload length (big-endian u32, at most i32::MAX)]
//! [N bytes: payload]
//! [0..7 bytes: zero padding to an 8-byte boundary]
//! ```
//!
//! Index entries keep only the first [`INLINE_MAX`] payload bytes. The rest
//! of a longer payload is read back from the value log at
//! [`remainder_offset`].

use spool_types::{Category, TypedValue, RECORD_ALIGN};

use crate::error::{PoolError, PoolResult};

/// Fixed header size.
pub const HEADER_SIZE: usize = 8;

/// Payload bytes an index entry holds inline.
pub const INLINE_MAX: usize = 64;

/// Round `n` up to the record alignment.
pub const fn padded_len(n: usize) -> usize {
    let align = RECORD_ALIGN as usize;
    (n + align - 1) & !(align - 1)
}

/// Log offset of the payload bytes that follow the inline prefix of the
/// record at `offset`.
pub const fn remainder_offset(offset: u64) -> u64 {
    offset + (HEADER_SIZE + INLINE_MAX) as u64
}

/// The fixed eight-byte header of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub category: Category,
    pub type_id: u8,
    pub subtype_id: u8,
    pub data_len: u32,
}

impl RecordHeader {
    /// Header describing `value`.
    pub fn of(value: &TypedValue) -> PoolResult<Self> {
        let data_len = u32::try_from(value.data().len())
            .ok()
            .filter(|&n| n <= i32::MAX as u32)
            .ok_or_else(|| {
                PoolError::InvalidArgument(format!(
                    "payload of {} bytes is too large",
                    value.data().len()
                ))
            })?;
        Ok(Self {
            category: value.category(),
            type_id: value.type_id(),
            subtype_id: value.subtype_id(),
            data_len,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.data_len.to_be_bytes();
        [
            0,
            self.category.id(),
            self.type_id,
            self.subtype_id,
            len[0],
            len[1],
            len[2],
            len[3],
        ]
    }

    /// Parse and validate a header read at log (or snapshot) offset `offset`.
    pub fn decode(bytes: &[u8; HEADER_SIZE], offset: u64) -> PoolResult<Self> {
        if bytes[0] != 0 {
            return Err(PoolError::corrupt(
                offset,
                format!("reserved header byte is {:#04x}", bytes[0]),
            ));
        }
        let category = Category::from_id(bytes[1])
            .map_err(|e| PoolError::corrupt(offset, e.to_string()))?;
        let data_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if data_len > i32::MAX as u32 {
            return Err(PoolError::corrupt(
                offset,
                format!("negative payload length {}", data_len as i32),
            ));
        }
        Ok(Self {
            category,
            type_id: bytes[2],
            subtype_id: bytes[3],
            data_len,
        })
    }

    pub fn data_len(&self) -> usize {
        self.data_len as usize
    }

    /// Whether an index entry for this record holds only a prefix.
    pub fn is_overflow(&self) -> bool {
        self.data_len() > INLINE_MAX
    }

    /// Bytes the record occupies in the value log, padding included.
    pub fn record_len(&self) -> u64 {
        padded_len(HEADER_SIZE + self.data_len()) as u64
    }
}

/// Serialize `value` as a padded value-log record.
pub fn encode_record(value: &TypedValue) -> PoolResult<Vec<u8>> {
    let header = RecordHeader::of(value)?;
    let mut buf = Vec::with_capacity(header.record_len() as usize);
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(value.data());
    buf.resize(header.record_len() as usize, 0);
    Ok(buf)
}

/// A record read back from the value log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub data: Vec<u8>,
}

impl Record {
    /// Decode a record whose whole payload is present in `bytes`.
    pub fn decode_full(bytes: &[u8], offset: u64) -> PoolResult<Self> {
        let head: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| PoolError::corrupt(offset, "truncated record header"))?;
        let header = RecordHeader::decode(head, offset)?;
        let data = bytes
            .get(HEADER_SIZE..HEADER_SIZE + header.data_len())
            .ok_or_else(|| {
                PoolError::corrupt(
                    offset,
                    format!("payload of {} bytes is truncated", header.data_len),
                )
            })?
            .to_vec();
        Ok(Self { header, data })
    }

    /// Rebuild the value. `None` for a free (blank-category) record.
    pub fn into_value(self) -> PoolResult<Option<TypedValue>> {
        if self.header.category == Category::Blank {
            return Ok(None);
        }
        let h = self.header;
        Ok(Some(TypedValue::from_parts(
            h.category,
            h.type_id,
            h.subtype_id,
            self.data,
        )?))
    }
}
