//! Payload comparators, one per family of value encodings.
//!
//! The index orders values by category, then type id, then by the payload
//! comparator of the value's datatype. Comparators work on plain byte slices
//! so they can be tested without any storage behind them.

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::category::{Category, Datatype};

/// Orders two payloads of the same category and type.
pub trait ValueComparator: Send + Sync {
    /// Compare `key` against the first bytes of a stored payload whose full
    /// length is `stored_len` (larger than `stored_prefix.len()`).
    ///
    /// `Ordering::Equal` means the prefix cannot decide and the caller must
    /// fetch the full payload and call [`compare`](Self::compare).
    fn compare_prefix(&self, _key: &[u8], _stored_prefix: &[u8], _stored_len: usize) -> Ordering {
        Ordering::Equal
    }

    /// Full comparison. Subtypes break ties between equal payloads.
    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering;
}

/// Lexicographic byte order. Used for URIs, untyped literals, strings,
/// binary literals, and literals of unregistered datatypes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesComparator;

impl ValueComparator for BytesComparator {
    fn compare_prefix(&self, key: &[u8], stored_prefix: &[u8], _stored_len: usize) -> Ordering {
        let n = key.len().min(stored_prefix.len());
        match key[..n].cmp(&stored_prefix[..n]) {
            Ordering::Equal if key.len() < stored_prefix.len() => Ordering::Less,
            ord => ord,
        }
    }

    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering {
        a.cmp(b).then(a_subtype.cmp(&b_subtype))
    }
}

/// Signed big-endian integers of up to eight bytes: `xsd:integer` and its
/// subtypes, `xsd:dateTime`, `xsd:boolean`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerComparator;

impl ValueComparator for IntegerComparator {
    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering {
        let ord = match (signed(a), signed(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.cmp(b),
        };
        ord.then(a_subtype.cmp(&b_subtype))
    }
}

/// IEEE 754 doubles in total order (`-NaN < -inf < ... < -0 < +0 < ... < NaN`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleComparator;

impl ValueComparator for DoubleComparator {
    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering {
        let ord = match (<[u8; 8]>::try_from(a), <[u8; 8]>::try_from(b)) {
            (Ok(x), Ok(y)) => f64::from_be_bytes(x).total_cmp(&f64::from_be_bytes(y)),
            _ => a.cmp(b),
        };
        ord.then(a_subtype.cmp(&b_subtype))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FloatComparator;

impl ValueComparator for FloatComparator {
    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering {
        let ord = match (<[u8; 4]>::try_from(a), <[u8; 4]>::try_from(b)) {
            (Ok(x), Ok(y)) => f32::from_be_bytes(x).total_cmp(&f32::from_be_bytes(y)),
            _ => a.cmp(b),
        };
        ord.then(a_subtype.cmp(&b_subtype))
    }
}

/// `xsd:decimal` payloads (canonical lexical forms) in numeric order.
///
/// Payload bytes say nothing about magnitude, so a prefix never decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalComparator;

impl ValueComparator for DecimalComparator {
    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering {
        let ord = match (decimal(a), decimal(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.cmp(b),
        };
        ord.then(a_subtype.cmp(&b_subtype))
    }
}

/// Calendar payloads: an eight-byte signed value, then a signed zone
/// offset. `xsd:date` and the `xsd:gYear` family.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarComparator;

impl ValueComparator for CalendarComparator {
    fn compare(&self, a: &[u8], a_subtype: u8, b: &[u8], b_subtype: u8) -> Ordering {
        let ord = match (a.split_at_checked(8), b.split_at_checked(8)) {
            (Some((a_head, a_zone)), Some((b_head, b_zone))) => {
                match (signed(a_head), signed(b_head), signed(a_zone), signed(b_zone)) {
                    (Some(x), Some(y), Some(xz), Some(yz)) => x.cmp(&y).then(xz.cmp(&yz)),
                    _ => a.cmp(b),
                }
            }
            _ => a.cmp(b),
        };
        ord.then(a_subtype.cmp(&b_subtype))
    }
}

/// Sign-extend a big-endian integer of one to eight bytes.
fn signed(bytes: &[u8]) -> Option<i64> {
    let first = *bytes.first()?;
    if bytes.len() > 8 {
        return None;
    }
    let fill = if first & 0x80 != 0 { 0xff } else { 0 };
    let mut buf = [fill; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Some(i64::from_be_bytes(buf))
}

fn decimal(bytes: &[u8]) -> Option<BigDecimal> {
    BigDecimal::from_str(std::str::from_utf8(bytes).ok()?).ok()
}

static BYTES: BytesComparator = BytesComparator;
static INTEGER: IntegerComparator = IntegerComparator;
static DOUBLE: DoubleComparator = DoubleComparator;
static FLOAT: FloatComparator = FloatComparator;
static DECIMAL: DecimalComparator = DecimalComparator;
static CALENDAR: CalendarComparator = CalendarComparator;

/// The comparator for payloads of the given category and type id.
pub fn comparator_for(category: Category, type_id: u8) -> &'static dyn ValueComparator {
    if category != Category::TypedLiteral {
        return &BYTES;
    }
    // Subtype does not change the encoding, so any subtype resolves the family.
    match Datatype::from_ids(type_id, 0) {
        Ok(Datatype::Integer(_) | Datatype::DateTime | Datatype::Boolean) => &INTEGER,
        Ok(Datatype::Double) => &DOUBLE,
        Ok(Datatype::Float) => &FLOAT,
        Ok(Datatype::Decimal) => &DECIMAL,
        Ok(Datatype::Date | Datatype::Gregorian(_)) => &CALENDAR,
        _ => &BYTES,
    }
}
