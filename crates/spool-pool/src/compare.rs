//! Orderings used to search the index.
//!
//! A [`SearchKey`] is compared against one stored entry, given the entry's
//! header, its inline payload prefix, and a way to fetch the rest of the
//! payload from the value log. Bound keys never compare equal to an entry,
//! so a search for one always yields an insertion point: the first entry of
//! a category (or category and type).

use std::cmp::Ordering;

use spool_types::{comparator_for, Category, TypedValue};

use crate::error::PoolResult;
use crate::record::RecordHeader;

/// What an index search looks for.
#[derive(Debug, Clone, Copy)]
pub enum SearchKey<'a> {
    /// Sorts before every entry whose category id is at least `category`.
    /// `category` is one past the last real id for an upper bound.
    Category { category: u16 },
    /// Sorts before every entry of `category` whose type id is at least
    /// `type_id`, and after all entries of lower categories.
    CategoryType { category: u8, type_id: u16 },
    /// An exact value.
    Value {
        header: RecordHeader,
        data: &'a [u8],
    },
}

impl<'a> SearchKey<'a> {
    pub fn value(value: &'a TypedValue) -> PoolResult<Self> {
        Ok(SearchKey::Value {
            header: RecordHeader::of(value)?,
            data: value.data(),
        })
    }

    /// Lower bound of `category`.
    pub fn category_start(category: Category) -> Self {
        SearchKey::Category {
            category: category.id() as u16,
        }
    }

    /// Upper bound of `category`.
    pub fn category_end(category: Category) -> Self {
        SearchKey::Category {
            category: category.id() as u16 + 1,
        }
    }

    pub fn type_start(category: Category, type_id: u8) -> Self {
        SearchKey::CategoryType {
            category: category.id(),
            type_id: type_id as u16,
        }
    }

    pub fn type_end(category: Category, type_id: u8) -> Self {
        SearchKey::CategoryType {
            category: category.id(),
            type_id: type_id as u16 + 1,
        }
    }

    /// Order of this key relative to a stored entry.
    ///
    /// `stored_prefix` holds the first bytes of the entry's payload. When the
    /// payload is longer than the prefix and the prefix cannot decide,
    /// `fetch_remainder` supplies the missing bytes.
    pub fn compare_entry<F>(
        &self,
        stored: &RecordHeader,
        stored_prefix: &[u8],
        fetch_remainder: F,
    ) -> PoolResult<Ordering>
    where
        F: FnOnce() -> PoolResult<Vec<u8>>,
    {
        let stored_category = stored.category.id();
        match *self {
            SearchKey::Category { category } => Ok(below_if(category <= stored_category as u16)),
            SearchKey::CategoryType { category, type_id } => {
                Ok(match category.cmp(&stored_category) {
                    Ordering::Equal => below_if(type_id <= stored.type_id as u16),
                    ord => ord,
                })
            }
            SearchKey::Value { header, data } => {
                let ord = header
                    .category
                    .id()
                    .cmp(&stored_category)
                    .then(header.type_id.cmp(&stored.type_id));
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
                let cmp = comparator_for(header.category, header.type_id);
                let stored_len = stored.data_len();
                if !stored.is_overflow() {
                    return Ok(cmp.compare(data, header.subtype_id, stored_prefix, stored.subtype_id));
                }
                match cmp.compare_prefix(data, stored_prefix, stored_len) {
                    Ordering::Equal => {}
                    ord => return Ok(ord),
                }
                let mut full = Vec::with_capacity(stored_len);
                full.extend_from_slice(stored_prefix);
                full.extend_from_slice(&fetch_remainder()?);
                Ok(cmp.compare(data, header.subtype_id, &full, stored.subtype_id))
            }
        }
    }
}

fn below_if(below: bool) -> Ordering {
    if below {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}
