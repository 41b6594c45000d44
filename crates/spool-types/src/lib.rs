//! Value types for the spool string pool.
//!
//! The pool interns RDF values (URIs, plain and language-tagged literals,
//! typed literals) and hands out stable integer identifiers. This crate holds
//! the pieces every other spool crate shares.
//!
//! # Key Types
//!
//! - [`NodeId`] -- identifier for a stored value or a blank node
//! - [`Category`] -- top-level partition of the value space
//! - [`Datatype`] -- registry of typed-literal datatypes
//! - [`TypedValue`] -- a value in its stored form, totally ordered
//! - [`ValueComparator`] -- payload ordering, usable on partial payloads

pub mod category;
pub mod comparator;
pub mod error;
pub mod node;
pub mod value;

pub use category::{Category, Datatype, GregorianKind, IntegerKind, NONE_TYPE_ID, XSD_NS};
pub use comparator::{
    comparator_for, BytesComparator, CalendarComparator, DecimalComparator, DoubleComparator,
    FloatComparator, IntegerComparator, ValueComparator,
};
pub use error::TypeError;
pub use node::{NodeId, BLANK_TAG, RECORD_ALIGN};
pub use value::TypedValue;
