use thiserror::Error;

/// Errors produced by value and identifier operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid category id: {0}")]
    InvalidCategory(u8),

    #[error("unknown datatype id {type_id} (subtype {subtype_id})")]
    UnknownDatatype { type_id: u8, subtype_id: u8 },

    #[error("unsupported datatype URI: {0}")]
    UnsupportedDatatype(String),

    #[error("invalid byte length for {datatype}: expected {expected}, got {actual}")]
    InvalidLength {
        datatype: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("node {0} is not a value-log identifier")]
    NotAnOffset(u64),

    #[error("cannot parse encoded value {input:?}: {reason}")]
    Parse { input: String, reason: String },
}
