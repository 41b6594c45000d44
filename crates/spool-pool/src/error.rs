use spool_store::StoreError;
use spool_types::{NodeId, TypeError};

/// Errors produced by the string pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Underlying file I/O failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// `put` found an equal value already in the pool.
    #[error("value already present as node {existing}")]
    DuplicateValue { existing: NodeId },

    /// Called before `recover`/`select_phase` or `clear`.
    #[error("string pool is not initialized")]
    NotInitialized,

    /// The transaction state machine does not allow this call now.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// `select_phase` named a generation no valid metaroot records.
    #[error("phase {requested} is not among the valid phases {available:?}")]
    UnknownPhase { requested: u32, available: Vec<u32> },

    /// Stored bytes failed validation.
    #[error("corrupt data at offset {offset}: {reason}")]
    CorruptData { offset: u64, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid metaroot magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error("unsupported metaroot version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("configuration error: {0}")]
    Config(String),

    /// The pool was closed, explicitly or by a failed commit.
    #[error("string pool is closed")]
    Closed,

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl PoolError {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            offset,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the pool crate.
pub type PoolResult<T> = Result<T, PoolError>;
