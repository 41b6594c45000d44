/// Errors from file store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read reached past the end of the file.
    #[error("short read at offset {offset}: wanted {wanted} bytes, file has {available}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        available: u64,
    },

    /// The simulated filesystem is down (see `MemDir::schedule_crash`).
    #[error("filesystem is down")]
    Crashed,

    /// A one-off failure injected by `MemDir::fail_once`.
    #[error("injected I/O fault")]
    Fault,

    /// The named file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
