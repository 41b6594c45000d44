//! Durable file storage for the spool string pool.
//!
//! The pool never touches `std::fs` directly. It reads and writes through the
//! [`StoreFile`] and [`StoreDir`] traits, so the same transaction code runs
//! against real files and against an in-memory filesystem that can be made
//! to crash at an exact operation.
//!
//! # Storage Backends
//!
//! - [`DiskDir`] -- one file per name under a root directory
//! - [`MemDir`] -- in-memory files with synced/live images, crash scheduling
//!   and reboot
//!
//! # Design Rules
//!
//! 1. Nothing is durable until `sync()` returns.
//! 2. Reads observe unsynced writes.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod disk;
pub mod error;
pub mod memory;
pub mod traits;

pub use disk::{DiskDir, DiskFile};
pub use error::{StoreError, StoreResult};
pub use memory::{MemDir, MemEvent, MemFile};
pub use traits::{StoreDir, StoreFile};
