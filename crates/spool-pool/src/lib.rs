//! Transactional write-once string pool.
//!
//! [`ValuePool`] interns [`TypedValue`](spool_types::TypedValue)s and hands
//! out [`NodeId`](spool_types::NodeId)s that stay valid for the life of the
//! pool. Values are appended to a value log; the id of a value is its log
//! offset. An ordered index, kept in copy-on-write generations, answers
//! value -> id lookups and range scans.
//!
//! # On-disk layout
//!
//! For a pool named `spool`:
//!
//! - `spool.sp` -- two metaroot slots ([`metaroot`])
//! - `spool.sp_nd` -- the value log ([`value_log`])
//! - `spool.sp_idx0`, `spool.sp_idx1` -- index snapshots, one per slot
//!
//! # Transactions
//!
//! ```text
//! open -> recover -> select_phase(n) | clear -> Active
//! Active --prepare--> Prepared --commit--> Active
//!                            \--rollback--> Active
//! ```
//!
//! `prepare` forces the index snapshot and the value log, then publishes a
//! metaroot for phase `n + 1` in the slot not holding phase `n`. `commit`
//! invalidates the old slot. After a crash, `recover` lists the valid phases
//! and `select_phase` truncates the log back to the chosen one.
//!
//! # Design Rules
//!
//! 1. Records are never rewritten; the log only grows, except for truncation
//!    of an uncommitted tail.
//! 2. A metaroot slot becomes valid only after everything it points to is
//!    durable.
//! 3. Readers pin an index generation and never block the writer.

pub mod blank;
pub mod cache;
pub mod compare;
pub mod config;
pub mod error;
pub mod metaroot;
pub mod phase;
pub mod pool;
pub mod range;
pub mod record;
pub mod value_log;

pub use blank::BlankNodeAllocator;
pub use config::{PoolConfig, SyncMode};
pub use error::{PoolError, PoolResult};
pub use metaroot::{IndexRoot, Metaroot};
pub use phase::{IndexPhase, PhaseToken};
pub use pool::{PoolState, PoolStats, ValuePool};
pub use range::NodeRange;
pub use record::{RecordHeader, HEADER_SIZE, INLINE_MAX};
