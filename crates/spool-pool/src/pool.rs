use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use spool_store::{DiskDir, StoreDir, StoreFile};
use spool_types::{Category, Datatype, NodeId, TypedValue};
use tracing::{debug, error, info, warn};

use crate::blank::BlankNodeAllocator;
use crate::cache::NodeCache;
use crate::compare::SearchKey;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::metaroot::{Metaroot, MetarootFile, NR_SLOTS};
use crate::phase::{IndexEntry, IndexPhase, PhaseToken, Position};
use crate::range::NodeRange;
use crate::record::{encode_record, RecordHeader};
use crate::value_log::ValueLog;

/// Transaction state of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Opened; no generation selected yet.
    Uninitialized,
    /// Accepting writes.
    Active,
    /// A generation is durably staged; only `commit` or `rollback` may follow.
    Prepared,
    /// Terminal.
    Closed,
}

/// Snapshot of pool counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub state: PoolState,
    pub phase_number: Option<u32>,
    pub entries: usize,
    pub log_end: u64,
    pub committed_log_end: u64,
    pub next_blank: u64,
}

/// Writer-side state, guarded by the pool mutex.
#[derive(Debug)]
struct PoolInner {
    state: PoolState,
    metaroots: MetarootFile,
    index_files: [Box<dyn StoreFile>; NR_SLOTS],
    /// Slot of the latest durable generation.
    phase_index: usize,
    phase_number: u32,
    /// The generation writes go to.
    current: IndexPhase,
    /// Pin on the last committed generation.
    committed: Option<PhaseToken>,
    /// Pin on the generation staged by `prepare`.
    recording: Option<PhaseToken>,
    blank: BlankNodeAllocator,
    committed_log_end: u64,
    prepared_log_end: u64,
}

/// A transactional write-once pool of RDF values.
///
/// Values are appended to a value log and indexed by an ordered index; the
/// identifier of a value is its log offset, so lookups by id never touch the
/// index. Writes become durable through `prepare` and `commit`, which publish
/// a new generation in one of two metaroot slots.
///
/// One writer at a time: every mutating call serializes on an internal mutex.
/// Readers pin the current index generation and run without the mutex, so a
/// long range scan never blocks the writer.
#[derive(Debug)]
pub struct ValuePool {
    config: PoolConfig,
    dir: Arc<dyn StoreDir>,
    log: ValueLog,
    cache: Mutex<NodeCache>,
    inner: Mutex<PoolInner>,
}

impl ValuePool {
    /// Open (or create) the pool files in `dir`. The pool starts
    /// uninitialized: call [`recover`](Self::recover) and
    /// [`select_phase`](Self::select_phase), or [`clear`](Self::clear).
    pub fn open(dir: Arc<dyn StoreDir>, config: PoolConfig) -> PoolResult<Self> {
        let metaroot_file = dir.open(&config.metaroot_file())?;
        if let Err(e) = MetarootFile::check(&*metaroot_file) {
            warn!(error = %e, "metaroot file failed validation; recovery will fail");
        }
        let log = ValueLog::open(dir.open(&config.log_file())?, config.sync_mode)?;
        let index_files = [
            dir.open(&config.index_file(0))?,
            dir.open(&config.index_file(1))?,
        ];
        info!(name = %config.name, log_end = log.end(), "string pool opened");

        let inner = PoolInner {
            state: PoolState::Uninitialized,
            metaroots: MetarootFile::new(metaroot_file, config.sync_mode),
            index_files,
            phase_index: 0,
            phase_number: 0,
            current: IndexPhase::new(),
            committed: None,
            recording: None,
            blank: BlankNodeAllocator::new(),
            committed_log_end: 0,
            prepared_log_end: 0,
        };
        Ok(Self {
            cache: Mutex::new(NodeCache::new(config.node_cache_capacity)),
            config,
            dir,
            log,
            inner: Mutex::new(inner),
        })
    }

    /// Open a pool stored on disk under `path`.
    pub fn open_path(path: impl AsRef<Path>, config: PoolConfig) -> PoolResult<Self> {
        Self::open(Arc::new(DiskDir::new(path)?), config)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // -- Values --------------------------------------------------------------

    /// Store `value` and return its new id.
    ///
    /// Fails with [`PoolError::DuplicateValue`] carrying the existing id if
    /// an equal value is already present.
    pub fn put(&self, value: &TypedValue) -> PoolResult<NodeId> {
        self.insert(value, false)
    }

    /// Return the id of `value`, storing it first if absent.
    pub fn find_or_create(&self, value: &TypedValue) -> PoolResult<NodeId> {
        self.insert(value, true)
    }

    fn insert(&self, value: &TypedValue, reuse: bool) -> PoolResult<NodeId> {
        let key = SearchKey::value(value)?;
        let mut inner = self.writable()?;
        match inner.current.find(|e| self.compare(&key, e))? {
            Position::Found(i) => {
                let existing = inner.current.entries()[i].node;
                if reuse {
                    Ok(existing)
                } else {
                    Err(PoolError::DuplicateValue { existing })
                }
            }
            Position::Insert(i) => {
                let offset = self.log.append(&encode_record(value)?)?;
                let node = NodeId::from_offset(offset);
                let header = RecordHeader::of(value)?;
                inner
                    .current
                    .insert(i, IndexEntry::new(header, value.data(), node));
                debug!(%node, category = %value.category(), "value stored");
                Ok(node)
            }
        }
    }

    /// Look up the id of `value` without storing it.
    pub fn find_id(&self, value: &TypedValue) -> PoolResult<Option<NodeId>> {
        let key = SearchKey::value(value)?;
        let token = self.reader()?;
        Ok(match token.find(|e| self.compare(&key, e))? {
            Position::Found(i) => Some(token.entries()[i].node),
            Position::Insert(_) => None,
        })
    }

    /// The value stored under `node`.
    ///
    /// Blank ids, `NodeId::NONE`, and ids past the end of the log are not
    /// found. An id that does not land on a record boundary is an error.
    pub fn find_value(&self, node: NodeId) -> PoolResult<Option<TypedValue>> {
        self.ensure_initialized()?;
        if node.is_none() || node.is_blank() {
            return Ok(None);
        }
        let offset = node.to_offset().map_err(|_| {
            PoolError::InvalidArgument(format!("node {node} is not a record boundary"))
        })?;
        if !self.log.contains(node) {
            return Ok(None);
        }
        let epoch = {
            let cache = self.cache.lock().expect("node cache poisoned");
            if let Some(value) = cache.get(node) {
                return Ok(Some(value.clone()));
            }
            cache.epoch()
        };
        let value = self.log.read_record(offset)?.into_value()?;
        if let Some(v) = &value {
            self.cache
                .lock()
                .expect("node cache poisoned")
                .insert_at(epoch, node, v.clone());
        }
        Ok(value)
    }

    /// Ids of the values between `low` and `high`, ascending.
    ///
    /// Both bounds must share a category (and a type, for typed literals). A
    /// missing bound extends the range to the start or end of that
    /// category or type; with both missing the range is the whole pool.
    pub fn find_range(
        &self,
        low: Option<&TypedValue>,
        low_inclusive: bool,
        high: Option<&TypedValue>,
        high_inclusive: bool,
    ) -> PoolResult<NodeRange> {
        let token = self.reader()?;
        let (category, type_id) = match (low, high) {
            (None, None) => {
                let len = token.len();
                return Ok(NodeRange::new(token, 0, len));
            }
            (Some(l), Some(h)) => {
                let same_type = l.category() == h.category()
                    && (l.category() != Category::TypedLiteral || l.type_id() == h.type_id());
                if !same_type {
                    return Err(PoolError::InvalidArgument(
                        "low and high bounds are of different types".into(),
                    ));
                }
                match l.cmp(h) {
                    Ordering::Greater => return Ok(NodeRange::empty()),
                    Ordering::Equal if !(low_inclusive && high_inclusive) => {
                        return Ok(NodeRange::empty())
                    }
                    _ => {}
                }
                (l.category(), l.type_id())
            }
            (Some(v), None) | (None, Some(v)) => (v.category(), v.type_id()),
        };
        let (lower, upper) = bounds(category, Some(type_id));

        let start = match low {
            Some(v) => {
                let key = SearchKey::value(v)?;
                match token.find(|e| self.compare(&key, e))? {
                    Position::Found(i) if !low_inclusive => i + 1,
                    pos => pos.index(),
                }
            }
            None => token.find(|e| self.compare(&lower, e))?.index(),
        };
        let end = match high {
            Some(v) => {
                let key = SearchKey::value(v)?;
                match token.find(|e| self.compare(&key, e))? {
                    Position::Found(j) if high_inclusive => j + 1,
                    pos => pos.index(),
                }
            }
            None => token.find(|e| self.compare(&upper, e))?.index(),
        };
        Ok(NodeRange::new(token, start, end))
    }

    /// Ids of every value of `category`, or of every typed literal with the
    /// given datatype, ascending.
    ///
    /// Datatypes that differ only in subtype (`xsd:int` and `xsd:long`) share
    /// a type id and are returned together. With neither argument the range
    /// is the whole pool.
    pub fn find_range_by_type(
        &self,
        category: Option<Category>,
        datatype_uri: Option<&str>,
    ) -> PoolResult<NodeRange> {
        let token = self.reader()?;
        let (lower, upper) = match (category, datatype_uri) {
            (None, None) => {
                let len = token.len();
                return Ok(NodeRange::new(token, 0, len));
            }
            (None, Some(uri)) => {
                return Err(PoolError::InvalidArgument(format!(
                    "datatype {uri} given without a category"
                )))
            }
            (Some(c), None) => bounds(c, None),
            (Some(Category::TypedLiteral), Some(uri)) => {
                let dt = Datatype::from_uri(uri).ok_or_else(|| {
                    PoolError::InvalidArgument(format!("unsupported datatype {uri}"))
                })?;
                bounds(Category::TypedLiteral, Some(dt.type_id()))
            }
            (Some(c), Some(_)) => {
                return Err(PoolError::InvalidArgument(format!(
                    "category {c} has no datatypes"
                )))
            }
        };
        let start = token.find(|e| self.compare(&lower, e))?.index();
        let end = token.find(|e| self.compare(&upper, e))?.index();
        Ok(NodeRange::new(token, start, end))
    }

    /// Allocate a fresh blank node id.
    pub fn allocate_blank(&self) -> PoolResult<NodeId> {
        Ok(self.writable()?.blank.allocate())
    }

    /// Whether `node` names a blank node. No I/O.
    pub fn is_blank(node: NodeId) -> bool {
        BlankNodeAllocator::is_blank(node)
    }

    /// Values are never removed: ids are log offsets and stay valid forever.
    /// Always reports success and leaves the value resolvable.
    pub fn remove(&self, node: NodeId) -> bool {
        debug!(%node, "remove ignored; the pool is write-once");
        true
    }

    // -- Transactions --------------------------------------------------------

    /// Phase numbers of the valid metaroots. Empty once a phase is selected.
    pub fn recover(&self) -> PoolResult<Vec<u32>> {
        let mut inner = self.lock();
        match inner.state {
            PoolState::Closed => return Err(PoolError::Closed),
            PoolState::Active | PoolState::Prepared => return Ok(Vec::new()),
            PoolState::Uninitialized => {}
        }
        inner.metaroots.load()?;
        let phases = inner.metaroots.valid_phases();
        info!(?phases, "metaroots recovered");
        Ok(phases)
    }

    /// Adopt the durable generation `phase_number`.
    ///
    /// Loads its index and blank counter, invalidates the other metaroot
    /// slot, then cuts any uncommitted tail off the log.
    pub fn select_phase(&self, phase_number: u32) -> PoolResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            PoolState::Closed => return Err(PoolError::Closed),
            PoolState::Active | PoolState::Prepared if inner.phase_number == phase_number => {
                return Ok(())
            }
            PoolState::Active | PoolState::Prepared => {
                return Err(PoolError::InvalidState(format!(
                    "phase {} is already selected",
                    inner.phase_number
                )))
            }
            PoolState::Uninitialized => {}
        }
        if !inner.metaroots.is_loaded() {
            inner.metaroots.load()?;
        }
        let slot = inner
            .metaroots
            .find_valid(phase_number)
            .ok_or_else(|| PoolError::UnknownPhase {
                requested: phase_number,
                available: inner.metaroots.valid_phases(),
            })?;
        let metaroot = *inner.metaroots.slot(slot);
        let phase = IndexPhase::read_snapshot(&*inner.index_files[slot], &metaroot.index_root)?;
        // The other slot may describe a longer log; retire it before the
        // log is cut to this generation's length.
        inner.metaroots.invalidate(1 - slot)?;
        self.log.truncate(metaroot.log_end)?;
        self.clear_cache();

        inner.blank.set_current_state(metaroot.next_blank);
        inner.committed = Some(phase.use_phase());
        inner.current = phase;
        inner.recording = None;
        inner.phase_index = slot;
        inner.phase_number = phase_number;
        inner.committed_log_end = metaroot.log_end;
        inner.prepared_log_end = metaroot.log_end;
        inner.state = PoolState::Active;
        info!(
            phase = phase_number,
            log_end = metaroot.log_end,
            entries = inner.current.len(),
            "phase selected"
        );
        Ok(())
    }

    /// Format an empty pool at phase 0. Does nothing if a phase is already
    /// selected.
    pub fn clear(&self) -> PoolResult<()> {
        if self.lock().state != PoolState::Uninitialized {
            return Ok(());
        }
        self.clear_at(0)
    }

    /// Format an empty pool at `phase_number`, discarding everything stored.
    pub fn clear_at(&self, phase_number: u32) -> PoolResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            PoolState::Closed => return Err(PoolError::Closed),
            PoolState::Active | PoolState::Prepared => {
                return Err(PoolError::InvalidState(
                    "clear requires an uninitialized pool".into(),
                ))
            }
            PoolState::Uninitialized => {}
        }
        inner.metaroots.reset()?;
        self.log.truncate(0)?;
        self.log.force()?;
        self.clear_cache();
        for file in &inner.index_files {
            file.set_len(0)?;
        }

        inner.blank.clear();
        inner.current = IndexPhase::new();
        inner.committed = Some(inner.current.use_phase());
        inner.recording = None;
        inner.phase_number = phase_number;
        inner.phase_index = 1;
        inner.committed_log_end = 0;
        inner.prepared_log_end = 0;
        inner.state = PoolState::Active;
        info!(phase = phase_number, "string pool cleared");
        Ok(())
    }

    /// Durably stage the current generation as phase `n + 1`.
    ///
    /// Writes the index snapshot, forces it and the value log, then publishes
    /// the new metaroot with the two-step valid-flag protocol. Writes are
    /// refused until `commit` or `rollback`.
    pub fn prepare(&self) -> PoolResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            PoolState::Active => {}
            PoolState::Prepared => {
                return Err(PoolError::InvalidState(
                    "prepare called twice without commit or rollback".into(),
                ))
            }
            PoolState::Uninitialized => return Err(PoolError::NotInitialized),
            PoolState::Closed => return Err(PoolError::Closed),
        }
        let next_number = inner
            .phase_number
            .checked_add(1)
            .ok_or_else(|| PoolError::InvalidState("phase number overflow".into()))?;

        let token = inner.current.use_phase();
        inner.current = IndexPhase::from_token(&token);
        let next_index = 1 - inner.phase_index;

        match self.publish_generation(inner, next_index, next_number) {
            Ok(log_end) => {
                inner.phase_index = next_index;
                inner.phase_number = next_number;
                inner.prepared_log_end = log_end;
                inner.recording = Some(token);
                inner.state = PoolState::Prepared;
                info!(phase = next_number, log_end, "transaction prepared");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, phase = next_number, "prepare failed");
                // The staged slot may already carry its valid flag.
                if let Err(undo) = inner.metaroots.invalidate(next_index) {
                    warn!(error = %undo, slot = next_index, "could not retire staged metaroot");
                }
                Err(e)
            }
        }
    }

    fn publish_generation(
        &self,
        inner: &mut PoolInner,
        slot: usize,
        phase_number: u32,
    ) -> PoolResult<u64> {
        let file = &*inner.index_files[slot];
        let index_root = inner.current.write_snapshot(file)?;
        self.config.sync_mode.force(file)?;
        self.log.force()?;

        let log_end = self.log.end();
        let mut metaroot = Metaroot {
            valid: true,
            phase_number,
            log_end,
            next_blank: 0,
            index_root,
        };
        inner.blank.prepare(&mut metaroot);
        inner.metaroots.publish(slot, metaroot)?;
        Ok(log_end)
    }

    /// Make the prepared generation the committed one.
    ///
    /// A failure here leaves the on-disk state ambiguous, so the pool closes
    /// itself; reopen and recover to continue.
    pub fn commit(&self) -> PoolResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            PoolState::Prepared => {}
            PoolState::Active => {
                return Err(PoolError::InvalidState(
                    "commit called without prepare".into(),
                ))
            }
            PoolState::Uninitialized => return Err(PoolError::NotInitialized),
            PoolState::Closed => return Err(PoolError::Closed),
        }
        if let Err(e) = inner.metaroots.invalidate(1 - inner.phase_index) {
            error!(error = %e, phase = inner.phase_number, "commit failed; closing string pool");
            self.close_locked(inner);
            return Err(e);
        }
        inner.committed = inner.recording.take();
        inner.blank.commit();
        inner.committed_log_end = inner.prepared_log_end;
        inner.state = PoolState::Active;
        info!(
            phase = inner.phase_number,
            log_end = inner.committed_log_end,
            "transaction committed"
        );
        Ok(())
    }

    /// Return to the last committed generation.
    ///
    /// Undoes a `prepare` if there was one, truncates the value log to the
    /// committed length, resets the blank counter, and restarts the index
    /// from the committed generation. Every step runs even if an earlier one
    /// fails; the first error is returned.
    pub fn rollback(&self) -> PoolResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            PoolState::Active | PoolState::Prepared => {}
            PoolState::Uninitialized => return Err(PoolError::NotInitialized),
            PoolState::Closed => return Err(PoolError::Closed),
        }

        let mut first_error = None;
        let mut keep = |result: PoolResult<()>| {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!(error = %e, "additional error during rollback");
                }
            }
        };

        if inner.state == PoolState::Prepared {
            inner.phase_index = 1 - inner.phase_index;
            inner.phase_number -= 1;
            inner.recording = None;
            keep(inner.metaroots.invalidate(1 - inner.phase_index));
        }
        inner.blank.rollback();
        inner.prepared_log_end = inner.committed_log_end;
        keep(self.log.truncate(inner.committed_log_end));
        self.clear_cache();
        inner.current = match &inner.committed {
            Some(token) => IndexPhase::from_token(token),
            None => IndexPhase::new(),
        };
        inner.state = PoolState::Active;
        info!(
            phase = inner.phase_number,
            log_end = inner.committed_log_end,
            "transaction rolled back"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Current phase number.
    pub fn phase_number(&self) -> PoolResult<u32> {
        let inner = self.lock();
        match inner.state {
            PoolState::Active | PoolState::Prepared => Ok(inner.phase_number),
            PoolState::Uninitialized => Err(PoolError::NotInitialized),
            PoolState::Closed => Err(PoolError::Closed),
        }
    }

    pub fn state(&self) -> PoolState {
        self.lock().state
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.lock();
        let initialized = matches!(inner.state, PoolState::Active | PoolState::Prepared);
        PoolStats {
            state: inner.state,
            phase_number: initialized.then_some(inner.phase_number),
            entries: inner.current.len(),
            log_end: self.log.end(),
            committed_log_end: inner.committed_log_end,
            next_blank: inner.blank.next(),
        }
    }

    /// Release every pinned generation and refuse further calls.
    pub fn close(&self) {
        let mut guard = self.lock();
        self.close_locked(&mut guard);
    }

    /// Close the pool and remove its files.
    pub fn delete(&self) -> PoolResult<()> {
        self.close();
        let names = [
            self.config.metaroot_file(),
            self.config.log_file(),
            self.config.index_file(0),
            self.config.index_file(1),
        ];
        for name in &names {
            self.dir.remove(name)?;
        }
        info!(name = %self.config.name, "string pool deleted");
        Ok(())
    }

    // -- Internals -----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().expect("pool mutex poisoned")
    }

    fn close_locked(&self, inner: &mut PoolInner) {
        if inner.state == PoolState::Closed {
            return;
        }
        inner.state = PoolState::Closed;
        inner.committed = None;
        inner.recording = None;
        inner.current = IndexPhase::new();
        self.clear_cache();
        info!("string pool closed");
    }

    fn clear_cache(&self) {
        self.cache.lock().expect("node cache poisoned").clear();
    }

    /// The writer lock, if the pool accepts writes.
    fn writable(&self) -> PoolResult<MutexGuard<'_, PoolInner>> {
        let inner = self.lock();
        match inner.state {
            PoolState::Active => Ok(inner),
            PoolState::Prepared => Err(PoolError::InvalidState(
                "writes are refused while a transaction is prepared".into(),
            )),
            PoolState::Uninitialized => Err(PoolError::NotInitialized),
            PoolState::Closed => Err(PoolError::Closed),
        }
    }

    fn ensure_initialized(&self) -> PoolResult<()> {
        match self.lock().state {
            PoolState::Active | PoolState::Prepared => Ok(()),
            PoolState::Uninitialized => Err(PoolError::NotInitialized),
            PoolState::Closed => Err(PoolError::Closed),
        }
    }

    /// Pin the current generation for a read.
    fn reader(&self) -> PoolResult<PhaseToken> {
        let inner = self.lock();
        match inner.state {
            PoolState::Active | PoolState::Prepared => Ok(inner.current.use_phase()),
            PoolState::Uninitialized => Err(PoolError::NotInitialized),
            PoolState::Closed => Err(PoolError::Closed),
        }
    }

    fn compare(&self, key: &SearchKey<'_>, entry: &IndexEntry) -> PoolResult<Ordering> {
        key.compare_entry(&entry.header, &entry.prefix, || {
            self.log.read_node_remainder(entry.node, &entry.header)
        })
    }
}

/// Search bounds for all values of `category`, or of one type within it.
fn bounds(category: Category, type_id: Option<u8>) -> (SearchKey<'static>, SearchKey<'static>) {
    match type_id {
        Some(t) if category == Category::TypedLiteral => (
            SearchKey::type_start(category, t),
            SearchKey::type_end(category, t),
        ),
        _ => (
            SearchKey::category_start(category),
            SearchKey::category_end(category),
        ),
    }
}
