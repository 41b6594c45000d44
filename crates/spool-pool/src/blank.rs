use spool_types::NodeId;

use crate::metaroot::Metaroot;

/// First counter value handed out after `clear`.
pub const FIRST: u64 = 1;

/// Transactional blank-node counter.
///
/// Allocation is in-memory only. The counter reaches disk through the
/// metaroot written by `prepare`, and `rollback` hands the uncommitted
/// counters out again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankNodeAllocator {
    next: u64,
    committed: u64,
}

impl BlankNodeAllocator {
    pub fn new() -> Self {
        Self {
            next: FIRST,
            committed: FIRST,
        }
    }

    /// Return a tagged identifier for a fresh blank node.
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId::blank(self.next);
        self.next += 1;
        id
    }

    pub fn is_blank(id: NodeId) -> bool {
        id.is_blank()
    }

    /// Record the counter into the metaroot being prepared.
    pub fn prepare(&self, metaroot: &mut Metaroot) {
        metaroot.next_blank = self.next;
    }

    pub fn commit(&mut self) {
        self.committed = self.next;
    }

    pub fn rollback(&mut self) {
        self.next = self.committed;
    }

    pub fn clear(&mut self) {
        self.next = FIRST;
        self.committed = FIRST;
    }

    /// Adopt the counter recorded in a selected metaroot.
    pub fn set_current_state(&mut self, next: u64) {
        self.next = next;
        self.committed = next;
    }

    pub fn next(&self) -> u64 {
        self.next
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }
}

impl Default for BlankNodeAllocator {
    fn default() -> Self {
        Self::new()
    }
}
