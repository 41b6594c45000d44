use std::collections::{HashMap, VecDeque};

use spool_types::{NodeId, TypedValue};

/// Bounded id -> value cache in front of the value log. Evicts the oldest
/// insertion first.
///
/// Every `clear` starts a new epoch. A reader that looked a value up before
/// the log was truncated inserts with the epoch it started in, and the stale
/// value is dropped.
#[derive(Debug)]
pub struct NodeCache {
    capacity: usize,
    epoch: u64,
    values: HashMap<NodeId, TypedValue>,
    order: VecDeque<NodeId>,
}

impl NodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            epoch: 0,
            values: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, node: NodeId) -> Option<&TypedValue> {
        self.values.get(&node)
    }

    pub fn insert(&mut self, node: NodeId, value: TypedValue) {
        if self.capacity == 0 || self.values.contains_key(&node) {
            return;
        }
        while self.values.len() >= self.capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.values.remove(&old);
                }
                None => break,
            }
        }
        self.order.push_back(node);
        self.values.insert(node, value);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Insert only if no `clear` happened since `epoch` was read.
    pub fn insert_at(&mut self, epoch: u64, node: NodeId, value: TypedValue) {
        if epoch == self.epoch {
            self.insert(node, value);
        }
    }

    pub fn clear(&mut self) {
        self.epoch += 1;
        self.values.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
