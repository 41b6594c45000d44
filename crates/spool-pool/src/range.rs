use std::iter::FusedIterator;

use spool_types::NodeId;

use crate::phase::PhaseToken;

/// Lazy ascending sequence of node ids from one index generation.
///
/// The range pins its generation until it is dropped, so later writes and
/// commits never change what it yields.
#[derive(Debug, Clone)]
pub struct NodeRange {
    token: Option<PhaseToken>,
    start: usize,
    end: usize,
}

impl NodeRange {
    pub(crate) fn new(token: PhaseToken, start: usize, end: usize) -> Self {
        if start >= end {
            return Self::empty();
        }
        Self {
            token: Some(token),
            start,
            end,
        }
    }

    /// A range with no ids. Pins nothing.
    pub fn empty() -> Self {
        Self {
            token: None,
            start: 0,
            end: 0,
        }
    }

    /// Ids remaining.
    pub fn remaining(&self) -> usize {
        self.end - self.start
    }

    fn node_at(&self, i: usize) -> Option<NodeId> {
        self.token.as_ref().map(|t| t.entries()[i].node)
    }
}

impl Iterator for NodeRange {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.start >= self.end {
            self.token = None;
            return None;
        }
        let node = self.node_at(self.start);
        self.start += 1;
        node
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl DoubleEndedIterator for NodeRange {
    fn next_back(&mut self) -> Option<NodeId> {
        if self.start >= self.end {
            self.token = None;
            return None;
        }
        self.end -= 1;
        self.node_at(self.end)
    }
}

impl ExactSizeIterator for NodeRange {}

impl FusedIterator for NodeRange {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{IndexEntry, IndexPhase};
    use crate::record::RecordHeader;
    use spool_types::TypedValue;

    fn phase_with(n: u64) -> IndexPhase {
        let mut phase = IndexPhase::new();
        for i in 0..n {
            let v = TypedValue::integer(i as i64);
            phase.insert(
                i as usize,
                IndexEntry::new(RecordHeader::of(&v).unwrap(), v.data(), NodeId::new(i * 8 + 1)),
            );
        }
        phase
    }

    #[test]
    fn yields_slice_in_order() {
        let phase = phase_with(5);
        let range = NodeRange::new(phase.use_phase(), 1, 4);
        assert_eq!(range.len(), 3);
        let ids: Vec<u64> = range.map(|n| n.as_u64()).collect();
        assert_eq!(ids, vec![9, 17, 25]);
    }

    #[test]
    fn reverse_iteration() {
        let phase = phase_with(3);
        let ids: Vec<u64> = NodeRange::new(phase.use_phase(), 0, 3)
            .rev()
            .map(|n| n.as_u64())
            .collect();
        assert_eq!(ids, vec![17, 9, 1]);
    }

    #[test]
    fn inverted_bounds_are_empty() {
        let phase = phase_with(3);
        let mut range = NodeRange::new(phase.use_phase(), 2, 1);
        assert_eq!(range.len(), 0);
        assert_eq!(range.next(), None);
        assert!(!phase.is_in_use());
    }

    #[test]
    fn pin_released_when_exhausted() {
        let phase = phase_with(2);
        let mut range = NodeRange::new(phase.use_phase(), 0, 2);
        assert!(phase.is_in_use());
        range.by_ref().for_each(drop);
        assert_eq!(range.next(), None);
        assert!(!phase.is_in_use());
    }
}
