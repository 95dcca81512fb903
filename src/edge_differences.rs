//! Per-tree edge differences: which edges end and which begin at each
//! breakpoint along the sequence.
//!
//! This walks the same insertion/removal index arrays as the sparse tree
//! but yields the edges themselves instead of updating pointer arrays.
//! Consumers that build their own per-interval state (haplotype painting,
//! LD-style scans) use this instead of carrying a full [`crate::Tree`].

use crate::edge_table::EdgeTableRow;
use crate::newtypes::{EdgeId, Position};
use crate::TreeSequence;

/// The differences entering one local tree: its `[left, right)` interval,
/// the edges whose span ended at `left`, and the edges whose span begins
/// there. Edges are reported as [`EdgeTableRow`] values in index order,
/// so removals unlink children top-down and insertions relink bottom-up.
pub struct EdgeDifferences<'ts> {
    ts: &'ts TreeSequence,
    removals: (usize, usize),
    insertions: (usize, usize),
    left: f64,
    right: f64,
}

impl EdgeDifferences<'_> {
    pub fn interval(&self) -> (Position, Position) {
        (self.left.into(), self.right.into())
    }

    /// The edges removed at the left boundary of this tree.
    pub fn removals(&self) -> impl Iterator<Item = EdgeTableRow> + '_ {
        let edges = self.ts.edges();
        self.ts.edge_removal_order()[self.removals.0..self.removals.1]
            .iter()
            .filter_map(move |e| edges.row(*e).ok())
    }

    /// The edges inserted at the left boundary of this tree.
    pub fn insertions(&self) -> impl Iterator<Item = EdgeTableRow> + '_ {
        let edges = self.ts.edges();
        self.ts.edge_insertion_order()[self.insertions.0..self.insertions.1]
            .iter()
            .filter_map(move |e| edges.row(*e).ok())
    }

    pub fn num_removals(&self) -> usize {
        self.removals.1 - self.removals.0
    }

    pub fn num_insertions(&self) -> usize {
        self.insertions.1 - self.insertions.0
    }
}

/// Streams [`EdgeDifferences`] for every local tree, left to right.
///
/// Created by
/// [`TreeSequence::edge_differences_iter`](crate::TreeSequence::edge_differences_iter).
pub struct EdgeDifferencesIterator<'ts> {
    ts: &'ts TreeSequence,
    left: f64,
    insertion_index: usize,
    removal_index: usize,
}

impl<'ts> EdgeDifferencesIterator<'ts> {
    pub(crate) fn new(ts: &'ts TreeSequence) -> Self {
        Self {
            ts,
            left: 0.0,
            insertion_index: 0,
            removal_index: 0,
        }
    }

    fn edge_left(&self, e: EdgeId) -> f64 {
        f64::from(self.ts.edges().left_slice()[e.as_usize()])
    }

    fn edge_right(&self, e: EdgeId) -> f64 {
        f64::from(self.ts.edges().right_slice()[e.as_usize()])
    }
}

impl<'ts> Iterator for EdgeDifferencesIterator<'ts> {
    type Item = EdgeDifferences<'ts>;

    fn next(&mut self) -> Option<Self::Item> {
        let length = f64::from(self.ts.sequence_length());
        if self.left >= length {
            return None;
        }
        let num_edges = self.ts.edges().num_rows();
        let removal_start = self.removal_index;
        while self.removal_index < num_edges
            && self.edge_right(self.ts.edge_removal_order()[self.removal_index]) == self.left
        {
            self.removal_index += 1;
        }
        let insertion_start = self.insertion_index;
        while self.insertion_index < num_edges
            && self.edge_left(self.ts.edge_insertion_order()[self.insertion_index]) == self.left
        {
            self.insertion_index += 1;
        }
        let left = self.left;
        let mut right = length;
        if self.insertion_index < num_edges {
            right = right.min(self.edge_left(self.ts.edge_insertion_order()[self.insertion_index]));
        }
        if self.removal_index < num_edges {
            right = right.min(self.edge_right(self.ts.edge_removal_order()[self.removal_index]));
        }
        self.left = right;
        Some(EdgeDifferences {
            ts: self.ts,
            removals: (removal_start, self.removal_index),
            insertions: (insertion_start, self.insertion_index),
            left,
            right,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeFlags;
    use crate::TableCollection;

    fn two_tree_sequence() -> TreeSequence {
        let mut tables = TableCollection::new(10.).unwrap();
        tables
            .add_node(NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        tables
            .add_node(NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edge(0.0, 5.0, 2, 0).unwrap();
        tables.add_edge(0.0, 5.0, 2, 1).unwrap();
        tables.add_edge(5.0, 10.0, 3, 0).unwrap();
        tables.add_edge(5.0, 10.0, 3, 1).unwrap();
        tables.tree_sequence().unwrap()
    }

    #[test]
    fn test_intervals_partition_the_sequence() {
        let ts = two_tree_sequence();
        let mut last_right = 0.0;
        let mut num_trees = 0;
        for diffs in ts.edge_differences_iter() {
            let (l, r) = diffs.interval();
            assert_eq!(f64::from(l), last_right);
            assert!(r > l);
            last_right = r.into();
            num_trees += 1;
        }
        assert_eq!(num_trees, ts.num_trees());
        assert_eq!(last_right, 10.0);
    }

    #[test]
    fn test_insertions_and_removals_balance() {
        let ts = two_tree_sequence();
        let mut inserted = 0usize;
        let mut removed = 0usize;
        for diffs in ts.edge_differences_iter() {
            inserted += diffs.num_insertions();
            removed += diffs.num_removals();
            assert_eq!(diffs.insertions().count(), diffs.num_insertions());
            assert_eq!(diffs.removals().count(), diffs.num_removals());
        }
        // every edge is inserted once; edges ending at the sequence end
        // are never removed
        assert_eq!(inserted, 4);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_first_tree_has_no_removals() {
        let ts = two_tree_sequence();
        let first = ts.edge_differences_iter().next().unwrap();
        assert_eq!(first.num_removals(), 0);
        assert_eq!(first.num_insertions(), 2);
        for edge in first.insertions() {
            assert_eq!(edge.parent, 2);
        }
    }

    #[test]
    fn test_rows_carry_their_edge_ids() {
        let ts = two_tree_sequence();
        let mut seen: Vec<i32> = vec![];
        for diffs in ts.edge_differences_iter() {
            for edge in diffs.insertions() {
                seen.push(edge.id.into());
            }
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
