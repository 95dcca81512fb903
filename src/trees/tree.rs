use std::cell::{Cell, RefCell};

use crate::flags::TreeFlags;
use crate::newtypes::{EdgeId, NodeId, Position, Time};
use crate::CoalseqError;

use super::TreeSequence;

const NULL_SAMPLE: i32 = -1;
const FORWARD: i32 = 1;
const REVERSE: i32 = -1;

/// A local tree, streamed along the sequence.
///
/// Node relationships are held in parent/child/sibling pointer arrays of
/// length `num_nodes + 1`; the extra slot is a *virtual root* whose
/// children are the roots of the current tree, so root bookkeeping reuses
/// the ordinary branch operations. Transitions to the adjacent tree
/// remove and insert only the edges whose endpoint lies on the shared
/// boundary, which is O(1) amortized over a full sweep.
///
/// Trees are obtained from
/// [`TreeSequence::tree_iterator`](crate::TreeSequence::tree_iterator)
/// and advanced through the [`StreamingIterator`](crate::StreamingIterator)
/// (and [`DoubleEndedStreamingIterator`](crate::DoubleEndedStreamingIterator))
/// traits.
pub struct Tree<'treeseq> {
    ts: &'treeseq TreeSequence,
    flags: TreeFlags,
    parent: Vec<NodeId>,
    left_child: Vec<NodeId>,
    right_child: Vec<NodeId>,
    left_sib: Vec<NodeId>,
    right_sib: Vec<NodeId>,
    num_samples: Vec<u32>,
    num_tracked: Vec<u32>,
    tracked: Vec<bool>,
    left_sample: Vec<i32>,
    right_sample: Vec<i32>,
    next_sample: Vec<i32>,
    marked: RefCell<Vec<u8>>,
    mark: Cell<u8>,
    index: i32,
    left: f64,
    right: f64,
    direction: i32,
    left_index: isize,
    right_index: isize,
    advanced: bool,
}

impl<'treeseq> Tree<'treeseq> {
    pub(crate) fn new(ts: &'treeseq TreeSequence, flags: TreeFlags) -> Result<Self, CoalseqError> {
        let n = ts.nodes().num_rows();
        Ok(Self {
            ts,
            flags,
            parent: vec![NodeId::NULL; n + 1],
            left_child: vec![NodeId::NULL; n + 1],
            right_child: vec![NodeId::NULL; n + 1],
            left_sib: vec![NodeId::NULL; n + 1],
            right_sib: vec![NodeId::NULL; n + 1],
            num_samples: vec![0; n + 1],
            num_tracked: vec![0; n + 1],
            tracked: vec![false; n],
            left_sample: vec![NULL_SAMPLE; n + 1],
            right_sample: vec![NULL_SAMPLE; n + 1],
            next_sample: vec![NULL_SAMPLE; ts.num_samples()],
            marked: RefCell::new(vec![0; n + 1]),
            mark: Cell::new(0),
            index: -1,
            left: 0.0,
            right: 0.0,
            direction: 0,
            left_index: 0,
            right_index: 0,
            advanced: false,
        })
    }

    fn virtual_root_index(&self) -> usize {
        self.parent.len() - 1
    }

    /// Return the virtual root of the tree.
    pub fn virtual_root(&self) -> NodeId {
        NodeId::from(self.virtual_root_index() as i32)
    }

    /// The leftmost root. Multiple roots are siblings reachable through
    /// [`Tree::right_sib`].
    pub fn left_root(&self) -> NodeId {
        self.left_child[self.virtual_root_index()]
    }

    /// Return the `[left, right)` coordinates of the tree.
    pub fn interval(&self) -> (Position, Position) {
        (self.left.into(), self.right.into())
    }

    /// Return the length of the genome for which this
    /// tree is the ancestry.
    pub fn span(&self) -> Position {
        let i = self.interval();
        i.1 - i.0
    }

    /// The index of the current tree along the sequence.
    pub fn current_tree(&self) -> i32 {
        self.index
    }

    pub fn flags(&self) -> TreeFlags {
        self.flags
    }

    fn node_index<N: Into<NodeId>>(&self, u: N) -> Option<usize> {
        let i = u.into().to_usize()?;
        if i < self.parent.len() {
            Some(i)
        } else {
            None
        }
    }

    /// Get the parent of node `u`.
    ///
    /// Returns `None` if `u` is out of range.
    pub fn parent<N: Into<NodeId> + Copy>(&self, u: N) -> Option<NodeId> {
        self.node_index(u).map(|i| self.parent[i])
    }

    /// Get the left child of node `u`.
    ///
    /// Returns `None` if `u` is out of range.
    pub fn left_child<N: Into<NodeId> + Copy>(&self, u: N) -> Option<NodeId> {
        self.node_index(u).map(|i| self.left_child[i])
    }

    /// Get the right child of node `u`.
    ///
    /// Returns `None` if `u` is out of range.
    pub fn right_child<N: Into<NodeId> + Copy>(&self, u: N) -> Option<NodeId> {
        self.node_index(u).map(|i| self.right_child[i])
    }

    /// Get the left sib of node `u`.
    ///
    /// Returns `None` if `u` is out of range.
    pub fn left_sib<N: Into<NodeId> + Copy>(&self, u: N) -> Option<NodeId> {
        self.node_index(u).map(|i| self.left_sib[i])
    }

    /// Get the right sib of node `u`.
    ///
    /// Returns `None` if `u` is out of range.
    pub fn right_sib<N: Into<NodeId> + Copy>(&self, u: N) -> Option<NodeId> {
        self.node_index(u).map(|i| self.right_sib[i])
    }

    pub fn parent_array(&self) -> &[NodeId] {
        &self.parent
    }

    pub fn left_child_array(&self) -> &[NodeId] {
        &self.left_child
    }

    pub fn right_child_array(&self) -> &[NodeId] {
        &self.right_child
    }

    pub fn left_sib_array(&self) -> &[NodeId] {
        &self.left_sib
    }

    pub fn right_sib_array(&self) -> &[NodeId] {
        &self.right_sib
    }

    /// Get the list of sample nodes.
    pub fn sample_nodes(&self) -> &[NodeId] {
        self.ts.sample_nodes()
    }

    pub fn is_sample<N: Into<NodeId> + Copy>(&self, u: N) -> bool {
        self.ts.is_sample(u.into())
    }

    /// Return an [`Iterator`] over the roots of the tree.
    ///
    /// # Note
    ///
    /// For a tree with multiple roots, the iteration starts
    /// at the left root.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        SibIter {
            tree: self,
            current: self.left_root(),
        }
    }

    /// Return all roots as a vector.
    pub fn roots_to_vec(&self) -> Vec<NodeId> {
        self.roots().collect()
    }

    pub fn num_roots(&self) -> usize {
        self.roots().count()
    }

    /// Return an [`Iterator`] over the children of node `u`.
    pub fn children<N: Into<NodeId> + Copy>(&self, u: N) -> impl Iterator<Item = NodeId> + '_ {
        SibIter {
            tree: self,
            current: self.left_child(u).unwrap_or(NodeId::NULL),
        }
    }

    /// Return an [`Iterator`] over the ancestors of node `u`, starting
    /// from its parent.
    pub fn parents<N: Into<NodeId> + Copy>(&self, u: N) -> impl Iterator<Item = NodeId> + '_ {
        AncestorIter {
            tree: self,
            current: self.parent(u).unwrap_or(NodeId::NULL),
        }
    }

    /// Get the number of samples below node `u`.
    ///
    /// # Errors
    ///
    /// * [`CoalseqError::NotTrackingSamples`] unless
    ///   [`TreeFlags::SAMPLE_COUNTS`] was set.
    pub fn num_samples<N: Into<NodeId> + Copy>(&self, u: N) -> Result<usize, CoalseqError> {
        if !self.flags.contains(TreeFlags::SAMPLE_COUNTS) {
            return Err(CoalseqError::NotTrackingSamples);
        }
        self.node_index(u)
            .map(|i| self.num_samples[i] as usize)
            .ok_or(CoalseqError::IndexError)
    }

    /// Get the number of tracked samples below node `u`.
    ///
    /// # Errors
    ///
    /// * [`CoalseqError::NotTrackingSamples`] unless
    ///   [`TreeFlags::SAMPLE_COUNTS`] was set.
    pub fn num_tracked_samples<N: Into<NodeId> + Copy>(
        &self,
        u: N,
    ) -> Result<usize, CoalseqError> {
        if !self.flags.contains(TreeFlags::SAMPLE_COUNTS) {
            return Err(CoalseqError::NotTrackingSamples);
        }
        self.node_index(u)
            .map(|i| self.num_tracked[i] as usize)
            .ok_or(CoalseqError::IndexError)
    }

    /// Designate a subset of samples whose per-node counts are reported by
    /// [`Tree::num_tracked_samples`]. Counts are seeded for the current
    /// tree and maintained across transitions.
    pub fn set_tracked_samples(&mut self, samples: &[NodeId]) -> Result<(), CoalseqError> {
        if !self.flags.contains(TreeFlags::SAMPLE_COUNTS) {
            return Err(CoalseqError::NotTrackingSamples);
        }
        for t in self.tracked.iter_mut() {
            *t = false;
        }
        for c in self.num_tracked.iter_mut() {
            *c = 0;
        }
        for s in samples {
            let i = s
                .to_usize()
                .filter(|i| *i < self.tracked.len())
                .ok_or(CoalseqError::NodeOutOfBounds)?;
            if !self.ts.is_sample(*s) {
                return Err(value_error!(s, "a sample node"));
            }
            if self.tracked[i] {
                return Err(value_error!(s, "each tracked sample at most once"));
            }
            self.tracked[i] = true;
            self.num_tracked[i] += 1;
            let mut u = self.parent[i];
            while !u.is_null() {
                self.num_tracked[u.as_usize()] += 1;
                u = self.parent[u.as_usize()];
            }
        }
        Ok(())
    }

    /// Return an [`Iterator`] over the samples below `u`.
    ///
    /// # Errors
    ///
    /// * [`CoalseqError::NotTrackingSamples`] unless
    ///   [`TreeFlags::SAMPLE_LISTS`] was set.
    pub fn samples<N: Into<NodeId> + Copy>(
        &self,
        u: N,
    ) -> Result<impl Iterator<Item = NodeId> + '_, CoalseqError> {
        if !self.flags.contains(TreeFlags::SAMPLE_LISTS) {
            return Err(CoalseqError::NotTrackingSamples);
        }
        let i = self.node_index(u).ok_or(CoalseqError::IndexError)?;
        Ok(SampleIter {
            tree: self,
            current: self.left_sample[i],
            last: self.right_sample[i],
            done: self.left_sample[i] == NULL_SAMPLE,
        })
    }

    /// The most recent common ancestor of `u` and `v` in this tree, or
    /// `None` when they sit under different roots.
    ///
    /// One path to the root is stamped with a fresh mark epoch; the walk
    /// from the other node stops at the first stamped ancestor.
    pub fn mrca<N: Into<NodeId> + Copy>(&self, u: N, v: N) -> Option<NodeId> {
        let ui = self.node_index(u)?;
        let vi = self.node_index(v)?;
        let n = self.virtual_root_index();
        if ui >= n || vi >= n {
            return None;
        }
        let mut marked = self.marked.borrow_mut();
        let mut mark = self.mark.get().wrapping_add(1);
        if mark == 0 {
            marked.fill(0);
            mark = 1;
        }
        self.mark.set(mark);
        let mut w = NodeId::try_from(ui).ok()?;
        while !w.is_null() {
            marked[w.as_usize()] = mark;
            w = self.parent[w.as_usize()];
        }
        let mut w = NodeId::try_from(vi).ok()?;
        while !w.is_null() {
            if marked[w.as_usize()] == mark {
                return Some(w);
            }
            w = self.parent[w.as_usize()];
        }
        None
    }

    /// Calculate the total length of the branches of the tree.
    ///
    /// # Parameters
    ///
    /// * `by_span`: if `true`, multiply the return value by [`Tree::span`].
    pub fn total_branch_length(&self, by_span: bool) -> Result<Time, CoalseqError> {
        let time = self.ts.nodes().time_slice();
        let mut total = 0.0;
        for u in 0..self.virtual_root_index() {
            let p = self.parent[u];
            if !p.is_null() {
                total += f64::from(time[p.as_usize()]) - f64::from(time[u]);
            }
        }
        if by_span {
            total *= f64::from(self.span());
        }
        Ok(Time::from(total))
    }

    fn reset_topology(&mut self) {
        self.parent.fill(NodeId::NULL);
        self.left_child.fill(NodeId::NULL);
        self.right_child.fill(NodeId::NULL);
        self.left_sib.fill(NodeId::NULL);
        self.right_sib.fill(NodeId::NULL);
        self.num_samples.fill(0);
        self.num_tracked.fill(0);
        self.left_sample.fill(NULL_SAMPLE);
        self.right_sample.fill(NULL_SAMPLE);
        self.next_sample.fill(NULL_SAMPLE);
        let vr = self.virtual_root_index();
        let samples: Vec<NodeId> = self.ts.sample_nodes().to_vec();
        for (index, s) in samples.iter().enumerate() {
            let i = s.as_usize();
            self.num_samples[i] = 1;
            if self.tracked[i] {
                self.num_tracked[i] = 1;
            }
            self.left_sample[i] = index as i32;
            self.right_sample[i] = index as i32;
            self.insert_branch(vr, i);
        }
    }

    fn insert_branch(&mut self, p: usize, c: usize) {
        let rc = self.right_child[p];
        if rc.is_null() {
            self.left_child[p] = NodeId::from(c as i32);
            self.left_sib[c] = NodeId::NULL;
        } else {
            self.right_sib[rc.as_usize()] = NodeId::from(c as i32);
            self.left_sib[c] = rc;
        }
        self.right_sib[c] = NodeId::NULL;
        self.right_child[p] = NodeId::from(c as i32);
    }

    fn remove_branch(&mut self, p: usize, c: usize) {
        let ls = self.left_sib[c];
        let rs = self.right_sib[c];
        if ls.is_null() {
            self.left_child[p] = rs;
        } else {
            self.right_sib[ls.as_usize()] = rs;
        }
        if rs.is_null() {
            self.right_child[p] = ls;
        } else {
            self.left_sib[rs.as_usize()] = ls;
        }
        self.left_sib[c] = NodeId::NULL;
        self.right_sib[c] = NodeId::NULL;
    }

    fn insert_edge(&mut self, e: EdgeId) {
        let p = self.ts.edges().parent_slice()[e.as_usize()].as_usize();
        let c = self.ts.edges().child_slice()[e.as_usize()].as_usize();
        let vr = self.virtual_root_index();
        let nc = self.num_samples[c];
        let tc = self.num_tracked[c];
        if nc > 0 {
            self.remove_branch(vr, c);
        }
        self.insert_branch(p, c);
        self.parent[c] = NodeId::from(p as i32);
        if nc > 0 {
            let mut u = p;
            let top;
            loop {
                self.num_samples[u] += nc;
                self.num_tracked[u] += tc;
                let next = self.parent[u];
                if next.is_null() {
                    top = u;
                    break;
                }
                u = next.as_usize();
            }
            if self.num_samples[top] == nc {
                self.insert_branch(vr, top);
            }
            if self.flags.contains(TreeFlags::SAMPLE_LISTS) {
                self.update_sample_lists(p);
            }
        }
    }

    fn remove_edge(&mut self, e: EdgeId) {
        let p = self.ts.edges().parent_slice()[e.as_usize()].as_usize();
        let c = self.ts.edges().child_slice()[e.as_usize()].as_usize();
        let vr = self.virtual_root_index();
        self.remove_branch(p, c);
        self.parent[c] = NodeId::NULL;
        let nc = self.num_samples[c];
        let tc = self.num_tracked[c];
        if nc > 0 {
            let mut u = p;
            let top;
            loop {
                self.num_samples[u] -= nc;
                self.num_tracked[u] -= tc;
                let next = self.parent[u];
                if next.is_null() {
                    top = u;
                    break;
                }
                u = next.as_usize();
            }
            if self.num_samples[top] == 0 {
                self.remove_branch(vr, top);
            }
            self.insert_branch(vr, c);
            if self.flags.contains(TreeFlags::SAMPLE_LISTS) {
                self.update_sample_lists(p);
            }
        }
    }

    /// Rebuild the sample lists along the path from `node` to its root by
    /// concatenating the children's lists.
    fn update_sample_lists(&mut self, node: usize) {
        let mut u = NodeId::from(node as i32);
        while !u.is_null() {
            let i = u.as_usize();
            let sample_index = self.ts.sample_index_map[i];
            if sample_index != NULL_SAMPLE {
                self.left_sample[i] = sample_index;
                self.right_sample[i] = sample_index;
            } else {
                self.left_sample[i] = NULL_SAMPLE;
                self.right_sample[i] = NULL_SAMPLE;
            }
            let mut v = self.left_child[i];
            while !v.is_null() {
                let vi = v.as_usize();
                if self.left_sample[vi] != NULL_SAMPLE {
                    if self.left_sample[i] == NULL_SAMPLE {
                        self.left_sample[i] = self.left_sample[vi];
                        self.right_sample[i] = self.right_sample[vi];
                    } else {
                        self.next_sample[self.right_sample[i] as usize] = self.left_sample[vi];
                        self.right_sample[i] = self.right_sample[vi];
                    }
                }
                v = self.right_sib[vi];
            }
            u = self.parent[i];
        }
    }

    /// One tree transition in `direction`, consuming the edges whose
    /// endpoint equals the shared boundary. Cursor offsets flip by one
    /// step when the direction of travel changes.
    fn advance(&mut self, direction: i32) {
        if self.direction != 0 && direction != self.direction {
            self.left_index += direction as isize;
            self.right_index += direction as isize;
        }
        self.direction = direction;
        let ts = self.ts;
        let m = ts.edges().num_rows() as isize;
        let insertion = &ts.insertion_order;
        let removal = &ts.removal_order;
        let edge_left = |e: EdgeId| f64::from(ts.edges().left_slice()[e.as_usize()]);
        let edge_right = |e: EdgeId| f64::from(ts.edges().right_slice()[e.as_usize()]);
        if direction == FORWARD {
            let x = self.right;
            let mut j = self.right_index;
            while j < m && edge_right(removal[j as usize]) == x {
                self.remove_edge(removal[j as usize]);
                j += 1;
            }
            let mut k = self.left_index;
            while k < m && edge_left(insertion[k as usize]) == x {
                self.insert_edge(insertion[k as usize]);
                k += 1;
            }
            self.right_index = j;
            self.left_index = k;
            self.left = x;
            let mut r = f64::from(ts.sequence_length());
            if k < m {
                r = r.min(edge_left(insertion[k as usize]));
            }
            if j < m {
                r = r.min(edge_right(removal[j as usize]));
            }
            self.right = r;
            self.index += 1;
        } else {
            let x = self.left;
            let mut j = self.left_index;
            while j >= 0 && edge_left(insertion[j as usize]) == x {
                self.remove_edge(insertion[j as usize]);
                j -= 1;
            }
            let mut k = self.right_index;
            while k >= 0 && edge_right(removal[k as usize]) == x {
                self.insert_edge(removal[k as usize]);
                k -= 1;
            }
            self.left_index = j;
            self.right_index = k;
            self.right = x;
            let mut l = 0.0f64;
            if j >= 0 {
                l = l.max(edge_left(insertion[j as usize]));
            }
            if k >= 0 {
                l = l.max(edge_right(removal[k as usize]));
            }
            self.left = l;
            self.index -= 1;
        }
    }

    fn first(&mut self) {
        self.reset_topology();
        self.direction = FORWARD;
        self.left_index = 0;
        self.right_index = 0;
        self.index = -1;
        self.left = 0.0;
        self.right = 0.0;
        self.advance(FORWARD);
    }

    fn last(&mut self) {
        self.reset_topology();
        let m = self.ts.edges().num_rows() as isize;
        self.direction = REVERSE;
        self.left_index = m - 1;
        self.right_index = m - 1;
        self.index = self.ts.num_trees() as i32;
        self.left = f64::from(self.ts.sequence_length());
        self.right = f64::from(self.ts.sequence_length());
        self.advance(REVERSE);
    }
}

struct SibIter<'a, 'ts> {
    tree: &'a Tree<'ts>,
    current: NodeId,
}

impl Iterator for SibIter<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current.is_null() {
            return None;
        }
        let rv = self.current;
        self.current = self.tree.right_sib[rv.as_usize()];
        Some(rv)
    }
}

struct AncestorIter<'a, 'ts> {
    tree: &'a Tree<'ts>,
    current: NodeId,
}

impl Iterator for AncestorIter<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current.is_null() {
            return None;
        }
        let rv = self.current;
        self.current = self.tree.parent[rv.as_usize()];
        Some(rv)
    }
}

struct SampleIter<'a, 'ts> {
    tree: &'a Tree<'ts>,
    current: i32,
    last: i32,
    done: bool,
}

impl Iterator for SampleIter<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.done || self.current == NULL_SAMPLE {
            return None;
        }
        let rv = self.tree.ts.sample_nodes()[self.current as usize];
        if self.current == self.last {
            self.done = true;
        } else {
            self.current = self.tree.next_sample[self.current as usize];
        }
        Some(rv)
    }
}

impl<'ts> streaming_iterator::StreamingIterator for Tree<'ts> {
    type Item = Tree<'ts>;

    fn advance(&mut self) {
        if self.index == -1 {
            self.first();
            self.advanced = true;
        } else if (self.index as usize) < self.ts.num_trees() - 1 {
            Tree::advance(self, FORWARD);
            self.advanced = true;
        } else {
            self.advanced = false;
            self.index = -1;
            self.direction = 0;
        }
    }

    fn get(&self) -> Option<&Self::Item> {
        match self.advanced {
            true => Some(self),
            false => None,
        }
    }
}

impl streaming_iterator::DoubleEndedStreamingIterator for Tree<'_> {
    fn advance_back(&mut self) {
        if self.index == -1 {
            self.last();
            self.advanced = true;
        } else if self.index > 0 {
            Tree::advance(self, REVERSE);
            self.advanced = true;
        } else {
            self.advanced = false;
            self.index = -1;
            self.direction = 0;
        }
    }
}
