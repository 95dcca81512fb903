//! Simplification: rewrite a tree sequence to the minimal ancestry of a
//! designated sample subset.
//!
//! The algorithm is segment-based. Each input node owns an *ancestor map*,
//! a left-sorted list of `(left, right, output node)` segments recording
//! which output node represents that stretch of the input node's material.
//! Samples seed a full-span self segment; parents are then processed in
//! canonical edge order (ascending parent time), merging the restrictions
//! of their children's maps. Sub-intervals covered by a single lineage pass
//! through unchanged; overlaps allocate the parent's output node (at most
//! once) and emit edges.

use crate::edge_table::EdgeTable;
use crate::flags::{NodeFlags, SimplificationOptions};
use crate::mutation_table::MutationTable;
use crate::newtypes::{NodeId, Position};
use crate::node_table::NodeTable;
use crate::site_table::SiteTable;
use crate::table_collection::TableCollection;
use crate::CoalseqError;

#[derive(Clone, Copy, Debug)]
struct MappedSegment {
    left: f64,
    right: f64,
    node: NodeId,
}

/// A queue of mapped segments kept sorted by descending `left`, so that
/// popping from the back yields the leftmost segment.
#[derive(Default)]
struct SegmentQueue {
    segments: Vec<MappedSegment>,
}

impl SegmentQueue {
    fn clear(&mut self) {
        self.segments.clear();
    }

    fn push_unordered(&mut self, segment: MappedSegment) {
        self.segments.push(segment);
    }

    fn finalize(&mut self) {
        self.segments
            .sort_by(|a, b| b.left.total_cmp(&a.left));
    }

    fn pop(&mut self) -> Option<MappedSegment> {
        self.segments.pop()
    }

    fn peek(&self) -> Option<&MappedSegment> {
        self.segments.last()
    }

    fn enqueue(&mut self, segment: MappedSegment) {
        let idx = self
            .segments
            .partition_point(|s| s.left > segment.left);
        self.segments.insert(idx, segment);
    }

    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

struct Simplifier<'a> {
    tables: &'a mut TableCollection,
    options: SimplificationOptions,
    sequence_length: f64,
    is_sample: Vec<bool>,
    node_id_map: Vec<NodeId>,
    ancestry: Vec<Vec<MappedSegment>>,
    queue: SegmentQueue,
    overlaps: Vec<MappedSegment>,
    out_nodes: NodeTable,
    out_edges: Vec<(f64, f64, NodeId, NodeId)>,
}

pub(crate) fn simplify_tables(
    tables: &mut TableCollection,
    samples: &[NodeId],
    options: SimplificationOptions,
) -> Result<Vec<NodeId>, CoalseqError> {
    tables.check_integrity()?;
    tables.check_edge_ordering()?;
    if tables.migrations().num_rows() > 0 {
        return Err(CoalseqError::IntegrityError(
            "cannot simplify tables containing migrations".to_string(),
        ));
    }
    let num_nodes = tables.nodes().num_rows();
    let mut is_sample = vec![false; num_nodes];
    for s in samples {
        match s.to_usize() {
            Some(i) if i < num_nodes => {
                if is_sample[i] {
                    return Err(value_error!(s, "each sample at most once"));
                }
                is_sample[i] = true;
            }
            _ => return Err(CoalseqError::NodeOutOfBounds),
        }
    }
    let mut simplifier = Simplifier {
        sequence_length: f64::from(tables.sequence_length()),
        options,
        is_sample,
        node_id_map: vec![NodeId::NULL; num_nodes],
        ancestry: vec![Vec::new(); num_nodes],
        queue: SegmentQueue::default(),
        overlaps: Vec::new(),
        out_nodes: NodeTable::new(),
        out_edges: Vec::new(),
        tables,
    };
    simplifier.run(samples)
}

impl<'a> Simplifier<'a> {
    fn run(&mut self, samples: &[NodeId]) -> Result<Vec<NodeId>, CoalseqError> {
        for s in samples {
            self.insert_sample(*s)?;
        }
        let num_edges = self.tables.edges().num_rows();
        let mut start = 0;
        while start < num_edges {
            let parent = self.tables.edges().parent(
                crate::EdgeId::try_from(start)?,
            )?;
            let mut stop = start;
            while stop < num_edges
                && self.tables.edges().parent(crate::EdgeId::try_from(stop)?)? == parent
            {
                stop += 1;
            }
            self.process_parent(parent, start, stop)?;
            start = stop;
        }
        let (sites, mutations) = self.map_mutations()?;
        let edges = self.flush_edges()?;
        let map = std::mem::take(&mut self.node_id_map);
        *self.tables.nodes_mut() = std::mem::take(&mut self.out_nodes);
        *self.tables.edges_mut() = edges;
        *self.tables.sites_mut() = sites;
        *self.tables.mutations_mut() = mutations;
        Ok(map)
    }

    fn insert_sample(&mut self, sample: NodeId) -> Result<(), CoalseqError> {
        let row = self.tables.nodes().row(sample)?;
        let out = self.out_nodes.add_row(
            row.flags | NodeFlags::IS_SAMPLE,
            row.time,
            row.population,
            &row.name,
        )?;
        self.node_id_map[sample.as_usize()] = out;
        self.ancestry[sample.as_usize()].push(MappedSegment {
            left: 0.0,
            right: self.sequence_length,
            node: out,
        });
        Ok(())
    }

    /// Merge the ancestry restrictions of all of `parent`'s child edges
    /// (rows `start..stop` of the input edge table).
    fn process_parent(
        &mut self,
        parent: NodeId,
        start: usize,
        stop: usize,
    ) -> Result<(), CoalseqError> {
        self.queue.clear();
        for e in start..stop {
            let row = self.tables.edges().row(crate::EdgeId::try_from(e)?)?;
            let (el, er) = (f64::from(row.left), f64::from(row.right));
            for seg in &self.ancestry[row.child.as_usize()] {
                if seg.right > el && er > seg.left {
                    self.queue.push_unordered(MappedSegment {
                        left: seg.left.max(el),
                        right: seg.right.min(er),
                        node: seg.node,
                    });
                }
            }
        }
        let pi = parent.as_usize();
        let parent_is_sample = self.is_sample[pi];
        self.queue.finalize();
        if self.queue.is_empty() {
            return Ok(());
        }

        let mut output_node = self.node_id_map[pi];
        let mut merged: Vec<MappedSegment> = Vec::new();
        while let Some(first) = self.queue.peek().copied() {
            let l = first.left;
            let mut r = self.sequence_length;
            self.overlaps.clear();
            while matches!(self.queue.peek(), Some(s) if s.left == l) {
                match self.queue.pop() {
                    Some(x) => {
                        r = r.min(x.right);
                        self.overlaps.push(x);
                    }
                    None => break,
                }
            }
            if let Some(next) = self.queue.peek() {
                r = r.min(next.left);
            }
            // A sample parent is always retained, so even single coverage
            // attaches to it with an edge rather than passing through.
            if self.overlaps.len() == 1 && !parent_is_sample {
                let mut x = self.overlaps[0];
                let mut alpha = x;
                if let Some(next_left) = self.queue.peek().map(|s| s.left) {
                    if next_left < x.right {
                        alpha = MappedSegment {
                            left: x.left,
                            right: next_left,
                            node: x.node,
                        };
                        x.left = next_left;
                        self.queue.enqueue(x);
                    }
                }
                merged.push(alpha);
            } else {
                if output_node.is_null() {
                    let row = self.tables.nodes().row(parent)?;
                    output_node = self.out_nodes.add_row(
                        row.flags.difference(NodeFlags::IS_SAMPLE),
                        row.time,
                        row.population,
                        &row.name,
                    )?;
                    self.node_id_map[pi] = output_node;
                }
                for i in 0..self.overlaps.len() {
                    let mut o = self.overlaps[i];
                    self.out_edges.push((l, r, output_node, o.node));
                    if o.right > r {
                        o.left = r;
                        self.queue.enqueue(o);
                    }
                }
                merged.push(MappedSegment {
                    left: l,
                    right: r,
                    node: output_node,
                });
            }
        }
        // A sample keeps its full-span self mapping; merged pieces all
        // map to its own output node anyway.
        if !parent_is_sample {
            self.ancestry[pi] = merged;
        }
        Ok(())
    }

    /// Canonicalise the buffered output edges: sort by
    /// `(parent time, parent, child, left)` then squash.
    fn flush_edges(&mut self) -> Result<EdgeTable, CoalseqError> {
        let time = self.out_nodes.time_slice();
        self.out_edges.sort_by(|a, b| {
            let ta = f64::from(time[a.2.as_usize()]);
            let tb = f64::from(time[b.2.as_usize()]);
            ta.total_cmp(&tb)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
                .then_with(|| a.0.total_cmp(&b.0))
        });
        let mut edges = EdgeTable::new();
        for (l, r, p, c) in &self.out_edges {
            edges.add_row(*l, *r, *p, *c)?;
        }
        edges.squash();
        Ok(edges)
    }

    /// Retain, per site, the first mutation whose node still has ancestry
    /// under the restricted sample set.
    fn map_mutations(&mut self) -> Result<(SiteTable, MutationTable), CoalseqError> {
        let mut sites = SiteTable::new();
        let mut mutations = MutationTable::new();
        let num_sites = self.tables.sites().num_rows();
        let mut mutations_at_site: Vec<Vec<usize>> = vec![Vec::new(); num_sites];
        for (i, m) in self.tables.mutations().iter().enumerate() {
            mutations_at_site[m.site.as_usize()].push(i);
        }
        for s in 0..num_sites {
            let site = self.tables.sites().row(crate::SiteId::try_from(s)?)?;
            let position = f64::from(site.position);
            let mut mapped: Option<(NodeId, Vec<u8>)> = None;
            for &mi in &mutations_at_site[s] {
                let m = self
                    .tables
                    .mutations()
                    .row(crate::MutationId::try_from(mi)?)?;
                if let Some(node) = self.map_position(m.node, position) {
                    mapped = Some((node, m.derived_state));
                    break;
                }
            }
            match mapped {
                Some((node, derived_state)) => {
                    let sid = sites.add_row(site.position, &site.ancestral_state)?;
                    mutations.add_row(sid, node, &derived_state)?;
                }
                None => {
                    if !self
                        .options
                        .contains(SimplificationOptions::FILTER_INVARIANT_SITES)
                    {
                        sites.add_row(site.position, &site.ancestral_state)?;
                    }
                }
            }
        }
        Ok((sites, mutations))
    }

    /// The output node representing `node`'s material at `position`,
    /// if any.
    fn map_position(&self, node: NodeId, position: f64) -> Option<NodeId> {
        self.ancestry[node.as_usize()]
            .iter()
            .find(|seg| seg.left <= position && position < seg.right)
            .map(|seg| seg.node)
    }
}

// The real workout for this module is in tests/test_simplification.rs;
// these cover the queue helper.
#[cfg(test)]
mod tests {
    use super::*;

    fn seg(left: f64, right: f64) -> MappedSegment {
        MappedSegment {
            left,
            right,
            node: NodeId::from(0),
        }
    }

    #[test]
    fn test_queue_orders_by_left() {
        let mut q = SegmentQueue::default();
        q.push_unordered(seg(3.0, 4.0));
        q.push_unordered(seg(1.0, 5.0));
        q.push_unordered(seg(2.0, 8.0));
        q.finalize();
        assert_eq!(q.pop().unwrap().left, 1.0);
        assert_eq!(q.peek().unwrap().left, 2.0);
    }

    #[test]
    fn test_queue_enqueue_keeps_order() {
        let mut q = SegmentQueue::default();
        q.push_unordered(seg(5.0, 9.0));
        q.push_unordered(seg(1.0, 2.0));
        q.finalize();
        q.enqueue(seg(3.0, 4.0));
        q.enqueue(seg(0.5, 1.0));
        let mut lefts = vec![];
        while let Some(s) = q.pop() {
            lefts.push(s.left);
        }
        assert_eq!(lefts, vec![0.5, 1.0, 3.0, 5.0]);
    }
}
