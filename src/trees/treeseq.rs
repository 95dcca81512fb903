use crate::flags::{NodeFlags, SimplificationOptions, TreeFlags};
use crate::newtypes::{EdgeId, NodeId, Position};
use crate::table_collection::TableCollection;
use crate::CoalseqError;

use super::Tree;

/// A tree sequence.
///
/// Owns a validated, canonically-sorted [`TableCollection`] together with
/// the two edge index arrays driving tree transitions: insertion order
/// (ascending by left endpoint, then parent time) and removal order
/// (ascending by right endpoint, then descending parent time).
///
/// # Examples
///
/// ```
/// let mut tables = coalseq::TableCollection::new(1000.).unwrap();
/// tables.add_node(0, 1.0, coalseq::PopulationId::NULL, b"").unwrap();
/// tables.add_node(coalseq::NodeFlags::new_sample(), 0.0,
///     coalseq::PopulationId::NULL, b"").unwrap();
/// tables.add_node(coalseq::NodeFlags::new_sample(), 0.0,
///     coalseq::PopulationId::NULL, b"").unwrap();
/// tables.add_edge(0., 1000., 0, 1).unwrap();
/// tables.add_edge(0., 1000., 0, 2).unwrap();
///
/// // tables gets moved into our treeseq variable:
/// let treeseq = tables.tree_sequence().unwrap();
/// assert_eq!(treeseq.nodes().num_rows(), 3);
/// assert_eq!(treeseq.edges().num_rows(), 2);
/// assert_eq!(treeseq.num_trees(), 1);
/// ```
pub struct TreeSequence {
    pub(crate) tables: TableCollection,
    pub(crate) samples: Vec<NodeId>,
    /// node id -> index into `samples`, or -1
    pub(crate) sample_index_map: Vec<i32>,
    pub(crate) insertion_order: Vec<EdgeId>,
    pub(crate) removal_order: Vec<EdgeId>,
    num_trees: usize,
}

impl TreeSequence {
    /// Create a tree sequence from a [`TableCollection`].
    /// In general, [`TableCollection::tree_sequence`] may be preferred.
    /// The table collection is moved/consumed.
    ///
    /// # Errors
    ///
    /// * [`CoalseqError::UnsortedTables`] if the edges are not
    ///   canonically sorted.
    /// * [`CoalseqError::IntegrityError`] for corrupt tables.
    pub fn new(tables: TableCollection) -> Result<Self, CoalseqError> {
        tables.check_integrity()?;
        tables.check_edge_ordering()?;
        let mut samples = vec![];
        let mut sample_index_map = vec![-1i32; tables.nodes().num_rows()];
        for (i, flags) in tables.nodes().flags_slice().iter().enumerate() {
            if flags.contains(NodeFlags::IS_SAMPLE) {
                sample_index_map[i] = samples.len() as i32;
                samples.push(NodeId::try_from(i)?);
            }
        }
        let (insertion_order, removal_order) = build_indexes(&tables);
        let num_trees = count_trees(&tables);
        Ok(Self {
            tables,
            samples,
            sample_index_map,
            insertion_order,
            removal_order,
            num_trees,
        })
    }

    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    /// Obtain the underlying [`TableCollection`], consuming `self`.
    pub fn dump_tables(self) -> TableCollection {
        self.tables
    }

    pub fn nodes(&self) -> &crate::NodeTable {
        self.tables.nodes()
    }

    pub fn edges(&self) -> &crate::EdgeTable {
        self.tables.edges()
    }

    pub fn sequence_length(&self) -> Position {
        self.tables.sequence_length()
    }

    /// Get the list of sample nodes.
    pub fn sample_nodes(&self) -> &[NodeId] {
        &self.samples
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_sample<N: Into<NodeId> + Copy>(&self, u: N) -> bool {
        u.into()
            .to_usize()
            .map_or(false, |i| {
                self.sample_index_map.get(i).map_or(false, |s| *s >= 0)
            })
    }

    /// The number of distinct local trees along the sequence.
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    pub fn edge_insertion_order(&self) -> &[EdgeId] {
        &self.insertion_order
    }

    pub fn edge_removal_order(&self) -> &[EdgeId] {
        &self.removal_order
    }

    /// Create an iterator over trees.
    ///
    /// # Parameters
    ///
    /// * `flags` A [`TreeFlags`] bit field.
    ///
    /// # Examples
    ///
    /// ```
    /// // You must include streaming_iterator as a dependency
    /// // and import this type.
    /// use coalseq::StreamingIterator;
    /// // Import this to allow .next_back() for reverse
    /// // iteration over trees.
    /// use coalseq::DoubleEndedStreamingIterator;
    ///
    /// let mut tables = coalseq::TableCollection::new(1000.).unwrap();
    /// let tree_sequence = tables.tree_sequence().unwrap();
    /// let mut tree_iterator = tree_sequence.tree_iterator(coalseq::TreeFlags::default()).unwrap();
    /// while let Some(_tree) = tree_iterator.next() {
    /// }
    /// ```
    pub fn tree_iterator<F: Into<TreeFlags>>(&self, flags: F) -> Result<Tree<'_>, CoalseqError> {
        Tree::new(self, flags.into())
    }

    /// Iterate per-tree edge insertions and removals.
    pub fn edge_differences_iter(&self) -> crate::EdgeDifferencesIterator<'_> {
        crate::EdgeDifferencesIterator::new(self)
    }

    /// Simplify down to the history of `samples`, returning the new tree
    /// sequence and the input-to-output node id map.
    pub fn simplify(
        &self,
        samples: &[NodeId],
        options: SimplificationOptions,
    ) -> Result<(TreeSequence, Vec<NodeId>), CoalseqError> {
        let mut tables = self.tables.clone();
        let idmap = tables.simplify(samples, options)?;
        Ok((TreeSequence::new(tables)?, idmap))
    }
}

impl TryFrom<TableCollection> for TreeSequence {
    type Error = CoalseqError;

    fn try_from(value: TableCollection) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn build_indexes(tables: &TableCollection) -> (Vec<EdgeId>, Vec<EdgeId>) {
    let time = tables.nodes().time_slice();
    let left = tables.edges().left_slice();
    let right = tables.edges().right_slice();
    let parent = tables.edges().parent_slice();
    let child = tables.edges().child_slice();
    let mut insertion: Vec<EdgeId> = (0..tables.edges().num_rows() as i32)
        .map(EdgeId::from)
        .collect();
    let mut removal = insertion.clone();
    insertion.sort_by(|&a, &b| {
        let (a, b) = (a.as_usize(), b.as_usize());
        f64::from(left[a])
            .total_cmp(&f64::from(left[b]))
            .then_with(|| {
                f64::from(time[parent[a].as_usize()])
                    .total_cmp(&f64::from(time[parent[b].as_usize()]))
            })
            .then_with(|| parent[a].cmp(&parent[b]))
            .then_with(|| child[a].cmp(&child[b]))
    });
    removal.sort_by(|&a, &b| {
        let (a, b) = (a.as_usize(), b.as_usize());
        f64::from(right[a])
            .total_cmp(&f64::from(right[b]))
            .then_with(|| {
                f64::from(time[parent[b].as_usize()])
                    .total_cmp(&f64::from(time[parent[a].as_usize()]))
            })
            .then_with(|| parent[b].cmp(&parent[a]))
            .then_with(|| child[b].cmp(&child[a]))
    });
    (insertion, removal)
}

fn count_trees(tables: &TableCollection) -> usize {
    let length = f64::from(tables.sequence_length());
    let mut breakpoints: Vec<f64> = vec![0.0, length];
    for p in tables.edges().left_slice().iter().chain(tables.edges().right_slice()) {
        let p = f64::from(*p);
        if p > 0.0 && p < length {
            breakpoints.push(p);
        }
    }
    breakpoints.sort_by(f64::total_cmp);
    breakpoints.dedup();
    breakpoints.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tree_tables() -> TableCollection {
        let mut tables = TableCollection::new(10.).unwrap();
        // 0, 1 are samples; 2 covers [0, 5), 3 covers [5, 10)
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
        tables
    }

    #[test]
    fn test_samples_and_num_trees() {
        let ts = two_tree_tables().tree_sequence().unwrap();
        assert_eq!(ts.num_samples(), 2);
        assert_eq!(ts.sample_nodes(), &[NodeId::from(0), NodeId::from(1)]);
        assert!(ts.is_sample(1));
        assert!(!ts.is_sample(2));
        assert_eq!(ts.num_trees(), 2);
    }

    #[test]
    fn test_indexes_cover_all_edges() {
        let ts = two_tree_tables().tree_sequence().unwrap();
        assert_eq!(ts.edge_insertion_order().len(), 4);
        assert_eq!(ts.edge_removal_order().len(), 4);
        // insertion: lefts ascending
        let lefts: Vec<f64> = ts
            .edge_insertion_order()
            .iter()
            .map(|e| f64::from(ts.edges().left(*e).unwrap()))
            .collect();
        assert!(lefts.windows(2).all(|w| w[0] <= w[1]));
        // removal: rights ascending
        let rights: Vec<f64> = ts
            .edge_removal_order()
            .iter()
            .map(|e| f64::from(ts.edges().right(*e).unwrap()))
            .collect();
        assert!(rights.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_unsorted_tables_rejected() {
        let mut tables = TableCollection::new(10.).unwrap();
        tables
            .add_node(NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        // parent times out of order
        tables.add_edge(0.0, 10.0, 2, 0).unwrap();
        tables.add_edge(0.0, 10.0, 1, 0).unwrap();
        assert!(matches!(
            tables.tree_sequence(),
            Err(CoalseqError::UnsortedTables)
        ));
    }
}
