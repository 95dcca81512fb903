use crate::edge_table::EdgeTable;
use crate::flags::{NodeFlags, SimplificationOptions};
use crate::migration_table::MigrationTable;
use crate::mutation_table::MutationTable;
use crate::newtypes::{EdgeId, MigrationId, MutationId, NodeId, Position, SiteId, Time};
use crate::node_table::NodeTable;
use crate::site_table::SiteTable;
use crate::CoalseqError;

/// A collection of the five tables that make up a tree sequence.
///
/// This is the canonical in-memory representation exchanged with callers:
/// the simulator emits into it, the simplifier rewrites it, and
/// [`TreeSequence`](crate::TreeSequence) consumes it.
///
/// # Examples
///
/// ```
/// let mut tables = coalseq::TableCollection::new(100.).unwrap();
/// assert_eq!(tables.sequence_length(), 100.);
///
/// // Adding edges:
///
/// let rv = tables.add_edge(0., 53., 1, 11).unwrap();
///
/// // Add node:
///
/// let rv = tables.add_node(0, 3.2, coalseq::PopulationId::NULL, b"").unwrap();
///
/// // Get immutable reference to edge table
/// let edges = tables.edges();
/// assert_eq!(edges.num_rows(), 1);
///
/// // Get immutable reference to node table
/// let nodes = tables.nodes();
/// assert_eq!(nodes.num_rows(), 1);
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct TableCollection {
    sequence_length: Position,
    nodes: NodeTable,
    edges: EdgeTable,
    migrations: MigrationTable,
    sites: SiteTable,
    mutations: MutationTable,
}

impl TableCollection {
    /// Create a new table collection with a sequence length.
    pub fn new<P: Into<Position>>(sequence_length: P) -> Result<Self, CoalseqError> {
        let sequence_length = sequence_length.into();
        if !(f64::from(sequence_length) > 0.0 && f64::from(sequence_length).is_finite()) {
            return Err(value_error!(sequence_length, "sequence_length > 0.0"));
        }
        Ok(Self {
            sequence_length,
            ..Default::default()
        })
    }

    /// Length of the sequence/"genome".
    pub fn sequence_length(&self) -> Position {
        self.sequence_length
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    pub fn migrations(&self) -> &MigrationTable {
        &self.migrations
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    pub fn mutations(&self) -> &MutationTable {
        &self.mutations
    }

    pub fn nodes_mut(&mut self) -> &mut NodeTable {
        &mut self.nodes
    }

    pub fn edges_mut(&mut self) -> &mut EdgeTable {
        &mut self.edges
    }

    pub fn migrations_mut(&mut self) -> &mut MigrationTable {
        &mut self.migrations
    }

    pub fn sites_mut(&mut self) -> &mut SiteTable {
        &mut self.sites
    }

    pub fn mutations_mut(&mut self) -> &mut MutationTable {
        &mut self.mutations
    }

    /// Add a row to the edge table
    pub fn add_edge<P: Into<Position>, N: Into<NodeId>>(
        &mut self,
        left: P,
        right: P,
        parent: N,
        child: N,
    ) -> Result<EdgeId, CoalseqError> {
        self.edges.add_row(left, right, parent, child)
    }

    /// Add a row to the node table
    pub fn add_node<F: Into<NodeFlags>, T: Into<Time>, I: Into<crate::PopulationId>>(
        &mut self,
        flags: F,
        time: T,
        population: I,
        name: &[u8],
    ) -> Result<NodeId, CoalseqError> {
        self.nodes.add_row(flags, time, population, name)
    }

    /// Add a row to the site table
    pub fn add_site<P: Into<Position>>(
        &mut self,
        position: P,
        ancestral_state: &[u8],
    ) -> Result<SiteId, CoalseqError> {
        self.sites.add_row(position, ancestral_state)
    }

    /// Add a row to the mutation table
    pub fn add_mutation<S: Into<SiteId>, N: Into<NodeId>>(
        &mut self,
        site: S,
        node: N,
        derived_state: &[u8],
    ) -> Result<MutationId, CoalseqError> {
        self.mutations.add_row(site, node, derived_state)
    }

    /// Add a row to the migration table
    #[allow(clippy::too_many_arguments)]
    pub fn add_migration<
        P: Into<Position>,
        N: Into<NodeId>,
        I: Into<crate::PopulationId>,
        T: Into<Time>,
    >(
        &mut self,
        left: P,
        right: P,
        node: N,
        source: I,
        dest: I,
        time: T,
    ) -> Result<MigrationId, CoalseqError> {
        self.migrations.add_row(left, right, node, source, dest, time)
    }

    /// Clear the contents of all tables.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.migrations.clear();
        self.sites.clear();
        self.mutations.clear();
    }

    /// Sort all tables into the canonical order:
    ///
    /// * edges by `(parent time, parent, child, left)`;
    /// * migrations by `time`;
    /// * sites by `position`, with mutations re-pointed and co-sorted so
    ///   that all mutations at a site stay contiguous in input order.
    ///
    /// Sorting is stable: a second call is a no-op and equal inputs
    /// produce byte-identical outputs irrespective of the input order.
    pub fn full_sort(&mut self) -> Result<(), CoalseqError> {
        self.sort_edges()?;
        self.sort_migrations()?;
        self.sort_sites_and_mutations()
    }

    fn sort_edges(&mut self) -> Result<(), CoalseqError> {
        let num_nodes = self.nodes.num_rows();
        for p in self.edges.parent_slice() {
            if p.to_usize().map_or(true, |i| i >= num_nodes) {
                return Err(CoalseqError::NodeOutOfBounds);
            }
        }
        for c in self.edges.child_slice() {
            if c.to_usize().map_or(true, |i| i >= num_nodes) {
                return Err(CoalseqError::NodeOutOfBounds);
            }
        }
        let time = self.nodes.time_slice();
        let left = self.edges.left_slice();
        let parent = self.edges.parent_slice();
        let child = self.edges.child_slice();
        let mut perm: Vec<usize> = (0..self.edges.num_rows()).collect();
        perm.sort_by(|&a, &b| {
            let ta = f64::from(time[parent[a].as_usize()]);
            let tb = f64::from(time[parent[b].as_usize()]);
            ta.total_cmp(&tb)
                .then_with(|| parent[a].cmp(&parent[b]))
                .then_with(|| child[a].cmp(&child[b]))
                .then_with(|| f64::from(left[a]).total_cmp(&f64::from(left[b])))
        });
        let new_left: Vec<Position> = perm.iter().map(|&i| left[i]).collect();
        let new_right: Vec<Position> = perm.iter().map(|&i| self.edges.right_slice()[i]).collect();
        let new_parent: Vec<NodeId> = perm.iter().map(|&i| parent[i]).collect();
        let new_child: Vec<NodeId> = perm.iter().map(|&i| child[i]).collect();
        self.edges
            .set_columns(&new_left, &new_right, &new_parent, &new_child)
    }

    fn sort_migrations(&mut self) -> Result<(), CoalseqError> {
        let rows: Vec<crate::MigrationTableRow> = self.migrations.iter().collect();
        let mut perm: Vec<usize> = (0..rows.len()).collect();
        perm.sort_by(|&a, &b| {
            f64::from(rows[a].time).total_cmp(&f64::from(rows[b].time))
        });
        let mut sorted = MigrationTable::new();
        for &i in &perm {
            let r = &rows[i];
            sorted.add_row(r.left, r.right, r.node, r.source, r.dest, r.time)?;
        }
        self.migrations = sorted;
        Ok(())
    }

    fn sort_sites_and_mutations(&mut self) -> Result<(), CoalseqError> {
        let site_rows: Vec<crate::SiteTableRow> = self.sites.iter().collect();
        let mut perm: Vec<usize> = (0..site_rows.len()).collect();
        perm.sort_by(|&a, &b| {
            f64::from(site_rows[a].position).total_cmp(&f64::from(site_rows[b].position))
        });
        let mut site_map: Vec<SiteId> = vec![SiteId::NULL; site_rows.len()];
        let mut sorted_sites = SiteTable::new();
        for &i in &perm {
            let new_id = sorted_sites.add_row(site_rows[i].position, &site_rows[i].ancestral_state)?;
            site_map[i] = new_id;
        }
        let mutation_rows: Vec<crate::MutationTableRow> = self.mutations.iter().collect();
        for m in &mutation_rows {
            if m.site.to_usize().map_or(true, |i| i >= site_rows.len()) {
                return Err(CoalseqError::IntegrityError(
                    "mutation references a missing site".to_string(),
                ));
            }
        }
        let mut mperm: Vec<usize> = (0..mutation_rows.len()).collect();
        mperm.sort_by_key(|&i| site_map[mutation_rows[i].site.as_usize()]);
        let mut sorted_mutations = MutationTable::new();
        for &i in &mperm {
            let m = &mutation_rows[i];
            sorted_mutations.add_row(
                site_map[m.site.as_usize()],
                m.node,
                &m.derived_state,
            )?;
        }
        self.sites = sorted_sites;
        self.mutations = sorted_mutations;
        Ok(())
    }

    /// Merge abutting same-`(parent, child)` edge records.
    /// See [`EdgeTable::squash`]; the edge table should be sorted first.
    pub fn squash_edges(&mut self) {
        self.edges.squash();
    }

    /// Verify that edges are in the canonical sorted order.
    pub(crate) fn check_edge_ordering(&self) -> Result<(), CoalseqError> {
        let time = self.nodes.time_slice();
        let num_nodes = self.nodes.num_rows();
        let left = self.edges.left_slice();
        let parent = self.edges.parent_slice();
        let child = self.edges.child_slice();
        for p in parent {
            if p.to_usize().map_or(true, |i| i >= num_nodes) {
                return Err(CoalseqError::NodeOutOfBounds);
            }
        }
        for w in 0..self.edges.num_rows().saturating_sub(1) {
            let (a, b) = (w, w + 1);
            let ta = f64::from(time[parent[a].as_usize()]);
            let tb = f64::from(time[parent[b].as_usize()]);
            let ord = ta
                .total_cmp(&tb)
                .then_with(|| parent[a].cmp(&parent[b]))
                .then_with(|| child[a].cmp(&child[b]))
                .then_with(|| f64::from(left[a]).total_cmp(&f64::from(left[b])));
            if ord == std::cmp::Ordering::Greater {
                return Err(CoalseqError::UnsortedTables);
            }
        }
        Ok(())
    }

    /// Validate internal consistency: id ranges, interval bounds, edge
    /// time ordering, and site position ordering. Corrupt input fails
    /// here before any downstream consumer runs.
    pub fn check_integrity(&self) -> Result<(), CoalseqError> {
        let num_nodes = self.nodes.num_rows();
        let length = f64::from(self.sequence_length);
        for t in self.nodes.time_slice() {
            let t = f64::from(*t);
            if !(t.is_finite() && t >= 0.0) {
                return Err(CoalseqError::IntegrityError(format!(
                    "node time {}",
                    t
                )));
            }
        }
        for row in self.edges.iter() {
            let (l, r) = (f64::from(row.left), f64::from(row.right));
            if !(l < r) || l < 0.0 || r > length {
                return Err(CoalseqError::IntegrityError(format!(
                    "edge interval [{}, {})",
                    l, r
                )));
            }
            let pi = row
                .parent
                .to_usize()
                .filter(|i| *i < num_nodes)
                .ok_or(CoalseqError::NodeOutOfBounds)?;
            let ci = row
                .child
                .to_usize()
                .filter(|i| *i < num_nodes)
                .ok_or(CoalseqError::NodeOutOfBounds)?;
            let tp = f64::from(self.nodes.time_slice()[pi]);
            let tc = f64::from(self.nodes.time_slice()[ci]);
            if !(tp > tc) {
                return Err(CoalseqError::IntegrityError(format!(
                    "edge with parent time {} <= child time {}",
                    tp, tc
                )));
            }
        }
        let mut last = f64::NEG_INFINITY;
        for p in self.sites.position_slice() {
            let p = f64::from(*p);
            if !(p >= 0.0 && p < length) {
                return Err(CoalseqError::IntegrityError(format!(
                    "site position {}",
                    p
                )));
            }
            if p <= last {
                return Err(CoalseqError::IntegrityError(
                    "site positions not strictly increasing".to_string(),
                ));
            }
            last = p;
        }
        let num_sites = self.sites.num_rows();
        for m in self.mutations.iter() {
            if m.site.to_usize().map_or(true, |i| i >= num_sites) {
                return Err(CoalseqError::IntegrityError(
                    "mutation references a missing site".to_string(),
                ));
            }
            if m.node.to_usize().map_or(true, |i| i >= num_nodes) {
                return Err(CoalseqError::NodeOutOfBounds);
            }
        }
        for m in self.migrations.iter() {
            if m.node.to_usize().map_or(true, |i| i >= num_nodes) {
                return Err(CoalseqError::NodeOutOfBounds);
            }
        }
        Ok(())
    }

    /// Simplify this table collection down to the ancestry of `samples`,
    /// remapping node ids.
    ///
    /// Returns the map from input node id to output node id, with
    /// [`NodeId::NULL`] marking nodes that were removed.
    ///
    /// # Errors
    ///
    /// [`CoalseqError::UnsortedTables`] if edges are not canonically
    /// sorted; [`CoalseqError::IntegrityError`] for corrupt input. The
    /// tables are unchanged on error.
    pub fn simplify(
        &mut self,
        samples: &[NodeId],
        options: SimplificationOptions,
    ) -> Result<Vec<NodeId>, CoalseqError> {
        crate::simplify::simplify_tables(self, samples, options)
    }

    /// Build a [`TreeSequence`](crate::TreeSequence) from this collection,
    /// consuming it. Tables must be canonically sorted.
    pub fn tree_sequence(self) -> Result<crate::TreeSequence, CoalseqError> {
        crate::TreeSequence::new(self)
    }

    /// Return ``true`` if ``self`` contains the same data as ``other``.
    pub fn equals(&self, other: &TableCollection) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_length() {
        let tables = TableCollection::new(1000.).unwrap();
        assert!((f64::from(tables.sequence_length()) - 1000.).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic]
    fn test_zero_sequence_length() {
        let _ = TableCollection::new(0.).unwrap();
    }

    #[test]
    #[should_panic]
    fn test_negative_sequence_length() {
        let _ = TableCollection::new(-1.).unwrap();
    }

    fn two_record_tables() -> TableCollection {
        let mut tables = TableCollection::new(10.).unwrap();
        tables
            .add_node(crate::NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_edge(5.0, 10.0, 1, 0).unwrap();
        tables.add_edge(0.0, 5.0, 1, 0).unwrap();
        tables
    }

    #[test]
    fn test_sort_then_squash_merges_abutting_records() {
        let mut tables = two_record_tables();
        assert!(tables.check_edge_ordering().is_err());
        tables.full_sort().unwrap();
        tables.check_edge_ordering().unwrap();
        tables.squash_edges();
        assert_eq!(tables.edges().num_rows(), 1);
        assert_eq!(tables.edges().left(0).unwrap(), 0.0);
        assert_eq!(tables.edges().right(0).unwrap(), 10.0);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut tables = two_record_tables();
        tables.full_sort().unwrap();
        let first = tables.clone();
        tables.full_sort().unwrap();
        assert_eq!(tables, first);
    }

    #[test]
    fn test_sort_sites_carries_mutations() {
        let mut tables = TableCollection::new(10.).unwrap();
        tables
            .add_node(crate::NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        let s0 = tables.add_site(7.5, b"0").unwrap();
        let s1 = tables.add_site(2.5, b"0").unwrap();
        tables.add_mutation(s0, 0, b"1").unwrap();
        tables.add_mutation(s1, 0, b"1").unwrap();
        tables.full_sort().unwrap();
        assert_eq!(tables.sites().position(0).unwrap(), 2.5);
        assert_eq!(tables.sites().position(1).unwrap(), 7.5);
        assert_eq!(tables.mutations().site(0).unwrap(), SiteId::from(0));
        assert_eq!(tables.mutations().site(1).unwrap(), SiteId::from(1));
    }

    #[test]
    fn test_check_integrity_rejects_bad_intervals() {
        let mut tables = TableCollection::new(10.).unwrap();
        tables
            .add_node(crate::NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_edge(6.0, 5.0, 1, 0).unwrap();
        assert!(matches!(
            tables.check_integrity(),
            Err(CoalseqError::IntegrityError(_))
        ));
    }

    #[test]
    fn test_check_integrity_rejects_missing_nodes() {
        let mut tables = TableCollection::new(10.).unwrap();
        tables
            .add_node(crate::NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        tables.add_edge(0.0, 5.0, 7, 0).unwrap();
        assert_eq!(
            tables.check_integrity(),
            Err(CoalseqError::NodeOutOfBounds)
        );
    }
}
