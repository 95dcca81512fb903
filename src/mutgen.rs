//! Infinite-sites mutation generation over a simulated topology.

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::edge_table::EdgeTable;
use crate::mutation_table::MutationTable;
use crate::newtypes::NodeId;
use crate::node_table::NodeTable;
use crate::site_table::SiteTable;
use crate::CoalseqError;

/// Decorates a tree sequence with infinite-sites mutations.
///
/// For each edge, the mutation count is Poisson with mean
/// `rate * branch_length * span` and positions are uniform on the edge
/// interval. The resulting site table is sorted by position with the
/// binary ancestral state `"0"`; each site carries a single mutation with
/// derived state `"1"`. Duplicate positions (vanishingly rare with real
/// coordinates) are discarded to preserve the infinite-sites property.
pub struct MutationGenerator {
    rate: f64,
}

impl MutationGenerator {
    pub fn new(rate: f64) -> Result<Self, CoalseqError> {
        if !(rate >= 0.0 && rate.is_finite()) {
            return Err(value_error!(rate, "a finite mutation rate >= 0"));
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Append generated sites and mutations. The output tables are
    /// expected to be empty; positions are emitted sorted.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        nodes: &NodeTable,
        edges: &EdgeTable,
        sites: &mut SiteTable,
        mutations: &mut MutationTable,
    ) -> Result<(), CoalseqError> {
        let time = nodes.time_slice();
        let num_nodes = nodes.num_rows();
        let mut placed: Vec<(f64, NodeId)> = Vec::new();
        for edge in edges.iter() {
            let pi = edge
                .parent
                .to_usize()
                .filter(|i| *i < num_nodes)
                .ok_or(CoalseqError::NodeOutOfBounds)?;
            let ci = edge
                .child
                .to_usize()
                .filter(|i| *i < num_nodes)
                .ok_or(CoalseqError::NodeOutOfBounds)?;
            let branch_length = f64::from(time[pi]) - f64::from(time[ci]);
            let (left, right) = (f64::from(edge.left), f64::from(edge.right));
            if !(branch_length > 0.0) || !(right > left) {
                return Err(CoalseqError::IntegrityError(
                    "edge with non-positive branch length or span".to_string(),
                ));
            }
            let mu = self.rate * branch_length * (right - left);
            if mu == 0.0 {
                continue;
            }
            let poisson = Poisson::new(mu)
                .map_err(|_| value_error!(mu, "a valid Poisson mean"))?;
            let k = poisson.sample(rng) as u64;
            for _ in 0..k {
                placed.push((rng.gen_range(left..right), edge.child));
            }
        }
        placed.sort_by(|a, b| a.0.total_cmp(&b.0));
        placed.dedup_by(|a, b| a.0 == b.0);
        for (position, node) in placed {
            let site = sites.add_row(position, b"0")?;
            mutations.add_row(site, node, b"1")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::NodeFlags;
    use rand::SeedableRng;

    fn topology() -> (NodeTable, EdgeTable) {
        let mut nodes = NodeTable::new();
        nodes
            .add_row(NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        nodes
            .add_row(NodeFlags::new_sample(), 0.0, 0, b"")
            .unwrap();
        nodes.add_row(NodeFlags::default(), 2.0, 0, b"").unwrap();
        let mut edges = EdgeTable::new();
        edges.add_row(0.0, 100.0, 2, 0).unwrap();
        edges.add_row(0.0, 100.0, 2, 1).unwrap();
        (nodes, edges)
    }

    #[test]
    fn test_zero_rate_generates_nothing() {
        let (nodes, edges) = topology();
        let mut rng = rand_pcg::Pcg64::seed_from_u64(1);
        let mut sites = SiteTable::new();
        let mut mutations = MutationTable::new();
        MutationGenerator::new(0.0)
            .unwrap()
            .generate(&mut rng, &nodes, &edges, &mut sites, &mut mutations)
            .unwrap();
        assert_eq!(sites.num_rows(), 0);
        assert_eq!(mutations.num_rows(), 0);
    }

    #[test]
    fn test_sites_sorted_and_in_bounds() {
        let (nodes, edges) = topology();
        let mut rng = rand_pcg::Pcg64::seed_from_u64(7);
        let mut sites = SiteTable::new();
        let mut mutations = MutationTable::new();
        MutationGenerator::new(0.05)
            .unwrap()
            .generate(&mut rng, &nodes, &edges, &mut sites, &mut mutations)
            .unwrap();
        assert_eq!(sites.num_rows(), mutations.num_rows());
        let positions = sites.position_slice();
        for w in positions.windows(2) {
            assert!(w[0] < w[1]);
        }
        for p in positions {
            let p = f64::from(*p);
            assert!((0.0..100.0).contains(&p));
        }
        for m in mutations.iter() {
            assert!(m.node == 0 || m.node == 1);
            assert_eq!(m.derived_state, b"1");
        }
    }

    #[test]
    fn test_bad_rate_rejected() {
        assert!(MutationGenerator::new(-1.0).is_err());
        assert!(MutationGenerator::new(f64::NAN).is_err());
    }
}
