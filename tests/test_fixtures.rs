use coalseq::*;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// Run a single-population simulation to completion and return the
/// canonicalised tables. Physical coordinates equal genetic coordinates
/// (a unit-rate uniform map).
pub fn simulate_tables(
    samples: &[Sample],
    num_loci: u32,
    recombination_rate: f64,
    seed: u64,
) -> TableCollection {
    let rng = Pcg64::seed_from_u64(seed);
    let mut sim = Simulator::new(samples, rng).unwrap();
    sim.set_num_loci(num_loci).unwrap();
    sim.set_scaled_recombination_rate(recombination_rate)
        .unwrap();
    sim.initialise().unwrap();
    assert_eq!(
        sim.run(f64::INFINITY, u64::MAX).unwrap(),
        RunStatus::Coalesced
    );
    let map = unit_map(num_loci);
    let mut tables = sim.tables(1.0, &map).unwrap();
    tables.full_sort().unwrap();
    tables.squash_edges();
    tables
}

pub fn simulate_treeseq(
    samples: &[Sample],
    num_loci: u32,
    recombination_rate: f64,
    seed: u64,
) -> TreeSequence {
    simulate_tables(samples, num_loci, recombination_rate, seed)
        .tree_sequence()
        .unwrap()
}

/// A map under which physical positions coincide with locus indexes.
pub fn unit_map(num_loci: u32) -> RecombinationMap {
    RecombinationMap::uniform(num_loci, num_loci as f64, 1.0).unwrap()
}

pub fn population_samples(counts: &[usize]) -> Vec<Sample> {
    let mut samples = vec![];
    for (pop, n) in counts.iter().enumerate() {
        for _ in 0..*n {
            samples.push(Sample::new(pop as i32, 0.0));
        }
    }
    samples
}

/// The time of the most recent common ancestor of `a` and `b` in the
/// local tree covering `position`, or `None` when they do not share a
/// root there.
pub fn tmrca_at(ts: &TreeSequence, a: NodeId, b: NodeId, position: f64) -> Option<f64> {
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    while let Some(tree) = iter.next() {
        let (left, right) = tree.interval();
        if f64::from(left) <= position && position < f64::from(right) {
            return tree
                .mrca(a, b)
                .map(|m| f64::from(ts.nodes().time(m).unwrap()));
        }
    }
    None
}
