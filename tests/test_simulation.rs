#[path = "./test_fixtures.rs"]
mod test_fixtures;

use coalseq::*;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use test_fixtures::{population_samples, simulate_tables, unit_map};

fn check_edge_invariants(tables: &TableCollection) {
    let length = f64::from(tables.sequence_length());
    for edge in tables.edges().iter() {
        let (l, r) = (f64::from(edge.left), f64::from(edge.right));
        assert!(0.0 <= l && l < r && r <= length, "bad interval [{}, {})", l, r);
        let tp = f64::from(tables.nodes().time(edge.parent).unwrap());
        let tc = f64::from(tables.nodes().time(edge.child).unwrap());
        assert!(tp > tc, "parent time {} <= child time {}", tp, tc);
    }
}

fn check_samples_reach_roots(ts: &TreeSequence) {
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    while let Some(tree) = iter.next() {
        let roots = tree.roots_to_vec();
        assert!(!roots.is_empty());
        for s in ts.sample_nodes() {
            let top = tree.parents(*s).last().unwrap_or(*s);
            assert!(roots.contains(&top), "sample {} stranded", s);
        }
    }
}

fn check_tree_spans(ts: &TreeSequence) {
    let mut covered = 0.0;
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    let mut n = 0;
    while let Some(tree) = iter.next() {
        covered += f64::from(tree.span());
        n += 1;
    }
    assert_eq!(n, ts.num_trees());
    assert!((covered - f64::from(ts.sequence_length())).abs() < 1e-9);
}

#[test]
fn test_two_samples_one_locus() {
    // exactly one coalescence; a single full-span tree
    let tables = simulate_tables(&population_samples(&[2]), 1, 0.0, 101);
    assert_eq!(tables.nodes().num_rows(), 3);
    assert_eq!(tables.edges().num_rows(), 2);
    let root_time = f64::from(tables.nodes().time(2).unwrap());
    assert!(root_time > 0.0);
    for edge in tables.edges().iter() {
        assert_eq!(edge.parent, 2);
        assert_eq!(f64::from(edge.left), 0.0);
        assert_eq!(f64::from(edge.right), 1.0);
    }
    let ts = tables.tree_sequence().unwrap();
    assert_eq!(ts.num_trees(), 1);
    check_tree_spans(&ts);
}

#[test]
fn test_zero_recombination_yields_single_tree() {
    let tables = simulate_tables(&population_samples(&[5]), 64, 0.0, 202);
    check_edge_invariants(&tables);
    let ts = tables.tree_sequence().unwrap();
    assert_eq!(ts.num_trees(), 1);
    check_samples_reach_roots(&ts);
}

#[test]
fn test_recombining_run_invariants() {
    let mut saw_recombination = false;
    for seed in [11, 12, 13, 14, 15] {
        let samples = population_samples(&[4]);
        let rng = Pcg64::seed_from_u64(seed);
        let mut sim = Simulator::new(&samples, rng).unwrap();
        sim.set_num_loci(100).unwrap();
        sim.set_scaled_recombination_rate(0.1).unwrap();
        sim.initialise().unwrap();
        assert_eq!(
            sim.run(f64::INFINITY, u64::MAX).unwrap(),
            RunStatus::Coalesced
        );
        saw_recombination |= sim.num_recombination_events() > 0;
        // every distinct breakpoint is a recombination event that was
        // neither a repeat nor trapped in a gap
        assert_eq!(
            sim.num_breakpoints(),
            sim.num_recombination_events()
                - sim.num_multiple_recombination_events()
                - sim.num_trapped_recombination_events()
        );
        let mut tables = sim.tables(1.0, &unit_map(100)).unwrap();
        tables.full_sort().unwrap();
        tables.squash_edges();
        check_edge_invariants(&tables);
        let ts = tables.tree_sequence().unwrap();
        check_tree_spans(&ts);
        check_samples_reach_roots(&ts);
    }
    assert!(saw_recombination);
}

#[test]
fn test_child_ancestry_is_a_partition() {
    // the edges incident to a child never overlap
    let tables = simulate_tables(&population_samples(&[6]), 80, 0.3, 303);
    let mut by_child: std::collections::HashMap<NodeId, Vec<(f64, f64)>> =
        std::collections::HashMap::new();
    for edge in tables.edges().iter() {
        by_child
            .entry(edge.child)
            .or_default()
            .push((edge.left.into(), edge.right.into()));
    }
    for intervals in by_child.values_mut() {
        intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in intervals.windows(2) {
            assert!(w[0].1 <= w[1].0, "overlapping parent intervals");
        }
    }
}

#[test]
fn test_symmetric_migration_coalesces_and_records() {
    let samples = population_samples(&[1, 1]);
    let rng = Pcg64::seed_from_u64(404);
    let mut sim = Simulator::new(&samples, rng).unwrap();
    sim.set_num_populations(2).unwrap();
    sim.set_migration_matrix(&[0.0, 0.5, 0.5, 0.0]).unwrap();
    sim.set_store_migrations(true).unwrap();
    sim.initialise().unwrap();
    assert_eq!(
        sim.run(f64::INFINITY, u64::MAX).unwrap(),
        RunStatus::Coalesced
    );
    let total_events: usize = sim.num_migration_events().iter().sum();
    assert!(total_events > 0);
    assert_eq!(sim.num_migrations(), total_events);
    let map = unit_map(1);
    let tables = sim.tables(1.0, &map).unwrap();
    assert_eq!(tables.migrations().num_rows(), total_events);
    for m in tables.migrations().iter() {
        assert!(f64::from(m.time) > 0.0);
        assert_ne!(m.source, m.dest);
    }
}

#[test]
fn test_mass_migration_empties_source() {
    let samples = population_samples(&[1, 1]);
    let rng = Pcg64::seed_from_u64(505);
    let mut sim = Simulator::new(&samples, rng).unwrap();
    sim.set_num_populations(2).unwrap();
    sim.add_mass_migration(0.5, PopulationId::from(0), PopulationId::from(1), 1.0)
        .unwrap();
    sim.initialise().unwrap();
    let status = sim.run(0.6, u64::MAX).unwrap();
    assert_ne!(status, RunStatus::Stalled);
    assert_eq!(sim.num_ancestors_in(0).unwrap(), 0);
    if !sim.is_completed() {
        assert_eq!(
            sim.run(f64::INFINITY, u64::MAX).unwrap(),
            RunStatus::Coalesced
        );
    }
    // the lineages could only meet in population 1, after the event
    let map = unit_map(1);
    let tables = sim.tables(1.0, &map).unwrap();
    for node in tables.nodes().iter() {
        if !node.flags.is_sample() {
            assert_eq!(node.population, 1);
            assert!(f64::from(node.time) > 0.5);
        }
    }
}

#[test]
fn test_delayed_sampling_event() {
    let samples = vec![
        Sample::new(0, 0.0),
        Sample::new(0, 0.0),
        Sample::new(0, 1.5),
    ];
    let tables = simulate_tables(&samples, 1, 0.0, 606);
    assert_eq!(f64::from(tables.nodes().time(2).unwrap()), 1.5);
    check_edge_invariants(&tables);
    let ts = tables.tree_sequence().unwrap();
    check_samples_reach_roots(&ts);
}

#[test]
fn test_simple_bottleneck_merges_everyone() {
    let samples = population_samples(&[10]);
    let rng = Pcg64::seed_from_u64(707);
    let mut sim = Simulator::new(&samples, rng).unwrap();
    // a huge population so that no pair coalesces before the bottleneck
    sim.set_population_configuration(0, 1e9, 0.0).unwrap();
    sim.add_simple_bottleneck(0.5, PopulationId::from(0), 1.0)
        .unwrap();
    sim.initialise().unwrap();
    assert_eq!(
        sim.run(f64::INFINITY, u64::MAX).unwrap(),
        RunStatus::Coalesced
    );
    assert_eq!(sim.time(), 0.5);
    assert_eq!(sim.num_nodes(), 11);
    assert_eq!(sim.num_edges(), 10);
}

#[test]
fn test_instantaneous_bottleneck_strength_controls_merging() {
    let samples = population_samples(&[8]);
    let rng = Pcg64::seed_from_u64(808);
    let mut sim = Simulator::new(&samples, rng).unwrap();
    sim.set_population_configuration(0, 1e9, 0.0).unwrap();
    sim.add_instantaneous_bottleneck(0.25, PopulationId::from(0), 1e9)
        .unwrap();
    sim.initialise().unwrap();
    assert_eq!(
        sim.run(f64::INFINITY, u64::MAX).unwrap(),
        RunStatus::Coalesced
    );
    // an effectively infinite strength collapses everything at once
    assert_eq!(sim.time(), 0.25);
    assert_eq!(sim.num_nodes(), 9);
}

#[test]
fn test_population_growth_and_rate_changes_run() {
    let samples = population_samples(&[3, 3]);
    let rng = Pcg64::seed_from_u64(909);
    let mut sim = Simulator::new(&samples, rng).unwrap();
    sim.set_num_populations(2).unwrap();
    sim.set_population_configuration(0, 2.0, 0.1).unwrap();
    sim.set_population_configuration(1, 0.5, -0.05).unwrap();
    sim.set_migration_matrix(&[0.0, 0.2, 0.2, 0.0]).unwrap();
    sim.add_population_parameters_change(0.75, Some(PopulationId::from(0)), Some(1.0), Some(0.0))
        .unwrap();
    sim.add_migration_rate_change(1.0, None, 1.0).unwrap();
    sim.initialise().unwrap();
    assert_eq!(
        sim.run(f64::INFINITY, u64::MAX).unwrap(),
        RunStatus::Coalesced
    );
    let map = unit_map(1);
    let mut tables = sim.tables(1.0, &map).unwrap();
    tables.full_sort().unwrap();
    check_edge_invariants(&tables);
}

#[test]
fn test_smc_models_complete() {
    for model in [SimulationModel::Smc, SimulationModel::SmcPrime] {
        let samples = population_samples(&[4]);
        let rng = Pcg64::seed_from_u64(1010);
        let mut sim = Simulator::new(&samples, rng).unwrap();
        sim.set_num_loci(50).unwrap();
        sim.set_scaled_recombination_rate(0.5).unwrap();
        sim.set_simulation_model(model).unwrap();
        sim.initialise().unwrap();
        assert_eq!(
            sim.run(f64::INFINITY, u64::MAX).unwrap(),
            RunStatus::Coalesced
        );
        let mut tables = sim.tables(1.0, &unit_map(50)).unwrap();
        tables.full_sort().unwrap();
        tables.squash_edges();
        check_edge_invariants(&tables);
        let ts = tables.tree_sequence().unwrap();
        check_tree_spans(&ts);
        check_samples_reach_roots(&ts);
    }
}

#[test]
fn test_multiple_merger_models_complete() {
    let models = [
        SimulationModel::Beta {
            alpha: 1.5,
            truncation_point: 1.0,
        },
        SimulationModel::Dirac { psi: 0.5, c: 1.0 },
    ];
    for model in models {
        let samples = population_samples(&[6]);
        let rng = Pcg64::seed_from_u64(1111);
        let mut sim = Simulator::new(&samples, rng).unwrap();
        sim.set_simulation_model(model).unwrap();
        sim.initialise().unwrap();
        assert_eq!(
            sim.run(f64::INFINITY, u64::MAX).unwrap(),
            RunStatus::Coalesced
        );
        let mut tables = sim.tables(1.0, &unit_map(1)).unwrap();
        tables.full_sort().unwrap();
        tables.squash_edges();
        check_edge_invariants(&tables);
        let ts = tables.tree_sequence().unwrap();
        check_samples_reach_roots(&ts);
    }
}

#[test]
fn test_mutation_decoration_round_trips() {
    let mut tables = simulate_tables(&population_samples(&[4]), 40, 0.2, 1212);
    let mut rng = Pcg64::seed_from_u64(99);
    let generator = MutationGenerator::new(0.1).unwrap();
    let (mut sites, mut mutations) = (SiteTable::new(), MutationTable::new());
    generator
        .generate(
            &mut rng,
            tables.nodes(),
            tables.edges(),
            &mut sites,
            &mut mutations,
        )
        .unwrap();
    *tables.sites_mut() = sites;
    *tables.mutations_mut() = mutations;
    tables.check_integrity().unwrap();
    let num_sites = tables.sites().num_rows();
    let ts = tables.tree_sequence().unwrap();
    assert_eq!(ts.tables().sites().num_rows(), num_sites);
}

#[test]
fn test_run_in_time_slices_matches_snapshot_contract() {
    let samples = population_samples(&[8]);
    let rng = Pcg64::seed_from_u64(1313);
    let mut sim = Simulator::new(&samples, rng).unwrap();
    sim.set_num_loci(20).unwrap();
    sim.set_scaled_recombination_rate(0.2).unwrap();
    sim.initialise().unwrap();
    let mut bound = 0.05;
    loop {
        match sim.run(bound, u64::MAX).unwrap() {
            RunStatus::Coalesced => break,
            RunStatus::MaxTimeReached => {
                assert!(sim.time() <= bound);
                bound += 0.05;
            }
            other => panic!("unexpected status {:?}", other),
        }
    }
    assert!(sim.is_completed());
    let mut tables = sim.tables(1.0, &unit_map(20)).unwrap();
    tables.full_sort().unwrap();
    tables.squash_edges();
    check_edge_invariants(&tables);
    let ts = tables.tree_sequence().unwrap();
    check_tree_spans(&ts);
}
