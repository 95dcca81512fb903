#[path = "./test_fixtures.rs"]
mod test_fixtures;

use coalseq::*;
use test_fixtures::{population_samples, simulate_tables, simulate_treeseq, tmrca_at};

#[test]
fn test_simplify_with_all_samples_is_identity() {
    let tables = simulate_tables(&population_samples(&[4]), 50, 0.2, 21);
    let samples: Vec<NodeId> = (0..4).map(NodeId::from).collect();
    let mut simplified = tables.clone();
    let idmap = simplified
        .simplify(&samples, SimplificationOptions::default())
        .unwrap();
    for (i, mapped) in idmap.iter().enumerate().take(4) {
        assert_eq!(*mapped, NodeId::try_from(i).unwrap());
    }
    assert_eq!(simplified, tables);
}

#[test]
fn test_simplify_is_idempotent() {
    let tables = simulate_tables(&population_samples(&[6]), 60, 0.25, 22);
    let mut once = tables.clone();
    let subset: Vec<NodeId> = vec![0.into(), 2.into(), 5.into()];
    once.simplify(&subset, SimplificationOptions::default())
        .unwrap();
    let mut twice = once.clone();
    let all_again: Vec<NodeId> = (0..3).map(NodeId::from).collect();
    let idmap = twice
        .simplify(&all_again, SimplificationOptions::default())
        .unwrap();
    assert_eq!(twice, once);
    for (i, mapped) in idmap.iter().enumerate().take(3) {
        assert_eq!(*mapped, NodeId::try_from(i).unwrap());
    }
}

#[test]
fn test_simplify_preserves_pairwise_topology() {
    let ts = simulate_treeseq(&population_samples(&[4]), 40, 0.3, 23);
    let (a, b) = (NodeId::from(1), NodeId::from(3));
    let (simplified, idmap) = ts
        .simplify(&[a, b], SimplificationOptions::default())
        .unwrap();
    let (sa, sb) = (idmap[1], idmap[3]);
    assert!(!sa.is_null());
    assert!(!sb.is_null());
    let length = f64::from(ts.sequence_length());
    let mut x = 0.5;
    while x < length {
        let original = tmrca_at(&ts, a, b, x).unwrap();
        let reduced = tmrca_at(&simplified, sa, sb, x).unwrap();
        assert!(
            (original - reduced).abs() < 1e-9,
            "tmrca mismatch at {}: {} vs {}",
            x,
            original,
            reduced
        );
        x += 1.0;
    }
}

#[test]
fn test_simplify_drops_unreachable_ancestry() {
    let tables = simulate_tables(&population_samples(&[5]), 30, 0.2, 24);
    let mut simplified = tables.clone();
    let subset: Vec<NodeId> = vec![0.into(), 1.into()];
    let idmap = simplified
        .simplify(&subset, SimplificationOptions::default())
        .unwrap();
    assert!(simplified.nodes().num_rows() <= tables.nodes().num_rows());
    assert!(simplified.edges().num_rows() <= tables.edges().num_rows());
    // dropped samples do not appear in the output
    for (i, mapped) in idmap.iter().enumerate() {
        if i >= 2 && i < 5 {
            assert!(mapped.is_null());
        }
    }
    // the reduced node set is exactly the reachable ancestry
    let reachable: usize = idmap.iter().filter(|m| !m.is_null()).count();
    assert_eq!(reachable, simplified.nodes().num_rows());
}

fn two_tree_tables_with_sites() -> TableCollection {
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
    let s0 = tables.add_site(1.0, b"0").unwrap();
    let s1 = tables.add_site(2.0, b"0").unwrap();
    let s2 = tables.add_site(8.0, b"0").unwrap();
    tables.add_mutation(s0, 0, b"1").unwrap();
    tables.add_mutation(s1, 1, b"1").unwrap();
    tables.add_mutation(s2, 3, b"1").unwrap();
    tables
}

#[test]
fn test_simplify_remaps_mutations() {
    let mut tables = two_tree_tables_with_sites();
    let idmap = tables
        .simplify(&[NodeId::from(0), NodeId::from(1)], SimplificationOptions::default())
        .unwrap();
    assert_eq!(tables.sites().num_rows(), 3);
    assert_eq!(tables.mutations().num_rows(), 3);
    assert_eq!(tables.mutations().node(0).unwrap(), idmap[0]);
    assert_eq!(tables.mutations().node(1).unwrap(), idmap[1]);
    // the mutation over the right tree follows its internal node
    assert_eq!(tables.mutations().node(2).unwrap(), idmap[3]);
}

#[test]
fn test_simplify_filters_invariant_sites() {
    let mut tables = two_tree_tables_with_sites();
    // sample 1 is dropped, so its private mutation loses all ancestry;
    // the mutation above the unary node 3 slides down onto sample 0
    let idmap = tables
        .simplify(&[NodeId::from(0)], SimplificationOptions::FILTER_INVARIANT_SITES)
        .unwrap();
    assert_eq!(idmap[0], NodeId::from(0));
    assert_eq!(tables.nodes().num_rows(), 1);
    assert_eq!(tables.edges().num_rows(), 0);
    assert_eq!(tables.sites().num_rows(), 2);
    assert_eq!(tables.mutations().num_rows(), 2);
    assert_eq!(tables.mutations().node(0).unwrap(), NodeId::from(0));
    assert_eq!(tables.mutations().node(1).unwrap(), NodeId::from(0));
    assert_eq!(f64::from(tables.sites().position(0).unwrap()), 1.0);
    assert_eq!(f64::from(tables.sites().position(1).unwrap()), 8.0);
}

#[test]
fn test_simplify_keeps_invariant_sites_by_default() {
    let mut tables = two_tree_tables_with_sites();
    tables
        .simplify(&[NodeId::from(0)], SimplificationOptions::default())
        .unwrap();
    assert_eq!(tables.sites().num_rows(), 3);
    assert_eq!(tables.mutations().num_rows(), 2);
}

#[test]
fn test_simplify_rejects_bad_input_and_leaves_tables_alone() {
    let mut tables = TableCollection::new(10.).unwrap();
    tables
        .add_node(NodeFlags::new_sample(), 0.0, 0, b"")
        .unwrap();
    tables.add_node(0, 1.0, 0, b"").unwrap();
    tables.add_node(0, 2.0, 0, b"").unwrap();
    // unsorted: parent times decreasing
    tables.add_edge(0.0, 10.0, 2, 0).unwrap();
    tables.add_edge(0.0, 10.0, 1, 0).unwrap();
    let snapshot = tables.clone();
    let err = tables
        .simplify(&[NodeId::from(0)], SimplificationOptions::default())
        .unwrap_err();
    assert_eq!(err, CoalseqError::UnsortedTables);
    assert_eq!(tables, snapshot);

    let mut sorted = TableCollection::new(10.).unwrap();
    sorted
        .add_node(NodeFlags::new_sample(), 0.0, 0, b"")
        .unwrap();
    sorted.add_node(0, 1.0, 0, b"").unwrap();
    sorted.add_edge(0.0, 10.0, 1, 0).unwrap();
    let snapshot = sorted.clone();

    let err = sorted
        .simplify(&[NodeId::from(99)], SimplificationOptions::default())
        .unwrap_err();
    assert_eq!(err, CoalseqError::NodeOutOfBounds);
    assert_eq!(sorted, snapshot);

    let err = sorted
        .simplify(
            &[NodeId::from(0), NodeId::from(0)],
            SimplificationOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, CoalseqError::ValueError { .. }));
    assert_eq!(sorted, snapshot);
}
