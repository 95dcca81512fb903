#[path = "./test_fixtures.rs"]
mod test_fixtures;

use coalseq::*;
use test_fixtures::{population_samples, simulate_treeseq};

fn recombining_treeseq() -> TreeSequence {
    simulate_treeseq(&population_samples(&[5]), 60, 0.4, 31)
}

#[test]
fn test_forward_iteration_partitions_the_sequence() {
    let ts = recombining_treeseq();
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    let mut expected_left = 0.0;
    let mut count = 0;
    while let Some(tree) = iter.next() {
        let (left, right) = tree.interval();
        assert_eq!(f64::from(left), expected_left);
        assert!(right > left);
        expected_left = right.into();
        count += 1;
    }
    assert_eq!(count, ts.num_trees());
    assert_eq!(expected_left, f64::from(ts.sequence_length()));
}

#[test]
fn test_reverse_iteration_matches_forward() {
    let ts = recombining_treeseq();
    let mut forward: Vec<(f64, f64, Vec<NodeId>)> = vec![];
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    while let Some(tree) = iter.next() {
        forward.push((
            tree.interval().0.into(),
            tree.interval().1.into(),
            tree.parent_array().to_vec(),
        ));
    }
    let mut backward: Vec<(f64, f64, Vec<NodeId>)> = vec![];
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    while let Some(tree) = iter.next_back() {
        backward.push((
            tree.interval().0.into(),
            tree.interval().1.into(),
            tree.parent_array().to_vec(),
        ));
    }
    backward.reverse();
    assert_eq!(forward.len(), backward.len());
    for (f, b) in forward.iter().zip(backward.iter()) {
        assert_eq!(f.0, b.0);
        assert_eq!(f.1, b.1);
        assert_eq!(f.2, b.2);
    }
}

#[test]
fn test_sample_counts_sum_over_roots() {
    let ts = recombining_treeseq();
    let n = ts.num_samples();
    let mut iter = ts.tree_iterator(TreeFlags::SAMPLE_COUNTS).unwrap();
    while let Some(tree) = iter.next() {
        let mut total = 0;
        for root in tree.roots() {
            total += tree.num_samples(root).unwrap();
        }
        assert_eq!(total, n);
        for s in ts.sample_nodes() {
            assert!(tree.num_samples(*s).unwrap() >= 1);
        }
    }
}

#[test]
fn test_sample_lists_agree_with_counts() {
    let ts = recombining_treeseq();
    let mut iter = ts
        .tree_iterator(TreeFlags::SAMPLE_COUNTS | TreeFlags::SAMPLE_LISTS)
        .unwrap();
    while let Some(tree) = iter.next() {
        for root in tree.roots() {
            let listed: Vec<NodeId> = tree.samples(root).unwrap().collect();
            assert_eq!(listed.len(), tree.num_samples(root).unwrap());
            for s in &listed {
                assert!(ts.is_sample(*s));
            }
        }
    }
}

#[test]
fn test_tracked_samples_propagate() {
    let ts = recombining_treeseq();
    let tracked: Vec<NodeId> = ts.sample_nodes()[..2].to_vec();
    let mut iter = ts.tree_iterator(TreeFlags::SAMPLE_COUNTS).unwrap();
    // position on the first tree, then mark
    let _ = iter.next();
    iter.set_tracked_samples(&tracked).unwrap();
    loop {
        let mut total = 0;
        for root in iter.roots() {
            total += iter.num_tracked_samples(root).unwrap();
        }
        assert_eq!(total, 2);
        if iter.next().is_none() {
            break;
        }
    }
}

#[test]
fn test_mrca_agrees_with_ancestor_sets() {
    let ts = recombining_treeseq();
    let (a, b) = (ts.sample_nodes()[0], ts.sample_nodes()[1]);
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    while let Some(tree) = iter.next() {
        // brute force: first common node on the two root paths
        let mut seen = std::collections::HashSet::new();
        seen.insert(a);
        for u in tree.parents(a) {
            seen.insert(u);
        }
        let mut expected = None;
        if seen.contains(&b) {
            expected = Some(b);
        } else {
            for v in tree.parents(b) {
                if seen.contains(&v) {
                    expected = Some(v);
                    break;
                }
            }
        }
        assert_eq!(tree.mrca(a, b), expected);
    }
}

#[test]
fn test_edge_differences_replay_tree_transitions() {
    let ts = recombining_treeseq();
    let num_nodes = ts.nodes().num_rows();
    let mut parent: Vec<NodeId> = vec![NodeId::NULL; num_nodes];
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    for diffs in ts.edge_differences_iter() {
        for removal in diffs.removals() {
            parent[removal.child.as_usize()] = NodeId::NULL;
        }
        for insertion in diffs.insertions() {
            parent[insertion.child.as_usize()] = insertion.parent;
        }
        let tree = iter.next().unwrap();
        assert_eq!(diffs.interval(), tree.interval());
        assert_eq!(&parent[..], &tree.parent_array()[..num_nodes]);
    }
    assert!(iter.next().is_none());
}

#[test]
fn test_tree_reiteration_after_exhaustion() {
    let ts = recombining_treeseq();
    let mut iter = ts.tree_iterator(TreeFlags::default()).unwrap();
    let mut first_pass = 0;
    while iter.next().is_some() {
        first_pass += 1;
    }
    let mut second_pass = 0;
    while iter.next().is_some() {
        second_pass += 1;
    }
    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass, ts.num_trees());
}
