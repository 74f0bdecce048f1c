//! Tests for NodeChain geometry and splicing

use rstest::rstest;

use rootarch::domain::node::MIN_DIAMETER;
use rootarch::domain::{NodeChain, Point};
use rootarch::util::testing;

const EPS: f64 = 1e-9;

fn straight_chain() -> NodeChain {
    NodeChain::from_samples([(0.0, 0.0, 2.0), (3.0, 4.0, 2.0), (3.0, 8.0, 2.0)])
}

#[test]
fn given_three_points_when_refreshing_then_cumulative_length_sums_segments() {
    testing::init_test_setup();
    let chain = straight_chain();

    let c: Vec<f64> = chain.iter().map(|n| n.c_length).collect();
    assert!((c[0] - 0.0).abs() < EPS);
    assert!((c[1] - 5.0).abs() < EPS);
    assert!((c[2] - 9.0).abs() < EPS);
    assert!((chain.total_length() - 9.0).abs() < EPS);
    assert!(chain.is_consistent());
}

#[test]
fn given_start_value_when_accumulating_then_offsets_every_node() {
    let mut chain = straight_chain();

    chain.accumulate_length(2.5);

    let last = chain.last_node().unwrap();
    assert!((last.c_length - (2.5 + chain.total_length())).abs() < EPS);
    let lengths: Vec<f64> = chain.iter().map(|n| n.c_length).collect();
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
}

#[rstest]
#[case(0.0)]
#[case(-3.0)]
#[case(0.4)]
fn given_small_diameter_when_building_geometry_then_clamped(#[case] d: f64) {
    let chain = NodeChain::from_samples([(0.0, 0.0, d), (1.0, 0.0, d)]);
    assert!(chain.iter().all(|n| n.diameter >= MIN_DIAMETER));
}

#[test]
fn given_tip_node_when_built_then_has_no_direction_or_length() {
    let chain = straight_chain();
    let tip = chain.last_node().unwrap();
    assert_eq!(tip.theta, 0.0);
    assert_eq!(tip.length, 0.0);
}

#[test]
fn given_neighbor_when_inserting_after_then_spliced_between() {
    let mut chain = NodeChain::from_samples([(0.0, 0.0, 1.0), (0.0, 10.0, 1.0)]);
    let first = chain.first().unwrap();

    let mid = chain.create_node(0.0, 5.0, Some(1.0), Some(first), true);
    chain.refresh();

    let ys: Vec<f64> = chain.iter().map(|n| n.y).collect();
    assert_eq!(ys, vec![0.0, 5.0, 10.0]);
    assert_eq!(chain.get(first).unwrap().next(), Some(mid));
    assert!((chain.get(mid).unwrap().c_length - 5.0).abs() < EPS);
    assert!((chain.total_length() - 10.0).abs() < EPS);
}

#[test]
fn given_neighbor_when_inserting_before_first_then_becomes_base() {
    let mut chain = NodeChain::from_samples([(0.0, 0.0, 1.0), (0.0, 10.0, 1.0)]);
    let first = chain.first().unwrap();

    let base = chain.create_node(0.0, -5.0, None, Some(first), false);
    chain.refresh();

    assert_eq!(chain.first(), Some(base));
    assert_eq!(chain.len(), 3);
    assert!((chain.total_length() - 15.0).abs() < EPS);
}

#[test]
fn given_middle_node_when_removing_then_neighbours_relinked() {
    let mut chain = straight_chain();
    let mid = chain.indices().nth(1).unwrap();

    let removed = chain.remove(mid).unwrap();
    chain.refresh();

    assert_eq!(removed.x, 3.0);
    assert_eq!(chain.len(), 2);
    // (0,0) -> (3,8)
    assert!((chain.total_length() - 73f64.sqrt()).abs() < EPS);
    assert!(chain.remove(mid).is_none());
}

#[test]
fn given_base_node_when_removing_then_arc_length_restarts_at_new_base() {
    let mut chain = NodeChain::from_samples([(0.0, 0.0, 1.0), (0.0, 5.0, 1.0), (0.0, 9.0, 1.0)]);
    let base = chain.first().unwrap();

    chain.remove(base).unwrap();
    chain.refresh();

    let c: Vec<f64> = chain.iter().map(|n| n.c_length).collect();
    assert_eq!(c, vec![0.0, 4.0]);
    assert_eq!(chain.first_node().unwrap().y, 5.0);
    assert!((chain.total_length() - 4.0).abs() < EPS);
}

#[test]
fn given_offset_chain_when_removing_base_then_start_value_kept() {
    let mut chain = NodeChain::from_samples([(0.0, 0.0, 1.0), (0.0, 5.0, 1.0), (0.0, 9.0, 1.0)]);
    chain.accumulate_length(2.0);
    let base = chain.first().unwrap();

    chain.remove(base).unwrap();
    chain.refresh();

    assert_eq!(chain.first_node().unwrap().c_length, 2.0);
    assert!((chain.last_node().unwrap().c_length - 6.0).abs() < EPS);
}

#[test]
fn given_translated_node_when_refreshing_then_neighbours_follow() {
    let mut chain = NodeChain::from_samples([(0.0, 0.0, 1.0), (0.0, 4.0, 1.0), (0.0, 8.0, 1.0)]);
    let mid = chain.indices().nth(1).unwrap();

    chain.translate(mid, 3.0, 0.0);
    assert!(!chain.is_consistent());
    chain.refresh();

    assert!(chain.is_consistent());
    assert!((chain.total_length() - 10.0).abs() < EPS);
}

#[test]
fn given_two_nodes_when_measuring_distance_then_follows_chain_direction() {
    let chain = straight_chain();
    let idx: Vec<_> = chain.indices().collect();

    assert!((chain.distance_between(idx[0], idx[2]) - 9.0).abs() < EPS);
    assert_eq!(chain.distance_between(idx[2], idx[0]), 0.0);
    assert_eq!(chain.distance_between(idx[1], idx[1]), 0.0);
}

#[test]
fn given_point_when_searching_nearest_then_scans_every_node() {
    let chain = straight_chain();
    let (idx, d) = chain.nearest_to(&Point::new(3.5, 4.0)).unwrap();
    assert_eq!(chain.get(idx).unwrap().y, 4.0);
    assert!((d - 0.5).abs() < EPS);

    assert!(NodeChain::new().nearest_to(&Point::new(0.0, 0.0)).is_none());
}

#[test]
fn given_arc_length_when_locating_then_returns_last_node_not_beyond() {
    let chain = straight_chain();
    let idx = chain.node_at_length(6.0).unwrap();
    assert_eq!(chain.get(idx).unwrap().y, 4.0);
}

#[test]
fn given_source_node_when_copying_then_target_marked_stale() {
    let mut chain = straight_chain();
    let source = chain.first_node().unwrap().clone();
    let tip = chain.last().unwrap();

    chain.copy_into(tip, &source);

    let node = chain.get(tip).unwrap();
    assert_eq!((node.x, node.y), (0.0, 0.0));
    assert!(node.needs_refresh);
}
