//! Tests for RootForest topology, lookup and removal

use std::f64::consts::PI;

use rootarch::domain::root::{LATERAL_ROOT_ACCESSION, PRIMARY_ROOT_ACCESSION};
use rootarch::domain::{DomainError, Insertion, NodeChain, RemovalPolicy, RootForest, RootIndex, RootKey};

const EPS: f64 = 1e-9;

fn vertical(x: f64, from: f64, to: f64) -> NodeChain {
    let step = (to - from) / 2.0;
    NodeChain::from_samples([(x, from, 1.0), (x, from + step, 1.0), (x, to, 1.0)])
}

fn horizontal(y: f64, from: f64, to: f64) -> NodeChain {
    NodeChain::from_samples([(from, y, 1.0), (to, y, 1.0)])
}

/// Primary `main` along x=0 from 0 to 10, laterals branching at y=5 and y=10.
fn branched() -> (RootForest, RootIndex, RootIndex, RootIndex) {
    let mut forest = RootForest::new(2.54);
    let main = forest.create_root("main", vertical(0.0, 0.0, 10.0), None).unwrap();
    let lat1 = forest.create_root("lat1", horizontal(5.0, 0.0, 4.0), None).unwrap();
    let lat2 = forest.create_root("lat2", horizontal(10.0, 0.0, 3.0), None).unwrap();
    forest.attach_child(main, lat1, None).unwrap();
    forest.attach_child(main, lat2, None).unwrap();
    (forest, main, lat1, lat2)
}

#[test]
fn given_new_roots_when_created_then_keys_are_sequential_and_ids_default_to_key() {
    let mut forest = RootForest::default();
    let a = forest.create_root("", NodeChain::new(), None).unwrap();
    let b = forest.create_root("b", NodeChain::new(), None).unwrap();

    assert_eq!(forest.get(a).unwrap().key(), RootKey(0));
    assert_eq!(forest.get(a).unwrap().id(), "0");
    assert_eq!(forest.get(b).unwrap().key(), RootKey(1));
    assert_eq!(forest.index_of(RootKey(1)), Some(b));
    assert_eq!(forest.nth(1).unwrap().id(), "b");
}

#[test]
fn given_taken_key_when_creating_then_duplicate_key_error() {
    let mut forest = RootForest::default();
    forest.create_root("a", NodeChain::new(), Some(RootKey(7))).unwrap();

    let err = forest.create_root("b", NodeChain::new(), Some(RootKey(7))).unwrap_err();

    assert_eq!(err, DomainError::DuplicateKey(RootKey(7)));
    assert_eq!(forest.len(), 1);
    // auto keys continue after explicit ones
    let c = forest.create_root("c", NodeChain::new(), None).unwrap();
    assert_eq!(forest.get(c).unwrap().key(), RootKey(8));
}

#[test]
fn given_lateral_when_attached_then_order_and_accession_follow_parent() {
    let (forest, main, lat1, _) = branched();

    let m = forest.get(main).unwrap();
    let l = forest.get(lat1).unwrap();
    assert_eq!(m.child_order(), 0);
    assert_eq!(m.po_accession, PRIMARY_ROOT_ACCESSION);
    assert_eq!(l.child_order(), 1);
    assert_eq!(l.po_accession, LATERAL_ROOT_ACCESSION);
    assert_eq!(l.parent(), Some(main));
    assert_eq!(m.child_count(), 2);
}

#[test]
fn given_lateral_without_insertion_when_attached_then_derived_from_geometry() {
    let (forest, _, lat1, lat2) = branched();

    let i = forest.get(lat1).unwrap().insertion().unwrap();
    assert!((i.distance_from_base - 5.0).abs() < EPS);
    assert!((i.angle - PI / 2.0).abs() < EPS);
    assert!((i.angle_degrees() - 90.0).abs() < EPS);

    // at the tip the incoming segment gives the parent's direction
    let tip = forest.get(lat2).unwrap().insertion().unwrap();
    assert!((tip.distance_from_base - 10.0).abs() < EPS);
    assert!((tip.angle - PI / 2.0).abs() < EPS);
}

#[test]
fn given_lateral_between_parent_nodes_when_attached_then_position_interpolated() {
    let mut forest = RootForest::new(2.54);
    let main = forest
        .create_root("main", NodeChain::from_samples([(0.0, 0.0, 1.0), (0.0, 10.0, 1.0)]), None)
        .unwrap();
    let near = forest.create_root("near", horizontal(2.0, 0.0, 3.0), None).unwrap();
    let far = forest.create_root("far", horizontal(4.0, 0.5, 3.0), None).unwrap();

    forest.attach_child(main, near, None).unwrap();
    forest.attach_child(main, far, None).unwrap();

    let near = forest.get(near).unwrap().insertion().unwrap();
    let far = forest.get(far).unwrap().insertion().unwrap();
    assert!((near.distance_from_base - 2.0).abs() < EPS);
    assert!((far.distance_from_base - 4.0).abs() < EPS);
    assert!((far.angle - PI / 2.0).abs() < EPS);
    assert_eq!(forest.first_child(main).map(|c| forest.get(c).unwrap().id().to_string()), Some("near".into()));
}

#[test]
fn given_key_at_upper_bound_when_creating_then_auto_keys_saturate() {
    let mut forest = RootForest::default();
    forest.create_root("max", NodeChain::new(), Some(RootKey(u32::MAX))).unwrap();

    let err = forest.create_root("next", NodeChain::new(), None).unwrap_err();

    assert_eq!(err, DomainError::DuplicateKey(RootKey(u32::MAX)));
    assert_eq!(forest.len(), 1);
}

#[test]
fn given_attached_pair_when_reversing_then_cycle_rejected_and_links_unchanged() {
    let (mut forest, main, lat1, _) = branched();

    let err = forest.attach_child(lat1, main, None).unwrap_err();

    assert!(matches!(err, DomainError::Cycle { .. }));
    assert_eq!(forest.get(main).unwrap().parent(), None);
    assert_eq!(forest.get(lat1).unwrap().parent(), Some(main));
    assert_eq!(forest.get(lat1).unwrap().child_count(), 0);
}

#[test]
fn given_grandchild_when_attaching_ancestor_below_then_cycle_rejected() {
    let (mut forest, main, lat1, _) = branched();
    let sub = forest.create_root("sub", horizontal(5.0, 2.0, 2.5), None).unwrap();
    forest.attach_child(lat1, sub, None).unwrap();

    assert_eq!(forest.get(sub).unwrap().child_order(), 2);
    assert!(matches!(
        forest.attach_child(sub, main, None),
        Err(DomainError::Cycle { .. })
    ));
    assert_eq!(forest.ancestors(sub).collect::<Vec<_>>(), vec![lat1, main]);
    assert_eq!(forest.get(main).unwrap().parent(), None);
    assert_eq!(forest.get(sub).unwrap().child_count(), 0);
    assert_eq!(forest.get(sub).unwrap().parent(), Some(lat1));
    assert_eq!(forest.get(main).unwrap().child_count(), 2);
}

#[test]
fn given_same_root_when_attaching_to_itself_then_rejected() {
    let (mut forest, main, _, _) = branched();
    assert_eq!(
        forest.attach_child(main, main, None),
        Err(DomainError::SelfAttachment(RootKey(0)))
    );
}

#[test]
fn given_child_with_parent_when_attached_elsewhere_then_reparented() {
    let (mut forest, main, lat1, lat2) = branched();
    let insertion = Insertion {
        distance_from_base: 1.0,
        angle: 0.5,
    };

    forest.attach_child(lat2, lat1, Some(insertion)).unwrap();

    assert_eq!(forest.get(main).unwrap().children(), &[lat2]);
    assert_eq!(forest.get(lat1).unwrap().parent(), Some(lat2));
    assert_eq!(forest.get(lat1).unwrap().insertion(), Some(insertion));
    assert_eq!(forest.get(lat1).unwrap().child_order(), 2);
}

#[test]
fn given_lateral_when_detached_then_becomes_primary() {
    let (mut forest, main, lat1, _) = branched();

    forest.detach(lat1).unwrap();

    let l = forest.get(lat1).unwrap();
    assert_eq!(l.parent(), None);
    assert_eq!(l.child_order(), 0);
    assert_eq!(l.insertion(), None);
    assert_eq!(l.po_accession, PRIMARY_ROOT_ACCESSION);
    assert_eq!(forest.get(main).unwrap().child_count(), 1);
    assert_eq!(forest.primaries().count(), 2);
}

#[test]
fn given_children_when_ordering_then_first_and_last_by_insertion_position() {
    let (forest, main, lat1, lat2) = branched();

    assert_eq!(forest.first_child(main), Some(lat1));
    assert_eq!(forest.last_child(main), Some(lat2));
    assert_eq!(forest.first_child(lat1), None);
}

#[test]
fn given_two_children_when_measuring_density_then_per_cm_of_branched_zone() {
    let (forest, main, lat1, _) = branched();

    // dpi 2.54: one pixel is one centimetre, branched zone is 5 cm
    assert!((forest.child_density(main) - 2.0 / 5.0).abs() < EPS);
    assert!((forest.inter_branch(main) - 5.0).abs() < EPS);
    assert_eq!(forest.child_density(lat1), 0.0);
    assert_eq!(forest.inter_branch(lat1), 0.0);
}

#[test]
fn given_single_root_when_finding_closest_then_none() {
    let mut forest = RootForest::default();
    let only = forest.create_root("only", vertical(0.0, 0.0, 4.0), None).unwrap();
    assert_eq!(forest.closest_root(only), None);
}

#[test]
fn given_two_candidates_when_finding_closest_then_nearest_node_wins() {
    let mut forest = RootForest::default();
    let target = forest.create_root("target", horizontal(0.0, 0.0, 1.0), None).unwrap();
    let far = forest.create_root("far", vertical(50.0, 0.0, 100.0), None).unwrap();
    // base far away, middle node 10 px from the target base
    let near = forest.create_root("near", vertical(10.0, -200.0, 200.0), None).unwrap();

    assert_eq!(forest.closest_root(target), Some(near));
    assert_ne!(forest.closest_root(target), Some(far));
}

#[test]
fn given_parent_when_removed_with_detach_then_children_survive_as_primaries() {
    let (mut forest, main, lat1, lat2) = branched();

    let removed = forest.remove_root(main, RemovalPolicy::Detach).unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(forest.len(), 2);
    assert!(forest.get(main).is_none());
    assert_eq!(forest.get(lat1).unwrap().parent(), None);
    assert_eq!(forest.get(lat2).unwrap().child_order(), 0);
    assert!(forest.by_key(RootKey(0)).is_none());
}

#[test]
fn given_parent_when_removed_with_cascade_then_subtree_gone() {
    let (mut forest, main, lat1, _) = branched();
    let other = forest.create_root("other", vertical(30.0, 0.0, 5.0), None).unwrap();

    let removed = forest.remove_root(main, RemovalPolicy::Cascade).unwrap();

    assert_eq!(removed.len(), 3);
    assert_eq!(removed.last().unwrap().id(), "main");
    assert_eq!(forest.len(), 1);
    assert!(forest.get(lat1).is_none());
    assert!(forest.get(other).is_some());
}

#[test]
fn given_stale_index_when_attaching_then_unknown_root() {
    let (mut forest, main, lat1, _) = branched();
    forest.remove_root(lat1, RemovalPolicy::Detach).unwrap();

    assert!(matches!(
        forest.attach_child(main, lat1, None),
        Err(DomainError::UnknownRoot(_))
    ));
}

#[test]
fn given_nested_laterals_when_traversing_then_pre_and_post_order() {
    let (mut forest, main, lat1, lat2) = branched();
    let sub = forest.create_root("sub", horizontal(5.0, 2.0, 2.5), None).unwrap();
    forest.attach_child(lat1, sub, None).unwrap();

    let pre: Vec<RootIndex> = forest.iter_subtree(main).map(|(i, _)| i).collect();
    let post: Vec<RootIndex> = forest.iter_postorder(main).map(|(i, _)| i).collect();

    assert_eq!(pre, vec![main, lat1, sub, lat2]);
    assert_eq!(post, vec![sub, lat1, lat2, main]);
    assert_eq!(forest.depth(), 3);
}

#[test]
fn given_new_dpi_when_set_then_every_root_follows() {
    let (mut forest, main, lat1, _) = branched();

    forest.set_dpi(254.0);

    assert!((forest.pixel_size() - 0.01).abs() < EPS);
    assert!((forest.get(main).unwrap().pixel_size() - 0.01).abs() < EPS);
    assert!((forest.get(lat1).unwrap().l_pos_pixels_to_cm(100.0) - 1.0).abs() < EPS);
}
