use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use bhquad::{direct_force, direct_forces};
use bhquad::{BodyStore, Gravity, NVec2, Quadrant, Quadtree, Region, SimError};

/// Unit-ish test universe: the square [-1, 1] x [-1, 1]
fn unit_region() -> Region {
    Region::from_center(NVec2::zeros(), 2.0)
}

fn test_gravity() -> Gravity {
    Gravity { g: 1.0, eps: 1e-3 }
}

/// Store holding `bodies` as (x, y, mass), all at rest
fn store_with(bodies: &[(f64, f64, f64)], transient_factor: usize) -> BodyStore {
    let mut store = BodyStore::new(bodies.len(), transient_factor, test_gravity()).expect("valid store");
    for (i, &(x, y, m)) in bodies.iter().enumerate() {
        store.set(i, x, y, 0.0, 0.0, m);
    }
    store
}

/// Tree over every body of `store`
fn build_tree(store: &mut BodyStore, theta: f64) -> Result<Quadtree, SimError> {
    let mut tree = Quadtree::new(unit_region(), theta);
    for i in 0..store.persistent_capacity() {
        tree.insert(i, store)?;
    }
    Ok(tree)
}

fn tree_force(tree: &Quadtree, store: &BodyStore, body: usize) -> NVec2 {
    let mut force = store.lock_force(body);
    force.reset();
    tree.update_force(body, store, &mut force);
    force.value()
}

fn random_bodies(n: usize, seed: u64) -> Vec<(f64, f64, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (rng.gen_range(-0.99..0.99), rng.gen_range(-0.99..0.99), rng.gen_range(1.0..10.0)))
        .collect()
}

// ==================================================================================
// Region tests
// ==================================================================================

#[test]
fn region_contains_is_inclusive() {
    let r = unit_region();
    assert!(r.contains(0.0, 0.0));
    assert!(r.contains(-1.0, -1.0));
    assert!(r.contains(1.0, 1.0));
    assert!(!r.contains(1.0 + 1e-12, 0.0));
    assert!(!r.contains(f64::NAN, 0.0));
}

#[test]
fn quadrants_tile_the_parent() {
    let r = Region::from_center(NVec2::new(3.0, -2.0), 8.0);
    let total: f64 = Quadrant::ALL.iter().map(|&q| r.quadrant(q).area()).sum();
    assert_relative_eq!(total, r.area(), max_relative = 1e-12);

    for q in Quadrant::ALL {
        assert_relative_eq!(r.quadrant(q).size(), r.size() / 2.0);
    }
    assert_eq!(r.quadrant(Quadrant::NorthWest).min(), r.min());
    assert_eq!(r.quadrant(Quadrant::SouthEast).max(), r.max());
}

#[test]
fn random_points_fall_in_exactly_one_quadrant() {
    let r = unit_region();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..10_000 {
        let (x, y) = (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        let hits: Vec<Quadrant> = Quadrant::ALL
            .into_iter()
            .filter(|&q| r.contains_in_quadrant(q, x, y))
            .collect();
        assert_eq!(hits.len(), 1, "({x}, {y}) matched {hits:?}");
        assert_eq!(r.quadrant_of(x, y), Some(hits[0]));
        assert!(r.quadrant(hits[0]).contains(x, y));
    }
}

#[test]
fn dividing_lines_go_to_the_first_matching_quadrant() {
    let r = unit_region();
    assert_eq!(r.quadrant_of(0.0, 0.0), Some(Quadrant::NorthWest));
    assert_eq!(r.quadrant_of(0.0, -0.5), Some(Quadrant::NorthWest));
    assert_eq!(r.quadrant_of(0.5, 0.0), Some(Quadrant::NorthEast));
    assert_eq!(r.quadrant_of(0.0, 0.5), Some(Quadrant::SouthEast));
    assert_eq!(r.quadrant_of(-0.5, 0.0), Some(Quadrant::NorthWest));
    assert_eq!(r.quadrant_of(-0.5, 0.5), Some(Quadrant::SouthWest));
    assert_eq!(r.quadrant_of(2.0, 0.0), None);
}

// ==================================================================================
// Body store tests
// ==================================================================================

#[test]
fn merge_lands_on_the_weighted_centroid() {
    let mut store = store_with(&[(-0.5, 0.25, 3.0), (0.75, -0.5, 1.0)], 1);
    let m = store.merge(0, 1).expect("slot available");

    assert_eq!(m, 2, "first transient slot follows the persistent ones");
    assert_relative_eq!(store.mass(m), 4.0);

    let (a, b, c) = (store.position(0), store.position(1), store.position(m));
    assert_relative_eq!(c.x, (-0.5 * 3.0 + 0.75) / 4.0, max_relative = 1e-12);
    assert_relative_eq!(c.y, (0.25 * 3.0 - 0.5) / 4.0, max_relative = 1e-12);

    // on the segment a-b, a quarter of the way from a
    let ab = b - a;
    let ac = c - a;
    assert!((ab.x * ac.y - ab.y * ac.x).abs() < 1e-12, "centroid is off the segment");
    assert_relative_eq!(ac.norm() / ab.norm(), 0.25, max_relative = 1e-12);
    assert_eq!(store.velocity(m), NVec2::zeros());
    assert_eq!(store.force(m), NVec2::zeros());
}

#[test]
fn transient_slots_are_rewound_each_step() {
    let mut store = store_with(&[(0.0, 0.0, 1.0), (0.5, 0.5, 1.0)], 2);
    assert_eq!(store.transient_capacity(), 4);

    assert_eq!(store.allocate(0.0, 0.0, 0.0, 0.0, 1.0).unwrap(), 2);
    assert_eq!(store.merge(0, 1).unwrap(), 3);
    assert_eq!(store.transient_used(), 2);

    store.reset_transient();
    assert_eq!(store.transient_used(), 0);
    assert_eq!(store.allocate(0.0, 0.0, 0.0, 0.0, 1.0).unwrap(), 2);
}

#[test]
fn allocation_past_capacity_names_the_multiplier() {
    let mut store = store_with(&[(0.0, 0.0, 1.0)], 2);
    store.allocate(0.0, 0.0, 0.0, 0.0, 1.0).unwrap();
    store.allocate(0.0, 0.0, 0.0, 0.0, 1.0).unwrap();

    let err = store.allocate(0.0, 0.0, 0.0, 0.0, 1.0).unwrap_err();
    assert!(matches!(err, SimError::CapacityExceeded { capacity: 2, factor: 2 }), "{err:?}");
    assert!(err.to_string().contains("transient_factor"), "{err}");
}

#[test]
fn empty_store_is_rejected() {
    assert!(matches!(
        BodyStore::new(0, 15, test_gravity()),
        Err(SimError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        BodyStore::new(10, 0, test_gravity()),
        Err(SimError::InvalidConfiguration(_))
    ));
}

#[test]
fn oversized_store_is_an_error_not_a_panic() {
    // slot count fits in usize, byte size does not
    assert!(matches!(
        BodyStore::new(usize::MAX / 64, 15, test_gravity()),
        Err(SimError::InvalidConfiguration(_))
    ));
    // slot count itself overflows
    assert!(matches!(
        BodyStore::new(usize::MAX / 2, 15, test_gravity()),
        Err(SimError::InvalidConfiguration(_))
    ));
}

#[test]
fn gravity_points_toward_other_body() {
    let store = store_with(&[(-0.5, 0.0, 2.0), (0.5, 0.0, 3.0)], 1);
    let mut f = store.lock_force(0);
    store.accumulate_force(&mut f, 1);

    // F = G m1 m2 / (d^2 + eps^2)
    let expected = 2.0 * 3.0 / (1.0 + 1e-6);
    assert_relative_eq!(f.value().x, expected, max_relative = 1e-12);
    assert_eq!(f.value().y, 0.0);
}

#[test]
fn gravity_newton_third_law() {
    let store = store_with(&[(-0.3, 0.2, 2.0), (0.4, -0.1, 5.0)], 1);
    let net = store.pair_force(0, 1) + store.pair_force(1, 0);
    assert!(net.norm() < 1e-12, "Net force not zero: {net:?}");
}

#[test]
fn gravity_softening_prevents_blowup() {
    let store = store_with(&[(0.0, 0.0, 1.0), (1e-12, 0.0, 1.0), (0.0, 0.0, 1.0)], 1);

    // bounded by G m m / eps^2
    assert!(store.pair_force(0, 1).norm() <= 1.0001 / 1e-6);

    // coincident bodies have no direction: no force, and no NaN
    assert_eq!(store.pair_force(0, 2), NVec2::zeros());
}

#[test]
fn integrate_is_semi_implicit_euler() {
    let mut store = store_with(&[(0.0, 0.0, 2.0), (1.0, 0.0, 4.0)], 1);
    store.set(0, 0.0, 0.0, 0.5, -0.25, 2.0);
    {
        let mut f = store.lock_force(0);
        store.accumulate_force(&mut f, 1);
    }
    let force = store.force(0);
    let dt = 0.1;
    store.integrate(0, dt);

    let v = NVec2::new(0.5, -0.25) + force * (dt / 2.0);
    assert_relative_eq!(store.velocity(0).x, v.x, max_relative = 1e-12);
    assert_relative_eq!(store.velocity(0).y, v.y, max_relative = 1e-12);
    // position moves with the updated velocity
    assert_relative_eq!(store.position(0).x, v.x * dt, max_relative = 1e-12);
    assert_relative_eq!(store.position(0).y, v.y * dt, max_relative = 1e-12);
}

#[test]
fn force_resets() {
    let mut store = store_with(&[(0.0, 0.0, 1.0), (0.5, 0.0, 1.0), (0.0, 0.5, 1.0)], 1);
    for i in 0..3 {
        let mut f = store.lock_force(i);
        assert_eq!(f.index(), i);
        store.accumulate_force(&mut f, (i + 1) % 3);
    }
    assert!(store.force(0).norm() > 0.0);

    store.reset_force(0);
    assert_eq!(store.force(0), NVec2::zeros());
    assert!(store.force(1).norm() > 0.0);

    store.reset_forces_bulk(3);
    for i in 0..3 {
        assert_eq!(store.force(i), NVec2::zeros());
    }
}

#[test]
fn store_region_queries() {
    let r = unit_region();
    let store = store_with(&[(-0.5, -0.5, 1.0), (0.5, 0.5, 1.0), (3.0, 0.0, 1.0)], 1);

    assert!(store.in_region(0, &r));
    assert!(!store.in_region(2, &r));

    assert!(store.in_quadrant(0, &r, Quadrant::NorthWest));
    assert!(!store.in_quadrant(0, &r, Quadrant::SouthEast));
    assert_eq!(store.quadrant_of(1, &r), Some(Quadrant::SouthEast));
    assert_eq!(store.quadrant_of(2, &r), None);
    assert_relative_eq!(store.distance_squared(0, 1), 2.0, max_relative = 1e-12);
}

// ==================================================================================
// Quadtree tests
// ==================================================================================

#[test]
fn empty_tree_has_an_empty_root() {
    let tree = Quadtree::new(unit_region(), 2.0);
    assert_eq!(tree.root_body(), None);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.leaf_count(), 0);
}

#[test]
fn single_body_sits_in_the_root() {
    let mut store = store_with(&[(0.2, 0.3, 1.0)], 15);
    let tree = build_tree(&mut store, 2.0).unwrap();

    assert_eq!(tree.root_body(), Some(0));
    assert_eq!(tree.node_count(), 1);
    assert_eq!(store.transient_used(), 0);
}

#[test]
fn tree_holds_every_body_in_exactly_one_leaf() {
    let bodies = random_bodies(200, 11);
    let mut store = store_with(&bodies, 15);
    let tree = build_tree(&mut store, 2.0).unwrap();

    let mut leaves: Vec<usize> = tree.leaf_bodies().collect();
    leaves.sort_unstable();
    assert_eq!(leaves, (0..bodies.len()).collect::<Vec<_>>());

    let root = tree.root_body().expect("non-empty tree");
    assert!(root >= store.persistent_capacity(), "root of a populated tree is an aggregate");

    let total: f64 = bodies.iter().map(|b| b.2).sum();
    assert_relative_eq!(store.mass(root), total, max_relative = 1e-12);

    let com = bodies.iter().fold(NVec2::zeros(), |acc, b| acc + NVec2::new(b.0, b.1) * b.2) / total;
    assert_relative_eq!(store.position(root).x, com.x, epsilon = 1e-12, max_relative = 1e-9);
    assert_relative_eq!(store.position(root).y, com.y, epsilon = 1e-12, max_relative = 1e-9);
}

#[test]
fn clear_empties_the_tree() {
    let mut store = store_with(&random_bodies(20, 3), 15);
    let mut tree = build_tree(&mut store, 2.0).unwrap();
    assert!(tree.node_count() > 1);

    tree.clear();
    assert_eq!(tree.root_body(), None);
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn zero_theta_matches_direct_summation() {
    let bodies = [(-0.5, -0.4, 3.0), (0.6, -0.2, 1.0), (0.1, 0.7, 2.0), (-0.3, 0.5, 5.0)];
    let mut store = store_with(&bodies, 15);
    let tree = build_tree(&mut store, 0.0).unwrap();
    let worklist: Vec<usize> = (0..bodies.len()).collect();

    for i in 0..bodies.len() {
        let approx = tree_force(&tree, &store, i);
        let exact = direct_force(&store, i, &worklist);
        assert_relative_eq!(approx.norm(), exact.norm(), max_relative = 1e-6);
        assert_relative_eq!(approx.x, exact.x, epsilon = 1e-12, max_relative = 1e-6);
        assert_relative_eq!(approx.y, exact.y, epsilon = 1e-12, max_relative = 1e-6);
    }
}

#[test]
fn small_theta_stays_close_to_direct_summation() {
    let bodies = random_bodies(300, 5);
    let mut store = store_with(&bodies, 15);
    let tree = build_tree(&mut store, 0.3).unwrap();
    let worklist: Vec<usize> = (0..bodies.len()).collect();
    let exact = direct_forces(&store, &worklist);

    // errors are measured against the typical force so near-cancelling bodies
    // don't dominate
    let typical = exact.iter().map(|f| f.norm()).sum::<f64>() / exact.len() as f64;
    for (i, f) in exact.iter().enumerate() {
        let approx = tree_force(&tree, &store, i);
        let err = (approx - f).norm() / typical;
        assert!(err < 0.05, "body {i}: error {err} of the mean force");
    }
}

#[test]
fn close_pair_needs_more_aggregates() {
    let bodies = [(-0.9, -0.9, 1.0), (-0.8, -0.8, 1.0), (0.5, 0.5, 1.0)];

    // the close pair splits four levels deep: four aggregates before the third body
    let mut tight = store_with(&bodies, 1);
    let err = build_tree(&mut tight, 2.0).err().expect("3 slots are not enough");
    assert!(matches!(err, SimError::CapacityExceeded { capacity: 3, factor: 1 }), "{err:?}");

    let mut roomy = store_with(&bodies, 2);
    let tree = build_tree(&mut roomy, 2.0).expect("6 slots are enough");
    assert_eq!(roomy.transient_used(), 5);
    assert_eq!(tree.leaf_count(), 3);
}

#[test]
fn coincident_bodies_exhaust_capacity_instead_of_looping() {
    let mut store = store_with(&[(0.25, 0.25, 1.0), (0.25, 0.25, 2.0)], 15);
    let err = build_tree(&mut store, 2.0).err().expect("coincident bodies cannot be separated");
    assert!(matches!(err, SimError::CapacityExceeded { .. }), "{err:?}");
}
