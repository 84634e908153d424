//! Tests for the Clarke-Wright construction and the fleet lower bound.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ils_cvrp::instance::{Instance, DEPOT};
use ils_cvrp::savings::{clarke_and_wright, min_routes_estimate};
use ils_cvrp::solution::Solution;

fn make_instance(coords: &[(f64, f64)], demands: &[i64], capacity: i64) -> Instance {
    let xs = coords.iter().map(|c| c.0).collect();
    let ys = coords.iter().map(|c| c.1).collect();
    Instance::new(
        "test".to_string(),
        xs,
        ys,
        demands.to_vec(),
        capacity,
        None,
        0.0,
        coords.len(),
        false,
        None,
    )
    .expect("valid test instance")
}

#[test]
fn construction_beats_the_singleton_bound() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut coords = vec![(0.0, 0.0)];
    let mut demands = vec![0i64];
    for _ in 0..50 {
        coords.push((rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)));
        demands.push(rng.gen_range(1..=10));
    }
    let instance = make_instance(&coords, &demands, 30);

    let mut solution = Solution::new(&instance, instance.vertices_num());
    clarke_and_wright(&instance, &mut solution, 1.0, 100);

    assert!(solution.is_feasible(&instance, false));

    let singleton_bound: f64 = instance
        .customers()
        .map(|c| 2.0 * instance.cost(DEPOT, c))
        .sum();
    assert!(solution.cost() <= singleton_bound + 0.01);
}

#[test]
fn capacity_tight_line_merges_the_cheap_pair() {
    // Pairs fit exactly; merging 2 and 3 saves the most.
    let instance = make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)],
        &[0, 3, 3, 3],
        6,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    clarke_and_wright(&instance, &mut solution, 1.0, 100);

    assert!(solution.is_feasible(&instance, false));
    assert_eq!(solution.routes_num(), 2);
    assert!((solution.cost() - 8.0).abs() < 0.01);
}

#[test]
fn fleet_estimate_packs_demands() {
    let instance = make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)],
        &[0, 3, 3, 3],
        6,
    );
    assert_eq!(min_routes_estimate(&instance), 2);

    let tight = make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
        &[0, 6, 6],
        6,
    );
    assert_eq!(min_routes_estimate(&tight), 2);
}
