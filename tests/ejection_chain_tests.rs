//! Ejection-chain tests: an improvement reachable only through a chained
//! relocation that transits through an overloaded route.

use ils_cvrp::instance::{Instance, DEPOT};
use ils_cvrp::local_search::{build_operator, OperatorId, RandomizedVnd, BASE_OPERATORS};
use ils_cvrp::movegen::MoveGenerators;
use ils_cvrp::solution::Solution;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

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

fn build_route(instance: &Instance, solution: &mut Solution, customers: &[usize]) -> usize {
    let route = solution.build_one_customer_route(instance, customers[0]);
    for &customer in &customers[1..] {
        solution.insert_vertex_before(instance, route, DEPOT, customer);
    }
    route
}

fn full_movegen(instance: &Instance) -> MoveGenerators {
    let n = instance.vertices_num();
    let mut moves = MoveGenerators::new(instance, n - 1);
    let gamma = vec![1.0; n];
    let vertices: Vec<usize> = (0..n).collect();
    moves.set_active_percentage(&gamma, &vertices);
    moves
}

/// Vertex 2 (`a`) is stranded in a far-away route; bringing it home
/// overloads its target route, which only a second relocation can fix.
/// Every single move is either capacity-infeasible or worsening, so only
/// the ejection chain can unlock the improvement.
fn chain_only_instance() -> (Instance, Solution) {
    let instance = make_instance(
        &[
            (0.0, 0.0),    // depot
            (0.0, -5.0),   // 1: z, anchor of the stranded route
            (100.0, 0.0),  // 2: a, stranded far from home
            (100.0, 2.0),  // 3: b1
            (100.0, 4.0),  // 4: v, must make room for a
            (100.0, 12.0), // 5: c1, v's escape hatch
        ],
        &[0, 2, 6, 3, 5, 5],
        10,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut solution, &[1, 2]);
    build_route(&instance, &mut solution, &[3, 4]);
    build_route(&instance, &mut solution, &[5]);
    assert!(solution.is_feasible(&instance, false));
    (instance, solution)
}

#[test]
fn base_operators_are_stuck() {
    let (instance, mut solution) = chain_only_instance();
    let cost_before = solution.cost();

    let mut moves = full_movegen(&instance);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut base = RandomizedVnd::new(BASE_OPERATORS, instance.vertices_num(), 0.01, false);
    let improved = base.apply(&instance, &mut solution, &mut moves, &mut rng);

    assert!(!improved);
    assert!((solution.cost() - cost_before).abs() < 0.01);
}

#[test]
fn ejection_chain_relocates_through_the_overload() {
    let (instance, mut solution) = chain_only_instance();
    let cost_before = solution.cost();

    let mut moves = full_movegen(&instance);
    let mut chain = build_operator(OperatorId::EJCH, instance.vertices_num(), 0.01, false);
    let improved = chain.apply_rough_best_improvement(&instance, &mut solution, &mut moves);

    assert!(improved);
    assert!(solution.is_feasible(&instance, false));
    // The chain saves the ~190 detour of serving `a` from the stranded
    // route, minus the small cost of pushing `v` one route over.
    assert!(solution.cost() < cost_before - 180.0);

    // `a` now rides with its geographic cluster, `v` moved over to c1.
    assert_eq!(solution.route_index(2), solution.route_index(3));
    assert_eq!(solution.route_index(4), solution.route_index(5));
}
