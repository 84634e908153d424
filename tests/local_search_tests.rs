//! Operator-level tests: single neighborhoods on crafted instances, the
//! boundary behaviors, and an invariant sweep over random descents.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ils_cvrp::instance::{Instance, DEPOT};
use ils_cvrp::local_search::{
    build_operator, OperatorId, RandomizedVnd, VndComposer, BASE_OPERATORS,
};
use ils_cvrp::movegen::MoveGenerators;
use ils_cvrp::savings::clarke_and_wright;
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

#[test]
fn relocate_merges_capacity_tight_routes() {
    // Three customers on a line with pair loads exactly at capacity: the
    // cheaper pairing serves 2 and 3 together.
    let instance = make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)],
        &[0, 3, 3, 3],
        6,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut solution, &[1, 2]);
    build_route(&instance, &mut solution, &[3]);
    assert!((solution.cost() - 10.0).abs() < 0.01);

    let mut moves = full_movegen(&instance);
    let mut relocate = build_operator(OperatorId::E10, instance.vertices_num(), 0.01, false);
    let improved = relocate.apply_rough_best_improvement(&instance, &mut solution, &mut moves);

    assert!(improved);
    assert!(solution.is_feasible(&instance, false));
    assert!((solution.cost() - 8.0).abs() < 0.01);
}

#[test]
fn two_opt_uncrosses_a_route() {
    let instance = make_instance(
        &[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (3.0, 0.0),
            (4.0, 0.0),
        ],
        &[0, 1, 1, 1, 1],
        10,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let route = build_route(&instance, &mut solution, &[1, 3, 2, 4]);
    assert!((solution.cost() - 10.0).abs() < 0.01);

    let mut moves = full_movegen(&instance);
    let mut two_opt = build_operator(OperatorId::TWOPT, instance.vertices_num(), 0.01, false);
    let improved = two_opt.apply_rough_best_improvement(&instance, &mut solution, &mut moves);

    assert!(improved);
    // Both 2-opt optima of this line cost 8.
    assert!((solution.cost() - 8.0).abs() < 0.01);
    assert!(solution.is_feasible(&instance, false));
    let _ = route;
}

#[test]
fn tails_exchange_uncrosses_two_routes() {
    // Two routes whose tails clearly belong to the other one. The
    // capacity keeps everything from collapsing into a single route.
    let instance = make_instance(
        &[
            (0.0, 0.0),
            (-10.0, 5.0),
            (10.0, 6.0),
            (10.0, 5.0),
            (-10.0, 6.0),
        ],
        &[0, 2, 2, 2, 2],
        7,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut solution, &[1, 2]);
    build_route(&instance, &mut solution, &[3, 4]);
    let cost_before = solution.cost();

    let mut tails = build_operator(OperatorId::TAILS, instance.vertices_num(), 0.01, false);
    let mut moves = full_movegen(&instance);
    let improved = tails.apply_rough_best_improvement(&instance, &mut solution, &mut moves);

    assert!(improved);
    assert!(solution.cost() < cost_before - 0.01);
    assert!(solution.is_feasible(&instance, false));

    // Each route now stays on its own side.
    for route in solution.route_ids().collect::<Vec<_>>() {
        let customers = solution.route_customers(route);
        let same_side = customers
            .windows(2)
            .all(|w| instance.x(w[0]).signum() == instance.x(w[1]).signum());
        assert!(same_side);
    }
}

#[test]
fn single_customer_route_offers_no_moves() {
    let instance = make_instance(&[(0.0, 0.0), (3.0, 4.0)], &[0, 1], 10);
    let mut solution = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut solution, &[1]);
    let cost_before = solution.cost();

    let mut moves = full_movegen(&instance);
    for &id in BASE_OPERATORS {
        let mut operator = build_operator(id, instance.vertices_num(), 0.01, false);
        let improved = operator.apply_rough_best_improvement(&instance, &mut solution, &mut moves);
        assert!(!improved);
    }
    assert!((solution.cost() - cost_before).abs() < 1e-9);
}

#[test]
fn inter_route_operators_idle_on_a_single_route() {
    let instance = make_instance(
        &[(0.0, 0.0), (1.0, 1.0), (2.0, 0.5), (3.0, 1.5)],
        &[0, 1, 1, 1],
        10,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut solution, &[1, 2, 3]);

    let mut moves = full_movegen(&instance);
    for id in [OperatorId::TAILS, OperatorId::SPLIT] {
        let mut operator = build_operator(id, instance.vertices_num(), 0.01, false);
        let improved = operator.apply_rough_best_improvement(&instance, &mut solution, &mut moves);
        assert!(!improved);
    }
    assert!(solution.is_feasible(&instance, false));
}

#[test]
fn random_descent_keeps_invariants_and_improves() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for round in 0..5 {
        let n_customers = 40 + 10 * round;
        let mut coords = vec![(0.0, 0.0)];
        let mut demands = vec![0i64];
        for _ in 0..n_customers {
            coords.push((rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)));
            demands.push(rng.gen_range(1..=10));
        }
        let instance = make_instance(&coords, &demands, 30);

        let mut solution = Solution::new(&instance, instance.vertices_num());
        clarke_and_wright(&instance, &mut solution, 1.0, 100);
        let initial_cost = solution.cost();
        assert!(solution.is_feasible(&instance, false));

        // Seed the localized search with every vertex.
        for vertex in instance.vertices() {
            solution.mark_modified(vertex);
        }

        let mut moves = full_movegen(&instance);
        let mut descent = VndComposer::new(0.01);
        descent.append(RandomizedVnd::new(
            BASE_OPERATORS,
            instance.vertices_num(),
            0.01,
            false,
        ));
        descent.append(RandomizedVnd::new(
            &[OperatorId::EJCH],
            instance.vertices_num(),
            0.01,
            false,
        ));
        descent.sequential_apply(&instance, &mut solution, &mut moves, &mut rng);

        assert!(solution.is_feasible(&instance, false));
        assert!(solution.cost() <= initial_cost + 0.01);
    }
}
