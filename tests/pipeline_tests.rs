//! End-to-end tests of the full pipeline: construction, route
//! minimization and the core optimization loop.

use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ils_cvrp::config::Config;
use ils_cvrp::instance::Instance;
use ils_cvrp::savings::clarke_and_wright;
use ils_cvrp::solution::Solution;
use ils_cvrp::IlsAlgorithm;

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

fn sorted_routes(solution: &Solution) -> Vec<Vec<usize>> {
    let mut routes: Vec<Vec<usize>> = solution
        .route_ids()
        .map(|r| {
            let mut customers = solution.route_customers(r);
            // Canonical orientation: Euclidean costs make a route and its
            // reverse interchangeable.
            if customers.last() < customers.first() {
                customers.reverse();
            }
            customers
        })
        .collect();
    routes.sort();
    routes
}

fn square_instance() -> Instance {
    make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)],
        &[0, 1, 1, 1, 1],
        4,
    )
}

fn two_cluster_instance() -> Instance {
    make_instance(
        &[
            (0.0, 0.0),
            (10.0, 0.0),
            (11.0, 0.0),
            (10.0, 1.0),
            (-10.0, 0.0),
            (-11.0, 0.0),
            (-10.0, 1.0),
        ],
        &[0, 5, 5, 5, 5, 5, 5],
        15,
    )
}

#[test]
fn four_customer_square_collapses_to_one_route() {
    let instance = square_instance();
    let config = Config::new()
        .with_seed(0)
        .with_round_costs(false)
        .with_coreopt_iterations(1_000);

    let mut algorithm = IlsAlgorithm::new(instance, config);
    let best = algorithm.run();

    assert!(best.is_feasible(&algorithm.instance, false));
    assert_eq!(best.routes_num(), 1);
    assert!(best.cost() <= 9.66);
}

#[test]
fn two_clusters_need_exactly_two_routes() {
    let instance = two_cluster_instance();
    let config = Config::new()
        .with_seed(1)
        .with_round_costs(false)
        .with_coreopt_iterations(1_000);

    let mut algorithm = IlsAlgorithm::new(instance, config);
    let best = algorithm.run();

    assert!(best.is_feasible(&algorithm.instance, false));
    assert_eq!(best.routes_num(), 2);
    assert!(best.cost() <= 46.0);

    // One route per cluster.
    for route in best.route_ids().collect::<Vec<_>>() {
        let customers = best.route_customers(route);
        let sign = algorithm.instance.x(customers[0]).signum();
        assert!(customers
            .iter()
            .all(|&c| algorithm.instance.x(c).signum() == sign));
    }
}

#[test]
fn same_seed_reproduces_the_same_solution() {
    let config = Config::new()
        .with_seed(42)
        .with_round_costs(false)
        .with_coreopt_iterations(400);

    let mut first = IlsAlgorithm::new(two_cluster_instance(), config.clone());
    let best_first = first.run();

    let mut second = IlsAlgorithm::new(two_cluster_instance(), config);
    let best_second = second.run();

    assert!((best_first.cost() - best_second.cost()).abs() < 1e-9);
    assert_eq!(sorted_routes(&best_first), sorted_routes(&best_second));
}

#[test]
fn exhausted_time_budget_still_returns_a_feasible_best() {
    let instance = two_cluster_instance();
    let config = Config::new()
        .with_round_costs(false)
        .with_coreopt_iterations(1_000_000)
        .with_time_limit(Duration::from_secs(0));

    let mut algorithm = IlsAlgorithm::new(instance, config);
    let best = algorithm.run();

    assert!(best.is_feasible(&algorithm.instance, false));
    assert!(algorithm.iterations <= 1);
}

#[test]
fn optimization_never_loses_to_the_construction() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let mut coords = vec![(0.0, 0.0)];
    let mut demands = vec![0i64];
    for _ in 0..100 {
        coords.push((rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)));
        demands.push(rng.gen_range(1..=10));
    }

    let instance = make_instance(&coords, &demands, 30);
    let mut construction = Solution::new(&instance, instance.vertices_num());
    clarke_and_wright(&instance, &mut construction, 1.0, 100);
    let construction_cost = construction.cost();

    let instance = make_instance(&coords, &demands, 30);
    let config = Config::new()
        .with_seed(5)
        .with_round_costs(false)
        .with_coreopt_iterations(300);
    let mut algorithm = IlsAlgorithm::new(instance, config);
    let best = algorithm.run();

    assert!(best.is_feasible(&algorithm.instance, false));
    assert!(best.cost() <= construction_cost + 0.01);
}
