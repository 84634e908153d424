//! Tests for the giant-tour decoder.

use ils_cvrp::instance::Instance;
use ils_cvrp::solution::Solution;
use ils_cvrp::split::Split;

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

fn make_duration_instance(
    coords: &[(f64, f64)],
    demands: &[i64],
    capacity: i64,
    limit: f64,
) -> Instance {
    let xs = coords.iter().map(|c| c.0).collect();
    let ys = coords.iter().map(|c| c.1).collect();
    Instance::new(
        "test".to_string(),
        xs,
        ys,
        demands.to_vec(),
        capacity,
        Some(limit),
        0.0,
        coords.len(),
        false,
        None,
    )
    .expect("valid test instance")
}

fn line_instance() -> Instance {
    make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)],
        &[0, 3, 3, 3],
        6,
    )
}

fn sorted_routes(solution: &Solution) -> Vec<Vec<usize>> {
    let mut routes: Vec<Vec<usize>> = solution
        .route_ids()
        .map(|r| solution.route_customers(r))
        .collect();
    routes.sort();
    routes
}

#[test]
fn empty_tour_decodes_to_nothing() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);

    let cost = split.decode(&instance, &mut solution, &[], 3);

    assert_eq!(solution.routes_num(), 0);
    assert!(cost.abs() < 1e-9);
}

#[test]
fn single_customer_gets_a_round_trip() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);

    let cost = split.decode(&instance, &mut solution, &[2], 3);

    assert_eq!(solution.routes_num(), 1);
    assert!((cost - 4.0).abs() < 0.01);
    assert!((solution.cost() - 4.0).abs() < 0.01);
}

#[test]
fn split_picks_the_optimal_boundaries() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);

    // {1} + {2,3} costs 8, every other feasible partition costs more.
    let cost = split.decode(&instance, &mut solution, &[1, 2, 3], 3);

    assert!((cost - 8.0).abs() < 0.01);
    assert!((solution.cost() - 8.0).abs() < 0.01);
    assert!(solution.is_load_feasible(&instance));
    assert_eq!(sorted_routes(&solution), vec![vec![1], vec![2, 3]]);
}

#[test]
fn decode_round_trips_a_known_solution() {
    let instance = line_instance();
    let mut original = Solution::new(&instance, instance.vertices_num());
    let route = original.build_one_customer_route(&instance, 1);
    let _ = route;
    let second = original.build_one_customer_route(&instance, 2);
    original.insert_vertex_before(&instance, second, ils_cvrp::instance::DEPOT, 3);
    let original_cost = original.cost();
    let original_routes = sorted_routes(&original);

    // Emit the giant tour and decode it back.
    let tour = original.giant_tour();
    let mut decoded = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);
    let cost = split.decode(&instance, &mut decoded, &tour, instance.max_vehicles());

    assert!((cost - original_cost).abs() < 0.01);
    assert_eq!(sorted_routes(&decoded), original_routes);
}

#[test]
fn sufficient_fleet_always_yields_a_feasible_partition() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);

    // ceil(totalDemand / Q) = 2 vehicles are enough.
    let _ = split.decode(&instance, &mut solution, &[3, 1, 2], 2);

    assert!(solution.is_load_feasible(&instance));
    assert!(solution.is_feasible(&instance, false));
}

#[test]
fn limited_fleet_respects_the_cap() {
    // Two clusters: unconstrained the decoder prefers one route per
    // cluster (44 < 45), but a single vehicle still fits everything.
    let instance = make_instance(
        &[
            (0.0, 0.0),
            (10.0, 0.0),
            (11.0, 0.0),
            (-10.0, 0.0),
            (-11.0, 0.0),
        ],
        &[0, 1, 1, 1, 1],
        10,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);

    let unconstrained = split.decode(&instance, &mut solution, &[1, 2, 3, 4], 4);
    assert_eq!(solution.routes_num(), 2);
    assert!((unconstrained - 44.0).abs() < 0.01);

    let capped = split.decode(&instance, &mut solution, &[1, 2, 3, 4], 1);
    assert_eq!(solution.routes_num(), 1);
    assert!((capped - 45.0).abs() < 0.01);
    assert!(solution.is_load_feasible(&instance));
}

#[test]
fn duration_limit_forces_shorter_routes() {
    // Two branches: serving all four in one route travels 14, one branch
    // per route travels 8. The duration limit forces the split.
    let instance = make_duration_instance(
        &[(0.0, 0.0), (3.0, 0.0), (4.0, 0.0), (0.0, 3.0), (0.0, 4.0)],
        &[0, 1, 1, 1, 1],
        10,
        9.0,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let split = Split::new(1000.0, 1000.0);

    let _ = split.decode(&instance, &mut solution, &[1, 2, 3, 4], 4);

    assert_eq!(solution.routes_num(), 2);
    assert!(solution.is_feasible(&instance, false));
    for route in solution.route_ids().collect::<Vec<_>>() {
        assert!(solution.route_cost(&instance, route) <= 9.0 + 0.01);
    }
}
