//! Tests for the linked-list solution representation: mutation contracts,
//! cached costs, cumulative loads and the do/undo journal.

use ils_cvrp::instance::{Instance, DEPOT};
use ils_cvrp::solution::Solution;

/// Instance with the depot first; all nearest-neighbor lists are complete.
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

fn line_instance() -> Instance {
    // Depot at the origin, five customers along the x axis.
    make_instance(
        &[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (3.0, 0.0),
            (4.0, 0.0),
            (5.0, 0.0),
        ],
        &[0, 1, 1, 1, 1, 1],
        10,
    )
}

/// Append customers to a fresh route and return its identifier.
fn build_route(instance: &Instance, solution: &mut Solution, customers: &[usize]) -> usize {
    let route = solution.build_one_customer_route(instance, customers[0]);
    for &customer in &customers[1..] {
        solution.insert_vertex_before(instance, route, DEPOT, customer);
    }
    route
}

#[test]
fn one_customer_route_has_round_trip_cost() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());

    let route = solution.build_one_customer_route(&instance, 3);

    assert_eq!(solution.routes_num(), 1);
    assert_eq!(solution.route_load(route), 1);
    assert_eq!(solution.route_size(route), 1);
    assert!((solution.cost() - 6.0).abs() < 1e-9);
    assert!(solution.is_feasible(&instance, true));
}

#[test]
fn remove_then_reinsert_restores_cost() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let route = build_route(&instance, &mut solution, &[1, 2, 3]);
    let cost_before = solution.cost();

    let where_was = solution.next_vertex(2);
    solution.remove_vertex(&instance, route, 2);
    solution.insert_vertex_before(&instance, route, where_was, 2);

    assert!((solution.cost() - cost_before).abs() < 0.01);
    assert_eq!(solution.route_customers(route), vec![1, 2, 3]);
    assert!(solution.is_feasible(&instance, true));
}

#[test]
fn remove_depot_creates_and_insert_restores_consistency() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let route = build_route(&instance, &mut solution, &[1, 2, 3]);
    let cost_before = solution.cost();

    // Temporarily reduce the route to a pure customer cycle, then re-root
    // it at the same place.
    solution.remove_vertex(&instance, route, DEPOT);
    solution.insert_vertex_before(&instance, route, 1, DEPOT);

    assert!((solution.cost() - cost_before).abs() < 0.01);
    assert_eq!(solution.route_customers(route), vec![1, 2, 3]);
}

#[test]
fn reverse_route_path_twice_is_identity() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let route = build_route(&instance, &mut solution, &[1, 2, 3, 4]);
    let cost_before = solution.cost();

    solution.reverse_route_path(&instance, route, 2, 4);
    assert_eq!(solution.route_customers(route), vec![1, 4, 3, 2]);

    solution.reverse_route_path(&instance, route, 4, 2);
    assert_eq!(solution.route_customers(route), vec![1, 2, 3, 4]);
    assert!((solution.cost() - cost_before).abs() < 0.01);
}

#[test]
fn reverse_whole_route_through_depot() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let route = build_route(&instance, &mut solution, &[1, 2, 3]);
    let cost_before = solution.cost();

    // Euclidean costs are symmetric: reversing everything keeps the cost.
    solution.reverse_route_path(&instance, route, 1, 3);
    assert_eq!(solution.route_customers(route), vec![3, 2, 1]);
    assert!((solution.cost() - cost_before).abs() < 0.01);
    assert!(solution.is_feasible(&instance, true));
}

#[test]
fn append_route_merges_and_releases() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let first = build_route(&instance, &mut solution, &[1, 2]);
    let second = build_route(&instance, &mut solution, &[4, 5]);

    solution.append_route(&instance, first, second);

    assert_eq!(solution.routes_num(), 1);
    assert!(!solution.is_route_in_solution(second));
    assert_eq!(solution.route_customers(first), vec![1, 2, 4, 5]);
    assert_eq!(solution.route_load(first), 4);

    // depot -> 1 -> 2 -> 4 -> 5 -> depot
    assert!((solution.cost() - 10.0).abs() < 0.01);
}

#[test]
fn swap_tails_exchanges_suffixes() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let first = build_route(&instance, &mut solution, &[1, 2]);
    let second = build_route(&instance, &mut solution, &[3, 4]);

    solution.swap_tails(&instance, 1, first, 4, second);

    assert_eq!(solution.route_customers(first), vec![1, 4]);
    assert_eq!(solution.route_customers(second), vec![3, 2]);
    assert!(solution.is_feasible(&instance, true));
}

#[test]
fn split_routes_exchanges_reversed_stretches() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let first = build_route(&instance, &mut solution, &[1, 2]);
    let second = build_route(&instance, &mut solution, &[3, 4]);

    // Head of the second route joins the first reversed, and vice versa.
    solution.split_routes(&instance, 1, first, 3, second);

    assert_eq!(solution.route_customers(first), vec![1, 3]);
    assert_eq!(solution.route_customers(second), vec![2, 4]);
    assert!(solution.is_feasible(&instance, true));
}

#[test]
fn cumulative_loads_follow_route_order() {
    let instance = make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)],
        &[0, 2, 3, 4],
        20,
    );
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let route = build_route(&instance, &mut solution, &[1, 2, 3]);

    assert_eq!(solution.route_load_before_included(&instance, 1), 2);
    assert_eq!(solution.route_load_before_included(&instance, 2), 5);
    assert_eq!(solution.route_load_before_included(&instance, 3), 9);
    assert_eq!(solution.route_load_after_included(&instance, 1), 9);
    assert_eq!(solution.route_load_after_included(&instance, 3), 4);
    assert_eq!(solution.route_load(route), 9);
}

#[test]
fn undo_list_rewinds_and_do_list_replays() {
    let instance = line_instance();
    let mut original = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut original, &[1, 2, 3]);
    build_route(&instance, &mut original, &[4, 5]);
    original.clear_do_list();
    original.clear_undo_list();

    let mut mirror = original.clone();
    let mut working = original.clone();

    // A journaled trajectory: relocate 2 into the second route and empty
    // out nothing else.
    let first = working.route_index(2);
    let second = working.route_index(4);
    working.remove_vertex(&instance, first, 2);
    working.insert_vertex_before(&instance, second, 5, 2);

    assert!(working.is_feasible(&instance, false));
    assert!((working.cost() - original.cost()).abs() > 0.01);

    // Replaying the do-list reproduces the trajectory on a twin solution.
    working.apply_do_list_to(&instance, &mut mirror);
    assert!((mirror.cost() - working.cost()).abs() < 0.01);
    assert_eq!(mirror.route_customers(second), vec![4, 2, 5]);

    // Rewinding restores the starting state.
    working.rewind(&instance);
    assert!((working.cost() - original.cost()).abs() < 0.01);
    assert_eq!(working.route_customers(first), vec![1, 2, 3]);
    assert!(working.is_feasible(&instance, false));
}

#[test]
fn rewind_recreates_released_routes() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    let first = build_route(&instance, &mut solution, &[1, 2, 3]);
    let single = build_route(&instance, &mut solution, &[5]);
    solution.clear_do_list();
    solution.clear_undo_list();
    let cost_before = solution.cost();

    // Empty the singleton route and release it.
    solution.remove_vertex(&instance, single, 5);
    solution.remove_route(single);
    assert_eq!(solution.routes_num(), 1);

    solution.rewind(&instance);
    assert_eq!(solution.routes_num(), 2);
    assert!((solution.cost() - cost_before).abs() < 0.01);
    assert!(solution.is_customer_served(5));
    assert!(solution.is_feasible(&instance, true));

    let _ = first;
}

#[test]
fn giant_tour_concatenates_routes() {
    let instance = line_instance();
    let mut solution = Solution::new(&instance, instance.vertices_num());
    build_route(&instance, &mut solution, &[1, 2]);
    build_route(&instance, &mut solution, &[3, 4, 5]);

    let tour = solution.giant_tour();
    assert_eq!(tour.len(), 5);
    // Routes are concatenated whole, so both orders appear intact.
    let pos = |c: usize| tour.iter().position(|&v| v == c).unwrap();
    assert_eq!(pos(2), pos(1) + 1);
    assert_eq!(pos(4), pos(3) + 1);
    assert_eq!(pos(5), pos(4) + 1);
}
