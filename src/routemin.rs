//! Route minimization: iteratively empty a pair of neighboring routes and
//! reinsert their customers, allowing some to stay temporarily unserved,
//! until the solution reaches the estimated minimum fleet size.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::local_search::{RandomizedVnd, VndComposer, BASE_OPERATORS};
use crate::movegen::MoveGenerators;
use crate::solution::{Solution, DUMMY_VERTEX};

/// Parameters mirror the outer engine: `k_min` is the route-count target,
/// `max_iterations` the budget. Returns the best complete solution found.
pub fn routemin(
    instance: &Instance,
    source: &Solution,
    moves: &mut MoveGenerators,
    rng: &mut ChaCha8Rng,
    k_min: usize,
    max_iterations: usize,
    tolerance: f64,
) -> Solution {
    let n = instance.vertices_num();

    // Partial solutions in play: operators skip unserved endpoints.
    let mut local_search = VndComposer::new(tolerance);
    local_search.append(RandomizedVnd::new(BASE_OPERATORS, n, tolerance, true));

    // Use every move generator during this phase.
    let gamma = vec![1.0; n];
    let all_vertices: Vec<usize> = instance.vertices().collect();
    moves.set_active_percentage(&gamma, &all_vertices);

    let mut best_solution = source.clone();
    let mut solution = source.clone();

    // Probability for a customer to stay unserved when it does not fit
    // anywhere, cooled geometrically towards zero.
    let t_base = 1.0f64;
    let t_end = 0.01f64;
    let mut t = t_base;
    let cooling = (t_end / t_base).powf(1.0 / max_iterations.max(1) as f64);

    let mut removed: Vec<usize> = Vec::with_capacity(instance.customers_num());
    let mut still_removed: Vec<usize> = Vec::with_capacity(instance.customers_num());
    let mut neighbor_routes = SparseIntSet::new(n + 1);

    for _ in 0..max_iterations {
        solution.clear_svc();

        // Pick a served seed customer and the route of one of its
        // neighbors as the routes to empty.
        let mut seed;
        loop {
            seed = rng.gen_range(1..n);
            if solution.is_customer_served(seed) {
                break;
            }
        }
        let mut selected_routes = vec![solution.route_index(seed)];
        for &vertex in &instance.neighbors(seed)[1..] {
            if vertex == DEPOT || !solution.is_customer_served(vertex) {
                continue;
            }
            let route = solution.route_index(vertex);
            if route != selected_routes[0] {
                selected_routes.push(route);
                break;
            }
        }

        removed.clear();
        removed.extend_from_slice(&still_removed);
        still_removed.clear();

        for &route in &selected_routes {
            let mut curr = solution.first_customer(route);
            while curr != DEPOT {
                let next = solution.next_vertex(curr);
                solution.remove_vertex(instance, route, curr);
                removed.push(curr);
                curr = next;
            }
            solution.remove_route(route);
        }

        if rng.gen_bool(0.5) {
            removed.sort_by_key(|&c| std::cmp::Reverse(instance.demand(c)));
        } else {
            removed.shuffle(rng);
        }

        for idx in 0..removed.len() {
            let customer = removed[idx];

            let mut best_route = usize::MAX;
            let mut best_where = DUMMY_VERTEX;
            let mut best_delta = f64::INFINITY;

            neighbor_routes.clear();
            for &vertex in &instance.neighbors(customer)[1..] {
                if vertex == DEPOT || !solution.is_customer_served(vertex) {
                    continue;
                }
                neighbor_routes.insert(solution.route_index(vertex));
            }

            let c_customer_depot = instance.cost(customer, DEPOT);

            for pos in 0..neighbor_routes.len() {
                let route = neighbor_routes.elements()[pos];
                if solution.route_load(route) + instance.demand(customer)
                    > instance.vehicle_capacity()
                {
                    continue;
                }

                let mut j = solution.first_customer(route);
                while j != DEPOT {
                    let prev = solution.prev_vertex_in(route, j);
                    let delta = -solution.cost_prev_customer(j)
                        + instance.cost(prev, customer)
                        + instance.cost(customer, j);
                    if delta < best_delta {
                        best_route = route;
                        best_where = j;
                        best_delta = delta;
                    }
                    j = solution.next_vertex(j);
                }

                let delta = -solution.cost_prev_depot(route)
                    + instance.cost(solution.last_customer(route), customer)
                    + c_customer_depot;
                if delta < best_delta {
                    best_route = route;
                    best_where = DEPOT;
                    best_delta = delta;
                }
            }

            if best_route == usize::MAX {
                // Nowhere to put it: open a new route, or leave the
                // customer out while the schedule still allows it.
                if rng.gen_range(0.0..1.0) > t || solution.routes_num() < k_min {
                    solution.build_one_customer_route(instance, customer);
                } else {
                    still_removed.push(customer);
                }
            } else {
                solution.insert_vertex_before(instance, best_route, best_where, customer);
            }
        }

        local_search.sequential_apply(instance, &mut solution, moves, rng);

        if still_removed.is_empty() {
            let better = solution.cost() < best_solution.cost()
                || (solution.cost() == best_solution.cost()
                    && solution.routes_num() < best_solution.routes_num());
            if better {
                solution.apply_do_list_to(instance, &mut best_solution);
                solution.clear_do_list();
                solution.clear_undo_list();

                if best_solution.routes_num() <= k_min {
                    break;
                }
            }
        }

        if solution.cost() > best_solution.cost() {
            // Worsening trajectory: fall back to the incumbent instead of
            // exploring from a degraded state.
            solution.rewind(instance);
            still_removed.clear();
        }

        t *= cooling;
    }

    debug_assert!(best_solution.is_feasible(instance, false));
    best_solution
}
