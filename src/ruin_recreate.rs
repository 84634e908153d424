//! Ruin-and-recreate shaking.
//!
//! Ruin removes up to `omega[seed]` customers by walking from a random
//! seed, either along the current route or jumping to a geographically
//! close customer of another route. Recreate reinserts the removed
//! customers in one of four orders, each at its cheapest position among
//! the routes serving its neighbors, or on a fresh singleton route when
//! that is cheaper.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::solution::{Solution, DUMMY_ROUTE, DUMMY_VERTEX};

pub struct RuinAndRecreate {
    removed: Vec<usize>,
    routes: SparseIntSet,
}

impl RuinAndRecreate {
    pub fn new(instance: &Instance) -> Self {
        RuinAndRecreate {
            removed: Vec::new(),
            routes: SparseIntSet::new(instance.vertices_num() + 1),
        }
    }

    /// Shake `solution` and return the seed customer of the walk.
    pub fn apply(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        omega: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> usize {
        self.removed.clear();
        self.routes.clear();

        let seed = rng.gen_range(1..instance.vertices_num());
        let walk_length = omega[seed];

        let mut curr = seed;
        for _ in 0..walk_length {
            debug_assert!(curr != DEPOT);

            let route = solution.route_index(curr);
            self.removed.push(curr);
            self.routes.insert(route);

            let mut next = DUMMY_VERTEX;
            if solution.route_size(route) > 1 && rng.gen_bool(0.5) {
                // Walk within the current route.
                if rng.gen_bool(0.5) {
                    next = solution.next_vertex(curr);
                    if next == DEPOT {
                        next = solution.next_vertex_in(route, next);
                    }
                } else {
                    next = solution.prev_vertex(curr);
                    if next == DEPOT {
                        next = solution.prev_vertex_in(route, next);
                    }
                }
            } else if rng.gen_bool(0.5) {
                // Jump to a route not yet visited by the walk.
                for &neighbor in &instance.neighbors(curr)[1..] {
                    if neighbor == DEPOT
                        || !solution.is_customer_served(neighbor)
                        || self.routes.contains(solution.route_index(neighbor))
                    {
                        continue;
                    }
                    next = neighbor;
                    break;
                }
            } else {
                // Jump to any neighboring route, visited or not.
                for &neighbor in &instance.neighbors(curr)[1..] {
                    if neighbor == DEPOT || !solution.is_customer_served(neighbor) {
                        continue;
                    }
                    next = neighbor;
                    break;
                }
            }

            solution.remove_vertex(instance, route, curr);
            if solution.is_route_empty(route) {
                solution.remove_route(route);
            }

            if next == DUMMY_VERTEX {
                break;
            }
            curr = next;
        }

        // Shuffle the removed customers around a little.
        match rng.gen_range(0..4) {
            0 => self.removed.shuffle(rng),
            1 => self
                .removed
                .sort_by_key(|&c| std::cmp::Reverse(instance.demand(c))),
            2 => self.removed.sort_by(|&a, &b| {
                instance
                    .cost(b, DEPOT)
                    .partial_cmp(&instance.cost(a, DEPOT))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            _ => self.removed.sort_by(|&a, &b| {
                instance
                    .cost(a, DEPOT)
                    .partial_cmp(&instance.cost(b, DEPOT))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }

        for idx in 0..self.removed.len() {
            let customer = self.removed[idx];

            let mut best_route = DUMMY_ROUTE;
            let mut best_where = DUMMY_VERTEX;
            let mut best_cost = f64::INFINITY;

            // Candidate routes are the ones serving nearby customers.
            self.routes.clear();
            for &neighbor in &instance.neighbors(customer)[1..] {
                if neighbor == DEPOT || !solution.is_customer_served(neighbor) {
                    continue;
                }
                self.routes.insert(solution.route_index(neighbor));
            }

            let c_customer_depot = instance.cost(customer, DEPOT);

            for pos in 0..self.routes.len() {
                let route = self.routes.elements()[pos];

                if solution.route_load(route) + instance.demand(customer)
                    > instance.vehicle_capacity()
                {
                    continue;
                }

                let mut where_ = solution.first_customer(route);
                while where_ != DEPOT {
                    let prev = solution.prev_vertex(where_);
                    let cost = -solution.cost_prev_customer(where_)
                        + instance.cost(prev, customer)
                        + instance.cost(customer, where_);
                    if cost < best_cost {
                        best_cost = cost;
                        best_route = route;
                        best_where = where_;
                    }
                    where_ = solution.next_vertex(where_);
                }

                // Insertion at the route end, before the depot.
                let cost = -solution.cost_prev_depot(route)
                    + instance.cost(solution.last_customer(route), customer)
                    + c_customer_depot;
                if cost < best_cost {
                    best_cost = cost;
                    best_route = route;
                    best_where = DEPOT;
                }
            }

            if best_route == DUMMY_ROUTE || 2.0 * c_customer_depot < best_cost {
                solution.build_one_customer_route(instance, customer);
            } else {
                solution.insert_vertex_before(instance, best_route, best_where, customer);
            }
        }

        seed
    }
}
