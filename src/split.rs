//! Split: decode a giant tour (a permutation of all customers) into a set
//! of routes of minimum total penalized cost.
//!
//! Without a duration constraint the unlimited-fleet decoder runs in
//! linear time using a monotone double-ended queue of non-dominated route
//! start positions; with a duration constraint it falls back to a
//! quadratic Bellman sweep. When the unlimited decoder needs more routes
//! than allowed, the limited-fleet variant solves one Bellman layer per
//! vehicle.

use crate::instance::{Instance, DEPOT};
use crate::solution::Solution;

const EPSILON: f64 = 1e-5;
const UNREACHED: f64 = 1e30;

#[derive(Debug, Clone, Copy, Default)]
struct ClientSplit {
    demand: f64,
    service: f64,
    d_depot: f64,
    d_to_depot: f64,
    d_next: f64,
}

/// Flat deque of route-start candidates in monotone improvement order.
/// The back index may transiently sit one slot before the front while the
/// dominance loop drains it, hence the signed cursors.
#[derive(Debug)]
struct TrivialDeque {
    contents: Vec<usize>,
    front: isize,
    back: isize,
}

impl TrivialDeque {
    fn new(capacity: usize, first: usize) -> Self {
        let mut contents = vec![0; capacity];
        contents[0] = first;
        TrivialDeque {
            contents,
            front: 0,
            back: 0,
        }
    }

    fn reset(&mut self, first: usize) {
        self.contents[0] = first;
        self.front = 0;
        self.back = 0;
    }

    fn pop_front(&mut self) {
        self.front += 1;
    }

    fn pop_back(&mut self) {
        self.back -= 1;
    }

    fn push_back(&mut self, value: usize) {
        self.back += 1;
        self.contents[self.back as usize] = value;
    }

    fn front(&self) -> usize {
        self.contents[self.front as usize]
    }

    fn next_front(&self) -> usize {
        self.contents[(self.front + 1) as usize]
    }

    fn back(&self) -> usize {
        self.contents[self.back as usize]
    }

    fn len(&self) -> isize {
        self.back + 1 - self.front
    }
}

/// Giant-tour decoder.
pub struct Split {
    penalty_capacity: f64,
    penalty_duration: f64,
}

struct SplitContext {
    capacity: f64,
    clients: Vec<ClientSplit>,
    sum_distance: Vec<f64>,
    sum_load: Vec<f64>,
    sum_service: Vec<f64>,
}

impl Split {
    pub fn new(penalty_capacity: f64, penalty_duration: f64) -> Self {
        Split {
            penalty_capacity,
            penalty_duration,
        }
    }

    /// Decode `tour` into `solution`, using at most `max_vehicles` routes
    /// when the unconstrained optimum needs more. Returns the penalized
    /// cost of the chosen split.
    pub fn decode(
        &self,
        instance: &Instance,
        solution: &mut Solution,
        tour: &[usize],
        max_vehicles: usize,
    ) -> f64 {
        solution.reset();
        if tour.is_empty() {
            return 0.0;
        }

        let ctx = self.build_context(instance, tour);
        let n = tour.len();

        let (potential, pred) = self.unlimited(instance, &ctx, n);

        // Count the routes of the unconstrained optimum.
        let mut routes = 0;
        let mut end = n;
        while end > 0 {
            end = pred[end];
            routes += 1;
        }

        if routes <= max_vehicles.max(1) {
            let cost = potential[n];
            self.write_routes(instance, solution, tour, &pred, n);
            return cost;
        }

        let k_max = max_vehicles.max(1);
        let (layers_potential, layers_pred) = self.limited(instance, &ctx, n, k_max);

        // A smaller fleet may beat the cap when penalties dominate.
        let mut best_k = k_max;
        let mut best_cost = layers_potential[k_max][n];
        for (k, layer) in layers_potential.iter().enumerate().skip(1) {
            if layer[n] < best_cost {
                best_cost = layer[n];
                best_k = k;
            }
        }

        // Flatten the chosen layer's predecessors into a single chain.
        let mut chain = vec![0usize; n + 1];
        let mut end = n;
        let mut k = best_k;
        while end > 0 {
            chain[end] = layers_pred[k][end];
            end = chain[end];
            k -= 1;
        }

        self.write_routes(instance, solution, tour, &chain, n);
        best_cost
    }

    fn build_context(&self, instance: &Instance, tour: &[usize]) -> SplitContext {
        let n = tour.len();
        let mut clients = vec![ClientSplit::default(); n + 1];
        let mut sum_distance = vec![0.0; n + 1];
        let mut sum_load = vec![0.0; n + 1];
        let mut sum_service = vec![0.0; n + 1];

        for i in 1..=n {
            let customer = tour[i - 1];
            clients[i] = ClientSplit {
                demand: instance.demand(customer) as f64,
                service: instance.service_time(),
                d_depot: instance.cost(DEPOT, customer),
                d_to_depot: instance.cost(customer, DEPOT),
                d_next: if i < n {
                    instance.cost(customer, tour[i])
                } else {
                    -UNREACHED
                },
            };
            sum_load[i] = sum_load[i - 1] + clients[i].demand;
            sum_service[i] = sum_service[i - 1] + clients[i].service;
            sum_distance[i] = sum_distance[i - 1] + clients[i - 1].d_next;
        }

        SplitContext {
            capacity: instance.vehicle_capacity() as f64,
            clients,
            sum_distance,
            sum_load,
            sum_service,
        }
    }

    /// Unlimited-fleet split: one Bellman layer, linear with the monotone
    /// deque when no duration constraint applies.
    fn unlimited(
        &self,
        instance: &Instance,
        ctx: &SplitContext,
        n: usize,
    ) -> (Vec<f64>, Vec<usize>) {
        let mut potential = vec![UNREACHED; n + 1];
        let mut pred = vec![0usize; n + 1];
        potential[0] = 0.0;

        if instance.duration_limit().is_some() {
            let capacity = instance.vehicle_capacity() as f64;
            for i in 0..n {
                let mut load = 0.0;
                let mut distance = 0.0;
                let mut j = i + 1;
                while j <= n && load <= 1.5 * capacity {
                    load += ctx.clients[j].demand;
                    if j == i + 1 {
                        distance += ctx.clients[j].d_depot;
                    } else {
                        distance += ctx.clients[j - 1].d_next;
                    }
                    let service = ctx.sum_service[j] - ctx.sum_service[i];
                    let cost = self.route_cost(instance, distance, load, service, &ctx.clients[j]);
                    if potential[i] + cost < potential[j] {
                        potential[j] = potential[i] + cost;
                        pred[j] = i;
                    }
                    j += 1;
                }
            }
        } else {
            let mut queue = TrivialDeque::new(n + 1, 0);
            for i in 1..=n {
                let value = self.propagate(ctx, &potential, queue.front(), i);
                potential[i] = value;
                pred[i] = queue.front();

                if i < n {
                    if !self.dominates(ctx, &potential, queue.back(), i) {
                        while queue.len() > 0
                            && self.dominates_right(ctx, &potential, queue.back(), i)
                        {
                            queue.pop_back();
                        }
                        queue.push_back(i);
                    }
                    while queue.len() > 1
                        && self.propagate(ctx, &potential, queue.front(), i + 1)
                            > self.propagate(ctx, &potential, queue.next_front(), i + 1) - EPSILON
                    {
                        queue.pop_front();
                    }
                }
            }
        }

        (potential, pred)
    }

    /// Limited-fleet split: `potential[k][i]` is the minimum cost of
    /// serving the first `i` tour customers with exactly `k` routes.
    fn limited(
        &self,
        instance: &Instance,
        ctx: &SplitContext,
        n: usize,
        k_max: usize,
    ) -> (Vec<Vec<f64>>, Vec<Vec<usize>>) {
        let mut potential = vec![vec![UNREACHED; n + 1]; k_max + 1];
        let mut pred = vec![vec![0usize; n + 1]; k_max + 1];
        potential[0][0] = 0.0;

        if instance.duration_limit().is_some() {
            let capacity = instance.vehicle_capacity() as f64;
            for k in 0..k_max {
                for i in k..n {
                    let base = potential[k][i];
                    if base >= UNREACHED {
                        continue;
                    }
                    let mut load = 0.0;
                    let mut distance = 0.0;
                    let mut j = i + 1;
                    while j <= n && load <= 1.5 * capacity {
                        load += ctx.clients[j].demand;
                        if j == i + 1 {
                            distance += ctx.clients[j].d_depot;
                        } else {
                            distance += ctx.clients[j - 1].d_next;
                        }
                        let service = ctx.sum_service[j] - ctx.sum_service[i];
                        let cost =
                            self.route_cost(instance, distance, load, service, &ctx.clients[j]);
                        if base + cost < potential[k + 1][j] {
                            potential[k + 1][j] = base + cost;
                            pred[k + 1][j] = i;
                        }
                        j += 1;
                    }
                }
            }
        } else {
            let mut queue = TrivialDeque::new(n + 1, 0);
            for k in 0..k_max {
                queue.reset(k);
                let (lower, upper) = potential.split_at_mut(k + 1);
                let prev_layer = &lower[k];
                let curr_layer = &mut upper[0];
                for i in (k + 1)..=n {
                    if queue.len() == 0 {
                        break;
                    }
                    curr_layer[i] = self.propagate(ctx, prev_layer, queue.front(), i);
                    pred[k + 1][i] = queue.front();

                    if i < n {
                        if !self.dominates(ctx, prev_layer, queue.back(), i) {
                            while queue.len() > 0
                                && self.dominates_right(ctx, prev_layer, queue.back(), i)
                            {
                                queue.pop_back();
                            }
                            queue.push_back(i);
                        }
                        while queue.len() > 1
                            && self.propagate(ctx, prev_layer, queue.front(), i + 1)
                                > self.propagate(ctx, prev_layer, queue.next_front(), i + 1)
                                    - EPSILON
                        {
                            queue.pop_front();
                        }
                    }
                }
            }
        }

        (potential, pred)
    }

    /// Cost of extending a route from start position `i` to customer `j`.
    fn propagate(&self, ctx: &SplitContext, potential: &[f64], i: usize, j: usize) -> f64 {
        debug_assert!(i < j);
        potential[i] + ctx.sum_distance[j] - ctx.sum_distance[i + 1]
            + ctx.clients[i + 1].d_depot
            + ctx.clients[j].d_to_depot
            + self.penalty_capacity
                * (ctx.sum_load[j] - ctx.sum_load[i] - ctx.capacity).max(0.0)
    }

    /// Whether starting a route at `j` can never beat starting at `i`
    /// (`i < j`) for any future position.
    fn dominates(&self, ctx: &SplitContext, potential: &[f64], i: usize, j: usize) -> bool {
        debug_assert!(i < j);
        potential[j] + ctx.clients[j + 1].d_depot
            > potential[i] + ctx.clients[i + 1].d_depot + ctx.sum_distance[j + 1]
                - ctx.sum_distance[i + 1]
                + self.penalty_capacity * (ctx.sum_load[j] - ctx.sum_load[i])
    }

    /// Whether `j` dominates `i` (`i < j`) from `j` onward.
    fn dominates_right(&self, ctx: &SplitContext, potential: &[f64], i: usize, j: usize) -> bool {
        debug_assert!(i < j);
        potential[j] + ctx.clients[j + 1].d_depot
            < potential[i] + ctx.clients[i + 1].d_depot + ctx.sum_distance[j + 1]
                - ctx.sum_distance[i + 1]
                + EPSILON
    }

    fn route_cost(
        &self,
        instance: &Instance,
        distance: f64,
        load: f64,
        service: f64,
        last: &ClientSplit,
    ) -> f64 {
        let capacity = instance.vehicle_capacity() as f64;
        let mut cost = distance
            + last.d_to_depot
            + self.penalty_capacity * (load - capacity).max(0.0);
        if let Some(limit) = instance.duration_limit() {
            cost += self.penalty_duration
                * (distance + last.d_to_depot + service - limit).max(0.0);
        }
        cost
    }

    /// Materialize the route boundaries of a predecessor chain.
    fn write_routes(
        &self,
        instance: &Instance,
        solution: &mut Solution,
        tour: &[usize],
        pred: &[usize],
        n: usize,
    ) {
        let mut end = n;
        while end > 0 {
            let begin = pred[end];
            let route = solution.build_one_customer_route(instance, tour[begin]);
            for &customer in &tour[begin + 1..end] {
                solution.insert_vertex_before(instance, route, DEPOT, customer);
            }
            end = begin;
        }
        solution.clear_do_list();
        solution.clear_undo_list();
    }
}
