//! Inter-route tail swap: replace `(i, next(i))` with `(i, j)` and
//! `(prev(j), j)` with `(prev(j), next(i))`, exchanging the suffix after
//! `i` with the suffix from `j`. Feasibility rides on the cumulative
//! route loads.

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::movegen::MoveGenerators;
use crate::solution::Solution;

use super::OperatorHooks;

#[derive(Debug, Clone, Copy)]
pub struct TailsCache {
    v: usize,
    prev: usize,
    next: usize,
    c_prev_v: f64,
    c_v_next: f64,
}

pub struct TailsExchange;

impl OperatorHooks for TailsExchange {
    const SYMMETRIC: bool = false;
    type Cache = TailsCache;

    fn prepare_cache(
        &self,
        _instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> TailsCache {
        let route = if vertex == DEPOT {
            solution.route_index(backup)
        } else {
            solution.route_index(vertex)
        };
        let prev = solution.prev_vertex_in(route, vertex);
        let next = solution.next_vertex_in(route, vertex);
        TailsCache {
            v: vertex,
            prev,
            next,
            c_prev_v: solution.cost_prev_vertex(route, vertex),
            c_v_next: solution.cost_prev_vertex(route, next),
        }
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &TailsCache,
        j: &TailsCache,
    ) -> (f64, f64) {
        let delta1 = -i.c_v_next - j.c_prev_v + edge_cost + instance.cost(j.prev, i.next);
        let delta2 = -j.c_v_next - i.c_prev_v + edge_cost + instance.cost(i.prev, j.next);
        (delta1, delta2)
    }

    fn is_feasible(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        index: usize,
    ) -> bool {
        let mv = moves.get(index);
        let i = mv.first_vertex();
        let j = mv.second_vertex();

        if i == DEPOT || j == DEPOT {
            return false;
        }
        let i_route = solution.route_index(i);
        let j_route = solution.route_index(j);
        if i_route == j_route {
            return false;
        }

        let capacity = instance.vehicle_capacity();
        let i_head = solution.route_load_before_included(instance, i);
        let j_tail = solution.route_load_after_included(instance, j);
        let i_load = solution.route_load(i_route);
        let j_load = solution.route_load(j_route);

        i_head + j_tail <= capacity && (i_load - i_head) + (j_load - j_tail) <= capacity
    }

    fn execute(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        index: usize,
        affected: &mut SparseIntSet,
    ) {
        let mv = moves.get(index);
        let i = mv.first_vertex();
        let j = mv.second_vertex();

        let i_route = solution.route_index(i);
        let j_route = solution.route_index(j);

        let i_next = solution.next_vertex(i);
        let j_prev = solution.prev_vertex(j);

        let bits = moves.update_bits_mut();
        for &vertex in &[i, i_next, j, j_prev, DEPOT] {
            affected.insert(vertex);
            bits.set_both(vertex);
        }

        solution.swap_tails(instance, i, i_route, j, j_route);

        if solution.is_route_empty(j_route) {
            solution.remove_route(j_route);
        }
    }
}
