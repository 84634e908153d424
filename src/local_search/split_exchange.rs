//! Inter-route crossover with reversal: replace `(i, next(i))` and
//! `(j, next(j))` with `(i, j)` and `(next(i), next(j))`. The head of
//! `j`'s route joins `i`'s route reversed and the tail of `i`'s route
//! joins `j`'s route reversed. Same arithmetic as 2-opt, applied across
//! two routes.

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::movegen::MoveGenerators;
use crate::solution::Solution;

use super::OperatorHooks;

#[derive(Debug, Clone, Copy)]
pub struct SplitCache {
    next: usize,
    c_v_next: f64,
}

pub struct SplitExchange;

impl OperatorHooks for SplitExchange {
    const SYMMETRIC: bool = true;
    type Cache = SplitCache;

    fn prepare_cache(
        &self,
        _instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> SplitCache {
        let route = if vertex == DEPOT {
            solution.route_index(backup)
        } else {
            solution.route_index(vertex)
        };
        let next = solution.next_vertex_in(route, vertex);
        SplitCache {
            next,
            c_v_next: solution.cost_prev_vertex(route, next),
        }
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &SplitCache,
        j: &SplitCache,
    ) -> (f64, f64) {
        let delta = -i.c_v_next - j.c_v_next + edge_cost + instance.cost(i.next, j.next);
        (delta, delta)
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
        let j_head = solution.route_load_before_included(instance, j);
        let i_load = solution.route_load(i_route);
        let j_load = solution.route_load(j_route);

        i_head + j_head <= capacity && (i_load - i_head) + (j_load - j_head) <= capacity
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

        // Both exchanged stretches flip orientation.
        let bits = moves.update_bits_mut();
        for &vertex in &[i, j, DEPOT] {
            affected.insert(vertex);
            bits.set_both(vertex);
        }
        let mut curr = j;
        while curr != DEPOT {
            affected.insert(curr);
            bits.set_both(curr);
            curr = solution.prev_vertex(curr);
        }
        curr = solution.next_vertex(i);
        while curr != DEPOT {
            affected.insert(curr);
            bits.set_both(curr);
            curr = solution.next_vertex(curr);
        }
        let j_next = solution.next_vertex(j);
        if j_next != DEPOT {
            affected.insert(j_next);
            bits.set_both(j_next);
        }

        solution.split_routes(instance, i, i_route, j, j_route);

        if solution.is_route_empty(j_route) {
            solution.remove_route(j_route);
        }
    }
}
