//! Intra-route 2-opt: replace the arcs `(i, next(i))` and `(j, next(j))`
//! with `(i, j)` and `(next(i), next(j))` by reversing the sub-path
//! between `next(i)` and `j`. The delta is orientation-independent, so
//! only the base generator of each pair is searched.

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::movegen::MoveGenerators;
use crate::solution::Solution;

use super::OperatorHooks;

#[derive(Debug, Clone, Copy)]
pub struct TwoOptCache {
    next: usize,
    c_v_next: f64,
}

pub struct TwoOptExchange;

impl OperatorHooks for TwoOptExchange {
    const SYMMETRIC: bool = true;
    type Cache = TwoOptCache;

    fn prepare_cache(
        &self,
        _instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> TwoOptCache {
        let route = if vertex == DEPOT {
            solution.route_index(backup)
        } else {
            solution.route_index(vertex)
        };
        let next = solution.next_vertex_in(route, vertex);
        TwoOptCache {
            next,
            c_v_next: solution.cost_prev_vertex(route, next),
        }
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &TwoOptCache,
        j: &TwoOptCache,
    ) -> (f64, f64) {
        // Adjacent pairs cancel out to zero by the formula itself.
        let delta = -i.c_v_next - j.c_v_next + edge_cost + instance.cost(i.next, j.next);
        (delta, delta)
    }

    fn is_feasible(
        &mut self,
        _instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        index: usize,
    ) -> bool {
        let mv = moves.get(index);
        let i = mv.first_vertex();
        let j = mv.second_vertex();

        let i_route = solution.route_index_of(i, j);
        let j_route = solution.route_index_of(j, i);
        if i_route != j_route {
            return false;
        }
        // The reversed sub-path must be non-empty.
        solution.next_vertex_in(i_route, i) != j
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

        let route = solution.route_index_of(i, j);
        let begin = solution.next_vertex_in(route, i);
        let stop = solution.next_vertex_in(route, j);

        // Every vertex of the reversed sub-path changes orientation.
        let bits = moves.update_bits_mut();
        affected.insert(i);
        bits.set_both(i);
        affected.insert(stop);
        bits.set_both(stop);
        let mut curr = begin;
        loop {
            affected.insert(curr);
            bits.set_both(curr);
            if curr == j {
                break;
            }
            curr = solution.next_vertex_in(route, curr);
        }

        solution.reverse_route_path(instance, route, begin, j);
    }
}
