//! Segment exchange neighborhoods.
//!
//! `SegmentExchange<N, M, REV>` swaps the segment A of `N` customers
//! starting at `i` with the segment B of `M` customers ending at
//! `prev(j)`. A lands immediately before `j` and B takes A's old slot, so
//! the candidate edge between the pair's endpoints is created by every
//! application. With `REV` the A segment is inserted reversed.
//!
//! The same-route guards follow from the cost formula: both segments must
//! be disjoint, depot-free and non-adjacent, otherwise the four removed
//! arcs are not distinct.

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::movegen::MoveGenerators;
use crate::solution::Solution;

use super::OperatorHooks;

#[derive(Debug, Clone, Copy)]
pub struct ExchangeCache {
    v: usize,
    /// A-role context: segment of N vertices starting at v.
    a_prev: usize,
    a_end: usize,
    a_next: usize,
    a_removal: f64,
    /// B-role context: segment of M vertices ending at prev(v).
    b_end: usize,
    b_start: usize,
    b_prev: usize,
    b_removal: f64,
}

pub struct SegmentExchange<const N: usize, const M: usize, const REV: bool>;

impl<const N: usize, const M: usize, const REV: bool> SegmentExchange<N, M, REV> {
    /// Collect segment A and its demand; `None` when it runs over the
    /// depot or absorbs `j`.
    fn collect_a(
        instance: &Instance,
        solution: &Solution,
        route: usize,
        i: usize,
        j: usize,
    ) -> Option<([usize; N], i64)> {
        let mut segment = [0usize; N];
        let mut demand = 0i64;
        let mut v = i;
        for slot in segment.iter_mut() {
            if v == DEPOT || v == j {
                return None;
            }
            *slot = v;
            demand += instance.demand(v);
            v = solution.next_vertex_in(route, v);
        }
        Some((segment, demand))
    }

    /// Collect segment B (ending at `prev(j)`) in route order and its
    /// demand; `None` when it runs over the depot.
    fn collect_b(
        instance: &Instance,
        solution: &Solution,
        route: usize,
        j: usize,
    ) -> Option<([usize; M], i64)> {
        let mut segment = [0usize; M];
        let mut demand = 0i64;
        let mut v = solution.prev_vertex_in(route, j);
        for slot in segment.iter_mut().rev() {
            if v == DEPOT {
                return None;
            }
            *slot = v;
            demand += instance.demand(v);
            v = solution.prev_vertex_in(route, v);
        }
        Some((segment, demand))
    }
}

impl<const N: usize, const M: usize, const REV: bool> OperatorHooks
    for SegmentExchange<N, M, REV>
{
    const SYMMETRIC: bool = false;
    type Cache = ExchangeCache;

    fn prepare_cache(
        &self,
        instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> ExchangeCache {
        let route = if vertex == DEPOT {
            solution.route_index(backup)
        } else {
            solution.route_index(vertex)
        };

        let a_prev = solution.prev_vertex_in(route, vertex);
        let mut a_end = vertex;
        for _ in 1..N {
            a_end = solution.next_vertex_in(route, a_end);
        }
        let a_next = solution.next_vertex_in(route, a_end);
        let a_removal = -solution.cost_prev_vertex(route, vertex)
            - solution.cost_prev_vertex(route, a_next);

        let b_end = a_prev;
        let mut b_start = b_end;
        for _ in 1..M {
            b_start = solution.prev_vertex_in(route, b_start);
        }
        let b_prev = solution.prev_vertex_in(route, b_start);
        let b_removal = -solution.cost_prev_vertex(route, b_start)
            - solution.cost_prev_vertex(route, vertex);

        ExchangeCache {
            v: vertex,
            a_prev,
            a_end,
            a_next,
            a_removal,
            b_end,
            b_start,
            b_prev,
            b_removal,
        }
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &ExchangeCache,
        j: &ExchangeCache,
    ) -> (f64, f64) {
        let delta = |a: &ExchangeCache, b: &ExchangeCache| {
            let removed = a.a_removal + b.b_removal;
            let added = if REV {
                instance.cost(b.b_prev, a.a_end)
                    + edge_cost
                    + instance.cost(a.a_prev, b.b_start)
                    + instance.cost(b.b_end, a.a_next)
            } else {
                let c_aend_j = if N == 1 {
                    edge_cost
                } else {
                    instance.cost(a.a_end, b.v)
                };
                instance.cost(b.b_prev, a.v)
                    + c_aend_j
                    + instance.cost(a.a_prev, b.b_start)
                    + instance.cost(b.b_end, a.a_next)
            };
            removed + added
        };
        (delta(i, j), delta(j, i))
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

        if i == DEPOT {
            return false;
        }

        let i_route = solution.route_index(i);
        let j_route = solution.route_index_of(j, i);

        if solution.prev_vertex_in(j_route, j) == DEPOT {
            return false;
        }

        let (segment_a, demand_a) = match Self::collect_a(instance, solution, i_route, i, j) {
            Some(result) => result,
            None => return false,
        };
        let (segment_b, demand_b) = match Self::collect_b(instance, solution, j_route, j) {
            Some(result) => result,
            None => return false,
        };

        // Disjointness and non-adjacency: the four removed arcs must be
        // distinct.
        let a_next = solution.next_vertex_in(i_route, segment_a[N - 1]);
        for &b in &segment_b {
            if segment_a.contains(&b) {
                return false;
            }
        }
        if a_next == segment_b[0] {
            return false;
        }

        if i_route == j_route {
            true
        } else {
            let capacity = instance.vehicle_capacity();
            solution.route_load(i_route) - demand_a + demand_b <= capacity
                && solution.route_load(j_route) - demand_b + demand_a <= capacity
        }
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
        let j_route = solution.route_index_of(j, i);

        let (segment_a, _) = Self::collect_a(instance, solution, i_route, i, j)
            .expect("executed move must be feasible");
        let (segment_b, _) = Self::collect_b(instance, solution, j_route, j)
            .expect("executed move must be feasible");

        let a_prev = solution.prev_vertex_in(i_route, i);
        let a_next = solution.next_vertex_in(i_route, segment_a[N - 1]);
        let b_prev = solution.prev_vertex_in(j_route, segment_b[0]);

        let bits = moves.update_bits_mut();
        for &vertex in segment_a
            .iter()
            .chain(segment_b.iter())
            .chain([a_prev, a_next, b_prev, j].iter())
        {
            affected.insert(vertex);
            bits.set_both(vertex);
        }

        for &vertex in &segment_a {
            solution.remove_vertex(instance, i_route, vertex);
        }
        for &vertex in &segment_b {
            solution.remove_vertex(instance, j_route, vertex);
        }

        // A takes B's old slot, just before j.
        if REV {
            for &vertex in segment_a.iter().rev() {
                solution.insert_vertex_before(instance, j_route, j, vertex);
            }
        } else {
            for &vertex in &segment_a {
                solution.insert_vertex_before(instance, j_route, j, vertex);
            }
        }

        // B takes A's old slot.
        for &vertex in &segment_b {
            solution.insert_vertex_before(instance, i_route, a_next, vertex);
        }
    }
}
