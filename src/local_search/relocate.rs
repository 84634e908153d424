//! Segment relocation neighborhoods.
//!
//! [`SegmentRelocate`] moves the segment of `N` consecutive vertices
//! starting at `i` to just after `j`, creating the candidate edge
//! `(j, i)`. [`RevSegmentRelocate`] moves the segment of `N` consecutive
//! customers *ending* at `i` to just after `j` reversed, which also
//! creates `(j, i)`.

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::movegen::MoveGenerators;
use crate::solution::Solution;

use super::OperatorHooks;

#[derive(Debug, Clone, Copy)]
pub struct RelocateCache {
    v: usize,
    next: usize,
    seg_end: usize,
    /// Successor of the relocated segment.
    seg_next: usize,
    /// Cost change of closing the gap left by the segment.
    removal: f64,
    /// Cost of the arc (v, next(v)), paid when v is the insertion anchor.
    c_v_next: f64,
}

fn prepare_relocate_cache<const N: usize>(
    instance: &Instance,
    solution: &Solution,
    vertex: usize,
    backup: usize,
) -> RelocateCache {
    let route = if vertex == DEPOT {
        solution.route_index(backup)
    } else {
        solution.route_index(vertex)
    };
    let prev = solution.prev_vertex_in(route, vertex);
    let next = solution.next_vertex_in(route, vertex);

    let mut seg_end = vertex;
    for _ in 1..N {
        seg_end = solution.next_vertex_in(route, seg_end);
    }
    let seg_next = solution.next_vertex_in(route, seg_end);

    let removal = instance.cost(prev, seg_next)
        - solution.cost_prev_vertex(route, vertex)
        - solution.cost_prev_vertex(route, seg_next);

    RelocateCache {
        v: vertex,
        next,
        seg_end,
        seg_next,
        removal,
        c_v_next: solution.cost_prev_vertex(route, next),
    }
}

/// Move the segment `[i, .., next^{N-1}(i)]` to just after `j`.
pub struct SegmentRelocate<const N: usize>;

impl<const N: usize> OperatorHooks for SegmentRelocate<N> {
    const SYMMETRIC: bool = false;
    type Cache = RelocateCache;

    fn prepare_cache(
        &self,
        instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> RelocateCache {
        prepare_relocate_cache::<N>(instance, solution, vertex, backup)
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &RelocateCache,
        j: &RelocateCache,
    ) -> (f64, f64) {
        // Relocating after the segment's own predecessor is the identity.
        let delta1 = if j.next == i.v {
            0.0
        } else {
            i.removal - j.c_v_next + edge_cost + instance.cost(i.seg_end, j.next)
        };
        let delta2 = if i.next == j.v {
            0.0
        } else {
            j.removal - i.c_v_next + edge_cost + instance.cost(j.seg_end, i.next)
        };
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

        // Only a single-vertex relocation may move the depot (re-rooting
        // its route); longer segments must stay clear of it.
        if i == DEPOT && N > 1 {
            return false;
        }

        let i_route = solution.route_index_of(i, j);
        let j_route = solution.route_index_of(j, i);

        let mut seg_demand = 0i64;
        let mut v = i;
        for step in 0..N {
            if step > 0 {
                v = solution.next_vertex_in(i_route, v);
                if v == DEPOT {
                    return false;
                }
            }
            if v == j {
                return false;
            }
            seg_demand += if v == DEPOT { 0 } else { instance.demand(v) };
        }

        if i_route == j_route {
            // The insertion anchor must survive the removal, and moving
            // after the segment's predecessor is the identity.
            solution.next_vertex_in(j_route, j) != i
        } else {
            solution.route_load(j_route) + seg_demand <= instance.vehicle_capacity()
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

        let i_route = solution.route_index_of(i, j);
        let j_route = solution.route_index_of(j, i);

        let mut segment = [0usize; N];
        let mut v = i;
        for slot in segment.iter_mut() {
            *slot = v;
            v = solution.next_vertex_in(i_route, v);
        }
        let seg_next = v;

        let bits = moves.update_bits_mut();
        for &vertex in segment
            .iter()
            .chain([solution.prev_vertex_in(i_route, i), seg_next, j].iter())
            .chain([solution.next_vertex_in(j_route, j)].iter())
        {
            affected.insert(vertex);
            bits.set_both(vertex);
        }

        for &vertex in &segment {
            solution.remove_vertex(instance, i_route, vertex);
        }
        if i_route != j_route && solution.is_route_empty(i_route) {
            solution.remove_route(i_route);
        }

        let anchor = solution.next_vertex_in(j_route, j);
        for &vertex in &segment {
            solution.insert_vertex_before(instance, j_route, anchor, vertex);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RevRelocateCache {
    v: usize,
    next: usize,
    seg_start: usize,
    removal: f64,
    c_v_next: f64,
}

/// Move the segment of `N` customers ending at `i` to just after `j`,
/// reversed.
pub struct RevSegmentRelocate<const N: usize>;

impl<const N: usize> OperatorHooks for RevSegmentRelocate<N> {
    const SYMMETRIC: bool = false;
    type Cache = RevRelocateCache;

    fn prepare_cache(
        &self,
        instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> RevRelocateCache {
        let route = if vertex == DEPOT {
            solution.route_index(backup)
        } else {
            solution.route_index(vertex)
        };
        let next = solution.next_vertex_in(route, vertex);

        let mut seg_start = vertex;
        for _ in 1..N {
            seg_start = solution.prev_vertex_in(route, seg_start);
        }
        let seg_prev = solution.prev_vertex_in(route, seg_start);

        let removal = instance.cost(seg_prev, next)
            - solution.cost_prev_vertex(route, seg_start)
            - solution.cost_prev_vertex(route, next);

        RevRelocateCache {
            v: vertex,
            next,
            seg_start,
            removal,
            c_v_next: solution.cost_prev_vertex(route, next),
        }
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &RevRelocateCache,
        j: &RevRelocateCache,
    ) -> (f64, f64) {
        // Anchoring right before the segment collapses the formula.
        let delta1 = if j.next == i.seg_start || j.next == i.v {
            0.0
        } else {
            i.removal - j.c_v_next + edge_cost + instance.cost(i.seg_start, j.next)
        };
        let delta2 = if i.next == j.seg_start || i.next == j.v {
            0.0
        } else {
            j.removal - i.c_v_next + edge_cost + instance.cost(j.seg_start, i.next)
        };
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

        if i == DEPOT {
            return false;
        }

        let i_route = solution.route_index(i);
        let j_route = solution.route_index_of(j, i);

        let mut seg_demand = 0i64;
        let mut v = i;
        for step in 0..N {
            if step > 0 {
                v = solution.prev_vertex_in(i_route, v);
                if v == DEPOT {
                    return false;
                }
            }
            if v == j {
                return false;
            }
            seg_demand += instance.demand(v);
        }
        let seg_start = v;

        if i_route == j_route {
            // The anchor's successor must survive the removal.
            let j_next = solution.next_vertex_in(j_route, j);
            j_next != seg_start && j_next != i && {
                // j_next strictly inside the segment means overlap.
                let mut inside = false;
                let mut w = seg_start;
                for _ in 0..N {
                    if w == j_next {
                        inside = true;
                        break;
                    }
                    w = solution.next_vertex_in(i_route, w);
                }
                !inside
            }
        } else {
            solution.route_load(j_route) + seg_demand <= instance.vehicle_capacity()
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

        // Segment in insertion order: i first, then its predecessors.
        let mut segment = [0usize; N];
        let mut v = i;
        for slot in segment.iter_mut() {
            *slot = v;
            v = solution.prev_vertex_in(i_route, v);
        }
        let seg_prev = v;
        let i_next = solution.next_vertex_in(i_route, i);

        let bits = moves.update_bits_mut();
        for &vertex in segment
            .iter()
            .chain([seg_prev, i_next, j].iter())
            .chain([solution.next_vertex_in(j_route, j)].iter())
        {
            affected.insert(vertex);
            bits.set_both(vertex);
        }

        for &vertex in &segment {
            solution.remove_vertex(instance, i_route, vertex);
        }
        if i_route != j_route && solution.is_route_empty(i_route) {
            solution.remove_route(i_route);
        }

        let anchor = solution.next_vertex_in(j_route, j);
        for &vertex in &segment {
            solution.insert_vertex_before(instance, j_route, anchor, vertex);
        }
    }
}
