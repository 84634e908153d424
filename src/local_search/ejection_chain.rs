//! Ejection chain: a relocation whose immediate effect overloads the
//! destination route, repaired by a sequence of further relocations found
//! with a best-first search over a tree of partial chains.
//!
//! Each tree node carries the cumulative delta of its chain, a snapshot of
//! the route loads it modified, and forbid sets preventing the chain from
//! revisiting vertices whose context it already changed. A node whose last
//! relocation makes both touched routes feasible commits the whole chain.

use std::collections::BinaryHeap;

use crate::collections::{SmallVecMap, SmallVecSet, SparseIntSet};
use crate::instance::{Instance, DEPOT};
use crate::movegen::{MoveGenerators, UNHEAPED};
use crate::solution::Solution;

use super::OperatorHooks;

/// Cap on the relocation tree size, which also bounds the chain length.
const MAX_RELOCATION_NODES: usize = 25;

const NO_NODE: i32 = -1;

#[derive(Debug, Clone, Default)]
struct Relocation {
    predecessor: i32,
    delta_sum: f64,
    move_index: u32,
    /// Route that the relocation of this node overloads.
    overfull_route: usize,
    modified_loads: SmallVecMap,
}

/// Frontier entry ordered by cumulative delta, smallest first.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    delta_sum: f64,
    node: u16,
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the minimum delta.
        other
            .delta_sum
            .partial_cmp(&self.delta_sum)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

pub struct EjectionChain {
    tolerance: f64,
    nodes: Vec<Relocation>,
    forbidden_i: Vec<SmallVecSet>,
    forbidden_j: Vec<SmallVecSet>,
    frontier: BinaryHeap<Frontier>,
    feasible_node: i32,
    computed_moves: Vec<u32>,
}

impl EjectionChain {
    pub fn new(tolerance: f64) -> Self {
        EjectionChain {
            tolerance,
            nodes: vec![Relocation::default(); MAX_RELOCATION_NODES],
            forbidden_i: vec![SmallVecSet::default(); MAX_RELOCATION_NODES],
            forbidden_j: vec![SmallVecSet::default(); MAX_RELOCATION_NODES],
            frontier: BinaryHeap::new(),
            feasible_node: NO_NODE,
            computed_moves: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EjchCache {
    v: usize,
    prev: usize,
    next: usize,
    /// Gain of removing v from its route.
    vrem: f64,
    /// Cost freed at v when something is inserted right before it.
    prevrem: f64,
}

impl OperatorHooks for EjectionChain {
    const SYMMETRIC: bool = false;
    type Cache = EjchCache;

    fn prepare_cache(
        &self,
        instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> EjchCache {
        let route = if vertex == DEPOT {
            solution.route_index(backup)
        } else {
            solution.route_index(vertex)
        };
        let prev = solution.prev_vertex_in(route, vertex);
        let next = solution.next_vertex_in(route, vertex);
        let vrem = -solution.cost_prev_vertex(route, vertex)
            - solution.cost_prev_vertex(route, next)
            + instance.cost(prev, next);
        EjchCache {
            v: vertex,
            prev,
            next,
            vrem,
            prevrem: -solution.cost_prev_vertex(route, vertex),
        }
    }

    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        i: &EjchCache,
        j: &EjchCache,
    ) -> (f64, f64) {
        // Relocate i to just before j; moving onto the own successor is
        // the identity.
        let delta1 = if j.v != i.next {
            i.vrem + j.prevrem + instance.cost(j.prev, i.v) + edge_cost
        } else {
            0.0
        };
        let delta2 = if i.v != j.next {
            j.vrem + i.prevrem + instance.cost(i.prev, j.v) + edge_cost
        } else {
            0.0
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
        self.feasible_node = NO_NODE;

        let generating = moves.get(index);
        let i = generating.first_vertex();
        let j = generating.second_vertex();
        let generating_delta = generating.delta();

        let i_route = solution.route_index_of(i, j);
        let j_route = solution.route_index_of(j, i);

        let i_prev = solution.prev_vertex_in(i_route, i);
        let i_next = solution.next_vertex_in(i_route, i);
        let j_prev = solution.prev_vertex_in(j_route, j);

        if j == i_next {
            return false;
        }

        // The depot's demand is zero, so the load arithmetic also covers
        // the route re-rooting seed.
        let i_demand = instance.demand(i);

        // The seed relocation may already be feasible on its own.
        if i_route == j_route
            || solution.route_load(j_route) + i_demand <= instance.vehicle_capacity()
        {
            self.feasible_node = 0;
            self.nodes[0].move_index = index as u32;
            self.nodes[0].predecessor = NO_NODE;
            self.forbidden_i[0].clear();
            self.forbidden_j[0].clear();
            for &v in &[i_prev, i, i_next, j_prev, j] {
                self.forbidden_i[0].insert(v);
            }
            return true;
        }

        // Root of the relocation tree: the overloading seed move.
        let mut count = 1usize;
        self.nodes[0].predecessor = NO_NODE;
        self.nodes[0].delta_sum = generating_delta;
        self.nodes[0].move_index = index as u32;
        self.nodes[0].overfull_route = j_route;
        self.nodes[0].modified_loads.clear();
        self.nodes[0]
            .modified_loads
            .set(i_route, solution.route_load(i_route) - i_demand);
        self.nodes[0]
            .modified_loads
            .set(j_route, solution.route_load(j_route) + i_demand);

        self.forbidden_i[0].clear();
        self.forbidden_i[0].insert(i_prev);
        self.forbidden_i[0].insert(j_prev);
        self.forbidden_j[0].clear();
        self.forbidden_j[0].insert(i);
        self.forbidden_j[0].insert(i_next);
        self.forbidden_j[0].insert(j);

        self.frontier.clear();
        self.frontier.push(Frontier {
            delta_sum: generating_delta,
            node: 0,
        });

        'search: while let Some(entry) = self.frontier.pop() {
            let curr_index = entry.node as usize;
            let curr_delta_sum = self.nodes[curr_index].delta_sum;
            let over_route = self.nodes[curr_index].overfull_route;
            let over_load = self.nodes[curr_index]
                .modified_loads
                .get(over_route)
                .expect("overfull route load must be tracked");

            // Scan the overloaded route for customers whose ejection
            // restores its feasibility.
            let mut v = solution.first_customer(over_route);
            while v != DEPOT {
                let v_demand = instance.demand(v);
                if over_load - v_demand > instance.vehicle_capacity() {
                    v = solution.next_vertex(v);
                    continue;
                }
                if self.forbidden_i[curr_index].contains(v)
                    || self.forbidden_j[curr_index].contains(v)
                {
                    v = solution.next_vertex(v);
                    continue;
                }

                let v_prev = solution.prev_vertex_in(over_route, v);
                let v_next = solution.next_vertex_in(over_route, v);

                // The cost matrix is the expensive part; derive the
                // ejection gain lazily and cache relocation deltas on the
                // generators themselves.
                let mut v_cost = 0.0;
                let mut v_cost_computed = false;

                for pos in 0..moves.indices_involving_1st(v).len() {
                    let move_index = moves.indices_involving_1st(v)[pos] as usize;
                    let w = moves.get(move_index).second_vertex();

                    if w == DEPOT || self.forbidden_j[curr_index].contains(w) {
                        continue;
                    }
                    let w_route = solution.route_index(w);
                    if w_route == over_route {
                        continue;
                    }

                    let w_load = self.nodes[curr_index]
                        .modified_loads
                        .get(w_route)
                        .unwrap_or_else(|| solution.route_load(w_route));
                    let w_prev = solution.prev_vertex_in(w_route, w);

                    if moves.get(move_index).heap_index() == UNHEAPED
                        && !moves.get(move_index).is_computed_for_ejch()
                    {
                        if !v_cost_computed {
                            v_cost = -solution.cost_prev_customer(v)
                                - solution.cost_prev_vertex(over_route, v_next)
                                + instance.cost(v_prev, v_next);
                            v_cost_computed = true;
                        }
                        let delta = v_cost - solution.cost_prev_customer(w)
                            + instance.cost(w_prev, v)
                            + moves.edge_cost(move_index);
                        let mv = moves.get_mut(move_index);
                        mv.set_delta(delta);
                        mv.set_computed_for_ejch(true);
                        self.computed_moves.push(move_index as u32);
                    }

                    // Only chains that keep improving are worth growing.
                    let delta = moves.get(move_index).delta();
                    if delta + curr_delta_sum > -self.tolerance {
                        continue;
                    }

                    // Attach the child node.
                    let node = count;
                    {
                        let (head, tail) = self.nodes.split_at_mut(node);
                        tail[0].predecessor = curr_index as i32;
                        tail[0].delta_sum = curr_delta_sum + delta;
                        tail[0].move_index = move_index as u32;
                        tail[0].overfull_route = w_route;
                        tail[0]
                            .modified_loads
                            .clone_from_map(&head[curr_index].modified_loads);
                        tail[0].modified_loads.set(over_route, over_load - v_demand);
                        tail[0].modified_loads.set(w_route, w_load + v_demand);
                    }
                    {
                        let (head, tail) = self.forbidden_i.split_at_mut(node);
                        tail[0].clone_from_set(&head[curr_index]);
                        tail[0].insert(v_prev);
                        tail[0].insert(w_prev);
                    }
                    {
                        let (head, tail) = self.forbidden_j.split_at_mut(node);
                        tail[0].clone_from_set(&head[curr_index]);
                        tail[0].insert(v);
                        tail[0].insert(v_next);
                        tail[0].insert(w);
                    }

                    self.frontier.push(Frontier {
                        delta_sum: self.nodes[node].delta_sum,
                        node: node as u16,
                    });

                    // Both routes feasible: the chain is complete.
                    if w_load + v_demand <= instance.vehicle_capacity() {
                        self.feasible_node = node as i32;
                        break 'search;
                    }

                    count += 1;
                    if count == MAX_RELOCATION_NODES {
                        break 'search;
                    }
                }

                v = solution.next_vertex(v);
            }
        }

        self.feasible_node != NO_NODE
    }

    fn execute(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        _index: usize,
        affected: &mut SparseIntSet,
    ) {
        debug_assert!(self.feasible_node != NO_NODE);
        let feasible = self.feasible_node as usize;

        for &v in self.forbidden_i[feasible].elements() {
            affected.insert(v);
        }
        for &v in self.forbidden_j[feasible].elements() {
            affected.insert(v);
        }

        // Cached relocation deltas around the chain are about to go stale.
        for &v in affected.elements() {
            for pos in 0..moves.base_indices_involving(v).len() {
                let base = moves.base_indices_involving(v)[pos] as usize;
                moves.get_mut(base).set_computed_for_ejch(false);
                moves
                    .get_mut(MoveGenerators::twin_index(base))
                    .set_computed_for_ejch(false);
            }
        }

        // Apply the chain back to front: later relocations free the
        // capacity the earlier ones rely on.
        let mut ptr = self.feasible_node;
        while ptr != NO_NODE {
            let move_index = self.nodes[ptr as usize].move_index as usize;
            let mv = moves.get(move_index);
            let i = mv.first_vertex();
            let j = mv.second_vertex();

            let i_route = solution.route_index_of(i, j);
            let j_route = solution.route_index_of(j, i);

            let i_prev = solution.prev_vertex_in(i_route, i);
            let i_next = solution.next_vertex_in(i_route, i);
            let j_prev = solution.prev_vertex_in(j_route, j);

            let bits = moves.update_bits_mut();
            for &vertex in &[i_prev, i, i_next, j_prev, j] {
                affected.insert(vertex);
                bits.set_both(vertex);
            }

            solution.remove_vertex(instance, i_route, i);
            solution.insert_vertex_before(instance, j_route, j, i);

            if solution.is_route_empty(i_route) {
                solution.remove_route(i_route);
            }

            ptr = self.nodes[ptr as usize].predecessor;
        }
    }

    fn post_processing(&mut self, moves: &mut MoveGenerators) {
        for &move_index in &self.computed_moves {
            let base = MoveGenerators::base_index(move_index as usize);
            moves.get_mut(base).set_computed_for_ejch(false);
            moves
                .get_mut(MoveGenerators::twin_index(base))
                .set_computed_for_ejch(false);
        }
        self.computed_moves.clear();
    }
}
