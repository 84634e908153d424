//! Sparse move-generator registry.
//!
//! A move generator is a candidate vertex pair `(i, j)` carrying a cached
//! cost delta and its position in the improvement heap. Generators are
//! created only for the k nearest neighbors of every vertex and stored
//! pairwise: the generator at even index `2m` represents `(i, j)` and its
//! twin at `2m + 1` represents `(j, i)`, sharing one edge-cost slot.
//!
//! The granularity mechanism activates a per-vertex fraction of the sorted
//! candidates; a generator takes part in the search while it is active for
//! at least one of its endpoints.

use crate::collections::SparseIntSet;
use crate::instance::Instance;

/// Heap position marking a generator that is not currently heaped.
pub const UNHEAPED: i32 = -1;

/// A candidate move `(i, j)` with its cached delta and heap slot.
#[derive(Debug, Clone)]
pub struct MoveGenerator {
    i: u32,
    j: u32,
    delta: f64,
    heap_index: i32,
    computed_for_ejch: bool,
}

impl MoveGenerator {
    fn new(i: usize, j: usize) -> Self {
        MoveGenerator {
            i: i as u32,
            j: j as u32,
            delta: 0.0,
            heap_index: UNHEAPED,
            computed_for_ejch: false,
        }
    }

    #[inline]
    pub fn first_vertex(&self) -> usize {
        self.i as usize
    }

    #[inline]
    pub fn second_vertex(&self) -> usize {
        self.j as usize
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    #[inline]
    pub fn set_delta(&mut self, delta: f64) {
        self.delta = delta;
    }

    #[inline]
    pub fn heap_index(&self) -> i32 {
        self.heap_index
    }

    #[inline]
    pub fn set_heap_index(&mut self, index: i32) {
        self.heap_index = index;
    }

    /// Whether the ejection chain already derived a relocation delta for
    /// this generator in the current cycle.
    #[inline]
    pub fn is_computed_for_ejch(&self) -> bool {
        self.computed_for_ejch
    }

    #[inline]
    pub fn set_computed_for_ejch(&mut self, value: bool) {
        self.computed_for_ejch = value;
    }
}

/// Binary min-heap over move-generator indices keyed by delta. Every
/// generator stores its own heap position, so delete and decrease-key work
/// directly from a generator reference.
#[derive(Debug, Default, Clone)]
struct MoveHeap {
    entries: Vec<u32>,
}

impl MoveHeap {
    fn reset(&mut self, moves: &mut [MoveGenerator]) {
        for &entry in &self.entries {
            moves[entry as usize].heap_index = UNHEAPED;
        }
        self.entries.clear();
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn at(&self, position: usize) -> usize {
        self.entries[position] as usize
    }

    fn insert(&mut self, moves: &mut [MoveGenerator], index: usize) {
        debug_assert_eq!(moves[index].heap_index, UNHEAPED);
        let position = self.entries.len();
        self.entries.push(index as u32);
        moves[index].heap_index = position as i32;
        self.sift_up(moves, position);
    }

    fn remove(&mut self, moves: &mut [MoveGenerator], position: usize) {
        moves[self.entries[position] as usize].heap_index = UNHEAPED;
        let last = self.entries.pop().expect("heap underflow");
        if position < self.entries.len() {
            let displaced_delta = moves[last as usize].delta;
            let removed_delta_was_smaller =
                displaced_delta > moves_delta_at(moves, &self.entries, position);
            self.entries[position] = last;
            moves[last as usize].heap_index = position as i32;
            if removed_delta_was_smaller {
                self.sift_down(moves, position);
            } else {
                self.sift_up(moves, position);
            }
        }
    }

    fn change_value(&mut self, moves: &mut [MoveGenerator], position: usize, delta: f64) {
        let index = self.entries[position] as usize;
        let old = moves[index].delta;
        moves[index].delta = delta;
        if delta < old {
            self.sift_up(moves, position);
        } else if delta > old {
            self.sift_down(moves, position);
        }
    }

    fn sift_up(&mut self, moves: &mut [MoveGenerator], mut position: usize) {
        while position > 0 {
            let parent = (position - 1) / 2;
            let curr = self.entries[position] as usize;
            let par = self.entries[parent] as usize;
            if moves[curr].delta < moves[par].delta {
                self.entries.swap(position, parent);
                moves[curr].heap_index = parent as i32;
                moves[par].heap_index = position as i32;
                position = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, moves: &mut [MoveGenerator], mut position: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * position + 1;
            let right = 2 * position + 2;
            let mut smallest = position;
            if left < len
                && moves[self.entries[left] as usize].delta
                    < moves[self.entries[smallest] as usize].delta
            {
                smallest = left;
            }
            if right < len
                && moves[self.entries[right] as usize].delta
                    < moves[self.entries[smallest] as usize].delta
            {
                smallest = right;
            }
            if smallest == position {
                break;
            }
            let a = self.entries[position] as usize;
            let b = self.entries[smallest] as usize;
            self.entries.swap(position, smallest);
            moves[a].heap_index = smallest as i32;
            moves[b].heap_index = position as i32;
            position = smallest;
        }
    }
}

#[inline]
fn moves_delta_at(moves: &[MoveGenerator], entries: &[u32], position: usize) -> f64 {
    moves[entries[position] as usize].delta
}

/// Per-vertex flags telling the update phase which candidate directions
/// need a refresh after a move application: `first` marks generators
/// `(v, j)`, `second` marks generators `(j, v)`.
#[derive(Debug, Clone)]
pub struct UpdateBits {
    first: Vec<bool>,
    second: Vec<bool>,
}

impl UpdateBits {
    fn new(n: usize) -> Self {
        UpdateBits {
            first: vec![false; n],
            second: vec![false; n],
        }
    }

    #[inline]
    pub fn set_first(&mut self, vertex: usize) {
        self.first[vertex] = true;
    }

    #[inline]
    pub fn set_second(&mut self, vertex: usize) {
        self.second[vertex] = true;
    }

    #[inline]
    pub fn set_both(&mut self, vertex: usize) {
        self.first[vertex] = true;
        self.second[vertex] = true;
    }

    #[inline]
    pub fn first(&self, vertex: usize) -> bool {
        self.first[vertex]
    }

    #[inline]
    pub fn second(&self, vertex: usize) -> bool {
        self.second[vertex]
    }

    #[inline]
    pub fn reset(&mut self, vertex: usize) {
        self.first[vertex] = false;
        self.second[vertex] = false;
    }
}

/// Registry of k-nearest-neighbor move generators with granular
/// activation, the improvement heap and the timestamp bookkeeping shared
/// by the local search operators.
pub struct MoveGenerators {
    max_neighbors: usize,
    moves: Vec<MoveGenerator>,
    /// One entry per `(i, j)`/`(j, i)` pair.
    edge_costs: Vec<f64>,
    /// Even (base) generator indices touching each vertex, sorted by edge
    /// cost.
    base_indices: Vec<Vec<u32>>,
    /// Active generators `(v, j)` for each vertex `v`, deduplicated by
    /// second endpoint.
    active_1st: Vec<Vec<u32>>,
    current_neighbors: Vec<usize>,
    /// Per pair: active because of the first / second endpoint.
    active_in_1st: Vec<bool>,
    active_in_2nd: Vec<bool>,
    heap: MoveHeap,
    timestamp: u64,
    vertex_timestamp: Vec<u64>,
    update_bits: UpdateBits,
    // Scratch, kept to avoid re-allocations.
    vertices_in_updated_moves: SparseIntSet,
    unique_endpoints: SparseIntSet,
    unique_move_generators: Vec<u32>,
}

impl MoveGenerators {
    /// Build the registry for the `k` nearest neighbors of every vertex.
    pub fn new(instance: &Instance, k: usize) -> Self {
        let n = instance.vertices_num();
        // neighbors[v][0] == v, so at most n - 1 proper neighbors exist.
        let max_neighbors = k.min(n - 1);

        let mut moves: Vec<MoveGenerator> = Vec::new();
        let mut edge_costs: Vec<f64> = Vec::new();
        let mut base_indices: Vec<Vec<u32>> = vec![Vec::new(); n];

        let mut insert_pair = |moves: &mut Vec<MoveGenerator>,
                               edge_costs: &mut Vec<f64>,
                               base_indices: &mut Vec<Vec<u32>>,
                               a: usize,
                               b: usize,
                               cost: f64| {
            let base_idx = moves.len() as u32;
            moves.push(MoveGenerator::new(a, b));
            moves.push(MoveGenerator::new(b, a));
            edge_costs.push(cost);
            base_indices[a].push(base_idx);
            base_indices[b].push(base_idx);
        };

        for i in instance.vertices() {
            let neighbors = instance.neighbors(i);
            let end = (1 + max_neighbors).min(neighbors.len());
            for &j in &neighbors[1..end] {
                debug_assert!(i != j);
                let c_ij = instance.cost(i, j);

                if i < j {
                    insert_pair(&mut moves, &mut edge_costs, &mut base_indices, i, j, c_ij);
                    continue;
                }

                // `i > j`: the pair may already exist from `j`'s scan. It
                // does not when `i` is farther from `j` than `j`'s k-th
                // neighbor, or ties with it and lost the dedup race.
                let j_neighbors = instance.neighbors(j);
                let j_end = (1 + max_neighbors).min(j_neighbors.len());
                let c_jn = instance.cost(j, j_neighbors[j_end - 1]);
                if c_ij > c_jn + 1e-5 {
                    insert_pair(&mut moves, &mut edge_costs, &mut base_indices, j, i, c_ij);
                } else if (c_ij - c_jn).abs() < 1e-5 {
                    let duplicate = base_indices[j].iter().any(|&idx| {
                        let mv = &moves[idx as usize];
                        mv.second_vertex() == i || mv.first_vertex() == i
                    });
                    if !duplicate {
                        insert_pair(&mut moves, &mut edge_costs, &mut base_indices, j, i, c_ij);
                    }
                }
            }
        }

        for list in &mut base_indices {
            list.sort_by(|&a, &b| {
                let ca = edge_costs[(a / 2) as usize];
                let cb = edge_costs[(b / 2) as usize];
                ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let pairs = moves.len() / 2;
        MoveGenerators {
            max_neighbors,
            moves,
            edge_costs,
            base_indices,
            active_1st: vec![Vec::new(); n],
            current_neighbors: vec![0; n],
            active_in_1st: vec![false; pairs],
            active_in_2nd: vec![false; pairs],
            heap: MoveHeap::default(),
            timestamp: 0,
            vertex_timestamp: vec![0; n],
            update_bits: UpdateBits::new(n),
            vertices_in_updated_moves: SparseIntSet::new(n),
            unique_endpoints: SparseIntSet::new(n),
            unique_move_generators: Vec::new(),
        }
    }

    /// Total number of stored generators (twins included).
    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &MoveGenerator {
        &self.moves[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut MoveGenerator {
        &mut self.moves[index]
    }

    /// Twin of a generator: `(i, j)` <-> `(j, i)`.
    #[inline]
    pub fn twin_index(index: usize) -> usize {
        index ^ 1
    }

    /// Even index representing the unordered pair of a generator.
    #[inline]
    pub fn base_index(index: usize) -> usize {
        index & !1
    }

    /// Cost of the edge underlying the generator at `index`.
    #[inline]
    pub fn edge_cost(&self, index: usize) -> f64 {
        self.edge_costs[index / 2]
    }

    /// Active generators `(vertex, j)`.
    #[inline]
    pub fn indices_involving_1st(&self, vertex: usize) -> &[u32] {
        &self.active_1st[vertex]
    }

    /// Even base indices of every generator touching `vertex`, active or
    /// not.
    #[inline]
    pub fn base_indices_involving(&self, vertex: usize) -> &[u32] {
        &self.base_indices[vertex]
    }

    /// Apply the granularity vector to `vertices`: activate or deactivate
    /// candidates so that `round(percentage[v] * k)` of each vertex's
    /// sorted candidate list is active, then rebuild the per-vertex active
    /// lists of every touched endpoint.
    pub fn set_active_percentage(&mut self, percentage: &[f64], vertices: &[usize]) {
        self.vertices_in_updated_moves.clear();

        for &vertex in vertices {
            let wanted = (percentage[vertex] * self.max_neighbors as f64).round() as usize;
            let wanted = wanted.min(self.base_indices[vertex].len());
            let current = self.current_neighbors[vertex];
            if wanted == current {
                continue;
            }

            if wanted < current {
                for n in wanted..current {
                    let idx = self.base_indices[vertex][n] as usize;
                    self.set_not_active_in(idx, vertex);
                    let mv = &self.moves[idx];
                    self.vertices_in_updated_moves.insert(mv.first_vertex());
                    self.vertices_in_updated_moves.insert(mv.second_vertex());
                }
            } else {
                for n in current..wanted {
                    let idx = self.base_indices[vertex][n] as usize;
                    self.set_active_in(idx, vertex);
                    let mv = &self.moves[idx];
                    self.vertices_in_updated_moves.insert(mv.first_vertex());
                    self.vertices_in_updated_moves.insert(mv.second_vertex());
                }
            }

            self.current_neighbors[vertex] = wanted;
        }

        // Rebuild the active candidate list of every endpoint touched by an
        // activation change. A generator may stay active through its other
        // endpoint, so all base indices are rescanned.
        let updated: Vec<usize> = self.vertices_in_updated_moves.elements().to_vec();
        for vertex in updated {
            self.unique_move_generators.clear();
            self.unique_endpoints.clear();

            for n in 0..self.base_indices[vertex].len() {
                let base_idx = self.base_indices[vertex][n] as usize;
                if !self.is_active_in_any(base_idx) {
                    continue;
                }
                let idx = if self.moves[base_idx].first_vertex() == vertex {
                    base_idx
                } else {
                    Self::twin_index(base_idx)
                };
                let j = self.moves[idx].second_vertex();
                if !self.unique_endpoints.contains(j) {
                    self.unique_endpoints.insert(j);
                    self.unique_move_generators.push(idx as u32);
                }
            }

            self.active_1st[vertex].clear();
            self.active_1st[vertex]
                .extend_from_slice(&self.unique_move_generators);
        }
    }

    // ----- heap -----

    pub fn heap_reset(&mut self) {
        self.heap.reset(&mut self.moves);
    }

    #[inline]
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Generator index stored at heap array position `position`.
    #[inline]
    pub fn heap_at(&self, position: usize) -> usize {
        self.heap.at(position)
    }

    pub fn heap_insert(&mut self, index: usize) {
        self.heap.insert(&mut self.moves, index);
    }

    pub fn heap_remove(&mut self, position: usize) {
        self.heap.remove(&mut self.moves, position);
    }

    pub fn heap_change_value(&mut self, position: usize, delta: f64) {
        self.heap.change_value(&mut self.moves, position, delta);
    }

    /// Re-key helper used by the update phase: keep improving generators
    /// heaped with a fresh delta, drop the rest.
    pub fn heap_refresh(&mut self, index: usize, delta: f64, tolerance: f64) {
        let heap_index = self.moves[index].heap_index;
        if delta > -tolerance {
            if heap_index != UNHEAPED {
                self.heap.remove(&mut self.moves, heap_index as usize);
            }
            self.moves[index].delta = delta;
        } else if heap_index == UNHEAPED {
            self.moves[index].delta = delta;
            self.heap.insert(&mut self.moves, index);
        } else {
            self.heap.change_value(&mut self.moves, heap_index as usize, delta);
        }
    }

    // ----- timestamps and update bits -----

    /// Timestamp for the next initialization or update sweep.
    #[inline]
    pub fn next_timestamp(&self) -> u64 {
        self.timestamp + 1
    }

    #[inline]
    pub fn bump_timestamp(&mut self) {
        self.timestamp += 1;
    }

    #[inline]
    pub fn vertex_stamp(&self, vertex: usize) -> u64 {
        self.vertex_timestamp[vertex]
    }

    #[inline]
    pub fn stamp_vertex(&mut self, vertex: usize, stamp: u64) {
        self.vertex_timestamp[vertex] = stamp;
    }

    #[inline]
    pub fn update_bits(&self) -> &UpdateBits {
        &self.update_bits
    }

    #[inline]
    pub fn update_bits_mut(&mut self) -> &mut UpdateBits {
        &mut self.update_bits
    }

    // ----- internals -----

    fn set_active_in(&mut self, base_idx: usize, vertex: usize) {
        let pair = base_idx / 2;
        if self.moves[base_idx].first_vertex() == vertex {
            self.active_in_1st[pair] = true;
        } else {
            self.active_in_2nd[pair] = true;
        }
    }

    fn set_not_active_in(&mut self, base_idx: usize, vertex: usize) {
        let pair = base_idx / 2;
        if self.moves[base_idx].first_vertex() == vertex {
            self.active_in_1st[pair] = false;
        } else {
            self.active_in_2nd[pair] = false;
        }
    }

    fn is_active_in_any(&self, base_idx: usize) -> bool {
        let pair = base_idx / 2;
        self.active_in_1st[pair] || self.active_in_2nd[pair]
    }
}
