//! Local search operators and their shared driver.
//!
//! Every operator implements [`OperatorHooks`]: a per-vertex cache, a
//! closed-form cost delta for both orientations of a candidate pair, a
//! feasibility predicate and a mutation. The generic [`CommonOperator`]
//! supplies the search skeleton shared by the whole family:
//!
//! - an initialization phase that evaluates only candidates around
//!   recently modified vertices and heaps the improving ones,
//! - a rough-best-improvement scan over the heap array that applies
//!   feasible improving moves and restarts from the top,
//! - an update phase that re-evaluates only the candidates of vertices
//!   affected by the last application, guided by per-vertex update bits.

pub mod ejection_chain;
pub mod exchange;
pub mod relocate;
pub mod split_exchange;
pub mod tails;
pub mod two_opt;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::collections::SparseIntSet;
use crate::instance::{Instance, DEPOT};
use crate::movegen::{MoveGenerators, UNHEAPED};
use crate::solution::Solution;

use ejection_chain::EjectionChain;
use exchange::SegmentExchange;
use relocate::{RevSegmentRelocate, SegmentRelocate};
use split_exchange::SplitExchange;
use tails::TailsExchange;
use two_opt::TwoOptExchange;

/// The closed, enumerable set of supported neighborhoods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    /// Relocate one customer.
    E10,
    /// Swap a customer with the predecessor of another.
    E11,
    /// Relocate a segment of two customers.
    E20,
    /// Exchange a two-customer segment with one customer.
    E21,
    /// Exchange two two-customer segments.
    E22,
    /// Relocate a segment of three customers.
    E30,
    /// Exchange a three-customer segment with one customer.
    E31,
    /// Exchange a three-customer segment with a two-customer segment.
    E32,
    /// Exchange two three-customer segments.
    E33,
    /// Relocate a reversed two-customer segment.
    RE20,
    /// Exchange with the two-customer segment inserted reversed.
    RE21,
    RE22,
    /// Relocate a reversed three-customer segment.
    RE30,
    RE31,
    RE32,
    RE33,
    /// Intra-route 2-opt.
    TWOPT,
    /// Inter-route crossover with reversal.
    SPLIT,
    /// Inter-route tail swap.
    TAILS,
    /// Ejection chain.
    EJCH,
}

/// Operator list used by the base descent tier.
pub const BASE_OPERATORS: &[OperatorId] = &[
    OperatorId::E11,
    OperatorId::E10,
    OperatorId::TAILS,
    OperatorId::SPLIT,
    OperatorId::RE22,
    OperatorId::E22,
    OperatorId::RE20,
    OperatorId::RE21,
    OperatorId::E21,
    OperatorId::E20,
    OperatorId::TWOPT,
    OperatorId::RE30,
    OperatorId::E30,
    OperatorId::RE33,
    OperatorId::E33,
    OperatorId::RE31,
    OperatorId::RE32,
    OperatorId::E31,
    OperatorId::E32,
];

/// Per-operator behavior plugged into [`CommonOperator`].
pub trait OperatorHooks {
    /// Whether the cost delta is identical for `(i, j)` and `(j, i)`; if
    /// so only the base generator of each pair is searched.
    const SYMMETRIC: bool;

    /// Per-vertex route context captured once per vertex and reused across
    /// all its candidates.
    type Cache;

    /// Capture the route context of `vertex`. `backup` identifies the
    /// route when `vertex` is the depot and must not be the depot itself.
    fn prepare_cache(
        &self,
        instance: &Instance,
        solution: &Solution,
        vertex: usize,
        backup: usize,
    ) -> Self::Cache;

    /// Cost deltas of `(i, j)` and `(j, i)` from cached contexts, where
    /// `i` is the vertex cached by `icache`. `edge_cost` is the cost of
    /// the underlying edge. Symmetric operators return the same value
    /// twice.
    fn compute_cost_pair(
        &self,
        instance: &Instance,
        edge_cost: f64,
        icache: &Self::Cache,
        jcache: &Self::Cache,
    ) -> (f64, f64);

    /// Whether applying the generator at `index` keeps the solution
    /// feasible (and structurally valid).
    fn is_feasible(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        index: usize,
    ) -> bool;

    /// Apply the generator at `index`, collecting every vertex whose
    /// candidates need re-evaluation into `affected` and raising its
    /// update bits.
    fn execute(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        index: usize,
        affected: &mut SparseIntSet,
    );

    /// Cleanup at the end of an operator cycle.
    fn post_processing(&mut self, _moves: &mut MoveGenerators) {}
}

/// Object-safe face of an operator cycle, used by the descent schedulers.
pub trait LocalSearchOperator {
    fn apply_rough_best_improvement(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
    ) -> bool;
}

/// Generic driver wrapping an [`OperatorHooks`] implementation.
pub struct CommonOperator<O: OperatorHooks> {
    hooks: O,
    tolerance: f64,
    /// When set, candidates with an unserved endpoint are skipped, which
    /// lets the same operators run on partial solutions.
    partial: bool,
    affected: SparseIntSet,
    scratch: Vec<usize>,
}

impl<O: OperatorHooks> CommonOperator<O> {
    pub fn new(hooks: O, vertices_num: usize, tolerance: f64, partial: bool) -> Self {
        CommonOperator {
            hooks,
            tolerance,
            partial,
            affected: SparseIntSet::new(vertices_num),
            scratch: Vec::new(),
        }
    }

    fn initialize_descriptors(
        &mut self,
        instance: &Instance,
        solution: &Solution,
        moves: &mut MoveGenerators,
    ) {
        let stamp = moves.next_timestamp();
        let mut depot_seen = false;

        for i in solution.svc_iter() {
            if self.partial && !solution.is_vertex_served(i) {
                continue;
            }
            // The depot needs a per-candidate cache, handle it last.
            if i == DEPOT {
                depot_seen = true;
                continue;
            }

            let icache = self.hooks.prepare_cache(instance, solution, i, i);

            for pos in 0..moves.indices_involving_1st(i).len() {
                let move_index = moves.indices_involving_1st(i)[pos] as usize;
                let j = moves.get(move_index).second_vertex();

                if self.partial && !solution.is_vertex_served(j) {
                    continue;
                }
                // `(j, i)` was already seeded while scanning j's candidates.
                if moves.vertex_stamp(j) == stamp {
                    continue;
                }

                let jcache = self.hooks.prepare_cache(instance, solution, j, i);
                self.seed_pair(instance, moves, move_index, &icache, &jcache);
            }

            moves.stamp_vertex(i, stamp);
        }

        if depot_seen {
            for pos in 0..moves.indices_involving_1st(DEPOT).len() {
                let move_index = moves.indices_involving_1st(DEPOT)[pos] as usize;
                let j = moves.get(move_index).second_vertex();

                if self.partial && !solution.is_vertex_served(j) {
                    continue;
                }
                if moves.vertex_stamp(j) == stamp {
                    continue;
                }

                let icache = self.hooks.prepare_cache(instance, solution, DEPOT, j);
                let jcache = self.hooks.prepare_cache(instance, solution, j, j);
                self.seed_pair(instance, moves, move_index, &icache, &jcache);
            }
            moves.stamp_vertex(DEPOT, stamp);
        }

        moves.bump_timestamp();
    }

    /// Evaluate one candidate pair during initialization and heap the
    /// improving orientations.
    fn seed_pair(
        &mut self,
        instance: &Instance,
        moves: &mut MoveGenerators,
        move_index: usize,
        icache: &O::Cache,
        jcache: &O::Cache,
    ) {
        let edge = moves.edge_cost(move_index);
        if O::SYMMETRIC {
            let base = MoveGenerators::base_index(move_index);
            let (delta, _) = self.hooks.compute_cost_pair(instance, edge, icache, jcache);
            let mv = moves.get_mut(base);
            mv.set_delta(delta);
            mv.set_heap_index(UNHEAPED);
            if delta < -self.tolerance {
                moves.heap_insert(base);
            }
        } else {
            let (delta1, delta2) = self.hooks.compute_cost_pair(instance, edge, icache, jcache);
            let twin = MoveGenerators::twin_index(move_index);

            let mv = moves.get_mut(move_index);
            mv.set_delta(delta1);
            mv.set_heap_index(UNHEAPED);
            if delta1 < -self.tolerance {
                moves.heap_insert(move_index);
            }

            let tw = moves.get_mut(twin);
            tw.set_delta(delta2);
            tw.set_heap_index(UNHEAPED);
            if delta2 < -self.tolerance {
                moves.heap_insert(twin);
            }
        }
    }

    fn descriptors_update(
        &mut self,
        instance: &Instance,
        solution: &Solution,
        moves: &mut MoveGenerators,
    ) {
        let stamp = moves.next_timestamp();

        self.scratch.clear();
        self.scratch.extend_from_slice(self.affected.elements());
        let mut depot_seen = false;

        for k in 0..self.scratch.len() {
            let i = self.scratch[k];
            if self.partial && !solution.is_vertex_served(i) {
                continue;
            }
            if i == DEPOT {
                depot_seen = true;
                continue;
            }

            let up_ij = moves.update_bits().first(i);
            let up_ji = moves.update_bits().second(i);
            if !up_ij && !up_ji {
                moves.stamp_vertex(i, stamp);
                continue;
            }

            let icache = self.hooks.prepare_cache(instance, solution, i, i);

            for pos in 0..moves.indices_involving_1st(i).len() {
                let move_index = moves.indices_involving_1st(i)[pos] as usize;
                let j = moves.get(move_index).second_vertex();

                if self.partial && !solution.is_vertex_served(j) {
                    continue;
                }
                self.refresh_pair(
                    instance, solution, moves, move_index, i, j, &icache, up_ij, up_ji, stamp,
                );
            }

            moves.stamp_vertex(i, stamp);
        }

        if depot_seen {
            let up_ij = moves.update_bits().first(DEPOT);
            let up_ji = moves.update_bits().second(DEPOT);
            if up_ij || up_ji {
                for pos in 0..moves.indices_involving_1st(DEPOT).len() {
                    let move_index = moves.indices_involving_1st(DEPOT)[pos] as usize;
                    let j = moves.get(move_index).second_vertex();

                    if self.partial && !solution.is_vertex_served(j) {
                        continue;
                    }
                    let icache = self.hooks.prepare_cache(instance, solution, DEPOT, j);
                    self.refresh_pair(
                        instance, solution, moves, move_index, DEPOT, j, &icache, up_ij, up_ji,
                        stamp,
                    );
                }
            }
            moves.stamp_vertex(DEPOT, stamp);
        }

        for k in 0..self.scratch.len() {
            let i = self.scratch[k];
            moves.update_bits_mut().reset(i);
        }

        moves.bump_timestamp();
    }

    /// Re-evaluate the orientations of one candidate pair that the update
    /// bits of `i` request and that `j`'s earlier sweep did not already
    /// cover.
    #[allow(clippy::too_many_arguments)]
    fn refresh_pair(
        &mut self,
        instance: &Instance,
        solution: &Solution,
        moves: &mut MoveGenerators,
        move_index: usize,
        i: usize,
        j: usize,
        icache: &O::Cache,
        up_ij: bool,
        up_ji: bool,
        stamp: u64,
    ) {
        let j_processed = moves.vertex_stamp(j) == stamp;

        if O::SYMMETRIC {
            if j_processed {
                return;
            }
            let jcache = if j == DEPOT {
                self.hooks.prepare_cache(instance, solution, j, i)
            } else {
                self.hooks.prepare_cache(instance, solution, j, j)
            };
            let edge = moves.edge_cost(move_index);
            let (delta, _) = self.hooks.compute_cost_pair(instance, edge, icache, &jcache);
            let base = MoveGenerators::base_index(move_index);
            moves.heap_refresh(base, delta, self.tolerance);
            return;
        }

        // From j's sweep: `(i, j)` was refreshed iff j's second bit was
        // set, `(j, i)` iff j's first bit was set.
        let need_ij = up_ij && !(j_processed && moves.update_bits().second(j));
        let need_ji = up_ji && !(j_processed && moves.update_bits().first(j));
        if !need_ij && !need_ji {
            return;
        }

        let jcache = if j == DEPOT {
            self.hooks.prepare_cache(instance, solution, j, i)
        } else {
            self.hooks.prepare_cache(instance, solution, j, j)
        };
        let edge = moves.edge_cost(move_index);
        let (delta1, delta2) = self.hooks.compute_cost_pair(instance, edge, icache, &jcache);

        if need_ij {
            moves.heap_refresh(move_index, delta1, self.tolerance);
        }
        if need_ji {
            let twin = MoveGenerators::twin_index(move_index);
            moves.heap_refresh(twin, delta2, self.tolerance);
        }
    }
}

impl<O: OperatorHooks> LocalSearchOperator for CommonOperator<O> {
    fn apply_rough_best_improvement(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
    ) -> bool {
        moves.heap_reset();
        self.initialize_descriptors(instance, solution, moves);

        let mut improved = false;
        let mut index = 0;

        // Scan the heap array in index order without popping: applying a
        // move invalidates the position, so restart from the top. This is
        // a rough best improvement, not an exact one.
        while index < moves.heap_len() {
            let move_index = moves.heap_at(index);
            index += 1;

            let (i, j) = {
                let mv = moves.get(move_index);
                (mv.first_vertex(), mv.second_vertex())
            };

            if self.partial && (!solution.is_vertex_served(i) || !solution.is_vertex_served(j)) {
                continue;
            }

            // The update phase refreshes candidates around the vertices an
            // application touched directly, but a cached delta can also
            // depend on context a few links further out. Re-derive it
            // before trusting it.
            let icache = self.hooks.prepare_cache(instance, solution, i, j);
            let jcache = self.hooks.prepare_cache(instance, solution, j, i);
            let edge = moves.edge_cost(move_index);
            let (fresh, _) = self.hooks.compute_cost_pair(instance, edge, &icache, &jcache);
            if (fresh - moves.get(move_index).delta()).abs() > 1e-6 {
                moves.heap_refresh(move_index, fresh, self.tolerance);
                if fresh > -self.tolerance {
                    continue;
                }
            }

            if !self.hooks.is_feasible(instance, solution, moves, move_index) {
                continue;
            }

            #[cfg(debug_assertions)]
            let old_cost = solution.cost();

            self.hooks
                .execute(instance, solution, moves, move_index, &mut self.affected);

            #[cfg(debug_assertions)]
            debug_assert!(solution.cost() < old_cost);

            improved = true;
            index = 0;

            self.descriptors_update(instance, solution, moves);
            self.affected.clear();
        }

        self.hooks.post_processing(moves);

        improved
    }
}

/// Instantiate the driver for one neighborhood.
pub fn build_operator(
    id: OperatorId,
    vertices_num: usize,
    tolerance: f64,
    partial: bool,
) -> Box<dyn LocalSearchOperator> {
    match id {
        OperatorId::E10 => Box::new(CommonOperator::new(
            SegmentRelocate::<1>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E20 => Box::new(CommonOperator::new(
            SegmentRelocate::<2>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E30 => Box::new(CommonOperator::new(
            SegmentRelocate::<3>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE20 => Box::new(CommonOperator::new(
            RevSegmentRelocate::<2>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE30 => Box::new(CommonOperator::new(
            RevSegmentRelocate::<3>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E11 => Box::new(CommonOperator::new(
            SegmentExchange::<1, 1, false>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E21 => Box::new(CommonOperator::new(
            SegmentExchange::<2, 1, false>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E22 => Box::new(CommonOperator::new(
            SegmentExchange::<2, 2, false>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E31 => Box::new(CommonOperator::new(
            SegmentExchange::<3, 1, false>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E32 => Box::new(CommonOperator::new(
            SegmentExchange::<3, 2, false>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::E33 => Box::new(CommonOperator::new(
            SegmentExchange::<3, 3, false>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE21 => Box::new(CommonOperator::new(
            SegmentExchange::<2, 1, true>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE22 => Box::new(CommonOperator::new(
            SegmentExchange::<2, 2, true>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE31 => Box::new(CommonOperator::new(
            SegmentExchange::<3, 1, true>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE32 => Box::new(CommonOperator::new(
            SegmentExchange::<3, 2, true>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::RE33 => Box::new(CommonOperator::new(
            SegmentExchange::<3, 3, true>,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::TWOPT => Box::new(CommonOperator::new(
            TwoOptExchange,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::SPLIT => Box::new(CommonOperator::new(
            SplitExchange,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::TAILS => Box::new(CommonOperator::new(
            TailsExchange,
            vertices_num,
            tolerance,
            partial,
        )),
        OperatorId::EJCH => {
            assert!(!partial, "ejection chain does not support partial solutions");
            Box::new(CommonOperator::new(
                EjectionChain::new(tolerance),
                vertices_num,
                tolerance,
                partial,
            ))
        }
    }
}

/// Randomized variable neighborhood descent: apply every operator once in
/// a fresh random order. Improvements found by one operator are visible to
/// the next through the recently-modified set.
pub struct RandomizedVnd {
    operators: Vec<Box<dyn LocalSearchOperator>>,
}

impl RandomizedVnd {
    pub fn new(ids: &[OperatorId], vertices_num: usize, tolerance: f64, partial: bool) -> Self {
        RandomizedVnd {
            operators: ids
                .iter()
                .map(|&id| build_operator(id, vertices_num, tolerance, partial))
                .collect(),
        }
    }

    pub fn apply(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        self.operators.shuffle(rng);

        let mut improved = false;
        for operator in &mut self.operators {
            improved |= operator.apply_rough_best_improvement(instance, solution, moves);
        }
        improved
    }
}

/// Tiered composition of descents: whenever a tier past the first one
/// improves the solution, restart from the first tier.
pub struct VndComposer {
    tolerance: f64,
    tiers: Vec<RandomizedVnd>,
}

impl VndComposer {
    pub fn new(tolerance: f64) -> Self {
        VndComposer {
            tolerance,
            tiers: Vec::new(),
        }
    }

    pub fn append(&mut self, tier: RandomizedVnd) {
        self.tiers.push(tier);
    }

    pub fn sequential_apply(
        &mut self,
        instance: &Instance,
        solution: &mut Solution,
        moves: &mut MoveGenerators,
        rng: &mut ChaCha8Rng,
    ) {
        'restart: loop {
            for n in 0..self.tiers.len() {
                let cost_before = solution.cost();
                self.tiers[n].apply(instance, solution, moves, rng);
                if n > 0 && solution.cost() + self.tolerance < cost_before {
                    continue 'restart;
                }
            }
            return;
        }
    }
}
