//! # ILS-CVRP
//!
//! A FILO-style iterated local search solver for the Capacitated Vehicle
//! Routing Problem.
//!
//! The engine couples an incremental-update local search over a doubly
//! linked route representation with ruin-and-recreate shaking and a
//! simulated-annealing acceptance criterion. Search effort is kept sparse
//! by per-vertex move generators over nearest-neighbor candidates, whose
//! active fraction adapts to stagnation, and localized by a small set of
//! recently modified vertices that drives all candidate re-evaluations.

pub mod annealing;
pub mod collections;
pub mod config;
pub mod instance;
pub mod kdtree;
pub mod local_search;
pub mod movegen;
pub mod routemin;
pub mod ruin_recreate;
pub mod savings;
pub mod solution;
pub mod split;
pub mod utils;

use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::annealing::SimulatedAnnealing;
use crate::collections::Welford;
use crate::config::Config;
use crate::instance::Instance;
use crate::local_search::{OperatorId, RandomizedVnd, VndComposer, BASE_OPERATORS};
use crate::movegen::MoveGenerators;
use crate::routemin::routemin;
use crate::ruin_recreate::RuinAndRecreate;
use crate::savings::{clarke_and_wright, min_routes_estimate};
use crate::solution::Solution;
use crate::split::Split;

/// The solver: construction, optional route minimization and the core
/// optimization loop.
pub struct IlsAlgorithm {
    pub instance: Instance,
    pub config: Config,
    pub iterations: usize,
    rng: ChaCha8Rng,
}

impl IlsAlgorithm {
    pub fn new(instance: Instance, config: Config) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        IlsAlgorithm {
            instance,
            config,
            iterations: 0,
            rng,
        }
    }

    /// Run the full pipeline and return the best solution found.
    pub fn run(&mut self) -> Solution {
        let start = Instant::now();
        let instance = &self.instance;
        let n = instance.vertices_num();
        let history_len = self.config.cache_size.min(n);

        let mut best = Solution::new(instance, history_len);
        clarke_and_wright(
            instance,
            &mut best,
            self.config.cw_lambda,
            self.config.cw_neighbors,
        );
        info!(
            cost = best.cost(),
            routes = best.routes_num(),
            "initial solution built"
        );

        let mut moves = MoveGenerators::new(instance, self.config.granular_neighbors);
        debug!(generators = moves.len(), "move generators ready");

        let k_min = min_routes_estimate(instance);
        if k_min < best.routes_num() && self.config.routemin_iterations > 0 {
            best = routemin(
                instance,
                &best,
                &mut moves,
                &mut self.rng,
                k_min,
                self.config.routemin_iterations,
                self.config.tolerance,
            );
            info!(
                cost = best.cost(),
                routes = best.routes_num(),
                "route minimization done"
            );
        }

        // Re-decode the incumbent's giant tour: the split decoder may find
        // better route boundaries for the same customer order.
        {
            let tour = best.giant_tour();
            let split = Split::new(best.cost(), best.cost());
            let mut decoded = Solution::new(instance, history_len);
            let cost = split.decode(instance, &mut decoded, &tour, instance.max_vehicles());
            if decoded.is_load_feasible(instance) && cost + self.config.tolerance < best.cost() {
                debug!(cost, "split decoder improved the initial routes");
                best = decoded;
            }
        }

        self.core_optimization(start, best, &mut moves)
    }

    /// The outer loop: shake, descend, adapt, accept.
    fn core_optimization(
        &mut self,
        start: Instant,
        mut best: Solution,
        moves: &mut MoveGenerators,
    ) -> Solution {
        let instance = &self.instance;
        let n = instance.vertices_num();
        let tolerance = self.config.tolerance;
        let coreopt_iterations = self.config.coreopt_iterations;

        let mut local_search = VndComposer::new(tolerance);
        local_search.append(RandomizedVnd::new(BASE_OPERATORS, n, tolerance, false));
        local_search.append(RandomizedVnd::new(&[OperatorId::EJCH], n, tolerance, false));

        // Granularity state: start narrow everywhere.
        let gamma_base = self.config.gamma_base;
        let mut gamma = vec![gamma_base; n];
        let mut gamma_counter = vec![0usize; n];
        let all_vertices: Vec<usize> = instance.vertices().collect();
        moves.set_active_percentage(&gamma, &all_vertices);
        let mut gamma_vertices: Vec<usize> = Vec::new();

        // Shake intensities, one per vertex.
        let omega_base = ((n as f64).ln().ceil() as usize).max(1);
        let mut omega = vec![omega_base; n];
        let mut ruined_customers: Vec<usize> = Vec::new();

        let mut rr = RuinAndRecreate::new(instance);

        let mean_arc_cost = |solution: &Solution| {
            solution.cost()
                / (instance.customers_num() as f64 + 2.0 * solution.routes_num() as f64)
        };
        let mut shaking_lb = mean_arc_cost(&best) * self.config.shaking_lb_factor;
        let mut shaking_ub = mean_arc_cost(&best) * self.config.shaking_ub_factor;

        // Seed the annealing temperature from the cost of random arcs.
        let mut arc_sample = Welford::default();
        for _ in 0..n {
            let a = self.rng.gen_range(0..n);
            let b = self.rng.gen_range(0..n);
            arc_sample.update(instance.cost(a, b));
        }
        let sa_initial = arc_sample.mean() * self.config.sa_initial_factor;
        let sa_final = sa_initial * self.config.sa_final_factor;
        let mut sa = SimulatedAnnealing::new(sa_initial, sa_final, coreopt_iterations);
        debug!(sa_initial, sa_final, "annealing schedule");

        let mut svc_mean = Welford::default();
        let mut neighbor = best.clone();
        let mut reference_cost = neighbor.cost();
        let mut last_improvement_iter = 0usize;
        let mut last_log = Instant::now();

        for iter in 0..coreopt_iterations {
            self.iterations = iter + 1;

            if let Some(limit) = self.config.time_limit {
                if start.elapsed() >= limit {
                    debug!(iter, "time budget exhausted");
                    break;
                }
            }
            if let Some(max_idle) = self.config.max_iterations_without_improvement {
                if iter - last_improvement_iter >= max_idle {
                    debug!(iter, "iteration budget without improvement exhausted");
                    break;
                }
            }

            // Back to the reference solution, with a clean slate.
            neighbor.rewind(instance);
            neighbor.clear_svc();

            let walk_seed = rr.apply(instance, &mut neighbor, &omega, &mut self.rng);

            ruined_customers.clear();
            ruined_customers.extend(neighbor.svc_iter());

            local_search.sequential_apply(instance, &mut neighbor, moves, &mut self.rng);

            svc_mean.update(neighbor.svc_len() as f64);
            let max_non_improving = (self.config.granular_delta
                * coreopt_iterations as f64
                * svc_mean.mean()
                / n as f64)
                .ceil() as usize;

            let improved = neighbor.cost() < best.cost();
            if improved {
                neighbor.apply_trajectory_to(instance, &mut best);
                neighbor.apply_do_list_to(instance, &mut best);
                neighbor.clear_trajectory();
                debug_assert!((best.cost() - neighbor.cost()).abs() < 0.01);

                last_improvement_iter = iter;

                // Intensify around the touched vertices again.
                gamma_vertices.clear();
                gamma_vertices.extend(neighbor.svc_iter());
                for &vertex in &gamma_vertices {
                    gamma[vertex] = gamma_base;
                    gamma_counter[vertex] = 0;
                }
                moves.set_active_percentage(&gamma, &gamma_vertices);
            } else {
                // Widen the candidate sets of stagnating vertices.
                gamma_vertices.clear();
                gamma_vertices.extend(neighbor.svc_iter());
                for idx in 0..gamma_vertices.len() {
                    let vertex = gamma_vertices[idx];
                    gamma_counter[vertex] += 1;
                    if gamma_counter[vertex] >= max_non_improving {
                        gamma[vertex] = (2.0 * gamma[vertex]).min(1.0);
                        gamma_counter[vertex] = 0;
                        moves.set_active_percentage(&gamma, &gamma_vertices[idx..idx + 1]);
                    }
                }
            }

            // Adapt the shake intensity of the ruined vertices towards or
            // away from the seed's value depending on how far the shake
            // moved the solution.
            let seed_shake_value = omega[walk_seed];
            let shake_gap = neighbor.cost() - reference_cost;
            if shake_gap > shaking_ub {
                for &i in &ruined_customers {
                    if omega[i] + 1 > seed_shake_value && omega[i] > 1 {
                        omega[i] -= 1;
                    }
                }
            } else if (0.0..shaking_lb).contains(&shake_gap) {
                for &i in &ruined_customers {
                    if omega[i] < seed_shake_value + 1 {
                        omega[i] += 1;
                    }
                }
            } else {
                for &i in &ruined_customers {
                    if self.rng.gen_bool(0.5) {
                        if omega[i] + 1 > seed_shake_value && omega[i] > 1 {
                            omega[i] -= 1;
                        }
                    } else if omega[i] < seed_shake_value + 1 {
                        omega[i] += 1;
                    }
                }
            }

            if sa.accept(reference_cost, neighbor.cost(), &mut self.rng) {
                if !improved {
                    neighbor.append_do_list_to_trajectory();
                }
                neighbor.clear_do_list();
                neighbor.clear_undo_list();

                reference_cost = neighbor.cost();
                shaking_lb = mean_arc_cost(&neighbor) * self.config.shaking_lb_factor;
                shaking_ub = mean_arc_cost(&neighbor) * self.config.shaking_ub_factor;
            }

            sa.decrease_temperature();

            if self.config.verbose && last_log.elapsed().as_secs() >= 1 {
                last_log = Instant::now();
                let omega_mean =
                    omega[1..].iter().sum::<usize>() as f64 / instance.customers_num() as f64;
                let gamma_mean = gamma.iter().sum::<f64>() / n as f64;
                info!(
                    iter,
                    best = best.cost(),
                    routes = best.routes_num(),
                    gamma = format!("{:.3}", gamma_mean),
                    omega = format!("{:.2}", omega_mean),
                    temperature = format!("{:.3}", sa.temperature()),
                    "optimizing"
                );
            }
        }

        info!(
            cost = best.cost(),
            routes = best.routes_num(),
            iterations = self.iterations,
            elapsed = ?start.elapsed(),
            "search finished"
        );

        debug_assert!(best.is_feasible(&self.instance, false));
        best
    }
}
