//! Solver configuration and command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the iterated local search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PRNG seed; the only source of nondeterminism.
    pub seed: u64,
    /// Round arc costs to the nearest integer.
    pub round_costs: bool,
    /// Emit per-second progress lines.
    pub verbose: bool,
    /// Fleet-size cap; derived from the total demand when unset.
    pub max_vehicles: Option<usize>,
    /// Wall-clock budget, checked once per outer iteration.
    pub time_limit: Option<Duration>,
    /// Stop after this many outer iterations without improving the best.
    pub max_iterations_without_improvement: Option<usize>,
    /// Nearest neighbors per vertex considered by the move generators (k).
    pub granular_neighbors: usize,
    /// Nearest neighbors precomputed per vertex at load time.
    pub neighbors_num: usize,
    /// Capacity of the recently-modified vertex set.
    pub cache_size: usize,
    /// Outer-loop iteration budget.
    pub coreopt_iterations: usize,
    /// Route-minimization iteration budget.
    pub routemin_iterations: usize,
    /// Initial fraction of active candidates per vertex.
    pub gamma_base: f64,
    /// Multiplier in the gamma-growth threshold.
    pub granular_delta: f64,
    /// Shake-intensity adaptation thresholds, scaled by the mean arc cost.
    pub shaking_lb_factor: f64,
    pub shaking_ub_factor: f64,
    /// Simulated-annealing temperature factors.
    pub sa_initial_factor: f64,
    pub sa_final_factor: f64,
    /// Minimum cost decrease regarded as an improvement.
    pub tolerance: f64,
    /// Clarke-Wright saving weight.
    pub cw_lambda: f64,
    /// Neighbors per customer considered by Clarke-Wright.
    pub cw_neighbors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            seed: 0,
            round_costs: true,
            verbose: false,
            max_vehicles: None,
            time_limit: None,
            max_iterations_without_improvement: None,
            granular_neighbors: 25,
            neighbors_num: 1500,
            cache_size: 50,
            coreopt_iterations: 100_000,
            routemin_iterations: 1_000,
            gamma_base: 0.25,
            granular_delta: 0.50,
            shaking_lb_factor: 0.375,
            shaking_ub_factor: 0.85,
            sa_initial_factor: 0.1,
            sa_final_factor: 0.01,
            tolerance: 0.01,
            cw_lambda: 1.0,
            cw_neighbors: 100,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_round_costs(mut self, round: bool) -> Self {
        self.round_costs = round;
        self
    }

    pub fn with_granular_neighbors(mut self, k: usize) -> Self {
        self.granular_neighbors = k;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_coreopt_iterations(mut self, iterations: usize) -> Self {
        self.coreopt_iterations = iterations;
        self
    }

    pub fn with_routemin_iterations(mut self, iterations: usize) -> Self {
        self.routemin_iterations = iterations;
        self
    }

    pub fn with_gamma_base(mut self, gamma: f64) -> Self {
        self.gamma_base = gamma;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_max_vehicles(mut self, vehicles: usize) -> Self {
        self.max_vehicles = Some(vehicles);
        self
    }
}

/// Parsed command line: positional instance and solution paths plus the
/// solver configuration.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub instance_path: PathBuf,
    pub solution_path: PathBuf,
    pub config: Config,
}

/// Parse the argument vector (without the program name).
///
/// The surface follows the original solver family: two positional paths
/// and single-dash `-token value` pairs.
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("usage: ils-cvrp <instancePath> <solutionPath> [options]".to_string());
    }

    let instance_path = PathBuf::from(&args[0]);
    let solution_path = PathBuf::from(&args[1]);
    let mut config = Config::default();

    let mut n = 2;
    while n < args.len() {
        let token = &args[n];
        let value = args
            .get(n + 1)
            .ok_or_else(|| format!("missing value for '{}'", token))?;

        match token.as_str() {
            "-t" => {
                let seconds: u64 = parse_value(token, value)?;
                config.time_limit = Some(Duration::from_secs(seconds));
            }
            "-it" => {
                config.max_iterations_without_improvement = Some(parse_value(token, value)?);
            }
            "-seed" => config.seed = parse_value(token, value)?,
            "-veh" => config.max_vehicles = Some(parse_value(token, value)?),
            "-round" => config.round_costs = parse_flag(token, value)?,
            "-log" => config.verbose = parse_flag(token, value)?,
            "-nbGranular" => config.granular_neighbors = parse_value(token, value)?,
            "-cache" => config.cache_size = parse_value(token, value)?,
            "-coreopt-iterations" => config.coreopt_iterations = parse_value(token, value)?,
            "-routemin-iterations" => config.routemin_iterations = parse_value(token, value)?,
            "-granular-gamma-base" => config.gamma_base = parse_value(token, value)?,
            "-granular-delta" => config.granular_delta = parse_value(token, value)?,
            "-shaking-lower-bound" => config.shaking_lb_factor = parse_value(token, value)?,
            "-shaking-upper-bound" => config.shaking_ub_factor = parse_value(token, value)?,
            "-sa-initial-factor" => config.sa_initial_factor = parse_value(token, value)?,
            "-sa-final-factor" => config.sa_final_factor = parse_value(token, value)?,
            "-tolerance" => config.tolerance = parse_value(token, value)?,
            _ => return Err(format!("unknown argument '{}'", token)),
        }
        n += 2;
    }

    Ok(CliArgs {
        instance_path,
        solution_path,
        config,
    })
}

fn parse_value<T: std::str::FromStr>(token: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid value '{}' for '{}'", value, token))
}

fn parse_flag(token: &str, value: &str) -> Result<bool, String> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(format!("invalid value '{}' for '{}', expected 0 or 1", value, token)),
    }
}
