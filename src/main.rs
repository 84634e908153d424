use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ils_cvrp::config::{parse_args, CliArgs};
use ils_cvrp::instance::Instance;
use ils_cvrp::utils::{format_duration, write_solution};
use ils_cvrp::IlsAlgorithm;

fn enable_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let CliArgs {
        instance_path,
        solution_path,
        config,
    } = parse_args(&args).map_err(anyhow::Error::msg)?;

    enable_tracing(config.verbose);

    let start = Instant::now();
    let instance = Instance::from_file(
        &instance_path,
        config.neighbors_num,
        config.round_costs,
        config.max_vehicles,
    )
    .with_context(|| format!("loading {}", instance_path.display()))?;

    info!(
        name = instance.name(),
        customers = instance.customers_num(),
        capacity = instance.vehicle_capacity(),
        "instance loaded"
    );

    let mut algorithm = IlsAlgorithm::new(instance, config);
    let best = algorithm.run();

    write_solution(&best, &solution_path)
        .with_context(|| format!("writing {}", solution_path.display()))?;

    info!(
        cost = best.cost(),
        routes = best.routes_num(),
        elapsed = %format_duration(start.elapsed()),
        solution = %solution_path.display(),
        "done"
    );

    Ok(())
}
