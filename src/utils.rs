//! Output helpers.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use crate::solution::Solution;

/// Write a solution in the `Route #k: ...` / `Cost x` exchange format.
pub fn write_solution<P: AsRef<Path>>(solution: &Solution, path: P) -> io::Result<()> {
    let mut file = File::create(path)?;

    for (idx, route) in solution.route_ids().enumerate() {
        write!(file, "Route #{}:", idx + 1)?;
        for customer in solution.route_customers(route) {
            write!(file, " {}", customer)?;
        }
        writeln!(file)?;
    }
    writeln!(file, "Cost {}", solution.cost())?;

    Ok(())
}

/// Format a duration as hours, minutes and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}
