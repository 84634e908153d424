//! Problem instance: immutable vertex data, distance lookup and
//! precomputed nearest-neighbor lists.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::kdtree::KdTree;

/// Index of the depot vertex.
pub const DEPOT: usize = 0;

/// Errors raised while loading or validating an instance. Both are fatal
/// and bubble up to the command line.
#[derive(Debug)]
pub enum InstanceError {
    /// Malformed input file.
    Parse(String),
    /// The instance cannot be served: demand exceeds the fleet capacity or
    /// the data is outside the supported scale.
    Infeasible(String),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::Parse(msg) => write!(f, "instance parse error: {}", msg),
            InstanceError::Infeasible(msg) => write!(f, "infeasible instance: {}", msg),
        }
    }
}

impl Error for InstanceError {}

/// Immutable CVRP instance data.
///
/// Vertex `0` is the depot, `1..vertices_num` are customers. Distances are
/// Euclidean, optionally rounded to the nearest integer, and computed on
/// the fly: for the instance sizes this solver targets a full matrix does
/// not fit in memory.
pub struct Instance {
    name: String,
    xs: Vec<f64>,
    ys: Vec<f64>,
    demands: Vec<i64>,
    vehicle_capacity: i64,
    total_demand: i64,
    max_vehicles: usize,
    duration_limit: Option<f64>,
    service_time: f64,
    round_costs: bool,
    neighbors: Vec<Vec<usize>>,
}

impl Instance {
    /// Parse a CVRPLIB `.vrp` file and precompute `num_neighbors` nearest
    /// neighbors per vertex.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        num_neighbors: usize,
        round_costs: bool,
        max_vehicles: Option<usize>,
    ) -> Result<Self, InstanceError> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| InstanceError::Parse(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_str(&text, num_neighbors, round_costs, max_vehicles)
    }

    /// Parse instance text. See `from_file`.
    pub fn from_str(
        text: &str,
        num_neighbors: usize,
        round_costs: bool,
        max_vehicles: Option<usize>,
    ) -> Result<Self, InstanceError> {
        let parsed = parse_vrplib(text)?;
        Self::new(
            parsed.name,
            parsed.xs,
            parsed.ys,
            parsed.demands,
            parsed.capacity,
            parsed.duration_limit,
            parsed.service_time,
            num_neighbors,
            round_costs,
            max_vehicles,
        )
    }

    /// Build an instance from raw data. Used directly by tests.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        xs: Vec<f64>,
        ys: Vec<f64>,
        demands: Vec<i64>,
        vehicle_capacity: i64,
        duration_limit: Option<f64>,
        service_time: f64,
        num_neighbors: usize,
        round_costs: bool,
        max_vehicles: Option<usize>,
    ) -> Result<Self, InstanceError> {
        let n = demands.len();
        if n < 2 || xs.len() != n || ys.len() != n {
            return Err(InstanceError::Parse(
                "instance needs a depot and at least one customer".to_string(),
            ));
        }
        if demands[DEPOT] != 0 {
            return Err(InstanceError::Parse("depot demand must be zero".to_string()));
        }
        if vehicle_capacity <= 0 {
            return Err(InstanceError::Infeasible(
                "vehicle capacity must be positive".to_string(),
            ));
        }

        let mut total_demand = 0i64;
        let mut max_demand = 0i64;
        for (i, &demand) in demands.iter().enumerate().skip(1) {
            if demand < 0 {
                return Err(InstanceError::Parse(format!(
                    "customer {} has negative demand",
                    i
                )));
            }
            if demand > vehicle_capacity {
                return Err(InstanceError::Infeasible(format!(
                    "customer {} demand {} exceeds vehicle capacity {}",
                    i, demand, vehicle_capacity
                )));
            }
            total_demand += demand;
            max_demand = max_demand.max(demand);
        }
        if max_demand as f64 > 100_000.0 {
            return Err(InstanceError::Infeasible(
                "demands are not in the supported scale [0.1, 100000]".to_string(),
            ));
        }

        let max_vehicles = max_vehicles.unwrap_or_else(|| {
            (1.3 * total_demand as f64 / vehicle_capacity as f64).ceil() as usize + 3
        });
        if (max_vehicles as i64).saturating_mul(vehicle_capacity) < total_demand {
            return Err(InstanceError::Infeasible(format!(
                "total demand {} exceeds fleet capacity {} x {}",
                total_demand, max_vehicles, vehicle_capacity
            )));
        }

        let mut instance = Instance {
            name,
            xs,
            ys,
            demands,
            vehicle_capacity,
            total_demand,
            max_vehicles,
            duration_limit,
            service_time,
            round_costs,
            neighbors: Vec::new(),
        };

        let spread = instance.coordinate_spread();
        if spread > 0.0 && !(0.1..=100_000.0).contains(&spread) {
            return Err(InstanceError::Infeasible(
                "distances are not in the supported scale [0.1, 100000]".to_string(),
            ));
        }

        instance.build_neighbor_lists(num_neighbors);
        Ok(instance)
    }

    /// Total number of vertices, depot included.
    #[inline]
    pub fn vertices_num(&self) -> usize {
        self.demands.len()
    }

    #[inline]
    pub fn customers_num(&self) -> usize {
        self.vertices_num() - 1
    }

    /// Iterate over customer indices.
    #[inline]
    pub fn customers(&self) -> std::ops::Range<usize> {
        1..self.vertices_num()
    }

    /// Iterate over all vertex indices, depot first.
    #[inline]
    pub fn vertices(&self) -> std::ops::Range<usize> {
        0..self.vertices_num()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn vehicle_capacity(&self) -> i64 {
        self.vehicle_capacity
    }

    #[inline]
    pub fn total_demand(&self) -> i64 {
        self.total_demand
    }

    /// Fleet-size cap used by the limited-fleet split decoder.
    #[inline]
    pub fn max_vehicles(&self) -> usize {
        self.max_vehicles
    }

    #[inline]
    pub fn duration_limit(&self) -> Option<f64> {
        self.duration_limit
    }

    #[inline]
    pub fn service_time(&self) -> f64 {
        self.service_time
    }

    #[inline]
    pub fn demand(&self, i: usize) -> i64 {
        self.demands[i]
    }

    #[inline]
    pub fn x(&self, i: usize) -> f64 {
        self.xs[i]
    }

    #[inline]
    pub fn y(&self, i: usize) -> f64 {
        self.ys[i]
    }

    /// Cost of the arc `(i, j)`. Symmetric, zero on the diagonal.
    #[inline]
    pub fn cost(&self, i: usize, j: usize) -> f64 {
        let dx = self.xs[i] - self.xs[j];
        let dy = self.ys[i] - self.ys[j];
        let dist = (dx * dx + dy * dy).sqrt();
        if self.round_costs {
            (dist + 0.5).floor()
        } else {
            dist
        }
    }

    /// Vertices sorted by increasing cost from `i`; `neighbors(i)[0] == i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    fn coordinate_spread(&self) -> f64 {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for i in self.vertices() {
            min_x = min_x.min(self.xs[i]);
            max_x = max_x.max(self.xs[i]);
            min_y = min_y.min(self.ys[i]);
            max_y = max_y.max(self.ys[i]);
        }
        (max_x - min_x).max(max_y - min_y)
    }

    fn build_neighbor_lists(&mut self, num_neighbors: usize) {
        let n = self.vertices_num();
        let k = num_neighbors.min(n);
        let tree = KdTree::new(&self.xs, &self.ys);
        self.neighbors = Vec::with_capacity(n);
        for i in 0..n {
            let mut list = tree.nearest_neighbors(self.xs[i], self.ys[i], k);
            // With overlapping points the query may not return `i` first.
            if list[0] != i {
                if let Some(pos) = list.iter().position(|&v| v == i) {
                    list.swap(0, pos);
                } else {
                    list.insert(0, i);
                    list.pop();
                }
            }
            self.neighbors.push(list);
        }
    }
}

struct ParsedInstance {
    name: String,
    xs: Vec<f64>,
    ys: Vec<f64>,
    demands: Vec<i64>,
    capacity: i64,
    duration_limit: Option<f64>,
    service_time: f64,
}

fn parse_vrplib(text: &str) -> Result<ParsedInstance, InstanceError> {
    let mut name = String::new();
    let mut dimension: Option<usize> = None;
    let mut capacity: Option<i64> = None;
    let mut duration_limit = None;
    let mut service_time = 0.0;
    let mut edge_weight_type = String::new();

    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    // Header: `KEY : value` pairs up to NODE_COORD_SECTION.
    loop {
        let line = lines
            .next()
            .ok_or_else(|| InstanceError::Parse("missing NODE_COORD_SECTION".to_string()))?;
        if line == "NODE_COORD_SECTION" {
            break;
        }
        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => {
                return Err(InstanceError::Parse(format!(
                    "malformed header line '{}'",
                    line
                )))
            }
        };
        match key {
            "NAME" => name = value.to_string(),
            "COMMENT" | "TYPE" => {}
            "DIMENSION" => {
                dimension = Some(value.parse().map_err(|_| {
                    InstanceError::Parse(format!("invalid DIMENSION '{}'", value))
                })?)
            }
            "EDGE_WEIGHT_TYPE" => edge_weight_type = value.to_string(),
            "CAPACITY" => {
                capacity = Some(value.parse().map_err(|_| {
                    InstanceError::Parse(format!("invalid CAPACITY '{}'", value))
                })?)
            }
            "DISTANCE" => {
                duration_limit = Some(value.parse().map_err(|_| {
                    InstanceError::Parse(format!("invalid DISTANCE '{}'", value))
                })?)
            }
            "SERVICE_TIME" => {
                service_time = value.parse().map_err(|_| {
                    InstanceError::Parse(format!("invalid SERVICE_TIME '{}'", value))
                })?
            }
            _ => {
                return Err(InstanceError::Parse(format!(
                    "unknown header field '{}'",
                    key
                )))
            }
        }
    }

    if edge_weight_type != "EUC_2D" {
        return Err(InstanceError::Parse(format!(
            "unsupported EDGE_WEIGHT_TYPE '{}'",
            edge_weight_type
        )));
    }
    let n = dimension.ok_or_else(|| InstanceError::Parse("missing DIMENSION".to_string()))?;
    let capacity = capacity.ok_or_else(|| InstanceError::Parse("missing CAPACITY".to_string()))?;

    let mut xs = vec![0.0; n];
    let mut ys = vec![0.0; n];
    for _ in 0..n {
        let line = lines
            .next()
            .ok_or_else(|| InstanceError::Parse("truncated NODE_COORD_SECTION".to_string()))?;
        let mut fields = line.split_whitespace();
        let id: usize = next_field(&mut fields, line)?;
        if id < 1 || id > n {
            return Err(InstanceError::Parse(format!("vertex id {} out of range", id)));
        }
        xs[id - 1] = next_field(&mut fields, line)?;
        ys[id - 1] = next_field(&mut fields, line)?;
    }

    match lines.next() {
        Some("DEMAND_SECTION") => {}
        other => {
            return Err(InstanceError::Parse(format!(
                "expected DEMAND_SECTION, found {:?}",
                other
            )))
        }
    }

    let mut demands = vec![0i64; n];
    for _ in 0..n {
        let line = lines
            .next()
            .ok_or_else(|| InstanceError::Parse("truncated DEMAND_SECTION".to_string()))?;
        let mut fields = line.split_whitespace();
        let id: usize = next_field(&mut fields, line)?;
        if id < 1 || id > n {
            return Err(InstanceError::Parse(format!("vertex id {} out of range", id)));
        }
        demands[id - 1] = next_field(&mut fields, line)?;
    }

    // Trailing DEPOT_SECTION / EOF markers are validated loosely.
    for line in lines {
        match line {
            "DEPOT_SECTION" | "1" | "-1" | "EOF" => {}
            other => {
                return Err(InstanceError::Parse(format!(
                    "unexpected trailing line '{}'",
                    other
                )))
            }
        }
    }

    Ok(ParsedInstance {
        name,
        xs,
        ys,
        demands,
        capacity,
        duration_limit,
        service_time,
    })
}

fn next_field<'a, T: std::str::FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    line: &str,
) -> Result<T, InstanceError> {
    fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| InstanceError::Parse(format!("malformed data line '{}'", line)))
}
