//! Tests for the CVRPLIB parser and instance validation.

use ils_cvrp::instance::{Instance, InstanceError, DEPOT};

const SMALL_VRP: &str = "\
NAME : toy-n5
COMMENT : hand written
TYPE : CVRP
DIMENSION : 5
EDGE_WEIGHT_TYPE : EUC_2D
CAPACITY : 4
NODE_COORD_SECTION
1 0 0
2 1 0
3 0 1
4 -1 0
5 0 -1
DEMAND_SECTION
1 0
2 1
3 1
4 1
5 1
DEPOT_SECTION
1
-1
EOF
";

#[test]
fn parses_the_standard_format() {
    let instance = Instance::from_str(SMALL_VRP, 10, true, None).expect("parses");

    assert_eq!(instance.name(), "toy-n5");
    assert_eq!(instance.vertices_num(), 5);
    assert_eq!(instance.customers_num(), 4);
    assert_eq!(instance.vehicle_capacity(), 4);
    assert_eq!(instance.demand(DEPOT), 0);
    assert_eq!(instance.demand(1), 1);
    assert_eq!(instance.total_demand(), 4);
    assert!(instance.duration_limit().is_none());

    // Rounded Euclidean costs.
    assert!((instance.cost(1, 3) - 2.0).abs() < 1e-9);
    assert!((instance.cost(0, 1) - 1.0).abs() < 1e-9);

    // Neighbor lists start with the vertex itself, sorted by distance.
    for v in instance.vertices() {
        assert_eq!(instance.neighbors(v)[0], v);
    }
}

#[test]
fn optional_distance_and_service_fields() {
    let text = SMALL_VRP.replace(
        "CAPACITY : 4\n",
        "CAPACITY : 4\nDISTANCE : 20\nSERVICE_TIME : 1.5\n",
    );
    let instance = Instance::from_str(&text, 10, true, None).expect("parses");

    assert_eq!(instance.duration_limit(), Some(20.0));
    assert!((instance.service_time() - 1.5).abs() < 1e-9);
}

#[test]
fn default_fleet_size_follows_the_demand() {
    let instance = Instance::from_str(SMALL_VRP, 10, true, None).expect("parses");
    // ceil(1.3 * 4 / 4) + 3
    assert_eq!(instance.max_vehicles(), 5);

    let overridden = Instance::from_str(SMALL_VRP, 10, true, Some(2)).expect("parses");
    assert_eq!(overridden.max_vehicles(), 2);
}

#[test]
fn rejects_malformed_headers() {
    let text = SMALL_VRP.replace("DIMENSION : 5", "DIMENSION : five");
    match Instance::from_str(&text, 10, true, None) {
        Err(InstanceError::Parse(_)) => {}
        other => panic!("expected a parse error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn rejects_oversized_demand() {
    let text = SMALL_VRP.replace("2 1\n", "2 9\n");
    match Instance::from_str(&text, 10, true, None) {
        Err(InstanceError::Infeasible(_)) => {}
        other => panic!("expected an infeasibility error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn rejects_truncated_sections() {
    let text = SMALL_VRP.replace("5 0 -1\n", "");
    assert!(Instance::from_str(&text, 10, true, None).is_err());
}
