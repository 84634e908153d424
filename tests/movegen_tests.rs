//! Tests for the move-generator registry: pairwise storage, granular
//! activation and the re-keyable heap.

use ils_cvrp::instance::Instance;
use ils_cvrp::movegen::{MoveGenerators, UNHEAPED};

fn make_instance(coords: &[(f64, f64)], demands: &[i64], capacity: i64) -> Instance {
    let xs = coords.iter().map(|c| c.0).collect();
    let ys = coords.iter().map(|c| c.1).collect();
    Instance::new(
        "test".to_string(),
        xs,
        ys,
        demands.to_vec(),
        capacity,
        None,
        0.0,
        coords.len(),
        false,
        None,
    )
    .expect("valid test instance")
}

fn square_instance() -> Instance {
    make_instance(
        &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)],
        &[0, 1, 1, 1, 1],
        4,
    )
}

#[test]
fn complete_neighbor_lists_store_each_pair_once() {
    let instance = square_instance();
    let moves = MoveGenerators::new(&instance, instance.vertices_num() - 1);

    // Five vertices, complete candidate graph: C(5, 2) pairs, generator
    // and twin for each.
    assert_eq!(moves.len(), 2 * 10);

    // Twins share the pair and swap the endpoints.
    for base in (0..moves.len()).step_by(2) {
        let mv = moves.get(base);
        let twin = moves.get(MoveGenerators::twin_index(base));
        assert_eq!(mv.first_vertex(), twin.second_vertex());
        assert_eq!(mv.second_vertex(), twin.first_vertex());
        let expected = instance.cost(mv.first_vertex(), mv.second_vertex());
        assert!((moves.edge_cost(base) - expected).abs() < 1e-9);
    }
}

#[test]
fn full_activation_exposes_all_candidates() {
    let instance = square_instance();
    let n = instance.vertices_num();
    let mut moves = MoveGenerators::new(&instance, n - 1);

    let gamma = vec![1.0; n];
    let vertices: Vec<usize> = (0..n).collect();
    moves.set_active_percentage(&gamma, &vertices);

    for vertex in 0..n {
        let involving = moves.indices_involving_1st(vertex);
        assert_eq!(involving.len(), n - 1);
        for &idx in involving {
            assert_eq!(moves.get(idx as usize).first_vertex(), vertex);
        }
    }
}

#[test]
fn deactivation_shrinks_candidate_lists() {
    let instance = square_instance();
    let n = instance.vertices_num();
    let mut moves = MoveGenerators::new(&instance, n - 1);

    let mut gamma = vec![1.0; n];
    let vertices: Vec<usize> = (0..n).collect();
    moves.set_active_percentage(&gamma, &vertices);

    // Drop vertex 1 to zero: its pairs survive only where the other
    // endpoint keeps them active.
    gamma[1] = 0.0;
    moves.set_active_percentage(&gamma, &[1]);

    for &idx in moves.indices_involving_1st(1) {
        let j = moves.get(idx as usize).second_vertex();
        assert!(j != 1);
    }

    // Deactivating everything empties every list.
    let gamma = vec![0.0; n];
    moves.set_active_percentage(&gamma, &vertices);
    for vertex in 0..n {
        assert!(moves.indices_involving_1st(vertex).is_empty());
    }
}

#[test]
fn heap_orders_by_delta_and_rekeys() {
    let instance = square_instance();
    let mut moves = MoveGenerators::new(&instance, instance.vertices_num() - 1);

    moves.heap_reset();
    moves.get_mut(0).set_delta(-3.0);
    moves.get_mut(2).set_delta(-8.0);
    moves.get_mut(4).set_delta(-1.0);
    moves.heap_insert(0);
    moves.heap_insert(2);
    moves.heap_insert(4);

    assert_eq!(moves.heap_len(), 3);
    assert_eq!(moves.heap_at(0), 2);
    assert_eq!(moves.get(2).heap_index(), 0);

    // Worsening past the tolerance drops the entry.
    moves.heap_refresh(2, 1.0, 0.01);
    assert_eq!(moves.heap_len(), 2);
    assert_eq!(moves.get(2).heap_index(), UNHEAPED);
    assert_eq!(moves.heap_at(0), 0);

    // Improving an unheaped entry inserts it at the right rank.
    moves.heap_refresh(2, -10.0, 0.01);
    assert_eq!(moves.heap_at(0), 2);

    // Decrease-key moves an existing entry up.
    moves.heap_refresh(4, -20.0, 0.01);
    assert_eq!(moves.heap_at(0), 4);

    moves.heap_reset();
    assert_eq!(moves.heap_len(), 0);
    assert_eq!(moves.get(4).heap_index(), UNHEAPED);
}
