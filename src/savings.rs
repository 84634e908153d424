//! Clarke-Wright savings construction and the first-fit-decreasing route
//! lower bound.

use crate::instance::{Instance, DEPOT};
use crate::solution::Solution;

struct Saving {
    i: usize,
    j: usize,
    value: f64,
}

/// Build an initial solution with the savings heuristic, limited to the
/// `neighbors_num` nearest neighbors of each customer.
///
/// Starting from one singleton route per customer, route pairs are merged
/// greedily by decreasing saving `c(0,i) + c(0,j) - lambda * c(i,j)`
/// whenever `i` is the tail of one route, `j` the head of another and the
/// merged load fits the vehicle.
pub fn clarke_and_wright(
    instance: &Instance,
    solution: &mut Solution,
    lambda: f64,
    neighbors_num: usize,
) {
    solution.reset();

    for customer in instance.customers() {
        solution.build_one_customer_route(instance, customer);
    }

    let neighbors_num = neighbors_num.min(instance.customers_num() - 1);
    let mut savings = Vec::with_capacity(instance.customers_num() * neighbors_num);

    for i in instance.customers() {
        let mut added = 0;
        for &j in &instance.neighbors(i)[1..] {
            if added >= neighbors_num {
                break;
            }
            if j == DEPOT {
                continue;
            }
            if i < j {
                let value = instance.cost(i, DEPOT) + instance.cost(DEPOT, j)
                    - lambda * instance.cost(i, j);
                savings.push(Saving { i, j, value });
                added += 1;
            }
        }
    }

    savings.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));

    for saving in &savings {
        let i_route = solution.route_index(saving.i);
        let j_route = solution.route_index(saving.j);
        if i_route == j_route {
            continue;
        }

        if solution.last_customer(i_route) == saving.i
            && solution.first_customer(j_route) == saving.j
            && solution.route_load(i_route) + solution.route_load(j_route)
                <= instance.vehicle_capacity()
        {
            solution.append_route(instance, i_route, j_route);
        } else if solution.last_customer(j_route) == saving.j
            && solution.first_customer(i_route) == saving.i
            && solution.route_load(i_route) + solution.route_load(j_route)
                <= instance.vehicle_capacity()
        {
            solution.append_route(instance, j_route, i_route);
        }
    }

    // Construction is not part of any trajectory.
    solution.clear_do_list();
    solution.clear_undo_list();
    solution.clear_svc();
}

/// Greedy first-fit-decreasing bound on the number of routes needed to
/// pack all demands into vehicles.
pub fn min_routes_estimate(instance: &Instance) -> usize {
    let mut customers: Vec<usize> = instance.customers().collect();
    customers.sort_by_key(|&i| std::cmp::Reverse(instance.demand(i)));

    let mut bins: Vec<i64> = Vec::new();
    for customer in customers {
        let demand = instance.demand(customer);
        match bins
            .iter_mut()
            .find(|load| **load + demand <= instance.vehicle_capacity())
        {
            Some(load) => *load += demand,
            None => bins.push(demand),
        }
    }
    bins.len()
}
