//! Mutable solution representation.
//!
//! Routes are not materialized as separate objects: every route is a doubly
//! linked list threaded through per-customer `prev`/`next` slots, and all
//! route operations go through this type. The depot belongs to every route,
//! so its links live in the per-route record rather than in the vertex
//! table.
//!
//! Every mutation keeps the solution cost, the per-route loads and the
//! cached predecessor arc costs up to date, inserts the touched vertices
//! into the set of recently modified vertices, and appends primitive
//! actions to a do/undo journal. The journal makes trajectories cheap to
//! evaluate: run shaking and local search on the live object, then either
//! keep the result or rewind, and replay accepted do-lists onto the
//! best-so-far copy instead of deep-copying solutions.

use crate::collections::{LruSet, RoutePool};
use crate::instance::{Instance, DEPOT};

/// Sentinel identifying an invalid vertex.
pub const DUMMY_VERTEX: usize = usize::MAX;

/// Sentinel identifying an invalid route. Also terminates the route list.
pub const DUMMY_ROUTE: usize = 0;

/// Primitive reversible mutation recorded in the do/undo journal.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    InsertVertex {
        route: usize,
        before: usize,
        vertex: usize,
    },
    RemoveVertex {
        route: usize,
        vertex: usize,
    },
    CreateRoute {
        route: usize,
    },
    RemoveRoute {
        route: usize,
    },
    ReverseRoutePath {
        route: usize,
        begin: usize,
        end: usize,
    },
    CreateOneCustomerRoute {
        route: usize,
        customer: usize,
    },
    RemoveOneCustomerRoute {
        route: usize,
        customer: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct CustomerNode {
    next: usize,
    prev: usize,
    route: usize,
    /// Cumulative demand from the depot up to this customer included.
    load_before: i64,
    /// Cumulative demand from this customer included up to the depot.
    load_after: i64,
    /// Cost of the arc (prev, this customer).
    c_prev_curr: f64,
}

impl Default for CustomerNode {
    fn default() -> Self {
        CustomerNode {
            next: DUMMY_VERTEX,
            prev: DUMMY_VERTEX,
            route: DUMMY_ROUTE,
            load_before: 0,
            load_after: 0,
            c_prev_curr: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RouteNode {
    first_customer: usize,
    last_customer: usize,
    load: i64,
    size: usize,
    next: usize,
    prev: usize,
    in_solution: bool,
    needs_cumulative_update: bool,
    /// Cost of the arc (last customer, depot).
    c_prev_curr: f64,
}

impl Default for RouteNode {
    fn default() -> Self {
        RouteNode {
            first_customer: DUMMY_VERTEX,
            last_customer: DUMMY_VERTEX,
            load: 0,
            size: 0,
            next: DUMMY_ROUTE,
            prev: DUMMY_ROUTE,
            in_solution: false,
            needs_cumulative_update: true,
            c_prev_curr: 0.0,
        }
    }
}

/// A CVRP solution over a fixed instance.
#[derive(Clone)]
pub struct Solution {
    cost: f64,
    pool: RoutePool,
    first_route: usize,
    num_routes: usize,
    routes: Vec<RouteNode>,
    customers: Vec<CustomerNode>,
    svc: LruSet,
    do_list: Vec<Action>,
    undo_list: Vec<Action>,
    trajectory: Vec<Action>,
}

impl Solution {
    /// Create an empty solution. `history_len` bounds the set of recently
    /// modified vertices.
    pub fn new(instance: &Instance, history_len: usize) -> Self {
        let n = instance.vertices_num();
        let max_routes = n + 1;
        Solution {
            cost: 0.0,
            pool: RoutePool::new(1, max_routes - 1),
            first_route: DUMMY_ROUTE,
            num_routes: 0,
            routes: vec![RouteNode::default(); max_routes],
            customers: vec![CustomerNode::default(); n],
            svc: LruSet::new(history_len.min(n), n),
            do_list: Vec::new(),
            undo_list: Vec::new(),
            trajectory: Vec::new(),
        }
    }

    /// Remove every route and clear journals and the recently-modified set.
    pub fn reset(&mut self) {
        self.cost = 0.0;
        self.pool.reset();
        self.first_route = DUMMY_ROUTE;
        self.num_routes = 0;
        for route in &mut self.routes {
            *route = RouteNode::default();
        }
        for customer in &mut self.customers {
            *customer = CustomerNode::default();
        }
        self.svc.clear();
        self.do_list.clear();
        self.undo_list.clear();
        self.trajectory.clear();
    }

    #[inline]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    #[inline]
    pub fn routes_num(&self) -> usize {
        self.num_routes
    }

    /// First route in the solution, or [`DUMMY_ROUTE`] if there is none.
    #[inline]
    pub fn first_route(&self) -> usize {
        self.first_route
    }

    /// Route after `route` in the route list, or [`DUMMY_ROUTE`].
    #[inline]
    pub fn next_route(&self, route: usize) -> usize {
        self.routes[route].next
    }

    /// Iterator over the present route identifiers.
    pub fn route_ids(&self) -> RouteIdIter<'_> {
        RouteIdIter {
            solution: self,
            curr: self.first_route,
        }
    }

    /// Build a route serving only `customer` and return its identifier.
    pub fn build_one_customer_route(&mut self, instance: &Instance, customer: usize) -> usize {
        self.build_one_customer_route_impl(instance, customer, true)
    }

    fn build_one_customer_route_impl(
        &mut self,
        instance: &Instance,
        customer: usize,
        record: bool,
    ) -> usize {
        debug_assert!(customer != DEPOT);
        debug_assert!(!self.is_customer_served(customer));

        let route = self.request_route();

        if record {
            self.do_list
                .push(Action::CreateOneCustomerRoute { route, customer });
            self.undo_list
                .push(Action::RemoveOneCustomerRoute { route, customer });
        }

        let c_depot = instance.cost(DEPOT, customer);
        self.customers[customer] = CustomerNode {
            next: DEPOT,
            prev: DEPOT,
            route,
            load_before: 0,
            load_after: 0,
            c_prev_curr: c_depot,
        };

        // Head-insert into the route list.
        let next_route = self.first_route;
        self.routes[route].next = next_route;
        self.routes[route].prev = DUMMY_ROUTE;
        self.routes[next_route].prev = route;
        self.first_route = route;

        self.routes[route].first_customer = customer;
        self.routes[route].last_customer = customer;
        self.routes[route].load = instance.demand(customer);
        self.routes[route].size = 1;
        self.routes[route].c_prev_curr = c_depot;
        self.routes[route].needs_cumulative_update = true;

        self.cost += 2.0 * c_depot;
        self.svc.insert(customer);

        route
    }

    /// Route serving `customer`. The customer must not be the depot.
    #[inline]
    pub fn route_index(&self, customer: usize) -> usize {
        debug_assert!(customer != DEPOT);
        self.customers[customer].route
    }

    /// Route serving `vertex`, using `fallback` to identify the route when
    /// `vertex` is the depot.
    #[inline]
    pub fn route_index_of(&self, vertex: usize, fallback: usize) -> usize {
        if vertex == DEPOT {
            self.customers[fallback].route
        } else {
            self.customers[vertex].route
        }
    }

    #[inline]
    pub fn route_load(&self, route: usize) -> i64 {
        self.routes[route].load
    }

    #[inline]
    pub fn route_size(&self, route: usize) -> usize {
        self.routes[route].size
    }

    #[inline]
    pub fn is_route_empty(&self, route: usize) -> bool {
        self.routes[route].load == 0
    }

    #[inline]
    pub fn is_route_in_solution(&self, route: usize) -> bool {
        self.routes[route].in_solution
    }

    #[inline]
    pub fn is_customer_served(&self, customer: usize) -> bool {
        debug_assert!(customer != DEPOT);
        self.customers[customer].route != DUMMY_ROUTE
    }

    /// Whether `vertex` is served. The depot is always considered served.
    #[inline]
    pub fn is_vertex_served(&self, vertex: usize) -> bool {
        vertex == DEPOT || self.is_customer_served(vertex)
    }

    /// Whether `route` serves `vertex`. Always true for the depot.
    #[inline]
    pub fn contains_vertex(&self, route: usize, vertex: usize) -> bool {
        vertex == DEPOT || self.customers[vertex].route == route
    }

    #[inline]
    pub fn first_customer(&self, route: usize) -> usize {
        self.routes[route].first_customer
    }

    #[inline]
    pub fn last_customer(&self, route: usize) -> usize {
        self.routes[route].last_customer
    }

    /// Successor of `customer` in its route.
    #[inline]
    pub fn next_vertex(&self, customer: usize) -> usize {
        debug_assert!(customer != DEPOT);
        self.customers[customer].next
    }

    /// Successor of `vertex` in `route`; the right accessor when the
    /// vertex might be the depot.
    #[inline]
    pub fn next_vertex_in(&self, route: usize, vertex: usize) -> usize {
        if vertex == DEPOT {
            self.routes[route].first_customer
        } else {
            self.customers[vertex].next
        }
    }

    /// Predecessor of `customer` in its route.
    #[inline]
    pub fn prev_vertex(&self, customer: usize) -> usize {
        debug_assert!(customer != DEPOT);
        self.customers[customer].prev
    }

    /// Predecessor of `vertex` in `route`; the right accessor when the
    /// vertex might be the depot.
    #[inline]
    pub fn prev_vertex_in(&self, route: usize, vertex: usize) -> usize {
        if vertex == DEPOT {
            self.routes[route].last_customer
        } else {
            self.customers[vertex].prev
        }
    }

    /// Cost of the arc (prev, vertex) within `route`.
    #[inline]
    pub fn cost_prev_vertex(&self, route: usize, vertex: usize) -> f64 {
        if vertex == DEPOT {
            self.routes[route].c_prev_curr
        } else {
            self.customers[vertex].c_prev_curr
        }
    }

    /// Cost of the arc (prev, customer).
    #[inline]
    pub fn cost_prev_customer(&self, customer: usize) -> f64 {
        debug_assert!(customer != DEPOT);
        self.customers[customer].c_prev_curr
    }

    /// Cost of the arc (last customer, depot) of `route`.
    #[inline]
    pub fn cost_prev_depot(&self, route: usize) -> f64 {
        self.routes[route].c_prev_curr
    }

    /// Cumulative demand from the depot up to `customer` included.
    /// Recomputes the route prefix sums lazily.
    pub fn route_load_before_included(&mut self, instance: &Instance, customer: usize) -> i64 {
        debug_assert!(customer != DEPOT);
        let route = self.customers[customer].route;
        if self.routes[route].needs_cumulative_update {
            self.update_cumulative_loads(instance, route);
        }
        self.customers[customer].load_before
    }

    /// Cumulative demand from `customer` included up to the depot.
    pub fn route_load_after_included(&mut self, instance: &Instance, customer: usize) -> i64 {
        debug_assert!(customer != DEPOT);
        let route = self.customers[customer].route;
        if self.routes[route].needs_cumulative_update {
            self.update_cumulative_loads(instance, route);
        }
        self.customers[customer].load_after
    }

    /// Remove `vertex` from `route` and return the cost delta.
    ///
    /// Removing the depot leaves the route in a transient state where its
    /// customers form a pure cycle; the depot must be reinserted before the
    /// route is observed again. Detecting an emptied route and releasing it
    /// is the caller's responsibility.
    pub fn remove_vertex(&mut self, instance: &Instance, route: usize, vertex: usize) -> f64 {
        self.remove_vertex_impl(instance, route, vertex, true)
    }

    fn remove_vertex_impl(
        &mut self,
        instance: &Instance,
        route: usize,
        vertex: usize,
        record: bool,
    ) -> f64 {
        debug_assert!(self.contains_vertex(route, vertex));

        if record {
            let next = self.next_vertex_in(route, vertex);
            self.do_list.push(Action::RemoveVertex { route, vertex });
            self.undo_list.push(Action::InsertVertex {
                route,
                before: next,
                vertex,
            });
        }

        if vertex == DEPOT {
            debug_assert!(!self.is_route_empty(route));

            let next = self.routes[route].first_customer;
            let prev = self.routes[route].last_customer;

            self.svc.insert(vertex);
            self.svc.insert(prev);
            self.svc.insert(next);

            // Close the customer cycle over the removed depot.
            self.set_prev_vertex_ptr(route, next, prev);
            self.set_next_vertex_ptr(route, prev, next);

            self.routes[route].first_customer = DUMMY_VERTEX;
            self.routes[route].last_customer = DUMMY_VERTEX;

            debug_assert!(next != DEPOT);
            let c_prev_next = instance.cost(prev, next);
            self.customers[next].c_prev_curr = c_prev_next;

            let delta = c_prev_next - instance.cost(prev, vertex) - instance.cost(vertex, next);
            self.cost += delta;
            self.routes[route].needs_cumulative_update = true;
            delta
        } else {
            let next = self.customers[vertex].next;
            let prev = self.customers[vertex].prev;

            self.svc.insert(vertex);
            self.svc.insert(prev);
            self.svc.insert(next);

            if vertex == self.routes[route].first_customer {
                self.routes[route].first_customer = next;
                self.set_prev_vertex_ptr(route, next, DEPOT);
            } else if vertex == self.routes[route].last_customer {
                self.routes[route].last_customer = prev;
                self.set_next_vertex_ptr(route, prev, DEPOT);
            } else {
                self.customers[prev].next = next;
                self.customers[next].prev = prev;
            }

            self.routes[route].load -= instance.demand(vertex);
            self.routes[route].size -= 1;

            let c_prev_next = instance.cost(prev, next);
            if next == DEPOT {
                self.routes[route].c_prev_curr = c_prev_next;
            } else {
                self.customers[next].c_prev_curr = c_prev_next;
            }

            let delta = c_prev_next - instance.cost(prev, vertex) - instance.cost(vertex, next);
            self.cost += delta;

            self.customers[vertex].next = DUMMY_VERTEX;
            self.customers[vertex].prev = DUMMY_VERTEX;
            self.customers[vertex].route = DUMMY_ROUTE;

            self.routes[route].needs_cumulative_update = true;
            delta
        }
    }

    /// Insert `vertex` before `where_` in `route`. Inserting the depot
    /// restores a route left depot-less by [`Solution::remove_vertex`]; a
    /// customer must be unserved.
    pub fn insert_vertex_before(
        &mut self,
        instance: &Instance,
        route: usize,
        where_: usize,
        vertex: usize,
    ) {
        self.insert_vertex_before_impl(instance, route, where_, vertex, true)
    }

    fn insert_vertex_before_impl(
        &mut self,
        instance: &Instance,
        route: usize,
        where_: usize,
        vertex: usize,
        record: bool,
    ) {
        debug_assert!(where_ != vertex);

        if record {
            self.do_list.push(Action::InsertVertex {
                route,
                before: where_,
                vertex,
            });
            self.undo_list.push(Action::RemoveVertex { route, vertex });
        }

        if vertex == DEPOT {
            debug_assert_eq!(self.routes[route].first_customer, DUMMY_VERTEX);
            debug_assert!(where_ != DEPOT);
            debug_assert!(!self.is_route_empty(route));

            let prev = self.customers[where_].prev;
            debug_assert!(prev != DEPOT);

            self.svc.insert(prev);
            self.svc.insert(where_);

            self.routes[route].first_customer = where_;
            self.routes[route].last_customer = prev;

            self.customers[prev].next = DEPOT;
            self.customers[where_].prev = DEPOT;

            self.routes[route].c_prev_curr = instance.cost(prev, DEPOT);

            let old_cost_prev_where = self.customers[where_].c_prev_curr;
            self.customers[where_].c_prev_curr = instance.cost(DEPOT, where_);

            let delta = self.routes[route].c_prev_curr + self.customers[where_].c_prev_curr
                - old_cost_prev_where;
            self.cost += delta;
        } else {
            debug_assert!(!self.is_customer_served(vertex));

            let prev = self.prev_vertex_in(route, where_);

            self.svc.insert(prev);
            self.svc.insert(where_);

            self.customers[vertex].next = where_;
            self.customers[vertex].prev = prev;
            self.customers[vertex].route = route;

            self.set_next_vertex_ptr(route, prev, vertex);
            self.set_prev_vertex_ptr(route, where_, vertex);

            let c_vertex_where = instance.cost(vertex, where_);
            let old_cost_prev_where = if where_ == DEPOT {
                let old = self.routes[route].c_prev_curr;
                self.routes[route].c_prev_curr = c_vertex_where;
                old
            } else {
                let old = self.customers[where_].c_prev_curr;
                self.customers[where_].c_prev_curr = c_vertex_where;
                old
            };
            self.customers[vertex].c_prev_curr = instance.cost(prev, vertex);

            let delta = self.customers[vertex].c_prev_curr + c_vertex_where - old_cost_prev_where;
            self.cost += delta;
            self.routes[route].load += instance.demand(vertex);
            self.routes[route].size += 1;
        }

        self.routes[route].needs_cumulative_update = true;
    }

    /// Release an empty route back to the pool.
    pub fn remove_route(&mut self, route: usize) {
        self.remove_route_impl(route, true)
    }

    fn remove_route_impl(&mut self, route: usize, record: bool) {
        debug_assert!(self.is_route_empty(route));
        if record {
            self.do_list.push(Action::RemoveRoute { route });
            self.undo_list.push(Action::CreateRoute { route });
        }
        self.release_route(route);
    }

    /// Reverse the sub-path from `begin` to `end` included. Both endpoints
    /// may be the depot.
    pub fn reverse_route_path(
        &mut self,
        instance: &Instance,
        route: usize,
        begin: usize,
        end: usize,
    ) {
        self.reverse_route_path_impl(instance, route, begin, end, true)
    }

    fn reverse_route_path_impl(
        &mut self,
        instance: &Instance,
        route: usize,
        begin: usize,
        end: usize,
        record: bool,
    ) {
        debug_assert!(begin != end);

        if record {
            self.do_list.push(Action::ReverseRoutePath { route, begin, end });
            self.undo_list.push(Action::ReverseRoutePath {
                route,
                begin: end,
                end: begin,
            });
        }

        let pre = self.prev_vertex_in(route, begin);
        let stop = self.next_vertex_in(route, end);
        let c_pre_begin = self.cost_prev_vertex(route, begin);
        let c_pre_end = instance.cost(pre, end);
        let c_begin_stop = instance.cost(stop, begin);

        self.svc.insert(pre);
        self.svc.insert(stop);

        // Flip the links of every vertex in the segment.
        let mut curr = begin;
        loop {
            self.svc.insert(curr);

            let prev = self.prev_vertex_in(route, curr);
            let next = self.next_vertex_in(route, curr);

            if curr == DEPOT {
                self.routes[route].last_customer = next;
                self.routes[route].first_customer = prev;
                debug_assert!(next != DEPOT);
                self.routes[route].c_prev_curr = self.customers[next].c_prev_curr;
            } else {
                self.customers[curr].prev = next;
                self.customers[curr].next = prev;
                self.customers[curr].c_prev_curr = self.cost_prev_vertex(route, next);
            }

            curr = next;
            if curr == stop {
                break;
            }
        }

        if end == pre && begin == stop {
            // The segment spans the whole cycle: only the boundary arc
            // orientation changes.
            if end == DEPOT {
                self.routes[route].c_prev_curr = c_pre_begin;
            } else {
                self.customers[end].c_prev_curr = c_pre_begin;
            }
        } else {
            self.set_next_vertex_ptr(route, begin, stop);
            self.set_next_vertex_ptr(route, pre, end);

            if end == DEPOT {
                self.routes[route].last_customer = pre;
                self.routes[route].c_prev_curr = c_pre_end;
            } else {
                self.customers[end].prev = pre;
                self.customers[end].c_prev_curr = c_pre_end;
            }

            if stop == DEPOT {
                self.routes[route].last_customer = begin;
                self.routes[route].c_prev_curr = c_begin_stop;
            } else {
                self.customers[stop].prev = begin;
                self.customers[stop].c_prev_curr = c_begin_stop;
            }
        }

        let delta = c_pre_end + c_begin_stop - instance.cost(pre, begin) - instance.cost(end, stop);
        self.cost += delta;
        self.routes[route].needs_cumulative_update = true;
    }

    /// Splice the customers of `other` after the last customer of `route`
    /// and release `other`. Not journaled: used only during construction,
    /// before any trajectory bookkeeping starts.
    pub fn append_route(&mut self, instance: &Instance, route: usize, other: usize) {
        let route_end = self.routes[route].last_customer;
        let other_start = self.routes[other].first_customer;

        debug_assert!(route_end != DEPOT);
        debug_assert!(other_start != DEPOT);

        self.customers[route_end].next = other_start;
        self.customers[other_start].prev = route_end;
        self.customers[other_start].c_prev_curr = instance.cost(route_end, other_start);

        self.routes[route].last_customer = self.routes[other].last_customer;
        self.routes[route].load += self.routes[other].load;
        self.routes[route].size += self.routes[other].size;
        self.routes[route].c_prev_curr = self.routes[other].c_prev_curr;

        let delta = self.customers[other_start].c_prev_curr
            - instance.cost(route_end, DEPOT)
            - instance.cost(DEPOT, other_start);
        self.cost += delta;

        self.svc.insert(route_end);
        let mut curr = other_start;
        while curr != DEPOT {
            self.customers[curr].route = route;
            self.svc.insert(curr);
            curr = self.customers[curr].next;
        }

        self.release_route(other);
        self.routes[route].needs_cumulative_update = true;
    }

    /// Exchange the tails after `i` and from `j` between two routes:
    /// `(i, next(i))` becomes `(i, j)` and `(prev(j), j)` becomes
    /// `(prev(j), next(i))`.
    pub fn swap_tails(
        &mut self,
        instance: &Instance,
        i: usize,
        i_route: usize,
        j: usize,
        j_route: usize,
    ) {
        debug_assert!(i != DEPOT && j != DEPOT);
        debug_assert!(i_route != j_route);

        let i_next = self.customers[i].next;

        let mut curr = j;
        while curr != DEPOT {
            let next = self.customers[curr].next;
            self.remove_vertex(instance, j_route, curr);
            self.insert_vertex_before(instance, i_route, i_next, curr);
            curr = next;
        }

        curr = i_next;
        while curr != DEPOT {
            let next = self.customers[curr].next;
            self.remove_vertex(instance, i_route, curr);
            self.insert_vertex_before(instance, j_route, DEPOT, curr);
            curr = next;
        }
    }

    /// Cross two routes with reversal: the customers up to `j` join `i`'s
    /// route reversed after `i`, and the customers after `i` join `j`'s
    /// route reversed before `next(j)`.
    pub fn split_routes(
        &mut self,
        instance: &Instance,
        i: usize,
        i_route: usize,
        j: usize,
        j_route: usize,
    ) {
        debug_assert!(i != DEPOT && j != DEPOT);
        debug_assert!(i_route != j_route);

        let i_next = self.customers[i].next;
        let j_next = self.customers[j].next;

        let mut curr = j;
        while curr != DEPOT {
            let prev = self.customers[curr].prev;
            self.remove_vertex(instance, j_route, curr);
            self.insert_vertex_before(instance, i_route, i_next, curr);
            curr = prev;
        }

        let mut before = j_next;
        curr = i_next;
        while curr != DEPOT {
            let next = self.customers[curr].next;
            self.remove_vertex(instance, i_route, curr);
            self.insert_vertex_before(instance, j_route, before, curr);
            before = curr;
            curr = next;
        }
    }

    /// Route cost recomputed from scratch. Linear in the route size.
    pub fn route_cost(&self, instance: &Instance, route: usize) -> f64 {
        let mut curr = self.routes[route].first_customer;
        let mut sum = instance.cost(DEPOT, curr);
        while curr != DEPOT {
            let next = self.customers[curr].next;
            sum += instance.cost(curr, next);
            curr = next;
        }
        sum
    }

    /// Customers of `route` in visiting order.
    pub fn route_customers(&self, route: usize) -> Vec<usize> {
        let mut result = Vec::with_capacity(self.routes[route].size);
        let mut curr = self.routes[route].first_customer;
        while curr != DEPOT {
            result.push(curr);
            curr = self.customers[curr].next;
        }
        result
    }

    /// All customers, routes concatenated in their natural order.
    pub fn giant_tour(&self) -> Vec<usize> {
        let mut tour = Vec::new();
        for route in self.route_ids() {
            let mut curr = self.routes[route].first_customer;
            while curr != DEPOT {
                tour.push(curr);
                curr = self.customers[curr].next;
            }
        }
        tour
    }

    // ----- recently modified vertices -----

    #[inline]
    pub fn svc_len(&self) -> usize {
        self.svc.len()
    }

    pub fn clear_svc(&mut self) {
        self.svc.clear();
    }

    /// Iterate over the recently modified vertices, most recent first. Do
    /// not mutate the solution while iterating.
    pub fn svc_iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.svc.iter()
    }

    /// Record `vertex` as recently modified.
    pub fn mark_modified(&mut self, vertex: usize) {
        self.svc.insert(vertex);
    }

    // ----- do/undo journal -----

    pub fn clear_do_list(&mut self) {
        self.do_list.clear();
    }

    pub fn clear_undo_list(&mut self) {
        self.undo_list.clear();
    }

    pub fn clear_trajectory(&mut self) {
        self.trajectory.clear();
    }

    /// Undo every mutation journaled since the last clear, restoring the
    /// state the undo list was started from. Clears both journals.
    pub fn rewind(&mut self, instance: &Instance) {
        let undo_list = std::mem::take(&mut self.undo_list);
        for action in undo_list.iter().rev() {
            self.apply_action(instance, *action);
        }
        self.do_list.clear();
    }

    /// Replay this solution's do-list onto `target`.
    pub fn apply_do_list_to(&self, instance: &Instance, target: &mut Solution) {
        for &action in &self.do_list {
            target.apply_action(instance, action);
        }
    }

    /// Replay the accepted trajectory onto `target`.
    pub fn apply_trajectory_to(&self, instance: &Instance, target: &mut Solution) {
        for &action in &self.trajectory {
            target.apply_action(instance, action);
        }
    }

    /// Move the current do-list to the end of the accepted trajectory.
    pub fn append_do_list_to_trajectory(&mut self) {
        self.trajectory.append(&mut self.do_list);
    }

    fn apply_action(&mut self, instance: &Instance, action: Action) {
        match action {
            Action::InsertVertex {
                route,
                before,
                vertex,
            } => {
                if self.is_route_in_solution(route) {
                    self.insert_vertex_before_impl(instance, route, before, vertex, false);
                } else {
                    // The route was released in the meantime; the insertion
                    // recreates it, and the pool's LIFO discipline hands the
                    // same identifier back.
                    debug_assert_eq!(before, DEPOT);
                    let created = self.build_one_customer_route_impl(instance, vertex, false);
                    debug_assert_eq!(created, route);
                }
            }
            Action::RemoveVertex { route, vertex } => {
                self.remove_vertex_impl(instance, route, vertex, false);
            }
            Action::CreateRoute { route } => {
                debug_assert!(!self.is_route_in_solution(route));
            }
            Action::RemoveRoute { route } => {
                self.remove_route_impl(route, false);
            }
            Action::ReverseRoutePath { route, begin, end } => {
                self.reverse_route_path_impl(instance, route, begin, end, false);
            }
            Action::CreateOneCustomerRoute { route, customer } => {
                let created = self.build_one_customer_route_impl(instance, customer, false);
                debug_assert_eq!(created, route);
            }
            Action::RemoveOneCustomerRoute { route, customer } => {
                self.remove_vertex_impl(instance, route, customer, false);
                debug_assert!(self.is_route_empty(route));
                self.remove_route_impl(route, false);
            }
        }
    }

    // ----- validation -----

    /// Whether every route satisfies the load constraint.
    pub fn is_load_feasible(&self, instance: &Instance) -> bool {
        self.route_ids()
            .all(|r| self.routes[r].load <= instance.vehicle_capacity())
    }

    /// Full structural validation: partition of the served customers, link
    /// symmetry, load counters, cached arc costs and total cost. Expensive;
    /// meant for tests and debug assertions. With `allow_unserved` the
    /// customer partition may be partial.
    pub fn is_feasible(&self, instance: &Instance, allow_unserved: bool) -> bool {
        let mut visited = vec![false; instance.vertices_num()];
        let mut total_cost = 0.0;
        let mut traversed_routes = 0;

        for route in self.route_ids() {
            if !self.routes[route].in_solution {
                return false;
            }
            traversed_routes += 1;

            let mut load = 0i64;
            let mut size = 0usize;
            let mut prev = DEPOT;
            let mut curr = self.routes[route].first_customer;
            if curr == DUMMY_VERTEX {
                return false;
            }
            while curr != DEPOT {
                if visited[curr] {
                    return false;
                }
                visited[curr] = true;
                if self.customers[curr].route != route {
                    return false;
                }
                if self.customers[curr].prev != prev {
                    return false;
                }
                if (self.customers[curr].c_prev_curr - instance.cost(prev, curr)).abs() > 0.01 {
                    return false;
                }
                total_cost += instance.cost(prev, curr);
                load += instance.demand(curr);
                size += 1;
                prev = curr;
                curr = self.customers[curr].next;
            }
            if self.routes[route].last_customer != prev {
                return false;
            }
            if (self.routes[route].c_prev_curr - instance.cost(prev, DEPOT)).abs() > 0.01 {
                return false;
            }
            total_cost += instance.cost(prev, DEPOT);
            if self.routes[route].load != load || self.routes[route].size != size {
                return false;
            }
            if load > instance.vehicle_capacity() {
                return false;
            }
            if size == 0 {
                // Empty routes must be released immediately.
                return false;
            }
        }

        if traversed_routes != self.num_routes {
            return false;
        }
        for customer in instance.customers() {
            if !visited[customer] {
                if !allow_unserved {
                    return false;
                }
                if self.customers[customer].route != DUMMY_ROUTE {
                    return false;
                }
            }
        }

        (total_cost - self.cost).abs() <= 0.01
    }

    // ----- internals -----

    #[inline]
    fn set_next_vertex_ptr(&mut self, route: usize, vertex: usize, next: usize) {
        if vertex == DEPOT {
            self.routes[route].first_customer = next;
        } else {
            self.customers[vertex].next = next;
        }
    }

    #[inline]
    fn set_prev_vertex_ptr(&mut self, route: usize, vertex: usize, prev: usize) {
        if vertex == DEPOT {
            self.routes[route].last_customer = prev;
        } else {
            self.customers[vertex].prev = prev;
        }
    }

    fn request_route(&mut self) -> usize {
        let route = self.pool.acquire();
        self.routes[route].in_solution = true;
        self.num_routes += 1;
        route
    }

    fn release_route(&mut self, route: usize) {
        let prev_route = self.routes[route].prev;
        let next_route = self.routes[route].next;
        self.routes[prev_route].next = next_route;
        self.routes[next_route].prev = prev_route;
        self.num_routes -= 1;

        if self.first_route == route {
            self.first_route = next_route;
        }

        self.routes[route] = RouteNode::default();
        self.pool.release(route);
    }

    fn update_cumulative_loads(&mut self, instance: &Instance, route: usize) {
        debug_assert!(!self.is_route_empty(route));

        let mut prev = self.routes[route].first_customer;
        self.customers[prev].load_before = instance.demand(prev);
        self.customers[prev].load_after = self.routes[route].load;

        let mut curr = self.customers[prev].next;
        while curr != DEPOT {
            self.customers[curr].load_before =
                self.customers[prev].load_before + instance.demand(curr);
            self.customers[curr].load_after =
                self.customers[prev].load_after - instance.demand(prev);
            prev = curr;
            curr = self.customers[curr].next;
        }

        self.routes[route].needs_cumulative_update = false;
    }
}

pub struct RouteIdIter<'a> {
    solution: &'a Solution,
    curr: usize,
}

impl Iterator for RouteIdIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.curr == DUMMY_ROUTE {
            None
        } else {
            let route = self.curr;
            self.curr = self.solution.routes[route].next;
            Some(route)
        }
    }
}
