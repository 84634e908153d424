//! 2-d tree used once at load time to precompute the nearest-neighbor
//! list of every vertex.

use std::collections::BinaryHeap;

#[derive(Clone, Copy)]
struct Point {
    index: usize,
    coords: [f64; 2],
}

struct Node {
    cut_dim: usize,
    point: Point,
    lo_bound: [f64; 2],
    hi_bound: [f64; 2],
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// Candidate neighbor ordered by distance, for the bounded max-heap used
/// during queries.
#[derive(Clone, Copy, PartialEq)]
struct Candidate {
    index: usize,
    dist2: f64,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist2
            .partial_cmp(&other.dist2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Static k-d tree over 2-d points.
pub struct KdTree {
    root: Option<Box<Node>>,
}

impl KdTree {
    pub fn new(xs: &[f64], ys: &[f64]) -> Self {
        let mut points: Vec<Point> = xs
            .iter()
            .zip(ys)
            .enumerate()
            .map(|(index, (&x, &y))| Point {
                index,
                coords: [x, y],
            })
            .collect();

        let mut lo = [f64::INFINITY; 2];
        let mut hi = [f64::NEG_INFINITY; 2];
        for p in &points {
            for d in 0..2 {
                lo[d] = lo[d].min(p.coords[d]);
                hi[d] = hi[d].max(p.coords[d]);
            }
        }

        let root = if points.is_empty() {
            None
        } else {
            Some(Self::build(&mut points, 0, lo, hi))
        };
        KdTree { root }
    }

    fn build(points: &mut [Point], depth: usize, lo: [f64; 2], hi: [f64; 2]) -> Box<Node> {
        let cut_dim = depth % 2;
        let median = points.len() / 2;
        points.select_nth_unstable_by(median, |a, b| {
            a.coords[cut_dim]
                .partial_cmp(&b.coords[cut_dim])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let point = points[median];
        let cut = point.coords[cut_dim];

        let (left_slice, rest) = points.split_at_mut(median);
        let right_slice = &mut rest[1..];

        let left = if left_slice.is_empty() {
            None
        } else {
            let mut child_hi = hi;
            child_hi[cut_dim] = cut;
            Some(Self::build(left_slice, depth + 1, lo, child_hi))
        };
        let right = if right_slice.is_empty() {
            None
        } else {
            let mut child_lo = lo;
            child_lo[cut_dim] = cut;
            Some(Self::build(right_slice, depth + 1, child_lo, hi))
        };

        Box::new(Node {
            cut_dim,
            point,
            lo_bound: lo,
            hi_bound: hi,
            left,
            right,
        })
    }

    /// Indices of the `k` points closest to `(x, y)`, by increasing
    /// distance. The query point itself is part of the result when it is
    /// one of the stored points.
    pub fn nearest_neighbors(&self, x: f64, y: f64, k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = &self.root {
            Self::search(root, [x, y], k, &mut heap);
        }
        let mut result: Vec<Candidate> = heap.into_vec();
        result.sort();
        result.into_iter().map(|c| c.index).collect()
    }

    fn search(node: &Node, query: [f64; 2], k: usize, heap: &mut BinaryHeap<Candidate>) {
        let dx = node.point.coords[0] - query[0];
        let dy = node.point.coords[1] - query[1];
        let dist2 = dx * dx + dy * dy;
        if heap.len() < k {
            heap.push(Candidate {
                index: node.point.index,
                dist2,
            });
        } else if dist2 < heap.peek().map(|c| c.dist2).unwrap_or(f64::INFINITY) {
            heap.pop();
            heap.push(Candidate {
                index: node.point.index,
                dist2,
            });
        }

        let cut = node.point.coords[node.cut_dim];
        let (near, far) = if query[node.cut_dim] < cut {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(child) = near {
            Self::search(child, query, k, heap);
        }
        if let Some(child) = far {
            if Self::bounds_overlap_ball(child, query, Self::radius2(heap, k)) {
                Self::search(child, query, k, heap);
            }
        }
    }

    fn radius2(heap: &BinaryHeap<Candidate>, k: usize) -> f64 {
        if heap.len() < k {
            f64::INFINITY
        } else {
            heap.peek().map(|c| c.dist2).unwrap_or(f64::INFINITY)
        }
    }

    fn bounds_overlap_ball(node: &Node, query: [f64; 2], radius2: f64) -> bool {
        if radius2.is_infinite() {
            return true;
        }
        let mut dist2 = 0.0;
        for d in 0..2 {
            if query[d] < node.lo_bound[d] {
                let diff = node.lo_bound[d] - query[d];
                dist2 += diff * diff;
            } else if query[d] > node.hi_bound[d] {
                let diff = query[d] - node.hi_bound[d];
                dist2 += diff * diff;
            }
        }
        dist2 <= radius2
    }
}
