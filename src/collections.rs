//! Small support containers used by the solver core.
//!
//! All of these are allocation-free after construction: scratch state is
//! cleared, never freed, so the hot loops of the local search never touch
//! the allocator.

/// Set of small non-negative integers with O(1) insert and membership test
/// and O(k) clear, where k is the number of stored elements.
#[derive(Debug, Clone)]
pub struct SparseIntSet {
    flags: Vec<bool>,
    elements: Vec<usize>,
}

impl SparseIntSet {
    /// Create a set able to hold values in `[0, universe)`.
    pub fn new(universe: usize) -> Self {
        SparseIntSet {
            flags: vec![false; universe],
            elements: Vec::new(),
        }
    }

    /// Insert `value` if it is not already present.
    #[inline]
    pub fn insert(&mut self, value: usize) {
        if !self.flags[value] {
            self.flags[value] = true;
            self.elements.push(value);
        }
    }

    #[inline]
    pub fn contains(&self, value: usize) -> bool {
        self.flags[value]
    }

    /// Remove every element. Only the stored elements are visited.
    pub fn clear(&mut self) {
        for &value in &self.elements {
            self.flags[value] = false;
        }
        self.elements.clear();
    }

    #[inline]
    pub fn elements(&self) -> &[usize] {
        &self.elements
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Sentinel marking the absence of a vertex in [`LruSet`] chains.
pub const LRU_END: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct LruEntry {
    prev: usize,
    next: usize,
    used: bool,
}

/// Fixed-capacity set of vertex indices kept in most-recently-inserted
/// order. Inserting an element moves it to the front; when the set is full
/// the least recently inserted element is evicted.
///
/// This backs the solution's set of recently modified vertices: the local
/// search only re-evaluates candidate moves around vertices found here.
#[derive(Debug, Clone)]
pub struct LruSet {
    capacity: usize,
    entries: Vec<LruEntry>,
    len: usize,
    head: usize,
    tail: usize,
}

impl LruSet {
    /// Create a set with room for `capacity` of the `universe` vertices.
    pub fn new(capacity: usize, universe: usize) -> Self {
        LruSet {
            capacity,
            entries: vec![
                LruEntry {
                    prev: LRU_END,
                    next: LRU_END,
                    used: false,
                };
                universe
            ],
            len: 0,
            head: LRU_END,
            tail: LRU_END,
        }
    }

    /// Insert `vertex`, moving it to the front if already present and
    /// evicting the least recently used entry when full.
    pub fn insert(&mut self, vertex: usize) {
        if self.entries[vertex].used {
            self.unlink(vertex);
            self.push_front(vertex);
        } else {
            if self.len == self.capacity {
                let tail = self.tail;
                self.unlink(tail);
            } else {
                self.len += 1;
            }
            self.push_front(vertex);
        }
    }

    pub fn clear(&mut self) {
        let mut curr = self.head;
        while curr != LRU_END {
            let next = self.entries[curr].next;
            self.entries[curr] = LruEntry {
                prev: LRU_END,
                next: LRU_END,
                used: false,
            };
            curr = next;
        }
        self.head = LRU_END;
        self.tail = LRU_END;
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First element in most-recently-used order, or [`LRU_END`].
    #[inline]
    pub fn begin(&self) -> usize {
        self.head
    }

    /// Element after `vertex` in most-recently-used order, or [`LRU_END`].
    #[inline]
    pub fn next(&self, vertex: usize) -> usize {
        self.entries[vertex].next
    }

    /// Iterate in most-recently-used order.
    pub fn iter(&self) -> LruIter<'_> {
        LruIter {
            set: self,
            curr: self.head,
        }
    }

    fn unlink(&mut self, vertex: usize) {
        debug_assert!(self.entries[vertex].used);
        let LruEntry { prev, next, .. } = self.entries[vertex];
        if prev == LRU_END {
            self.head = next;
        } else {
            self.entries[prev].next = next;
        }
        if next == LRU_END {
            self.tail = prev;
        } else {
            self.entries[next].prev = prev;
        }
        self.entries[vertex] = LruEntry {
            prev: LRU_END,
            next: LRU_END,
            used: false,
        };
    }

    fn push_front(&mut self, vertex: usize) {
        debug_assert!(!self.entries[vertex].used);
        self.entries[vertex].used = true;
        self.entries[vertex].next = self.head;
        self.entries[vertex].prev = LRU_END;
        if self.head != LRU_END {
            self.entries[self.head].prev = vertex;
        }
        self.head = vertex;
        if self.tail == LRU_END {
            self.tail = vertex;
        }
    }
}

pub struct LruIter<'a> {
    set: &'a LruSet,
    curr: usize,
}

impl Iterator for LruIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.curr == LRU_END {
            None
        } else {
            let item = self.curr;
            self.curr = self.set.entries[item].next;
            Some(item)
        }
    }
}

/// LIFO pool of route identifiers. Released identifiers are reused
/// immediately, which keeps do/undo replay deterministic.
#[derive(Debug, Clone)]
pub struct RoutePool {
    stack: Vec<usize>,
    first: usize,
    top: usize,
}

impl RoutePool {
    /// Create a pool containing the identifiers `first..first + count`.
    pub fn new(first: usize, count: usize) -> Self {
        RoutePool {
            stack: (first..first + count).collect(),
            first,
            top: 0,
        }
    }

    pub fn reset(&mut self) {
        for (offset, slot) in self.stack.iter_mut().enumerate() {
            *slot = self.first + offset;
        }
        self.top = 0;
    }

    /// Take the most recently released identifier.
    #[inline]
    pub fn acquire(&mut self) -> usize {
        assert!(self.top < self.stack.len(), "route pool exhausted");
        let id = self.stack[self.top];
        self.top += 1;
        id
    }

    /// Return an identifier to the pool.
    #[inline]
    pub fn release(&mut self, id: usize) {
        debug_assert!(self.top > 0);
        self.top -= 1;
        self.stack[self.top] = id;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top == self.stack.len()
    }
}

/// Tiny linear-scan map from route index to a value, used by the ejection
/// chain to snapshot modified route loads per tree node. Chains are short,
/// so a scan beats hashing.
#[derive(Debug, Clone, Default)]
pub struct SmallVecMap {
    entries: Vec<(usize, i64)>,
}

impl SmallVecMap {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: usize) -> Option<i64> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn set(&mut self, key: usize, value: i64) {
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn clone_from_map(&mut self, other: &SmallVecMap) {
        self.entries.clear();
        self.entries.extend_from_slice(&other.entries);
    }
}

/// Tiny linear-scan set of vertices, used for the ejection chain forbid
/// lists (one per tree node, a few dozen entries at most).
#[derive(Debug, Clone, Default)]
pub struct SmallVecSet {
    entries: Vec<usize>,
}

impl SmallVecSet {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn insert(&mut self, value: usize) {
        if !self.contains(value) {
            self.entries.push(value);
        }
    }

    pub fn contains(&self, value: usize) -> bool {
        self.entries.contains(&value)
    }

    pub fn clone_from_set(&mut self, other: &SmallVecSet) {
        self.entries.clear();
        self.entries.extend_from_slice(&other.entries);
    }

    pub fn elements(&self) -> &[usize] {
        &self.entries
    }
}

/// Online mean via Welford's recurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Welford {
    count: u64,
    mean: f64,
}

impl Welford {
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.mean = 0.0;
    }
}
