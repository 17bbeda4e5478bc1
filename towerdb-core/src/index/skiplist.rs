//! Skip-list index built from multi-level linked towers
//!
//! A probabilistic ordered structure mapping a totally-ordered key to a
//! non-empty list of values, with O(log n) expected insert, lookup, and
//! delete, and ordered range scans.
//!
//! ```text
//! level 2:  head ──────────────► 20 ─────────────────────► NIL
//! level 1:  head ──────► 10 ───► 20 ──────────► 40 ──────► NIL
//! level 0:  head ──► 5 ─► 10 ──► 20 ──► 30 ───► 40 ──► 50 ► NIL
//! ```
//!
//! Every key owns a node at level 0 holding its values. A key appears at
//! level k+1 only if it appears at level k; membership in each next level up
//! is decided by an independent fair coin flip at insertion time, giving the
//! towers their expected-logarithmic height. Upper-level nodes are routing
//! copies that carry a `down` link toward the authoritative level-0 node.
//!
//! Nodes live in a growable arena and link to each other through `usize`
//! handles; [`NIL`] is the reserved invalid handle standing in for "end of
//! list", "no down-link", and "not found". Unlinked nodes are abandoned in
//! the arena rather than reclaimed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Reserved invalid handle used as the list sentinel.
const NIL: usize = usize::MAX;

/// A tower node. At level 0 `values` is the authoritative, non-empty value
/// list for the key; routing copies above carry an empty placeholder.
#[derive(Debug)]
struct Node<K, V> {
    key: K,
    values: Vec<V>,
    next: usize,
    down: usize,
}

/// Result of the locate-greatest-key-≤-target search.
#[derive(Debug, Clone, Copy)]
enum Search {
    /// Exact key match, at the highest level the key appears on.
    Exact { node: usize, level: usize },
    /// Greatest strictly-smaller key; no exact match exists.
    Pred { node: usize },
    /// The target precedes every key, or the index is empty.
    Missing,
}

/// Ordered multi-valued skip-list index
///
/// `R` is the coin-flip source for tower promotion; it defaults to a
/// seedable [`SmallRng`] so tests can pin behavior deterministically.
#[derive(Debug)]
pub struct SkipList<K, V, R = SmallRng> {
    /// Node arena; handles index into this vector.
    nodes: Vec<Node<K, V>>,
    /// Head handle per level, level 0 first. Never contains an empty level.
    levels: Vec<usize>,
    /// Number of distinct keys present.
    keys: usize,
    rng: R,
}

/// Skip-list index keyed by [`IndexKey`](crate::index::IndexKey) mapping to
/// record positions, the form the record table consumes.
pub type SkipIndex = SkipList<crate::index::IndexKey, usize>;

impl<K, V> SkipList<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    /// Create an empty index with an entropy-seeded promotion source.
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Create an empty index with a deterministic promotion source.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }
}

impl<K, V> Default for SkipList<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, R> SkipList<K, V, R>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
    R: Rng,
{
    /// Create an empty index promoting with the given random source.
    pub fn with_rng(rng: R) -> Self {
        Self {
            nodes: Vec::new(),
            levels: Vec::new(),
            keys: 0,
            rng,
        }
    }

    /// Number of distinct keys in the index.
    pub fn key_count(&self) -> usize {
        self.keys
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    /// Number of levels currently in use.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Insert `value` under `key`, appending when the key already exists.
    ///
    /// A key inserted below every existing key (or into an empty index) gets
    /// a base-level node only; no tower is built for that path. Otherwise
    /// the new node is spliced after its base-level predecessor and promoted
    /// one level at a time while a fair coin flip keeps succeeding.
    pub fn insert(&mut self, key: K, value: V) {
        let start = match self.locate_lte(&key) {
            Search::Missing => {
                self.insert_in_level(0, key, vec![value], NIL);
                self.keys += 1;
                return;
            }
            Search::Exact { node, .. } | Search::Pred { node } => node,
        };

        let base = self.walk_down(start);
        if self.nodes[base].key == key {
            self.nodes[base].values.push(value);
            return;
        }

        // Splice into the base list after the predecessor.
        let next = self.nodes[base].next;
        let spliced = self.alloc(Node {
            key: key.clone(),
            values: vec![value],
            next,
            down: NIL,
        });
        self.nodes[base].next = spliced;
        self.keys += 1;

        // Promote routing copies upward while the coin flip succeeds.
        let mut below = spliced;
        let mut level = 1;
        while self.rng.gen_bool(0.5) {
            below = self.insert_in_level(level, key.clone(), Vec::new(), below);
            level += 1;
        }
    }

    /// The values stored under `key` in insertion order, or `None` if the
    /// key is absent. A returned slice is never empty.
    pub fn lookup(&self, key: &K) -> Option<&[V]> {
        match self.locate_lte(key) {
            Search::Exact { node, .. } => {
                let base = self.walk_down(node);
                Some(self.nodes[base].values.as_slice())
            }
            _ => None,
        }
    }

    /// All values for keys within the inclusive bounds, either of which may
    /// be open, ascending by key with insertion order preserved per key.
    pub fn scan(&self, min: Option<&K>, max: Option<&K>) -> Vec<V> {
        let mut node = match min {
            Some(min) => match self.locate_lte(min) {
                Search::Exact { node, .. } | Search::Pred { node } => node,
                Search::Missing => NIL,
            },
            None => NIL,
        };

        if node == NIL {
            match self.levels.first() {
                Some(&head) => node = head,
                None => return Vec::new(),
            }
        }

        node = self.walk_down(node);

        // The LTE search may land one key short of an inclusive min bound.
        if let Some(min) = min {
            if self.nodes[node].key < *min {
                node = self.nodes[node].next;
            }
        }

        let mut out = Vec::new();
        while node != NIL {
            let entry = &self.nodes[node];
            if let Some(max) = max {
                if entry.key > *max {
                    break;
                }
            }
            out.extend(entry.values.iter().cloned());
            node = entry.next;
        }
        out
    }

    /// Remove `value` from `key`'s list, or the whole key when `value` is
    /// `None`. Absent keys and absent values are silent no-ops.
    ///
    /// Once the last value is gone the key is unlinked from every level it
    /// appears on, starting at the level where the locate found it. Each
    /// level is re-scanned from its head; a level whose head held the key
    /// with no successor is dropped from the level index entirely.
    pub fn delete(&mut self, key: &K, value: Option<&V>) {
        let (node, level) = match self.locate_lte(key) {
            Search::Exact { node, level } => (node, level),
            _ => return,
        };

        if let Some(value) = value {
            let base = self.walk_down(node);
            let values = &mut self.nodes[base].values;
            if let Some(at) = values.iter().position(|v| v == value) {
                values.remove(at);
            }
            if !self.nodes[base].values.is_empty() {
                return;
            }
        }

        let mut current = level as isize;
        while current >= 0 {
            self.remove_in_level(current as usize, key);
            current -= 1;
        }
        self.keys -= 1;
    }

    /// Locate the node with the greatest key not exceeding `key`.
    ///
    /// Descends from the top level, scanning rightward and accumulating the
    /// last node whose key does not exceed the target. An exact match
    /// short-circuits immediately with the level it was found on. A level
    /// where the target precedes every scanned key drops the search to the
    /// next level's head; a qualifying predecessor whose successor overshoots
    /// resumes the scan below via its down link.
    fn locate_lte(&self, key: &K) -> Search {
        let mut last = NIL;
        let mut level = self.levels.len() as isize - 1;

        while level >= 0 {
            last = NIL;
            let mut node = self.levels[level as usize];

            while node != NIL {
                match key.cmp(&self.nodes[node].key) {
                    Ordering::Equal => {
                        return Search::Exact {
                            node,
                            level: level as usize,
                        };
                    }
                    Ordering::Less => {
                        if last == NIL {
                            // First node of this level already overshoots;
                            // restart at the head of the level below.
                            break;
                        }
                        node = self.nodes[last].down;
                        level -= 1;
                    }
                    Ordering::Greater => {
                        last = node;
                        node = self.nodes[node].next;
                    }
                }
            }

            level -= 1;
        }

        if last == NIL {
            Search::Missing
        } else {
            Search::Pred { node: last }
        }
    }

    /// Insert a node at its sorted slot within one level, creating the level
    /// when it does not exist yet. Returns the new node's handle.
    fn insert_in_level(&mut self, level: usize, key: K, values: Vec<V>, down: usize) -> usize {
        if level == self.levels.len() {
            let node = self.alloc(Node {
                key,
                values,
                next: NIL,
                down,
            });
            self.levels.push(node);
            return node;
        }

        let head = self.levels[level];
        if self.nodes[head].key > key {
            let node = self.alloc(Node {
                key,
                values,
                next: head,
                down,
            });
            self.levels[level] = node;
            return node;
        }

        let mut last = head;
        loop {
            let next = self.nodes[last].next;
            if next == NIL || self.nodes[next].key > key {
                let node = self.alloc(Node {
                    key,
                    values,
                    next,
                    down,
                });
                self.nodes[last].next = node;
                return node;
            }
            last = next;
        }
    }

    /// Unlink the node holding `key` from one level's list, dropping the
    /// level when the key was its only occupant.
    fn remove_in_level(&mut self, level: usize, key: &K) {
        let head = self.levels[level];
        if self.nodes[head].key == *key {
            let next = self.nodes[head].next;
            if next == NIL {
                self.levels.remove(level);
            } else {
                self.levels[level] = next;
            }
            return;
        }

        let mut last = head;
        loop {
            let node = self.nodes[last].next;
            if node == NIL {
                return;
            }
            if self.nodes[node].key == *key {
                self.nodes[last].next = self.nodes[node].next;
                return;
            }
            last = node;
        }
    }

    /// Follow down links to the authoritative level-0 node.
    fn walk_down(&self, mut node: usize) -> usize {
        while self.nodes[node].down != NIL {
            node = self.nodes[node].down;
        }
        node
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

impl<R: Rng> super::Index for SkipList<super::IndexKey, usize, R> {
    fn insert(&mut self, key: super::IndexKey, position: usize) {
        SkipList::insert(self, key, position);
    }

    fn lookup(&self, key: &super::IndexKey) -> Option<Vec<usize>> {
        SkipList::lookup(self, key).map(<[usize]>::to_vec)
    }

    fn scan(&self, min: Option<&super::IndexKey>, max: Option<&super::IndexKey>) -> Vec<usize> {
        SkipList::scan(self, min, max)
    }

    fn delete(&mut self, key: &super::IndexKey, position: Option<usize>) {
        SkipList::delete(self, key, position.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::seq::SliceRandom;
    use rand::RngCore;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::collections::VecDeque;

    /// Promotion source with a scripted flip sequence: values below 2^63
    /// read as "promote", and an exhausted script never promotes.
    struct ScriptedRng(VecDeque<u64>);

    const PROMOTE: u64 = 0;
    const STOP: u64 = u64::MAX;

    impl ScriptedRng {
        fn new(flips: &[u64]) -> Self {
            Self(flips.iter().copied().collect())
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0.pop_front().unwrap_or(STOP)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0xff);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(5, "five");
        assert_eq!(idx.lookup(&5), Some(["five"].as_slice()));
    }

    #[test]
    fn test_lookup_missing() {
        let idx: SkipList<i64, &str> = SkipList::with_seed(1);
        assert_eq!(idx.lookup(&42), None);
    }

    #[test]
    fn test_insert_and_lookup_multiple() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(5, "five");
        idx.insert(6, "six");
        idx.insert(4, "four");

        assert_eq!(idx.lookup(&4), Some(["four"].as_slice()));
        assert_eq!(idx.lookup(&5), Some(["five"].as_slice()));
        assert_eq!(idx.lookup(&6), Some(["six"].as_slice()));
        assert_eq!(idx.scan(Some(&4), Some(&6)), vec!["four", "five", "six"]);
        assert_eq!(idx.key_count(), 3);
    }

    #[test]
    fn test_duplicate_keys_append() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(1, "a");
        idx.insert(1, "b");

        assert_eq!(idx.lookup(&1), Some(["a", "b"].as_slice()));
        assert_eq!(idx.key_count(), 1);
    }

    #[test]
    fn test_scan_collects_range() {
        let mut idx = SkipList::with_seed(1);
        for n in [1, 2, 4, 5, 7] {
            idx.insert(n, n);
        }
        assert_eq!(idx.scan(Some(&2), Some(&6)), vec![2, 4, 5]);
    }

    #[test]
    fn test_scan_when_min_absent() {
        let mut idx = SkipList::with_seed(1);
        for n in [1, 3, 4] {
            idx.insert(n, n);
        }
        assert_eq!(idx.scan(Some(&2), Some(&4)), vec![3, 4]);
    }

    #[test]
    fn test_scan_open_min() {
        let mut idx = SkipList::with_seed(1);
        for n in [1, 2, 3] {
            idx.insert(n, n);
        }
        assert_eq!(idx.scan(None, Some(&2)), vec![1, 2]);
    }

    #[test]
    fn test_scan_open_max() {
        let mut idx = SkipList::with_seed(1);
        for n in [1, 2, 3] {
            idx.insert(n, n);
        }
        assert_eq!(idx.scan(Some(&2), None), vec![2, 3]);
    }

    #[test]
    fn test_scan_over_duplicates() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(1, "a");
        idx.insert(1, "b");
        idx.insert(2, "c");
        idx.insert(2, "d");

        assert_eq!(idx.scan(Some(&1), Some(&2)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_scan_empty_index() {
        let idx: SkipList<i64, i64> = SkipList::with_seed(1);
        assert!(idx.scan(None, None).is_empty());
        assert!(idx.scan(Some(&1), Some(&9)).is_empty());
    }

    #[test]
    fn test_scan_inverted_bounds() {
        let mut idx = SkipList::with_seed(1);
        for n in [1, 2, 3] {
            idx.insert(n, n);
        }
        assert!(idx.scan(Some(&3), Some(&1)).is_empty());
    }

    #[test]
    fn test_delete_removes_key() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(5, "five");
        idx.delete(&5, None);

        assert_eq!(idx.lookup(&5), None);
        assert!(idx.is_empty());
        assert_eq!(idx.level_count(), 0);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(5, "five");
        idx.delete(&42, None);
        idx.delete(&42, Some(&"five"));

        assert_eq!(idx.lookup(&5), Some(["five"].as_slice()));
    }

    #[test]
    fn test_delete_single_value() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(5, "five");
        idx.insert(5, "пет");
        idx.delete(&5, Some(&"five"));

        assert_eq!(idx.lookup(&5), Some(["пет"].as_slice()));

        idx.delete(&5, Some(&"пет"));
        assert_eq!(idx.lookup(&5), None);
    }

    #[test]
    fn test_delete_value_then_scan() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(1, "a");
        idx.insert(1, "b");
        idx.insert(2, "c");
        idx.delete(&1, Some(&"a"));

        assert_eq!(idx.lookup(&1), Some(["b"].as_slice()));
        assert_eq!(idx.scan(Some(&1), Some(&2)), vec!["b", "c"]);
    }

    #[test]
    fn test_delete_value_not_present_keeps_key() {
        let mut idx = SkipList::with_seed(1);
        idx.insert(5, "five");
        idx.delete(&5, Some(&"six"));

        assert_eq!(idx.lookup(&5), Some(["five"].as_slice()));
    }

    #[test]
    fn test_delete_preserves_neighbors() {
        let mut idx = SkipList::with_seed(1);
        for n in [1, 2, 3] {
            idx.insert(n, n * 10);
        }
        idx.delete(&2, None);

        assert_eq!(idx.lookup(&2), None);
        assert_eq!(idx.lookup(&1), Some([10].as_slice()));
        assert_eq!(idx.lookup(&3), Some([30].as_slice()));
        assert_eq!(idx.scan(None, None), vec![10, 30]);
    }

    #[test]
    fn test_new_minimum_never_promotes() {
        // An always-promoting source would loop forever on the general path;
        // descending inserts all take the no-predecessor path, which flips
        // no coins at all, so every tower stays one level tall.
        let mut idx = SkipList::with_rng(StepRng::new(0, 0));
        idx.insert(5, "e");
        idx.insert(4, "d");
        idx.insert(3, "c");

        assert_eq!(idx.level_count(), 1);
        assert_eq!(idx.scan(None, None), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_scripted_tower_and_level_collapse() {
        let mut idx = SkipList::with_rng(ScriptedRng::new(&[PROMOTE, PROMOTE, STOP]));
        idx.insert(1, "one"); // no predecessor: no flips
        idx.insert(2, "two"); // promoted twice: tower spans levels 0..=2

        assert_eq!(idx.level_count(), 3);
        assert_eq!(idx.lookup(&2), Some(["two"].as_slice()));
        assert_eq!(idx.scan(None, None), vec!["one", "two"]);

        idx.delete(&2, None);
        assert_eq!(idx.level_count(), 1);
        assert_eq!(idx.lookup(&2), None);
        assert_eq!(idx.lookup(&1), Some(["one"].as_slice()));
    }

    #[test]
    fn test_lookup_through_tall_towers() {
        let mut idx = SkipList::with_rng(ScriptedRng::new(&[
            STOP, // 20
            PROMOTE, PROMOTE, STOP, // 30
            PROMOTE, STOP, // 40
        ]));
        idx.insert(10, "a"); // no-predecessor path
        idx.insert(20, "b");
        idx.insert(30, "c");
        idx.insert(40, "d");

        for (key, value) in [(10, "a"), (20, "b"), (30, "c"), (40, "d")] {
            assert_eq!(idx.lookup(&key), Some([value].as_slice()));
        }
        assert_eq!(idx.scan(Some(&15), Some(&35)), vec!["b", "c"]);
    }

    #[test]
    fn test_delete_with_copies_in_multiple_levels() {
        let mut keys: Vec<i64> = (0..100).collect();
        keys.shuffle(&mut SmallRng::seed_from_u64(7));

        let mut idx = SkipList::with_seed(42);
        for &k in &keys {
            idx.insert(k, k);
        }

        idx.delete(&keys[50], None);

        assert_eq!(idx.lookup(&keys[50]), None);
        assert_eq!(idx.lookup(&keys[49]), Some([keys[49]].as_slice()));
        assert_eq!(idx.lookup(&keys[51]), Some([keys[51]].as_slice()));
        assert_eq!(idx.key_count(), 99);
    }

    #[test]
    fn test_scan_orders_all_elements() {
        let mut rng = SmallRng::seed_from_u64(99);
        let keys: Vec<i64> = (0..100).map(|_| rng.gen_range(0..500_000)).collect();

        let mut idx = SkipList::with_seed(3);
        for &k in &keys {
            idx.insert(k, k);
        }

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(idx.scan(None, None), sorted);
    }

    proptest! {
        #[test]
        fn prop_lookup_returns_insertion_ordered_values(
            pairs in prop::collection::vec((0u8..32, any::<u16>()), 0..200)
        ) {
            let mut idx = SkipList::with_seed(0xdecaf);
            for (k, v) in &pairs {
                idx.insert(*k, *v);
            }

            let mut expected: BTreeMap<u8, Vec<u16>> = BTreeMap::new();
            for (k, v) in &pairs {
                expected.entry(*k).or_default().push(*v);
            }

            for k in 0u8..32 {
                match expected.get(&k) {
                    Some(values) => prop_assert_eq!(idx.lookup(&k), Some(values.as_slice())),
                    None => prop_assert_eq!(idx.lookup(&k), None),
                }
            }

            let flat: Vec<u16> = expected.values().flatten().copied().collect();
            prop_assert_eq!(idx.scan(None, None), flat);
        }

        #[test]
        fn prop_scan_respects_bounds(
            pairs in prop::collection::vec((0u8..64, any::<u16>()), 0..200),
            lo in 0u8..64,
            hi in 0u8..64,
        ) {
            let mut idx = SkipList::with_seed(0xfeed);
            let mut expected: BTreeMap<u8, Vec<u16>> = BTreeMap::new();
            for (k, v) in &pairs {
                idx.insert(*k, *v);
                expected.entry(*k).or_default().push(*v);
            }

            let flat: Vec<u16> = expected
                .range(lo..=hi.max(lo))
                .flat_map(|(_, vs)| vs.iter().copied())
                .collect();
            let flat = if lo <= hi { flat } else { Vec::new() };

            prop_assert_eq!(idx.scan(Some(&lo), Some(&hi)), flat);
        }

        #[test]
        fn prop_delete_leaves_other_keys_intact(
            pairs in prop::collection::vec((0u8..32, any::<u16>()), 1..200),
            victim in 0u8..32,
        ) {
            let mut idx = SkipList::with_seed(0xbeef);
            let mut expected: BTreeMap<u8, Vec<u16>> = BTreeMap::new();
            for (k, v) in &pairs {
                idx.insert(*k, *v);
                expected.entry(*k).or_default().push(*v);
            }

            idx.delete(&victim, None);
            expected.remove(&victim);

            prop_assert_eq!(idx.lookup(&victim), None);
            for (k, values) in &expected {
                prop_assert_eq!(idx.lookup(k), Some(values.as_slice()));
            }
            prop_assert_eq!(idx.key_count(), expected.len());
        }
    }
}
