//! SkipList: ordered probabilistic index keyed by `(score, item)` with O(log n)
//! rank queries.
//!
//! Every forward link carries a span, the number of level-0 nodes it jumps
//! over. Summing spans on the way down yields a node's 1-based rank without
//! a linear walk. Equal scores are ordered by the item's `Ord`, and a second
//! insert of the same `(score, item)` panics, so the order is total.
//!
//! Nodes live in an arena. Forward links are arena keys; the single
//! `backward` link per node is only followed for reverse traversal.

use crate::config::SkipListConfig;
use crate::memory::UsedMemory;
use crate::tokens::OwnerId;
use core::cmp::Ordering;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::{DefaultKey, SlotMap};
use std::iter::Rev;
use std::rc::Rc;

pub const SKIP_LIST_MAX_LEVEL: usize = 32;

#[derive(Clone, Copy, Debug, Default)]
struct Level {
    forward: Option<DefaultKey>,
    span: usize,
}

struct Node<T: ?Sized> {
    // `None` only for the head sentinel.
    item: Option<Rc<T>>,
    score: f64,
    backward: Option<DefaultKey>,
    levels: Vec<Level>,
}

/// Reference to a node of a `SkipList`; stale once that node is deleted,
/// and never resolves against another list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle {
    owner: OwnerId,
    key: DefaultKey,
}

impl NodeHandle {
    pub fn item<'a, T: ?Sized + Ord>(&self, list: &'a SkipList<T>) -> Option<&'a Rc<T>> {
        list.resolve(*self).and_then(|n| n.item.as_ref())
    }

    pub fn score<T: ?Sized + Ord>(&self, list: &SkipList<T>) -> Option<f64> {
        list.resolve(*self)
            .filter(|n| n.item.is_some())
            .map(|n| n.score)
    }
}

/// Score interval with independently open or closed ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    pub min_exclusive: bool,
    pub max_exclusive: bool,
}

impl ScoreRange {
    pub fn inclusive(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_exclusive: false,
            max_exclusive: false,
        }
    }

    pub fn exclusive(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_exclusive: true,
            max_exclusive: true,
        }
    }

    pub fn exclude_min(mut self) -> Self {
        self.min_exclusive = true;
        self
    }

    pub fn exclude_max(mut self) -> Self {
        self.max_exclusive = true;
        self
    }

    pub fn gte_min(&self, score: f64) -> bool {
        if self.min_exclusive {
            score > self.min
        } else {
            score >= self.min
        }
    }

    pub fn lte_max(&self, score: f64) -> bool {
        if self.max_exclusive {
            score < self.max
        } else {
            score <= self.max
        }
    }

    pub fn contains(&self, score: f64) -> bool {
        self.gte_min(score) && self.lte_max(score)
    }

    /// True when no score can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
            || (self.min == self.max && (self.min_exclusive || self.max_exclusive))
    }
}

fn cmp_score(a: f64, b: f64) -> Ordering {
    if a < b {
        Ordering::Less
    } else if a > b {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

pub struct SkipList<T: ?Sized + Ord> {
    owner: OwnerId,
    nodes: SlotMap<DefaultKey, Node<T>>,
    head: DefaultKey,
    tail: Option<DefaultKey>,
    length: usize,
    level: usize,
    rng: StdRng,
    probability: f64,
    memory: UsedMemory,
}

impl<T: ?Sized + Ord> Default for SkipList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Ord> SkipList<T> {
    pub fn new() -> Self {
        Self::with_config(SkipListConfig::default())
    }

    pub fn with_config(config: SkipListConfig) -> Self {
        assert!(
            config.probability > 0.0 && config.probability < 1.0,
            "level probability must be in (0, 1)"
        );
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut nodes = SlotMap::with_key();
        let head = nodes.insert(Node {
            item: None,
            score: 0.0,
            backward: None,
            levels: vec![Level::default(); SKIP_LIST_MAX_LEVEL],
        });
        config.memory.charge(Self::node_bytes(SKIP_LIST_MAX_LEVEL));
        Self {
            owner: OwnerId::fresh(),
            nodes,
            head,
            tail: None,
            length: 0,
            level: 1,
            rng,
            probability: config.probability,
            memory: config.memory,
        }
    }

    fn handle(&self, x: DefaultKey) -> NodeHandle {
        NodeHandle {
            owner: self.owner,
            key: x,
        }
    }

    fn resolve(&self, h: NodeHandle) -> Option<&Node<T>> {
        (h.owner == self.owner).then(|| self.nodes.get(h.key)).flatten()
    }

    fn node_bytes(levels: usize) -> usize {
        core::mem::size_of::<Node<T>>() + levels * core::mem::size_of::<Level>()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Highest level used by any node; 1 for an empty list.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn memory(&self) -> &UsedMemory {
        &self.memory
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < SKIP_LIST_MAX_LEVEL && self.rng.gen_bool(self.probability) {
            level += 1;
        }
        level
    }

    /// Order of the node at `k` relative to `(score, item)`.
    fn cmp_entry(&self, k: DefaultKey, score: f64, item: &T) -> Ordering {
        let node = &self.nodes[k];
        cmp_score(node.score, score).then_with(|| match node.item.as_deref() {
            Some(it) => it.cmp(item),
            None => Ordering::Less,
        })
    }

    fn precedes(&self, k: DefaultKey, score: f64, item: &T) -> bool {
        self.cmp_entry(k, score, item) == Ordering::Less
    }

    /// Last node strictly before `(score, item)` on every level.
    fn predecessors(&self, score: f64, item: &T) -> [DefaultKey; SKIP_LIST_MAX_LEVEL] {
        let mut update = [self.head; SKIP_LIST_MAX_LEVEL];
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if !self.precedes(next, score, item) {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }
        update
    }

    /// Insert `item` with `score`.
    ///
    /// # Panics
    /// If `score` is NaN, or if the same `(score, item)` pair is already
    /// present.
    pub fn insert(&mut self, item: Rc<T>, score: f64) -> NodeHandle {
        assert!(!score.is_nan(), "skip list score must not be NaN");
        let mut update = [self.head; SKIP_LIST_MAX_LEVEL];
        let mut rank = [0usize; SKIP_LIST_MAX_LEVEL];

        let mut x = self.head;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(next) = self.nodes[x].levels[i].forward {
                if !self.precedes(next, score, &item) {
                    break;
                }
                rank[i] += self.nodes[x].levels[i].span;
                x = next;
            }
            update[i] = x;
        }
        assert!(
            self.nodes[x].levels[0]
                .forward
                .map_or(true, |n| self.cmp_entry(n, score, &item) != Ordering::Equal),
            "(score, item) already present"
        );

        let level = self.random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = self.head;
                self.nodes[self.head].levels[i].span = self.length;
            }
            self.level = level;
        }

        let x = self.nodes.insert(Node {
            item: Some(item),
            score,
            backward: None,
            levels: vec![Level::default(); level],
        });
        for i in 0..level {
            let prev = &mut self.nodes[update[i]].levels[i];
            let Level { forward, span } = *prev;
            prev.forward = Some(x);
            prev.span = rank[0] - rank[i] + 1;
            self.nodes[x].levels[i] = Level {
                forward,
                span: span - (rank[0] - rank[i]),
            };
        }
        for i in level..self.level {
            self.nodes[update[i]].levels[i].span += 1;
        }

        self.nodes[x].backward = (update[0] != self.head).then_some(update[0]);
        match self.nodes[x].levels[0].forward {
            Some(next) => self.nodes[next].backward = Some(x),
            None => self.tail = Some(x),
        }
        self.length += 1;
        self.memory.charge(Self::node_bytes(level));
        self.handle(x)
    }

    fn unlink_node(&mut self, x: DefaultKey, update: &[DefaultKey; SKIP_LIST_MAX_LEVEL]) -> Rc<T> {
        for i in 0..self.level {
            let own = self.nodes[x].levels.get(i).copied();
            let prev = &mut self.nodes[update[i]].levels[i];
            match own {
                Some(own) if prev.forward == Some(x) => {
                    prev.span = prev.span + own.span - 1;
                    prev.forward = own.forward;
                }
                _ => prev.span -= 1,
            }
        }

        let node = self
            .nodes
            .remove(x)
            .expect("unlinked node must be live in the arena");
        match node.levels[0].forward {
            Some(next) => self.nodes[next].backward = node.backward,
            None => self.tail = node.backward,
        }
        while self.level > 1 && self.nodes[self.head].levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }
        self.length -= 1;
        self.memory.credit(Self::node_bytes(node.levels.len()));
        node.item.expect("only the head lacks an item")
    }

    /// Remove the node matching both `score` and `item`, handing back the item.
    pub fn delete(&mut self, score: f64, item: &T) -> Option<Rc<T>> {
        let update = self.predecessors(score, item);
        let x = self.nodes[update[0]].levels[0].forward?;
        if self.cmp_entry(x, score, item) != Ordering::Equal {
            return None;
        }
        Some(self.unlink_node(x, &update))
    }

    /// Move the node for `(cur, item)` to score `new`.
    ///
    /// The node is rescored in place when it keeps its position; otherwise it
    /// is unlinked and reinserted and the returned handle differs from the old
    /// one. Returns `None` if no such node exists.
    pub fn update_score(&mut self, cur: f64, item: &T, new: f64) -> Option<NodeHandle> {
        assert!(!new.is_nan(), "skip list score must not be NaN");
        let update = self.predecessors(cur, item);
        let x = self.nodes[update[0]].levels[0].forward?;
        if self.cmp_entry(x, cur, item) != Ordering::Equal {
            return None;
        }

        let node = &self.nodes[x];
        let after_prev = node
            .backward
            .map_or(true, |b| self.precedes(b, new, item));
        let before_next = node.levels[0]
            .forward
            .map_or(true, |n| self.cmp_entry(n, new, item) == Ordering::Greater);
        if after_prev && before_next {
            self.nodes[x].score = new;
            return Some(self.handle(x));
        }

        let item = self.unlink_node(x, &update);
        Some(self.insert(item, new))
    }

    /// 1-based position of `(score, item)`, if present.
    pub fn rank(&self, score: f64, item: &T) -> Option<usize> {
        let mut rank = 0;
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if self.cmp_entry(next, score, item) == Ordering::Greater {
                    break;
                }
                rank += self.nodes[x].levels[i].span;
                x = next;
            }
            if x != self.head && self.cmp_entry(x, score, item) == Ordering::Equal {
                return Some(rank);
            }
        }
        None
    }

    /// Node at 1-based position `rank`.
    pub fn by_rank(&self, rank: usize) -> Option<NodeHandle> {
        if rank == 0 || rank > self.length {
            return None;
        }
        let mut traversed = 0;
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                let span = self.nodes[x].levels[i].span;
                if traversed + span > rank {
                    break;
                }
                traversed += span;
                x = next;
            }
            if traversed == rank {
                return Some(self.handle(x));
            }
        }
        None
    }

    fn overlaps(&self, range: &ScoreRange) -> bool {
        if range.is_empty() {
            return false;
        }
        match (self.tail, self.nodes[self.head].levels[0].forward) {
            (Some(last), Some(first)) => {
                range.gte_min(self.nodes[last].score) && range.lte_max(self.nodes[first].score)
            }
            _ => false,
        }
    }

    pub fn first_in_range(&self, range: &ScoreRange) -> Option<NodeHandle> {
        if !self.overlaps(range) {
            return None;
        }
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if range.gte_min(self.nodes[next].score) {
                    break;
                }
                x = next;
            }
        }
        let x = self.nodes[x].levels[0].forward?;
        range.lte_max(self.nodes[x].score).then(|| self.handle(x))
    }

    pub fn last_in_range(&self, range: &ScoreRange) -> Option<NodeHandle> {
        if !self.overlaps(range) {
            return None;
        }
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if !range.lte_max(self.nodes[next].score) {
                    break;
                }
                x = next;
            }
        }
        if x == self.head {
            return None;
        }
        range.gte_min(self.nodes[x].score).then(|| self.handle(x))
    }

    /// Remove every node whose score lies in `range`, in ascending order.
    pub fn delete_range_by_score(&mut self, range: &ScoreRange) -> Vec<Rc<T>> {
        let mut update = [self.head; SKIP_LIST_MAX_LEVEL];
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if range.gte_min(self.nodes[next].score) {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }

        let mut removed = Vec::new();
        let mut cur = self.nodes[x].levels[0].forward;
        while let Some(k) = cur {
            if !range.lte_max(self.nodes[k].score) {
                break;
            }
            cur = self.nodes[k].levels[0].forward;
            removed.push(self.unlink_node(k, &update));
        }
        removed
    }

    /// Remove the nodes ranked `start..=end` (1-based). Rank 0 is never
    /// valid, so `start == 0` or `start > end` removes nothing.
    pub fn delete_range_by_rank(&mut self, start: usize, end: usize) -> Vec<Rc<T>> {
        if start == 0 || start > end {
            return Vec::new();
        }
        let mut update = [self.head; SKIP_LIST_MAX_LEVEL];
        let mut traversed = 0;
        let mut x = self.head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                let span = self.nodes[x].levels[i].span;
                if traversed + span >= start {
                    break;
                }
                traversed += span;
                x = next;
            }
            update[i] = x;
        }

        traversed += 1;
        let mut removed = Vec::new();
        let mut cur = self.nodes[x].levels[0].forward;
        while let Some(k) = cur {
            if traversed > end {
                break;
            }
            cur = self.nodes[k].levels[0].forward;
            removed.push(self.unlink_node(k, &update));
            traversed += 1;
        }
        removed
    }

    pub fn first(&self) -> Option<NodeHandle> {
        self.nodes[self.head].levels[0].forward.map(|x| self.handle(x))
    }

    pub fn last(&self) -> Option<NodeHandle> {
        self.tail.map(|x| self.handle(x))
    }

    /// Ascending `(item, score)` pairs; reversible through backward links.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.nodes[self.head].levels[0].forward,
            back: self.tail,
            remaining: self.length,
        }
    }

    pub fn iter_rev(&self) -> Rev<Iter<'_, T>> {
        self.iter().rev()
    }

    /// Drop every node, releasing each node's share of its item.
    pub fn clear(&mut self) {
        let head = self.head;
        let memory = &self.memory;
        self.nodes.retain(|k, node| {
            if k == head {
                return true;
            }
            memory.credit(Self::node_bytes(node.levels.len()));
            false
        });
        for level in self.nodes[head].levels.iter_mut() {
            *level = Level::default();
        }
        self.tail = None;
        self.length = 0;
        self.level = 1;
    }
}

impl<T: ?Sized + Ord> Drop for SkipList<T> {
    fn drop(&mut self) {
        self.clear();
        self.memory.credit(Self::node_bytes(SKIP_LIST_MAX_LEVEL));
    }
}

pub struct Iter<'a, T: ?Sized + Ord> {
    list: &'a SkipList<T>,
    front: Option<DefaultKey>,
    back: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, T: ?Sized + Ord> Iterator for Iter<'a, T> {
    type Item = (&'a Rc<T>, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let list: &'a SkipList<T> = self.list;
        let node = &list.nodes[self.front?];
        self.front = node.levels[0].forward;
        self.remaining -= 1;
        Some((node.item.as_ref()?, node.score))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T: ?Sized + Ord> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let list: &'a SkipList<T> = self.list;
        let node = &list.nodes[self.back?];
        self.back = node.backward;
        self.remaining -= 1;
        Some((node.item.as_ref()?, node.score))
    }
}

impl<'a, T: ?Sized + Ord> ExactSizeIterator for Iter<'a, T> {}

#[cfg(test)]
impl<T: ?Sized + Ord> SkipList<T> {
    /// Structural checks shared by the unit and property suites.
    pub(crate) fn assert_invariants(&self) {
        let mut order = Vec::with_capacity(self.length);
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.nodes[self.head].levels[0].forward;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            assert!(!node.score.is_nan());
            assert_eq!(node.backward, prev, "backward link broken");
            if let Some(p) = prev {
                let item = node.item.as_deref().expect("real node has an item");
                assert_eq!(self.cmp_entry(p, node.score, item), Ordering::Less, "order broken");
            }
            order.push(k);
            prev = Some(k);
            cur = node.levels[0].forward;
        }
        assert_eq!(order.len(), self.length);
        assert_eq!(self.tail, prev);
        assert_eq!(self.nodes.len(), self.length + 1);

        let max_level = order
            .iter()
            .map(|k| self.nodes[*k].levels.len())
            .max()
            .unwrap_or(1);
        assert_eq!(self.level, max_level);
        for i in self.level..SKIP_LIST_MAX_LEVEL {
            assert!(self.nodes[self.head].levels[i].forward.is_none());
        }

        for i in 0..self.level {
            let mut x = self.head;
            let mut rank = 0;
            while let Some(next) = self.nodes[x].levels[i].forward {
                rank += self.nodes[x].levels[i].span;
                assert_eq!(order.get(rank - 1), Some(&next), "span sum at level {i} is not the rank");
                x = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SkipList<str> {
        SkipList::with_config(SkipListConfig::default().with_seed(7))
    }

    fn items(list: &SkipList<str>) -> Vec<String> {
        list.iter().map(|(it, _)| it.to_string()).collect()
    }

    fn name(list: &SkipList<str>, h: Option<NodeHandle>) -> Option<&str> {
        h.and_then(|h| h.item(list)).map(|it| &**it)
    }

    #[test]
    fn equal_scores_fall_back_to_item_order() {
        let mut l = seeded();
        l.insert(Rc::from("a"), 5.0);
        l.insert(Rc::from("b"), 3.0);
        let c = l.insert(Rc::from("c"), 5.0);
        assert_eq!(items(&l), ["b", "a", "c"]);
        assert_eq!(l.rank(5.0, "c"), Some(3));
        assert_eq!(l.rank(3.0, "b"), Some(1));
        assert_eq!(l.rank(4.0, "c"), None);
        assert_eq!(c.score(&l), Some(5.0));
        assert_eq!(l.last(), Some(c));
        l.assert_invariants();
    }

    #[test]
    fn empty_list_has_level_one() {
        let l = seeded();
        assert!(l.is_empty());
        assert_eq!(l.level(), 1);
        assert!(l.first().is_none());
        assert!(l.last().is_none());
        assert_eq!(l.iter().count(), 0);
        l.assert_invariants();
    }

    #[test]
    #[should_panic(expected = "NaN")]
    fn nan_score_rejected() {
        let mut l = seeded();
        l.insert(Rc::from("x"), f64::NAN);
    }

    #[test]
    fn ranks_hold_across_many_inserts_and_deletes() {
        let mut l: SkipList<u32> = SkipList::with_config(SkipListConfig::default().with_seed(42));
        for i in 0..500u32 {
            l.insert(Rc::new(i), f64::from(i % 37));
        }
        l.assert_invariants();
        for i in (0..500u32).step_by(3) {
            assert_eq!(l.delete(f64::from(i % 37), &i).as_deref(), Some(&i));
        }
        assert_eq!(l.delete(0.0, &0), None);
        l.assert_invariants();
        for r in 1..=l.len() {
            let h = l.by_rank(r).unwrap();
            let item = h.item(&l).unwrap();
            assert_eq!(l.rank(h.score(&l).unwrap(), item), Some(r));
        }
        assert!(l.by_rank(0).is_none());
        assert!(l.by_rank(l.len() + 1).is_none());
    }

    #[test]
    fn delete_requires_matching_score() {
        let mut l = seeded();
        l.insert(Rc::from("a"), 1.0);
        assert!(l.delete(2.0, "a").is_none());
        assert_eq!(l.len(), 1);
        assert_eq!(l.delete(1.0, "a").as_deref(), Some("a"));
        assert!(l.is_empty());
        assert_eq!(l.level(), 1);
        l.assert_invariants();
    }

    #[test]
    fn update_score_in_place_keeps_handle() {
        let mut l = seeded();
        l.insert(Rc::from("a"), 1.0);
        let b = l.insert(Rc::from("b"), 2.0);
        l.insert(Rc::from("c"), 3.0);
        assert_eq!(l.update_score(2.0, "b", 2.5), Some(b));
        assert_eq!(b.score(&l), Some(2.5));

        let moved = l.update_score(2.5, "b", 10.0).unwrap();
        assert_ne!(moved, b);
        assert!(b.item(&l).is_none(), "old handle goes stale");
        assert_eq!(items(&l), ["a", "c", "b"]);
        assert_eq!(l.rank(10.0, "b"), Some(3));
        assert!(l.update_score(1.0, "zzz", 4.0).is_none());
        l.assert_invariants();
    }

    #[test]
    fn score_ranges() {
        let mut l = seeded();
        for (s, name) in [(1.0, "a"), (2.0, "b"), (2.0, "c"), (3.0, "d"), (5.0, "e")] {
            l.insert(Rc::from(name), s);
        }
        let r = ScoreRange::inclusive(2.0, 3.0);
        assert_eq!(name(&l, l.first_in_range(&r)), Some("b"));
        assert_eq!(name(&l, l.last_in_range(&r)), Some("d"));

        let open = ScoreRange::exclusive(2.0, 5.0);
        assert_eq!(name(&l, l.first_in_range(&open)), Some("d"));
        assert_eq!(name(&l, l.last_in_range(&open)), Some("d"));

        assert!(l.first_in_range(&ScoreRange::inclusive(3.5, 4.5)).is_none());
        assert!(l.last_in_range(&ScoreRange::inclusive(3.5, 4.5)).is_none());
        assert!(l.first_in_range(&ScoreRange::inclusive(6.0, 9.0)).is_none());
        assert!(ScoreRange::inclusive(1.0, 1.0).exclude_max().is_empty());
        assert!(l.first_in_range(&ScoreRange::inclusive(3.0, 2.0)).is_none());
    }

    #[test]
    fn delete_ranges() {
        let mut l: SkipList<u32> = SkipList::with_config(SkipListConfig::default().with_seed(3));
        for i in 1..=10u32 {
            l.insert(Rc::new(i), f64::from(i));
        }
        let gone = l.delete_range_by_score(&ScoreRange::inclusive(3.0, 5.0).exclude_min());
        assert_eq!(gone.iter().map(|r| **r).collect::<Vec<_>>(), [4, 5]);
        l.assert_invariants();

        let gone = l.delete_range_by_rank(1, 3);
        assert_eq!(gone.iter().map(|r| **r).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(l.len(), 5);
        assert_eq!(l.rank(6.0, &6), Some(1));
        l.assert_invariants();

        assert!(l.delete_range_by_rank(9, 12).is_empty());
        let gone = l.delete_range_by_rank(4, 100);
        assert_eq!(gone.iter().map(|r| **r).collect::<Vec<_>>(), [9, 10]);
        assert_eq!(l.last().and_then(|h| h.score(&l)), Some(8.0));
        l.assert_invariants();
    }

    #[test]
    fn reverse_iteration_follows_backward_links() {
        let mut l = seeded();
        for (s, name) in [(2.0, "b"), (1.0, "a"), (3.0, "c")] {
            l.insert(Rc::from(name), s);
        }
        let rev: Vec<f64> = l.iter_rev().map(|(_, s)| s).collect();
        assert_eq!(rev, [3.0, 2.0, 1.0]);
        assert_eq!(l.iter().len(), 3);
        let mut it = l.iter();
        assert_eq!(it.next().map(|(_, s)| s), Some(1.0));
        assert_eq!(it.next_back().map(|(_, s)| s), Some(3.0));
        assert_eq!(it.next().map(|(_, s)| s), Some(2.0));
        assert!(it.next().is_none());
        assert!(it.next_back().is_none());
    }

    #[test]
    fn clear_and_drop_release_items() {
        let shared: Rc<str> = Rc::from("shared");
        let memory = UsedMemory::new();
        {
            let mut l: SkipList<str> =
                SkipList::with_config(SkipListConfig::default().with_seed(1).with_memory(memory.clone()));
            let base = memory.get();
            l.insert(shared.clone(), 1.0);
            l.insert(Rc::from("other"), 2.0);
            assert_eq!(Rc::strong_count(&shared), 2);
            l.clear();
            assert_eq!(Rc::strong_count(&shared), 1);
            assert_eq!(memory.get(), base);
            l.assert_invariants();

            l.insert(shared.clone(), 1.0);
            assert_eq!(Rc::strong_count(&shared), 2);
        }
        assert_eq!(Rc::strong_count(&shared), 1);
        assert_eq!(memory.get(), 0);
    }

    #[test]
    fn seeded_lists_draw_identical_levels() {
        let build = || {
            let mut l: SkipList<u32> = SkipList::with_config(SkipListConfig::default().with_seed(99));
            for i in 0..200u32 {
                l.insert(Rc::new(i), 0.0);
            }
            l.level()
        };
        assert_eq!(build(), build());
        assert!(build() <= SKIP_LIST_MAX_LEVEL);
    }
}
