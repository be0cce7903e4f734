//! Dictionary: chained hash table that grows and shrinks by incremental rehashing.
//!
//! Two tables live side by side. Table 0 serves lookups and inserts while no
//! resize is in flight. A resize allocates table 1 and sets the rehash
//! cursor; from then on every add/find/replace/delete migrates one slot of
//! table 0 into table 1 (unless a safe iterator pins the tables), inserts go
//! straight to table 1, and lookups search both. When table 0 is drained,
//! table 1 moves into its place.
//!
//! Nodes live in a generational arena and chains are threaded through arena
//! keys, so a `Handle` stays valid while its node migrates between tables.

use crate::config::{DictConfig, ResizeSwitch};
use crate::dict_type::DictType;
use crate::error::{Error, ExpandRejection, Result};
use crate::hash_table::HashTable;
use crate::memory::UsedMemory;
use crate::tokens::{Count, OwnerId, Token, UsizeCount};
use slotmap::{DefaultKey, SlotMap};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Slots migrated per batch by `rehash_for`.
const REHASH_BATCH: usize = 100;

/// Stable reference to a dictionary entry.
///
/// A handle only resolves against the dictionary that returned it; any other
/// dictionary treats it as absent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    owner: OwnerId,
    key: DefaultKey,
}

impl Handle {
    pub fn key<'a, T: DictType>(&self, dict: &'a Dictionary<T>) -> Option<&'a T::Key> {
        dict.resolve(*self).map(|k| &dict.nodes[k].key)
    }

    pub fn value<'a, T: DictType>(
        &self,
        dict: &'a Dictionary<T>,
    ) -> Option<&'a EntryValue<T::Value>> {
        dict.resolve(*self).map(|k| &dict.nodes[k].value)
    }
}

/// What an entry holds: an owned value governed by the descriptor, or a
/// scalar stored inline.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue<V> {
    /// Freshly created by `add_raw` and not filled in yet.
    Unset,
    Owned(V),
    Signed(i64),
    Unsigned(u64),
    Double(f64),
}

impl<V> EntryValue<V> {
    pub fn is_unset(&self) -> bool {
        matches!(self, EntryValue::Unset)
    }

    pub fn as_owned(&self) -> Option<&V> {
        match self {
            EntryValue::Owned(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match *self {
            EntryValue::Signed(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            EntryValue::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            EntryValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: EntryValue<V>,
    // Cached so rehashing never calls back into the descriptor.
    hash: u64,
    next: Option<DefaultKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub size: usize,
    pub used: usize,
    pub longest_chain: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictStats {
    pub primary: TableStats,
    pub target: TableStats,
    pub rehash_cursor: Option<usize>,
    pub iterators: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    table: usize,
    index: Option<usize>,
    entry: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

/// Iteration cursor that pins the dictionary's tables.
///
/// While any `SafeIter` is live, lookups and inserts stop migrating slots,
/// so a full pass visits every entry present at the start exactly once.
/// The entry most recently returned may be removed mid-pass. Hand the
/// iterator back with `Dictionary::release_iter` of the same dictionary;
/// dropping it panics.
#[derive(Debug)]
pub struct SafeIter {
    owner: OwnerId,
    cursor: Cursor,
    token: Token<UsizeCount>,
}

pub struct Dictionary<T: DictType> {
    owner: OwnerId,
    ty: T,
    ctx: T::Context,
    nodes: SlotMap<DefaultKey, Node<T::Key, T::Value>>,
    tables: [HashTable; 2],
    rehash_idx: Option<usize>,
    iterators: UsizeCount,
    config: DictConfig,
}

impl<T: DictType> Dictionary<T> {
    pub fn new(ty: T, ctx: T::Context) -> Self {
        Self::with_config(ty, ctx, DictConfig::default())
    }

    pub fn with_config(ty: T, ctx: T::Context, config: DictConfig) -> Self {
        assert!(
            config.initial_size >= 4 && config.initial_size.is_power_of_two(),
            "initial size must be a power of two >= 4"
        );
        assert!(config.rehash_empty_visits > 0 && config.clear_progress_interval > 0);
        Self {
            owner: OwnerId::fresh(),
            ty,
            ctx,
            nodes: SlotMap::with_key(),
            tables: [HashTable::default(), HashTable::default()],
            rehash_idx: None,
            iterators: UsizeCount::new(),
            config,
        }
    }

    fn handle(&self, k: DefaultKey) -> Handle {
        Handle {
            owner: self.owner,
            key: k,
        }
    }

    /// Arena key behind `h`, if `h` came from this dictionary and is live.
    fn resolve(&self, h: Handle) -> Option<DefaultKey> {
        (h.owner == self.owner && self.nodes.contains_key(h.key)).then_some(h.key)
    }

    fn node_bytes() -> usize {
        core::mem::size_of::<Node<T::Key, T::Value>>()
    }

    pub fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Next slot of table 0 to migrate, or `None` when no rehash is in flight.
    pub fn rehash_cursor(&self) -> Option<usize> {
        self.rehash_idx
    }

    pub fn context(&self) -> &T::Context {
        &self.ctx
    }

    pub fn dict_type(&self) -> &T {
        &self.ty
    }

    pub fn resize_switch(&self) -> &ResizeSwitch {
        &self.config.resize
    }

    pub fn memory(&self) -> &UsedMemory {
        &self.config.memory
    }

    pub fn stats(&self) -> DictStats {
        DictStats {
            primary: self.table_stats(0),
            target: self.table_stats(1),
            rehash_cursor: self.rehash_idx,
            iterators: self.iterators.count(),
        }
    }

    fn table_stats(&self, t: usize) -> TableStats {
        let table = &self.tables[t];
        let longest_chain = table
            .slots
            .iter()
            .map(|head| {
                let mut len = 0;
                let mut cur = *head;
                while let Some(k) = cur {
                    len += 1;
                    cur = self.nodes[k].next;
                }
                len
            })
            .max()
            .unwrap_or(0);
        TableStats {
            size: table.size(),
            used: table.used,
            longest_chain,
        }
    }

    fn next_power(&self, size: usize) -> usize {
        const MAX: usize = 1 << (usize::BITS - 1);
        if size >= MAX {
            return MAX;
        }
        size.max(self.config.initial_size).next_power_of_two()
    }

    /// Size the first table, or start an incremental rehash into a table of
    /// `size` slots rounded up to a power of two.
    pub fn expand(&mut self, size: usize) -> Result<()> {
        if self.is_rehashing() {
            return Err(ExpandRejection::Rehashing.into());
        }
        let len = self.len();
        if len > size {
            return Err(ExpandRejection::BelowLength {
                requested: size,
                len,
            }
            .into());
        }
        let real = self.next_power(size);
        if real == self.tables[0].size() {
            return Err(ExpandRejection::SameSize(real).into());
        }

        let table = HashTable::with_size(real, &self.config.memory);
        if self.tables[0].size() == 0 {
            self.tables[0] = table;
        } else {
            debug!(
                from = self.tables[0].size(),
                to = real,
                len,
                "starting incremental rehash"
            );
            self.tables[1] = table;
            self.rehash_idx = Some(0);
        }
        Ok(())
    }

    fn expand_if_needed(&mut self) {
        if self.tables[0].size() == 0 {
            let initial = self.config.initial_size;
            if let Err(e) = self.expand(initial) {
                debug!(error = %e, "initial sizing rejected");
            }
            return;
        }
        if self.is_rehashing() {
            return;
        }

        let ratio = self.tables[0].used / self.tables[0].size();
        if ratio < 1 {
            return;
        }
        let enabled = self.config.resize.is_enabled();
        if enabled || ratio > self.config.force_resize_ratio {
            if !enabled {
                warn!(ratio, "load factor over forced-resize threshold, growing anyway");
            }
            let target = self.tables[0].used * 2;
            if let Err(e) = self.expand(target) {
                debug!(error = %e, target, "growth rejected");
            }
        }
    }

    /// Shrink (or grow) the table to the smallest size that holds every entry.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        if !self.config.resize.is_enabled() {
            return Err(ExpandRejection::ResizeDisabled.into());
        }
        let minimal = self.len().max(self.config.initial_size);
        self.expand(minimal)?;
        debug!(len = self.len(), target = minimal, "dictionary shrink scheduled");
        Ok(())
    }

    /// Migrate up to `steps` non-empty slots from table 0 to table 1.
    ///
    /// At most `steps * rehash_empty_visits` empty slots are skipped per call,
    /// so a sparse table cannot turn one call into a full scan. Returns true
    /// while entries remain to be moved.
    pub fn rehash(&mut self, steps: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        let mut empty_visits = steps.saturating_mul(self.config.rehash_empty_visits);
        let mut remaining = steps;

        while remaining > 0 && self.tables[0].used != 0 {
            remaining -= 1;
            assert!(
                idx < self.tables[0].size(),
                "rehash cursor {} out of bounds for {} slots",
                idx,
                self.tables[0].size()
            );
            while self.tables[0].slots[idx].is_none() {
                idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehash_idx = Some(idx);
                    return true;
                }
            }

            let [from, to] = &mut self.tables;
            let mut cur = from.slots[idx].take();
            while let Some(k) = cur {
                let node = &mut self.nodes[k];
                cur = node.next;
                let dst = to.index_for(node.hash);
                node.next = to.slots[dst];
                to.slots[dst] = Some(k);
                from.used -= 1;
                to.used += 1;
            }
            idx += 1;
        }

        self.rehash_idx = Some(idx);
        if self.tables[0].used == 0 {
            self.finish_rehash();
            return false;
        }
        true
    }

    fn finish_rehash(&mut self) {
        let target = core::mem::take(&mut self.tables[1]);
        let drained = core::mem::replace(&mut self.tables[0], target);
        drained.release(&self.config.memory);
        self.rehash_idx = None;
        debug!(
            size = self.tables[0].size(),
            len = self.tables[0].used,
            "incremental rehash finished"
        );
    }

    /// Rehash in batches until done or `budget` has elapsed. Returns the
    /// number of slots migrated by completed batches; does nothing while a
    /// safe iterator is live.
    pub fn rehash_for(&mut self, budget: Duration) -> usize {
        if self.iterators.count() > 0 {
            return 0;
        }
        let start = Instant::now();
        let mut migrated = 0;
        while self.rehash(REHASH_BATCH) {
            migrated += REHASH_BATCH;
            if start.elapsed() > budget {
                break;
            }
        }
        trace!(migrated, elapsed = ?start.elapsed(), "timed rehash");
        migrated
    }

    fn rehash_step(&mut self) {
        if self.iterators.count() == 0 {
            self.rehash(1);
        }
    }

    fn lookup(&self, hash: u64, key: &T::Key) -> Option<DefaultKey> {
        for table in &self.tables {
            if table.size() > 0 {
                let mut cur = table.slots[table.index_for(hash)];
                while let Some(k) = cur {
                    let node = &self.nodes[k];
                    if node.hash == hash && self.ty.key_eq(&self.ctx, key, &node.key) {
                        return Some(k);
                    }
                    cur = node.next;
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    fn link(&mut self, hash: u64, key: T::Key, value: EntryValue<T::Value>) -> DefaultKey {
        let t = if self.is_rehashing() { 1 } else { 0 };
        let table = &mut self.tables[t];
        let idx = table.index_for(hash);
        let k = self.nodes.insert(Node {
            key,
            value,
            hash,
            next: table.slots[idx],
        });
        table.slots[idx] = Some(k);
        table.used += 1;
        self.config.memory.charge(Self::node_bytes());
        k
    }

    /// Insert `key` with an unset value and return its handle; fill the value
    /// through one of the `set_*` methods.
    pub fn add_raw(&mut self, key: T::Key) -> Result<Handle> {
        if self.is_rehashing() {
            self.rehash_step();
        }
        self.expand_if_needed();

        let hash = self.ty.hash(&key);
        if self.lookup(hash, &key).is_some() {
            return Err(Error::KeyExists);
        }
        let key = self.ty.dup_key(&self.ctx, key);
        let k = self.link(hash, key, EntryValue::Unset);
        Ok(self.handle(k))
    }

    pub fn add(&mut self, key: T::Key, value: T::Value) -> Result<Handle> {
        let h = self.add_raw(key)?;
        let value = self.ty.dup_value(&self.ctx, value);
        self.nodes[h.key].value = EntryValue::Owned(value);
        Ok(h)
    }

    pub fn find(&mut self, key: &T::Key) -> Option<Handle> {
        if self.tables[0].size() == 0 {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.ty.hash(key);
        self.lookup(hash, key).map(|k| self.handle(k))
    }

    pub fn contains_key(&mut self, key: &T::Key) -> bool {
        self.find(key).is_some()
    }

    pub fn get_value(&mut self, key: &T::Key) -> Option<&EntryValue<T::Value>> {
        let h = self.find(key)?;
        self.nodes.get(h.key).map(|n| &n.value)
    }

    /// Insert, or overwrite the value of an existing key.
    ///
    /// On overwrite the new value is installed before the previous one is
    /// destroyed, so replacing a value with itself (e.g. a clone of the same
    /// `Rc`) never destroys storage the entry still refers to.
    pub fn replace(&mut self, key: T::Key, value: T::Value) -> ReplaceOutcome {
        if self.is_rehashing() {
            self.rehash_step();
        }
        self.expand_if_needed();

        let hash = self.ty.hash(&key);
        match self.lookup(hash, &key) {
            None => {
                let key = self.ty.dup_key(&self.ctx, key);
                let value = self.ty.dup_value(&self.ctx, value);
                self.link(hash, key, EntryValue::Owned(value));
                ReplaceOutcome::Inserted
            }
            Some(k) => {
                let value = self.ty.dup_value(&self.ctx, value);
                self.install(k, EntryValue::Owned(value));
                ReplaceOutcome::Replaced
            }
        }
    }

    fn install(&mut self, k: DefaultKey, value: EntryValue<T::Value>) {
        let old = core::mem::replace(&mut self.nodes[k].value, value);
        self.destroy_value(old);
    }

    fn destroy_value(&self, value: EntryValue<T::Value>) {
        if let EntryValue::Owned(v) = value {
            self.ty.destroy_value(&self.ctx, v);
        }
    }

    pub fn set_value(&mut self, h: Handle, value: T::Value) -> Result<()> {
        let k = self.resolve(h).ok_or(Error::NotFound)?;
        let value = self.ty.dup_value(&self.ctx, value);
        self.install(k, EntryValue::Owned(value));
        Ok(())
    }

    pub fn set_signed(&mut self, h: Handle, value: i64) -> Result<()> {
        self.set_scalar(h, EntryValue::Signed(value))
    }

    pub fn set_unsigned(&mut self, h: Handle, value: u64) -> Result<()> {
        self.set_scalar(h, EntryValue::Unsigned(value))
    }

    pub fn set_double(&mut self, h: Handle, value: f64) -> Result<()> {
        self.set_scalar(h, EntryValue::Double(value))
    }

    fn set_scalar(&mut self, h: Handle, value: EntryValue<T::Value>) -> Result<()> {
        let k = self.resolve(h).ok_or(Error::NotFound)?;
        self.install(k, value);
        Ok(())
    }

    /// Remove `key`, running the key and value destructors.
    pub fn delete(&mut self, key: &T::Key) -> Result<()> {
        let (k, v) = self.unlink(key)?;
        self.ty.destroy_key(&self.ctx, k);
        self.destroy_value(v);
        Ok(())
    }

    /// Remove `key` without running destructors; the stored key and value
    /// are handed back to the caller.
    pub fn unlink(&mut self, key: &T::Key) -> Result<(T::Key, EntryValue<T::Value>)> {
        if self.tables[0].size() == 0 {
            return Err(Error::NotFound);
        }
        if self.is_rehashing() {
            self.rehash_step();
        }

        let hash = self.ty.hash(key);
        for t in 0..2 {
            let table = &self.tables[t];
            if table.size() > 0 {
                let idx = table.index_for(hash);
                let mut prev = None;
                let mut cur = table.slots[idx];
                while let Some(k) = cur {
                    let node = &self.nodes[k];
                    if node.hash == hash && self.ty.key_eq(&self.ctx, key, &node.key) {
                        return Ok(self.detach(t, idx, prev, k));
                    }
                    prev = cur;
                    cur = node.next;
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        Err(Error::NotFound)
    }

    /// Unlink the entry behind `h` without destructors and without a rehash
    /// step, so it is safe to call between `iter_next` calls.
    pub fn remove(&mut self, h: Handle) -> Option<(T::Key, EntryValue<T::Value>)> {
        let target = self.resolve(h)?;
        let hash = self.nodes[target].hash;
        for t in 0..2 {
            let table = &self.tables[t];
            if table.size() == 0 {
                continue;
            }
            let idx = table.index_for(hash);
            let mut prev = None;
            let mut cur = table.slots[idx];
            while let Some(k) = cur {
                if k == target {
                    return Some(self.detach(t, idx, prev, k));
                }
                prev = cur;
                cur = self.nodes[k].next;
            }
        }
        None
    }

    fn detach(
        &mut self,
        t: usize,
        idx: usize,
        prev: Option<DefaultKey>,
        k: DefaultKey,
    ) -> (T::Key, EntryValue<T::Value>) {
        let node = self
            .nodes
            .remove(k)
            .expect("chained node must be live in the arena");
        match prev {
            Some(p) => self.nodes[p].next = node.next,
            None => self.tables[t].slots[idx] = node.next,
        }
        self.tables[t].used -= 1;
        self.config.memory.credit(Self::node_bytes());
        (node.key, node.value)
    }

    /// Destroy every entry and free both slot arrays.
    pub fn clear(&mut self) {
        self.clear_with_progress(|_| {});
    }

    /// Like `clear`, calling `progress` with the context every
    /// `clear_progress_interval` slots (starting with the first) so an
    /// embedding server can interleave other work with a long teardown.
    pub fn clear_with_progress<F>(&mut self, mut progress: F)
    where
        F: FnMut(&T::Context),
    {
        for t in 0..2 {
            self.clear_table(t, &mut progress);
        }
        self.rehash_idx = None;
    }

    fn clear_table(&mut self, t: usize, progress: &mut dyn FnMut(&T::Context)) {
        let table = core::mem::take(&mut self.tables[t]);
        let interval = self.config.clear_progress_interval;
        let mut remaining = table.used;
        for (i, head) in table.slots.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            if i % interval == 0 {
                progress(&self.ctx);
            }
            let mut cur = *head;
            while let Some(k) = cur {
                let node = self
                    .nodes
                    .remove(k)
                    .expect("chained node must be live in the arena");
                cur = node.next;
                self.ty.destroy_key(&self.ctx, node.key);
                self.destroy_value(node.value);
                self.config.memory.credit(Self::node_bytes());
                remaining -= 1;
            }
        }
        table.release(&self.config.memory);
    }

    /// Borrowing iterator over every entry, table 0 first.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            dict: self,
            cursor: Cursor::default(),
        }
    }

    /// Start a pass that tolerates mutation between steps.
    pub fn safe_iter(&self) -> SafeIter {
        SafeIter {
            owner: self.owner,
            cursor: Cursor::default(),
            token: self.iterators.get(),
        }
    }

    /// Next entry of the pass; `None` at the end or if `it` belongs to
    /// another dictionary.
    pub fn iter_next(&self, it: &mut SafeIter) -> Option<Handle> {
        if it.owner != self.owner {
            return None;
        }
        self.advance(&mut it.cursor).map(|k| self.handle(k))
    }

    /// # Panics
    /// If `it` was started on a different dictionary.
    pub fn release_iter(&self, it: SafeIter) {
        let SafeIter { owner, token, .. } = it;
        assert!(
            owner == self.owner,
            "SafeIter released into a different dictionary"
        );
        self.iterators.put(token);
    }

    fn advance(&self, c: &mut Cursor) -> Option<DefaultKey> {
        loop {
            let entry = if c.entry.is_none() {
                let mut index = c.index.map_or(0, |i| i + 1);
                if index >= self.tables[c.table].size() {
                    if self.is_rehashing() && c.table == 0 {
                        c.table = 1;
                        index = 0;
                    } else {
                        return None;
                    }
                }
                c.index = Some(index);
                self.tables[c.table].slots[index]
            } else {
                c.next
            };
            // A removed successor ends the chain early rather than dangling.
            c.entry = entry.filter(|k| self.nodes.contains_key(*k));
            if let Some(k) = c.entry {
                c.next = self.nodes[k].next;
                return Some(k);
            }
        }
    }
}

impl<T: DictType> Drop for Dictionary<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct Iter<'a, T: DictType> {
    dict: &'a Dictionary<T>,
    cursor: Cursor,
}

impl<'a, T: DictType> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T::Key, &'a EntryValue<T::Value>);

    fn next(&mut self) -> Option<Self::Item> {
        let dict: &'a Dictionary<T> = self.dict;
        let k = dict.advance(&mut self.cursor)?;
        let node = &dict.nodes[k];
        Some((dict.handle(k), &node.key, &node.value))
    }
}

#[cfg(test)]
impl<T: DictType> Dictionary<T> {
    /// Structural checks shared by the unit and property suites.
    pub(crate) fn assert_invariants(&self) {
        for (t, table) in self.tables.iter().enumerate() {
            assert!(
                table.size() == 0 || (table.size() >= 4 && table.size().is_power_of_two()),
                "table {t} has {} slots",
                table.size()
            );
            let mut chained = 0;
            for (i, head) in table.slots.iter().enumerate() {
                let mut cur = *head;
                while let Some(k) = cur {
                    let node = &self.nodes[k];
                    assert_eq!(table.index_for(node.hash), i, "node chained in wrong slot");
                    if let (0, Some(c)) = (t, self.rehash_idx) {
                        assert!(i >= c, "slot {i} below cursor {c} still populated");
                    }
                    chained += 1;
                    cur = node.next;
                }
            }
            assert_eq!(chained, table.used, "table {t} used count drifted");
        }
        match self.rehash_idx {
            None => assert_eq!(self.tables[1].size(), 0),
            Some(_) => assert!(self.tables[1].size() > 0),
        }
        assert_eq!(self.nodes.len(), self.len());

        let keys: Vec<&T::Key> = self.iter().map(|(_, k, _)| k).collect();
        assert_eq!(keys.len(), self.len());
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                assert!(
                    !self.ty.key_eq(&self.ctx, keys[i], keys[j]),
                    "duplicate key across tables"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Hooks {
        key_dups: Cell<usize>,
        value_dups: Cell<usize>,
        key_drops: Cell<usize>,
        value_drops: Cell<usize>,
    }

    fn bump(c: &Cell<usize>) {
        c.set(c.get() + 1);
    }

    /// Identity hash so slot placement is predictable.
    struct IntType;

    impl DictType for IntType {
        type Key = u64;
        type Value = Rc<String>;
        type Context = Hooks;

        fn hash(&self, key: &u64) -> u64 {
            *key
        }
        fn key_eq(&self, _ctx: &Hooks, a: &u64, b: &u64) -> bool {
            a == b
        }
        fn dup_key(&self, ctx: &Hooks, key: u64) -> u64 {
            bump(&ctx.key_dups);
            key
        }
        fn dup_value(&self, ctx: &Hooks, value: Rc<String>) -> Rc<String> {
            bump(&ctx.value_dups);
            value
        }
        fn destroy_key(&self, ctx: &Hooks, _key: u64) {
            bump(&ctx.key_drops);
        }
        fn destroy_value(&self, ctx: &Hooks, value: Rc<String>) {
            bump(&ctx.value_drops);
            drop(value);
        }
    }

    fn dict() -> Dictionary<IntType> {
        Dictionary::new(IntType, Hooks::default())
    }

    fn val(s: &str) -> Rc<String> {
        Rc::new(s.to_string())
    }

    #[test]
    fn first_add_sizes_table_at_initial_size() {
        let mut d = dict();
        assert_eq!(d.stats().primary.size, 0);
        assert!(!d.is_rehashing());
        d.add(0, val("zero")).unwrap();
        let s = d.stats();
        assert_eq!(s.primary.size, 4);
        assert_eq!(s.primary.used, 1);
        assert_eq!(s.target.size, 0);
    }

    #[test]
    fn duplicate_add_rejected_without_hooks() {
        let mut d = dict();
        d.add(7, val("a")).unwrap();
        assert_eq!(d.add(7, val("b")), Err(Error::KeyExists));
        assert_eq!(d.len(), 1);
        assert_eq!(d.context().key_dups.get(), 1);
        assert_eq!(d.context().value_dups.get(), 1);
        let v = d.get_value(&7).unwrap();
        assert_eq!(v.as_owned().map(|s| s.as_str()), Some("a"));
    }

    #[test]
    fn expand_rejections() {
        let mut d = dict();
        d.expand(8).unwrap();
        assert_eq!(
            d.expand(8),
            Err(Error::CapacityRejected(ExpandRejection::SameSize(8)))
        );
        for k in 0..6 {
            d.add(k, val("v")).unwrap();
        }
        assert_eq!(
            d.expand(5),
            Err(Error::CapacityRejected(ExpandRejection::BelowLength {
                requested: 5,
                len: 6
            }))
        );
        d.expand(32).unwrap();
        assert!(d.is_rehashing());
        assert_eq!(
            d.expand(64),
            Err(Error::CapacityRejected(ExpandRejection::Rehashing))
        );
        d.assert_invariants();
    }

    #[test]
    fn rehash_bounds_empty_slot_visits() {
        let mut d = dict();
        d.expand(64).unwrap();
        d.add(63, val("tail")).unwrap();
        d.expand(128).unwrap();
        assert_eq!(d.rehash_cursor(), Some(0));

        assert!(d.rehash(1));
        assert_eq!(d.rehash_cursor(), Some(10));
        assert!(d.rehash(2));
        assert_eq!(d.rehash_cursor(), Some(30));
        d.assert_invariants();

        assert!(!d.rehash(10));
        assert_eq!(d.rehash_cursor(), None);
        assert_eq!(d.stats().primary.size, 128);
        assert!(d.find(&63).is_some());
        d.assert_invariants();
    }

    #[test]
    fn inserts_during_rehash_land_in_target_table() {
        let mut d = dict();
        for k in 0..4 {
            d.add(k, val("v")).unwrap();
        }
        d.add(4, val("v")).unwrap();
        assert!(d.is_rehashing());
        let s = d.stats();
        assert_eq!(s.target.size, 8);
        assert_eq!(s.primary.used, 4);
        assert_eq!(s.target.used, 1);
        d.assert_invariants();
    }

    #[test]
    fn disabled_resize_still_grows_past_force_ratio() {
        let switch = ResizeSwitch::new();
        let mut d = Dictionary::with_config(
            IntType,
            Hooks::default(),
            DictConfig::default().with_resize_switch(switch.clone()),
        );
        switch.disable();
        for k in 0..24 {
            d.add(k, val("v")).unwrap();
        }
        assert_eq!(d.stats().primary.size, 4);
        assert!(!d.is_rehashing());

        d.add(24, val("v")).unwrap();
        assert!(d.is_rehashing());
        assert_eq!(d.stats().target.size, 64);
        d.assert_invariants();
    }

    #[test]
    fn replace_installs_before_destroying() {
        let mut d = dict();
        let shared = val("same");
        assert_eq!(d.replace(1, shared.clone()), ReplaceOutcome::Inserted);
        assert_eq!(d.replace(1, shared.clone()), ReplaceOutcome::Replaced);
        assert_eq!(d.context().value_drops.get(), 1);
        assert_eq!(Rc::strong_count(&shared), 2, "dictionary keeps one clone");
        let v = d.get_value(&1).unwrap().as_owned().unwrap();
        assert_eq!(v.as_str(), "same");

        assert_eq!(d.replace(1, val("other")), ReplaceOutcome::Replaced);
        assert_eq!(d.context().value_drops.get(), 2);
        assert_eq!(Rc::strong_count(&shared), 1);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn add_raw_then_fill_scalars() {
        let mut d = dict();
        let h = d.add_raw(3).unwrap();
        assert!(h.value(&d).unwrap().is_unset());
        d.set_signed(h, -5).unwrap();
        assert_eq!(h.value(&d).unwrap().as_signed(), Some(-5));
        d.set_double(h, 1.5).unwrap();
        assert_eq!(h.value(&d).unwrap().as_double(), Some(1.5));
        d.set_value(h, val("owned")).unwrap();
        d.set_unsigned(h, 9).unwrap();
        assert_eq!(h.value(&d).unwrap().as_unsigned(), Some(9));
        assert_eq!(d.context().value_drops.get(), 1, "only the owned value is destroyed");
        assert_eq!(h.key(&d), Some(&3));
    }

    #[test]
    fn stale_handle_rejected() {
        let mut d = dict();
        let h = d.add(1, val("v")).unwrap();
        d.delete(&1).unwrap();
        assert!(h.value(&d).is_none());
        assert_eq!(d.set_signed(h, 1), Err(Error::NotFound));
        assert!(d.remove(h).is_none());
    }

    #[test]
    fn delete_mid_rehash_searches_both_tables() {
        let mut d = dict();
        for k in 0..5 {
            d.add(k, val("v")).unwrap();
        }
        assert!(d.is_rehashing());
        // key 4 sits in the target table, key 3 has not migrated yet
        d.delete(&4).unwrap();
        d.delete(&3).unwrap();
        assert_eq!(d.delete(&3), Err(Error::NotFound));
        assert_eq!(d.len(), 3);
        assert_eq!(d.context().key_drops.get(), 2);
        assert_eq!(d.context().value_drops.get(), 2);
        d.assert_invariants();
    }

    #[test]
    fn unlink_hands_back_ownership() {
        let mut d = dict();
        d.add(11, val("mine")).unwrap();
        let (k, v) = d.unlink(&11).unwrap();
        assert_eq!(k, 11);
        assert_eq!(v.as_owned().map(|s| s.as_str()), Some("mine"));
        assert_eq!(d.context().key_drops.get(), 0);
        assert_eq!(d.context().value_drops.get(), 0);
        assert_eq!(d.unlink(&11), Err(Error::NotFound));
    }

    #[test]
    fn safe_iter_pins_rehash() {
        let mut d = dict();
        for k in 0..5 {
            d.add(k, val("v")).unwrap();
        }
        let cursor = d.rehash_cursor();
        assert!(cursor.is_some());

        let mut it = d.safe_iter();
        for k in 0..5 {
            assert!(d.find(&k).is_some());
        }
        d.add(100, val("v")).unwrap();
        assert_eq!(d.rehash_cursor(), cursor, "lookups must not migrate while pinned");
        assert_eq!(d.stats().iterators, 1);

        let mut seen = Vec::new();
        while let Some(h) = d.iter_next(&mut it) {
            seen.push(*h.key(&d).unwrap());
        }
        d.release_iter(it);
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 100]);

        assert_eq!(d.stats().iterators, 0);
        d.find(&0);
        assert_ne!(d.rehash_cursor(), cursor, "rehashing resumes after release");
    }

    #[test]
    fn safe_iter_allows_removing_current_entry() {
        let mut d = dict();
        d.expand(4).unwrap();
        // chain of three in slot 0
        for k in [0, 4, 8, 1] {
            d.add(k, val("v")).unwrap();
        }
        let mut it = d.safe_iter();
        let mut visited = 0;
        while let Some(h) = d.iter_next(&mut it) {
            visited += 1;
            let key = *h.key(&d).unwrap();
            if key % 4 == 0 {
                assert!(d.remove(h).is_some());
            }
        }
        d.release_iter(it);
        assert_eq!(visited, 4);
        assert_eq!(d.len(), 1);
        assert!(d.find(&1).is_some());
        d.assert_invariants();
    }

    #[test]
    fn clear_reports_progress_per_interval() {
        let mut d = Dictionary::with_config(
            IntType,
            Hooks::default(),
            DictConfig::default().with_clear_progress_interval(4),
        );
        d.expand(16).unwrap();
        for k in 0..16 {
            d.add(k, val("v")).unwrap();
        }
        assert_eq!(d.stats().primary.size, 16);

        let mut calls = 0;
        d.clear_with_progress(|ctx: &Hooks| {
            calls += 1;
            assert!(ctx.value_drops.get() <= 16);
        });
        assert_eq!(calls, 4);
        assert_eq!(d.len(), 0);
        assert_eq!(d.context().key_drops.get(), 16);
        assert_eq!(d.context().value_drops.get(), 16);
        assert_eq!(d.stats().primary.size, 0);
        assert_eq!(d.memory().get(), 0);
    }

    #[test]
    fn drop_runs_destructors() {
        let memory = UsedMemory::new();
        let shared = val("kept");
        {
            let mut d = Dictionary::with_config(
                IntType,
                Hooks::default(),
                DictConfig::default().with_memory(memory.clone()),
            );
            for k in 0..10 {
                d.add(k, shared.clone()).unwrap();
            }
            assert!(memory.get() > 0);
            assert_eq!(Rc::strong_count(&shared), 11);
        }
        assert_eq!(Rc::strong_count(&shared), 1);
        assert_eq!(memory.get(), 0);
    }

    #[test]
    fn shrink_to_fit_after_deletes() {
        let mut d = dict();
        for k in 0..64 {
            d.add(k, val("v")).unwrap();
        }
        while d.rehash(100) {}
        assert_eq!(d.stats().primary.size, 64);
        for k in 0..60 {
            d.delete(&k).unwrap();
        }
        d.resize_switch().disable();
        assert_eq!(
            d.shrink_to_fit(),
            Err(Error::CapacityRejected(ExpandRejection::ResizeDisabled))
        );
        d.resize_switch().enable();
        d.shrink_to_fit().unwrap();
        while d.rehash(1) {}
        assert_eq!(d.stats().primary.size, 4);
        for k in 60..64 {
            assert!(d.find(&k).is_some());
        }
        d.assert_invariants();
    }

    #[test]
    fn rehash_for_finishes_small_table() {
        let mut d = dict();
        for k in 0..200 {
            d.add(k, val("v")).unwrap();
        }
        if !d.is_rehashing() {
            d.expand(1024).unwrap();
        }
        d.rehash_for(Duration::from_secs(5));
        assert!(!d.is_rehashing());
        for k in 0..200 {
            assert!(d.find(&k).is_some());
        }
        d.assert_invariants();
    }

    #[test]
    fn stats_report_longest_chain() {
        let mut d = dict();
        d.expand(4).unwrap();
        for k in [2, 6, 10] {
            d.add(k, val("v")).unwrap();
        }
        let s = d.stats();
        assert_eq!(s.primary.longest_chain, 3);
        assert_eq!(s.rehash_cursor, None);
    }
}
