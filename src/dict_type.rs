//! Keyed-type descriptors: the hooks that parameterize a `Dictionary`.
//!
//! A descriptor decides how keys hash and compare and what happens to keys
//! and values as they enter and leave the table. `hash` and `key_eq` are
//! required, so keys need not implement `Eq`. The other hooks default:
//! - `dup_key`/`dup_value` pass the argument through, so the dictionary
//!   stores exactly what the caller handed in (for `Rc` payloads that means
//!   sharing the allocation).
//! - `destroy_key`/`destroy_value` simply drop.
//!
//! Every hook receives the dictionary's context value.

use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;

pub trait DictType {
    type Key;
    type Value;
    type Context;

    fn hash(&self, key: &Self::Key) -> u64;

    fn key_eq(&self, ctx: &Self::Context, a: &Self::Key, b: &Self::Key) -> bool;

    fn dup_key(&self, _ctx: &Self::Context, key: Self::Key) -> Self::Key {
        key
    }

    fn dup_value(&self, _ctx: &Self::Context, value: Self::Value) -> Self::Value {
        value
    }

    fn destroy_key(&self, _ctx: &Self::Context, key: Self::Key) {
        drop(key);
    }

    fn destroy_value(&self, _ctx: &Self::Context, value: Self::Value) {
        drop(value);
    }
}

/// Hook-free descriptor hashing keys with a `BuildHasher`.
pub struct DefaultType<K, V, S = DefaultHashBuilder> {
    hasher: S,
    _pd: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DefaultType<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }
}

impl<K, V> Default for DefaultType<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> DefaultType<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            _pd: PhantomData,
        }
    }
}

impl<K, V, S> DictType for DefaultType<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Key = K;
    type Value = V;
    type Context = ();

    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    fn key_eq(&self, _ctx: &(), a: &K, b: &K) -> bool {
        a == b
    }
}
