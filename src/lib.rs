//! nosql-core: the storage core of a small key-value / sorted-set engine.
//! An incrementally rehashing `Dictionary` for primary key lookup and a
//! ranked `SkipList` for score-ordered collections.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: resize a live hash table without ever making one caller pay
//!   O(n), and keep exact rank information in an ordered index.
//! - Pieces:
//!   - Dictionary<T: DictType>: two chained `HashTable`s; a resize starts
//!     an incremental rehash that every add/find/replace/delete advances
//!     by one slot.
//!   - DictType: descriptor trait with the hash, compare, duplicate and
//!     destroy hooks; `DefaultType` covers the hook-free case.
//!   - SkipList<T>: probabilistic index ordered by `(score, item)` with
//!     per-link spans for O(log n) rank.
//!   - UsedMemory / ResizeSwitch: shared counters injected through config.
//!
//! Constraints
//! - Single-threaded mutation per instance; no internal locking. Only the
//!   memory counter and the resize switch may be shared across threads.
//! - All operations run to completion; none block.
//! - Allocation failure is fatal: the process aborts after logging.
//! - Stable, generational keys behind small `Handle`/`NodeHandle` wrappers.
//!
//! Rehashing invariants
//! - Each node stores its `u64` hash; migration never calls `DictType::hash`.
//! - While rehashing, inserts go to table 1, lookups search both tables,
//!   and no key lives in both.
//! - A live `SafeIter` holds a linear token from the dictionary's
//!   iterator counter (`tokens`). Opportunistic rehash steps run only
//!   while that counter is zero, so a pass sees a stable view.
//!
//! Skip list invariants
//! - Level-0 links form one chain ordered by score, then by `T: Ord`.
//! - For every level, span sums from the head equal the 1-based rank.
//! - Scores are never NaN; inserting one panics.
//!
//! Notes and non-goals
//! - The sorted-set type combining both structures lives above this crate;
//!   `tests/scenarios.rs` sketches the composition.
//! - No persistence, no network layer, no snapshotting.

pub mod config;
pub mod dict_type;
pub mod dictionary;
mod dictionary_proptest;
pub mod error;
mod hash_table;
pub mod memory;
pub mod skip_list;
mod skip_list_proptest;
pub mod tokens;

// Public surface
pub use config::{DictConfig, ResizeSwitch, SkipListConfig};
pub use dict_type::{DefaultType, DictType};
pub use dictionary::{
    DictStats, Dictionary, EntryValue, Handle, Iter, ReplaceOutcome, SafeIter, TableStats,
};
pub use error::{Error, ExpandRejection, Result};
pub use memory::UsedMemory;
pub use skip_list::{NodeHandle, ScoreRange, SkipList, SKIP_LIST_MAX_LEVEL};
