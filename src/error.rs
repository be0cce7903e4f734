//! Error outcomes surfaced by the dictionary and skip list.
//!
//! Only recoverable outcomes live here. Allocation failure aborts the
//! process (see `memory`), and contract violations such as a NaN score
//! panic at the call site.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("key already exists")]
    KeyExists,

    #[error("key not found")]
    NotFound,

    #[error("expand rejected: {0}")]
    CapacityRejected(#[from] ExpandRejection),
}

/// Why an explicit resize request was turned down.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandRejection {
    #[error("incremental rehash already in progress")]
    Rehashing,

    #[error("requested {requested} slots for {len} entries")]
    BelowLength { requested: usize, len: usize },

    #[error("table already has {0} slots")]
    SameSize(usize),

    #[error("automatic resizing is disabled")]
    ResizeDisabled,
}
