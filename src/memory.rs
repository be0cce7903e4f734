//! Memory accounting and the fatal out-of-memory path.
//!
//! Both structures allocate through the global allocator. What they add on
//! top is bookkeeping: every slot array and node charges its logical size
//! (rounded up to word alignment) to a shared `UsedMemory` counter when it is
//! created and credits it back when it is destroyed. The counter is atomic so
//! independent structures on different threads may share one instance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const WORD: usize = core::mem::size_of::<usize>();

/// Cloneable handle to an aggregate byte counter.
#[derive(Clone, Debug, Default)]
pub struct UsedMemory {
    bytes: Arc<AtomicUsize>,
}

impl UsedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently charged by every structure sharing this counter.
    pub fn get(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }

    /// True when both handles feed the same counter.
    pub fn same_counter(&self, other: &UsedMemory) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    pub(crate) fn charge(&self, bytes: usize) {
        self.bytes.fetch_add(aligned(bytes), Ordering::Relaxed);
    }

    pub(crate) fn credit(&self, bytes: usize) {
        let bytes = aligned(bytes);
        let prev = self.bytes.fetch_sub(bytes, Ordering::Relaxed);
        debug_assert!(prev >= bytes, "memory accounting underflow");
    }
}

#[inline]
pub(crate) fn aligned(bytes: usize) -> usize {
    (bytes + WORD - 1) & !(WORD - 1)
}

/// Allocate `len` copies of `fill`, aborting the process if the allocator
/// cannot satisfy the request.
pub(crate) fn alloc_filled<T: Clone>(len: usize, fill: T) -> Vec<T> {
    let mut v = Vec::new();
    if v.try_reserve_exact(len).is_err() {
        oom_abort(len.saturating_mul(core::mem::size_of::<T>()));
    }
    v.resize(len, fill);
    v
}

#[cold]
pub(crate) fn oom_abort(bytes: usize) -> ! {
    tracing::error!(bytes, "out of memory trying to allocate {} bytes", bytes);
    std::process::abort();
}
