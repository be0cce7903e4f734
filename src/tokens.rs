//! Linear tokens and counters.
//!
//! A token is a zero-sized proof that one unit was acquired from a counter.
//! Dropping a token panics; the only valid way to dispose of it is to hand
//! it back via `Count::put`. The dictionary uses this to pin its tables:
//! every live safe iterator owns one token from the dictionary's iterator
//! counter, and incremental rehashing only runs while that counter is zero.
//!
//! `OwnerId` brands a container instance so handles and iterators minted by
//! one container are refused by every other.

use core::cell::Cell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of one container instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Zero-sized, linear token branded with its counter type.
pub struct Token<C: ?Sized> {
    _ctr: PhantomData<*const C>,
}

impl<C: ?Sized> Token<C> {
    #[inline]
    fn new() -> Self {
        Self { _ctr: PhantomData }
    }
}

impl<C: ?Sized> core::fmt::Debug for Token<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Token")
    }
}

impl<C: ?Sized> Drop for Token<C> {
    fn drop(&mut self) {
        // Fail fast on misuse, but never turn an unwind into an abort.
        if !std::thread::panicking() {
            panic!("Token dropped without Count::put");
        }
    }
}

/// A source of counted units, enforced by linear token flow.
pub trait Count {
    /// Acquire one unit and return the token that stands for it.
    fn get(&self) -> Token<Self>;

    /// Return a previously acquired token. Returns true if the count is now zero.
    fn put(&self, t: Token<Self>) -> bool;

    fn count(&self) -> usize;
}

/// Single-threaded counter.
#[derive(Debug, Default)]
pub struct UsizeCount {
    count: Cell<usize>,
}

impl UsizeCount {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Count for UsizeCount {
    #[inline]
    fn get(&self) -> Token<Self> {
        let n = self.count.get().wrapping_add(1);
        if n == 0 {
            std::process::abort();
        }
        self.count.set(n);
        Token::new()
    }

    #[inline]
    fn put(&self, t: Token<Self>) -> bool {
        let c = self.count.get();
        assert!(c > 0, "UsizeCount underflow");
        self.count.set(c - 1);
        core::mem::forget(t);
        c == 1
    }

    #[inline]
    fn count(&self) -> usize {
        self.count.get()
    }
}
