/*!
 * Synchronization State Word
 *
 * A single atomically-updated integer whose meaning is supplied by the
 * concrete synchronizer policy: a lock bit, a reentrancy count, a permit
 * count, a packed reader/writer split. The core never interprets it.
 *
 * All retry logic lives in the acquire/release engine; this type only
 * exposes the three raw primitives.
 */

use std::sync::atomic::{AtomicI64, Ordering};

/// The synchronizer-defined state word
///
/// Cache-line aligned: the state word is the hottest field in the whole
/// framework and shares no line with the queue links.
#[repr(C, align(64))]
#[derive(Debug)]
pub struct SyncState {
    value: AtomicI64,
}

impl SyncState {
    /// Create a state word with the given initial value
    pub const fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Atomic load with full memory ordering
    #[inline(always)]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Plain atomic store with full memory ordering
    #[inline(always)]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Atomic compare-and-set
    ///
    /// Returns `false` with no side effect if the current value does not
    /// equal `expected`.
    #[inline(always)]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(0)
    }
}
