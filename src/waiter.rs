/*!
 * Waiter Handles
 *
 * The park/unpark/interrupt collaborator: one opaque handle per OS
 * thread, suspended and resumed through parking_lot_core. On Linux this
 * maps directly to futex syscalls for minimal overhead.
 *
 * # Semantics
 *
 * - At most one permit is pending per waiter. `unpark` grants it;
 *   `park` consumes it, returning immediately if it was already
 *   available. A permit delivered during `park` may instead surface as
 *   one spurious return from the *next* park, which all callers in this
 *   crate absorb by looping.
 * - The interrupt flag is sticky until cleared by `take_interrupt`
 *   (test-and-clear, usable immediately after waking). `park` never
 *   blocks while the flag is set.
 */

use parking_lot_core::{ParkToken, UnparkToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

thread_local! {
    static CURRENT_WAITER: Arc<Waiter> = Arc::new(Waiter::new());
}

/// Per-thread wait handle
///
/// Stable address for the lifetime of the thread (held in a
/// thread-local `Arc`), which is what the parking slot is keyed on.
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing
#[derive(Debug)]
pub struct Waiter {
    permit: AtomicBool,
    interrupted: AtomicBool,
}

impl Waiter {
    fn new() -> Self {
        Self {
            permit: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Handle for the calling thread
    ///
    /// Clones are cheap and may be passed to other threads, which can
    /// then `unpark` or `interrupt` this one.
    pub fn current() -> Arc<Waiter> {
        CURRENT_WAITER.with(Arc::clone)
    }

    /// Stable parking key for this handle
    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }

    /// Block the calling thread until unparked, interrupted, the
    /// deadline passes, or spuriously
    ///
    /// Must only be called on the current thread's own handle.
    pub fn park(&self, deadline: Option<Instant>) {
        // A pending permit is consumed without blocking
        if self.permit.swap(false, Ordering::SeqCst) {
            return;
        }
        // Pending interrupt: return immediately, flag stays set for the
        // caller's take_interrupt check
        if self.interrupted.load(Ordering::SeqCst) {
            return;
        }

        unsafe {
            parking_lot_core::park(
                self.key(),
                || {
                    // Raced with an unpark or interrupt: don't sleep
                    !self.permit.load(Ordering::SeqCst)
                        && !self.interrupted.load(Ordering::SeqCst)
                },
                || {},
                |_, _| {},
                ParkToken(0),
                deadline,
            );
        }
        // A permit set while we were waking is left in place and shows
        // up as one spurious return from the next park
    }

    /// Make the target thread's next (or current) park return
    pub fn unpark(&self) {
        self.permit.store(true, Ordering::SeqCst);
        unsafe {
            parking_lot_core::unpark_one(self.key(), |_| UnparkToken(0));
        }
    }

    /// Set the interrupt flag and wake the target if parked
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        unsafe {
            parking_lot_core::unpark_one(self.key(), |_| UnparkToken(0));
        }
    }

    /// Test-and-clear the interrupt flag
    ///
    /// Returns `true` at most once per `interrupt` call.
    #[inline]
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Non-clearing interrupt query (diagnostics)
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Re-assert the interrupt flag without waking anyone
    ///
    /// Used by the uninterruptible paths to hand a deferred interrupt
    /// back to the caller after acquisition completes.
    #[inline]
    pub fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_permit_before_park() {
        let waiter = Waiter::current();
        waiter.unpark();
        let start = Instant::now();
        waiter.park(Some(Instant::now() + Duration::from_secs(1)));
        // Permit was pending, park must not block
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_unpark_wakes_parked_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            let waiter = Waiter::current();
            tx.send(waiter.clone()).unwrap();
            waiter.park(None);
        });

        let waiter = rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        waiter.unpark();
        handle.join().unwrap();
    }

    #[test]
    fn test_park_deadline() {
        let waiter = Waiter::current();
        let start = Instant::now();
        waiter.park(Some(Instant::now() + Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_interrupt_wakes_and_clears_once() {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            let waiter = Waiter::current();
            tx.send(waiter.clone()).unwrap();
            waiter.park(None);
            let first = waiter.take_interrupt();
            let second = waiter.take_interrupt();
            (first, second)
        });

        let waiter = rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        waiter.interrupt();
        let (first, second) = handle.join().unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn test_park_does_not_block_while_interrupted() {
        let waiter = Waiter::current();
        waiter.set_interrupted();
        let start = Instant::now();
        waiter.park(Some(Instant::now() + Duration::from_secs(1)));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(waiter.take_interrupt());
    }
}
