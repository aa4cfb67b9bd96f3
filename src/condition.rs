/*!
 * Condition Queues
 *
 * Monitor-style wait/signal bound to an exclusively-held synchronizer.
 * Each condition keeps its own singly-linked queue of waiters; `signal`
 * does not wake anyone directly, it transfers the longest-waiting node
 * onto the sync queue where it competes to reacquire like any other
 * waiter.
 *
 * The waiter list itself is guarded by a small mutex rather than CAS:
 * every mutation happens while the caller holds the synchronizer
 * exclusively, so the lock is uncontended and only exists to keep the
 * read-only instrumentation walks coherent.
 *
 * # Design
 *
 * Interrupt handling distinguishes *when* the interrupt landed:
 * before a signal transferred the node, the wait aborts with
 * [`SyncError::Interrupted`]; after, the signal must not be lost, so
 * the wait completes and the interrupt flag is re-asserted.
 */

use crate::engine::{QueuedSynchronizer, SyncPolicy, SPIN_FOR_TIMEOUT_THRESHOLD};
use crate::errors::{SyncError, SyncResult};
use crate::node::{status, WaitNode};
use crate::waiter::Waiter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How an interrupt observed during a wait is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptMode {
    /// No interrupt during the wait
    None,
    /// Interrupt beat any signal: abort with an error
    Abort,
    /// Interrupt arrived after a signal: re-assert the flag
    Reinterrupt,
}

#[derive(Default)]
struct WaiterList {
    first: Option<Arc<WaitNode>>,
    last: Option<Arc<WaitNode>>,
}

/// A condition queue for a queued synchronizer
///
/// Created through [`QueuedSynchronizer::new_condition`]; every method
/// requires the caller to hold the owner synchronizer exclusively and
/// fails with [`SyncError::NotHeldExclusively`] otherwise.
pub struct Condition<P: SyncPolicy> {
    owner: Arc<QueuedSynchronizer<P>>,
    waiters: Mutex<WaiterList>,
}

impl<P: SyncPolicy> Condition<P> {
    pub(crate) fn new(owner: Arc<QueuedSynchronizer<P>>) -> Self {
        Self {
            owner,
            waiters: Mutex::new(WaiterList::default()),
        }
    }

    fn require_held(&self) -> SyncResult<()> {
        if self.owner.is_held_exclusively()? {
            Ok(())
        } else {
            Err(SyncError::NotHeldExclusively)
        }
    }

    /// Append a fresh CONDITION node for the current thread
    fn add_condition_waiter(&self) -> Arc<WaitNode> {
        let mut list = self.waiters.lock();
        // A trailing cancelled waiter means others may be stale too
        if list
            .last
            .as_ref()
            .map_or(false, |t| t.status() != status::CONDITION)
        {
            Self::unlink_cancelled_waiters(&mut list);
        }
        let node = Arc::new(WaitNode::for_condition(Waiter::current()));
        match list.last.take() {
            Some(t) => {
                t.cond_next.store(Some(node.clone()));
            }
            None => {
                list.first = Some(node.clone());
            }
        }
        list.last = Some(node.clone());
        node
    }

    /// Drop every node no longer in CONDITION status from the list
    ///
    /// Called only while the synchronizer is held, either when a new
    /// waiter arrives past a cancelled tail or after a wait ended
    /// without a signal.
    fn unlink_cancelled_waiters(list: &mut WaiterList) {
        let mut trail: Option<Arc<WaitNode>> = None;
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            let next = node.cond_next.load_full();
            if node.status() != status::CONDITION {
                node.cond_next.store(None);
                match &trail {
                    Some(t) => t.cond_next.store(next.clone()),
                    None => list.first = next.clone(),
                }
                if next.is_none() {
                    list.last = trail.clone();
                }
            } else {
                trail = Some(node);
            }
            cursor = next;
        }
    }

    /// Move the longest-waiting waiter to the sync queue
    pub fn signal(&self) -> SyncResult<()> {
        self.require_held()?;
        let mut list = self.waiters.lock();
        while let Some(first) = list.first.clone() {
            let next = first.cond_next.load_full();
            list.first = next.clone();
            if next.is_none() {
                list.last = None;
            }
            first.cond_next.store(None);
            // A cancelled waiter declines the signal; pass it on
            if self.owner.transfer_for_signal(&first) {
                break;
            }
        }
        Ok(())
    }

    /// Move every waiter to the sync queue
    pub fn signal_all(&self) -> SyncResult<()> {
        self.require_held()?;
        let mut list = self.waiters.lock();
        let mut cursor = list.first.take();
        list.last = None;
        while let Some(node) = cursor {
            cursor = node.cond_next.load_full();
            node.cond_next.store(None);
            self.owner.transfer_for_signal(&node);
        }
        Ok(())
    }

    /// Wait until signalled; aborts on interrupt
    ///
    /// Atomically releases the full held state, blocks until a signal
    /// transfers this waiter (or an interrupt lands first), then
    /// reacquires the released state before returning.
    pub fn wait(&self) -> SyncResult<()> {
        let waiter = Waiter::current();
        if waiter.take_interrupt() {
            return Err(SyncError::Interrupted);
        }
        let node = self.add_condition_waiter();
        let saved = self.owner.fully_release(&node)?;
        let mut mode = InterruptMode::None;
        while !self.owner.is_on_sync_queue(&node) {
            waiter.park(None);
            mode = self.check_interrupt_while_waiting(&node);
            if mode != InterruptMode::None {
                break;
            }
        }
        if self.owner.acquire_queued(&node, saved)? && mode != InterruptMode::Abort {
            mode = InterruptMode::Reinterrupt;
        }
        if node.cond_next.load_full().is_some() {
            // Ended by cancel or timeout mid-list; tidy in place
            Self::unlink_cancelled_waiters(&mut self.waiters.lock());
        }
        self.report_interrupt(mode)
    }

    /// Wait until signalled, deferring interrupts to the caller
    pub fn wait_uninterruptibly(&self) -> SyncResult<()> {
        let waiter = Waiter::current();
        let node = self.add_condition_waiter();
        let saved = self.owner.fully_release(&node)?;
        let mut interrupted = false;
        while !self.owner.is_on_sync_queue(&node) {
            waiter.park(None);
            if waiter.take_interrupt() {
                interrupted = true;
            }
        }
        if self.owner.acquire_queued(&node, saved)? || interrupted {
            waiter.set_interrupted();
        }
        Ok(())
    }

    /// Wait with a timeout, reporting the time left
    ///
    /// Returns the signed nanoseconds remaining until the deadline at
    /// wakeup (negative if already past), so callers re-waiting in a
    /// loop can pass the value straight back in.
    pub fn wait_nanos(&self, timeout: Duration) -> SyncResult<i64> {
        let waiter = Waiter::current();
        if waiter.take_interrupt() {
            return Err(SyncError::Interrupted);
        }
        let deadline = Instant::now() + timeout;
        let node = self.add_condition_waiter();
        let saved = self.owner.fully_release(&node)?;
        let mut mode = InterruptMode::None;
        while !self.owner.is_on_sync_queue(&node) {
            let now = Instant::now();
            if now >= deadline {
                self.owner.transfer_after_cancelled_wait(&node);
                break;
            }
            if deadline - now > SPIN_FOR_TIMEOUT_THRESHOLD {
                waiter.park(Some(deadline));
            }
            mode = self.check_interrupt_while_waiting(&node);
            if mode != InterruptMode::None {
                break;
            }
        }
        if self.owner.acquire_queued(&node, saved)? && mode != InterruptMode::Abort {
            mode = InterruptMode::Reinterrupt;
        }
        if node.cond_next.load_full().is_some() {
            Self::unlink_cancelled_waiters(&mut self.waiters.lock());
        }
        self.report_interrupt(mode)?;
        Ok(remaining_nanos(deadline))
    }

    /// Wait with a timeout; `Ok(false)` if the deadline passed before a
    /// signal
    pub fn wait_timed(&self, timeout: Duration) -> SyncResult<bool> {
        self.wait_until(Instant::now() + timeout)
    }

    /// Wait until an absolute deadline; `Ok(false)` on expiry
    pub fn wait_until(&self, deadline: Instant) -> SyncResult<bool> {
        let waiter = Waiter::current();
        if waiter.take_interrupt() {
            return Err(SyncError::Interrupted);
        }
        let node = self.add_condition_waiter();
        let saved = self.owner.fully_release(&node)?;
        let mut timed_out = false;
        let mut mode = InterruptMode::None;
        while !self.owner.is_on_sync_queue(&node) {
            let now = Instant::now();
            if now >= deadline {
                // The transfer settles the race against a late signal:
                // true means the timeout won
                timed_out = self.owner.transfer_after_cancelled_wait(&node);
                break;
            }
            if deadline - now > SPIN_FOR_TIMEOUT_THRESHOLD {
                waiter.park(Some(deadline));
            }
            mode = self.check_interrupt_while_waiting(&node);
            if mode != InterruptMode::None {
                break;
            }
        }
        if self.owner.acquire_queued(&node, saved)? && mode != InterruptMode::Abort {
            mode = InterruptMode::Reinterrupt;
        }
        if node.cond_next.load_full().is_some() {
            Self::unlink_cancelled_waiters(&mut self.waiters.lock());
        }
        self.report_interrupt(mode)?;
        Ok(!timed_out)
    }

    /// Classify an interrupt observed after a park during a wait
    fn check_interrupt_while_waiting(&self, node: &Arc<WaitNode>) -> InterruptMode {
        if Waiter::current().take_interrupt() {
            if self.owner.transfer_after_cancelled_wait(node) {
                InterruptMode::Abort
            } else {
                InterruptMode::Reinterrupt
            }
        } else {
            InterruptMode::None
        }
    }

    fn report_interrupt(&self, mode: InterruptMode) -> SyncResult<()> {
        match mode {
            InterruptMode::None => Ok(()),
            InterruptMode::Abort => Err(SyncError::Interrupted),
            InterruptMode::Reinterrupt => {
                Waiter::current().set_interrupted();
                Ok(())
            }
        }
    }

    /// Whether any thread is waiting on this condition
    pub fn has_waiters(&self) -> SyncResult<bool> {
        self.require_held()?;
        let list = self.waiters.lock();
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            if node.status() == status::CONDITION {
                return Ok(true);
            }
            cursor = node.cond_next.load_full();
        }
        Ok(false)
    }

    /// Estimated number of threads waiting on this condition
    pub fn wait_queue_length(&self) -> SyncResult<usize> {
        self.require_held()?;
        let list = self.waiters.lock();
        let mut n = 0;
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            if node.status() == status::CONDITION {
                n += 1;
            }
            cursor = node.cond_next.load_full();
        }
        Ok(n)
    }
}

impl<P: SyncPolicy> QueuedSynchronizer<P> {
    /// Create a condition bound to this synchronizer
    ///
    /// Requires the policy to implement
    /// [`is_held_exclusively`](SyncPolicy::is_held_exclusively).
    pub fn new_condition(self: &Arc<Self>) -> Condition<P> {
        Condition::new(Arc::clone(self))
    }
}

/// Signed nanoseconds from now to `deadline`; negative when past
fn remaining_nanos(deadline: Instant) -> i64 {
    let now = Instant::now();
    if deadline >= now {
        (deadline - now).as_nanos().min(i64::MAX as u128) as i64
    } else {
        -((now - deadline).as_nanos().min(i64::MAX as u128) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncCore;
    use std::thread;

    struct TestMutex;

    impl SyncPolicy for TestMutex {
        fn try_acquire(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
            if core.state().compare_and_set(0, 1) {
                core.set_exclusive_owner();
                return Ok(true);
            }
            Ok(false)
        }

        fn try_release(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
            core.clear_exclusive_owner();
            core.state().set(0);
            Ok(true)
        }

        fn is_held_exclusively(&self, core: &SyncCore) -> SyncResult<bool> {
            Ok(core.owner_is_current())
        }
    }

    #[test]
    fn test_signal_requires_hold() {
        let sync = Arc::new(QueuedSynchronizer::new(TestMutex));
        let cond = sync.new_condition();
        assert_eq!(cond.signal(), Err(SyncError::NotHeldExclusively));
        assert_eq!(cond.has_waiters(), Err(SyncError::NotHeldExclusively));
    }

    #[test]
    fn test_wait_then_signal() {
        let sync = Arc::new(QueuedSynchronizer::new(TestMutex));
        let cond = Arc::new(sync.new_condition());

        let (s, c) = (sync.clone(), cond.clone());
        let handle = thread::spawn(move || {
            s.acquire(1).unwrap();
            c.wait().unwrap();
            // Lock is held again after the wait returns
            let held = s.is_held_exclusively().unwrap();
            s.release(1).unwrap();
            held
        });

        // Wait until the waiter has released the lock and is queued
        loop {
            sync.acquire(1).unwrap();
            let waiting = cond.has_waiters().unwrap();
            if waiting {
                cond.signal().unwrap();
                sync.release(1).unwrap();
                break;
            }
            sync.release(1).unwrap();
            thread::yield_now();
        }

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_timed_expires() {
        let sync = Arc::new(QueuedSynchronizer::new(TestMutex));
        let cond = sync.new_condition();

        sync.acquire(1).unwrap();
        let start = Instant::now();
        let signalled = cond.wait_timed(Duration::from_millis(50)).unwrap();
        assert!(!signalled);
        assert!(start.elapsed() >= Duration::from_millis(50));
        // Lock reacquired after the timeout
        assert!(sync.is_held_exclusively().unwrap());
        sync.release(1).unwrap();
    }

    #[test]
    fn test_wait_queue_length() {
        let sync = Arc::new(QueuedSynchronizer::new(TestMutex));
        let cond = Arc::new(sync.new_condition());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let (s, c) = (sync.clone(), cond.clone());
            handles.push(thread::spawn(move || {
                s.acquire(1).unwrap();
                c.wait().unwrap();
                s.release(1).unwrap();
            }));
        }

        loop {
            sync.acquire(1).unwrap();
            let n = cond.wait_queue_length().unwrap();
            if n == 3 {
                assert!(cond.has_waiters().unwrap());
                cond.signal_all().unwrap();
                sync.release(1).unwrap();
                break;
            }
            sync.release(1).unwrap();
            thread::yield_now();
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
