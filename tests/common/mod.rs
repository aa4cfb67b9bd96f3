/*!
 * Shared test policies
 *
 * Small synchronizers built on the framework, mirroring the classic
 * shapes: a plain mutex, a reentrant mutex, a counting semaphore, a
 * one-shot latch, and a fair mutex that never barges.
 */

#![allow(dead_code)] // each test binary uses a subset

use queued_sync::{SyncCore, SyncError, SyncPolicy, SyncResult};

/// Non-reentrant mutex: state 0 = free, 1 = held
pub struct MutexPolicy;

impl SyncPolicy for MutexPolicy {
    fn try_acquire(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        if core.state().compare_and_set(0, 1) {
            core.set_exclusive_owner();
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        if core.state().get() != 1 {
            return Err(SyncError::IllegalState("release of unheld mutex"));
        }
        core.clear_exclusive_owner();
        core.state().set(0);
        Ok(true)
    }

    fn is_held_exclusively(&self, core: &SyncCore) -> SyncResult<bool> {
        Ok(core.owner_is_current())
    }
}

/// Reentrant mutex: state counts nested holds by the owner
pub struct ReentrantPolicy;

impl SyncPolicy for ReentrantPolicy {
    fn try_acquire(&self, core: &SyncCore, arg: i64) -> SyncResult<bool> {
        let c = core.state().get();
        if c == 0 {
            if core.state().compare_and_set(0, arg) {
                core.set_exclusive_owner();
                return Ok(true);
            }
        } else if core.owner_is_current() {
            // Nested acquire by the owner: plain add, no race possible
            core.state().set(c + arg);
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, core: &SyncCore, arg: i64) -> SyncResult<bool> {
        if !core.owner_is_current() {
            return Err(SyncError::IllegalState("release by non-owner"));
        }
        let c = core.state().get() - arg;
        if c == 0 {
            core.clear_exclusive_owner();
            core.state().set(0);
            return Ok(true);
        }
        core.state().set(c);
        Ok(false)
    }

    fn is_held_exclusively(&self, core: &SyncCore) -> SyncResult<bool> {
        Ok(core.owner_is_current())
    }
}

/// Counting semaphore: state holds the available permits
pub struct SemaphorePolicy;

impl SyncPolicy for SemaphorePolicy {
    fn try_acquire_shared(&self, core: &SyncCore, arg: i64) -> SyncResult<i64> {
        loop {
            let available = core.state().get();
            let remaining = available - arg;
            if remaining < 0 || core.state().compare_and_set(available, remaining) {
                return Ok(remaining);
            }
        }
    }

    fn try_release_shared(&self, core: &SyncCore, arg: i64) -> SyncResult<bool> {
        loop {
            let current = core.state().get();
            if core.state().compare_and_set(current, current + arg) {
                return Ok(true);
            }
        }
    }
}

/// One-shot countdown latch: open once state reaches zero
pub struct LatchPolicy;

impl SyncPolicy for LatchPolicy {
    fn try_acquire_shared(&self, core: &SyncCore, _arg: i64) -> SyncResult<i64> {
        Ok(if core.state().get() == 0 { 1 } else { -1 })
    }

    fn try_release_shared(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        loop {
            let c = core.state().get();
            if c == 0 {
                return Ok(false);
            }
            let next = c - 1;
            if core.state().compare_and_set(c, next) {
                return Ok(next == 0);
            }
        }
    }
}

/// Fair mutex: fails its attempt whenever an earlier waiter is queued
pub struct FairMutexPolicy;

impl SyncPolicy for FairMutexPolicy {
    fn try_acquire(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        if core.has_queued_predecessors() {
            return Ok(false);
        }
        if core.state().compare_and_set(0, 1) {
            core.set_exclusive_owner();
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        if core.state().get() != 1 {
            return Err(SyncError::IllegalState("release of unheld mutex"));
        }
        core.clear_exclusive_owner();
        core.state().set(0);
        Ok(true)
    }

    fn is_held_exclusively(&self, core: &SyncCore) -> SyncResult<bool> {
        Ok(core.owner_is_current())
    }
}
