/*!
 * Wait Nodes
 *
 * Queue entries for blocked callers. Links are atomic reference-counted
 * handles (arc-swap) rather than raw pointers: an interior node can
 * still be unlinked without blocking unrelated threads, and reclamation
 * falls out of the reference counts once a node is unlinked everywhere.
 *
 * The `next` link may legitimately lag behind `prev` during an enqueue
 * race; nothing here ever trusts `next` alone. Cycle-breaking mirrors
 * the promotion/cancellation protocol: a promoted node drops its `prev`
 * and the old head drops its `next`, so adjacent strong links never
 * outlive the pair's time in the queue.
 */

use crate::waiter::Waiter;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Node status values
///
/// Same encoding as the status state machine in the queue protocol:
/// negative values mean "not cancelled", so sign checks suffice in the
/// hot paths.
pub(crate) mod status {
    /// Node is cancelled due to timeout or interrupt (terminal)
    pub const CANCELLED: i32 = 1;
    /// Successor's thread needs unparking on release
    pub const SIGNAL: i32 = -1;
    /// Node is waiting on a condition queue
    pub const CONDITION: i32 = -2;
    /// Next shared acquire should propagate unconditionally
    pub const PROPAGATE: i32 = -3;
}

/// Acquisition mode recorded in each node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Exclusive,
    Shared,
}

/// Atomically swappable link between nodes
pub(crate) type NodeLink = ArcSwapOption<WaitNode>;

/// A single entry in the sync queue or a condition queue
pub(crate) struct WaitNode {
    /// Status word; mutated by CAS except for the documented
    /// single-writer transitions (promotion clear, post-hoc cancel)
    status: AtomicI32,
    /// Predecessor link: used for cancellation skip-over and backward
    /// scans, never for ownership decisions
    pub(crate) prev: NodeLink,
    /// Successor link: used to find whom to wake; may lag behind `prev`
    pub(crate) next: NodeLink,
    /// Handle to park/unpark; cleared at promotion or cancellation
    pub(crate) waiter: ArcSwapOption<Waiter>,
    /// Exclusive vs shared, fixed at construction
    mode: Mode,
    /// Link to the next condition waiter while on a condition queue
    pub(crate) cond_next: NodeLink,
}

impl WaitNode {
    /// Node for a caller entering the sync queue
    pub(crate) fn new(mode: Mode, waiter: Arc<Waiter>) -> Self {
        Self {
            status: AtomicI32::new(0),
            prev: ArcSwapOption::new(None),
            next: ArcSwapOption::new(None),
            waiter: ArcSwapOption::new(Some(waiter)),
            mode,
            cond_next: ArcSwapOption::new(None),
        }
    }

    /// Dummy head node: never holds a live waiter, never CANCELLED
    pub(crate) fn dummy() -> Self {
        Self {
            status: AtomicI32::new(0),
            prev: ArcSwapOption::new(None),
            next: ArcSwapOption::new(None),
            waiter: ArcSwapOption::new(None),
            mode: Mode::Exclusive,
            cond_next: ArcSwapOption::new(None),
        }
    }

    /// Node for a caller entering a condition queue
    ///
    /// Condition waiters reacquire exclusively after transfer.
    pub(crate) fn for_condition(waiter: Arc<Waiter>) -> Self {
        Self {
            status: AtomicI32::new(status::CONDITION),
            prev: ArcSwapOption::new(None),
            next: ArcSwapOption::new(None),
            waiter: ArcSwapOption::new(Some(waiter)),
            mode: Mode::Exclusive,
            cond_next: ArcSwapOption::new(None),
        }
    }

    #[inline(always)]
    pub(crate) fn status(&self) -> i32 {
        self.status.load(Ordering::SeqCst)
    }

    /// Unconditional status store
    ///
    /// Only valid where a single writer is guaranteed (post-hoc cancel,
    /// fully-release failure).
    #[inline(always)]
    pub(crate) fn set_status(&self, value: i32) {
        self.status.store(value, Ordering::SeqCst);
    }

    #[inline(always)]
    pub(crate) fn cas_status(&self, expected: i32, new: i32) -> bool {
        self.status
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn is_shared(&self) -> bool {
        self.mode == Mode::Shared
    }

    /// Drop the waiter handle (promotion or cancellation)
    #[inline]
    pub(crate) fn clear_waiter(&self) {
        self.waiter.store(None);
    }

    /// Wake this node's waiter if it still has one
    #[inline]
    pub(crate) fn unpark_waiter(&self) {
        if let Some(waiter) = self.waiter.load_full() {
            waiter.unpark();
        }
    }

    /// Whether this node's waiter is the given handle
    #[inline]
    pub(crate) fn waiter_is(&self, waiter: &Arc<Waiter>) -> bool {
        match self.waiter.load_full() {
            Some(w) => Arc::ptr_eq(&w, waiter),
            None => false,
        }
    }
}

/// Raw pointer of an optional node handle, for CAS identity comparison
#[inline(always)]
pub(crate) fn link_ptr(link: &Option<Arc<WaitNode>>) -> *const WaitNode {
    link.as_ref().map_or(std::ptr::null(), Arc::as_ptr)
}

/// Whether two optional handles refer to the same node (or both none)
#[inline(always)]
pub(crate) fn same_node(a: &Option<Arc<WaitNode>>, b: &Option<Arc<WaitNode>>) -> bool {
    link_ptr(a) == link_ptr(b)
}

/// CAS a link from `expected` to `new`, comparing by node identity
///
/// Returns `false` with no side effect if the link no longer holds
/// `expected`.
pub(crate) fn cas_link(
    link: &NodeLink,
    expected: &Option<Arc<WaitNode>>,
    new: Option<Arc<WaitNode>>,
) -> bool {
    let previous = link.compare_and_swap(expected, new);
    link_ptr(&previous) == link_ptr(expected)
}
