/*!
 * FIFO Sync Queue
 *
 * The wait queue behind every blocking acquire: a variant of a CLH lock
 * queue with explicit successor links. The list always starts with a
 * lazily-installed dummy head; the node holding (or about to hold) the
 * synchronizer sits at head, and admission order is fixed at enqueue
 * time by the tail CAS.
 *
 * # Design
 *
 * - `prev` links are authoritative: they are valid the instant the tail
 *   CAS succeeds and are what cancellation and the backward scan rely
 *   on. `next` links are an optimization that may briefly lag or pass
 *   through a cancelled node; every reader of `next` falls back to a
 *   backward scan from tail when it looks wrong.
 * - A node's status speaks about its *successor* (SIGNAL), not itself,
 *   except for the terminal CANCELLED marker.
 */

use crate::node::{cas_link, same_node, status, Mode, NodeLink, WaitNode};
use crate::waiter::Waiter;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Head and tail of the wait queue
///
/// Both links are lazily initialized: the queue is entirely empty until
/// the first contended acquire installs the dummy head.
#[repr(C, align(64))]
pub struct SyncQueue {
    head: NodeLink,
    tail: NodeLink,
}

impl SyncQueue {
    pub(crate) fn new() -> Self {
        Self {
            head: ArcSwapOption::new(None),
            tail: ArcSwapOption::new(None),
        }
    }

    /// Current head node, if the queue was ever initialized
    #[inline]
    pub(crate) fn head(&self) -> Option<Arc<WaitNode>> {
        self.head.load_full()
    }

    /// Whether `node` is the current head
    #[inline]
    pub(crate) fn is_head(&self, node: &Arc<WaitNode>) -> bool {
        self.head
            .load_full()
            .map_or(false, |h| Arc::ptr_eq(&h, node))
    }

    /// Whether `node` is the current tail
    #[inline]
    pub(crate) fn is_tail(&self, node: &Arc<WaitNode>) -> bool {
        self.tail
            .load_full()
            .map_or(false, |t| Arc::ptr_eq(&t, node))
    }

    /// Insert `node` at the tail, initializing the queue if necessary
    ///
    /// Returns the node's predecessor.
    pub(crate) fn enqueue(&self, node: Arc<WaitNode>) -> Arc<WaitNode> {
        loop {
            match self.tail.load_full() {
                None => {
                    // Install the dummy head; the loser of this race
                    // retries against the now-initialized queue
                    let dummy = Arc::new(WaitNode::dummy());
                    if cas_link(&self.head, &None, Some(dummy.clone())) {
                        self.tail.store(Some(dummy));
                    }
                }
                Some(t) => {
                    node.prev.store(Some(t.clone()));
                    if cas_link(&self.tail, &Some(t.clone()), Some(node.clone())) {
                        t.next.store(Some(node));
                        return t;
                    }
                }
            }
        }
    }

    /// Create and enqueue a node for the current thread
    pub(crate) fn add_waiter(&self, mode: Mode) -> Arc<WaitNode> {
        let node = Arc::new(WaitNode::new(mode, Waiter::current()));
        // Fast path: one CAS against a known tail before the full loop
        if let Some(t) = self.tail.load_full() {
            node.prev.store(Some(t.clone()));
            if cas_link(&self.tail, &Some(t.clone()), Some(node.clone())) {
                t.next.store(Some(node.clone()));
                return node;
            }
        }
        self.enqueue(node.clone());
        node
    }

    /// Promote `node` to head after it acquired
    ///
    /// Only ever called by the thread that owns `node`, so plain stores
    /// suffice. Dropping `prev` here breaks the strong-link cycle with
    /// the outgoing head.
    pub(crate) fn set_head(&self, node: &Arc<WaitNode>) {
        self.head.store(Some(node.clone()));
        node.clear_waiter();
        node.prev.store(None);
    }

    /// Wake the effective successor of `node`, skipping cancelled ones
    pub(crate) fn unpark_successor(&self, node: &Arc<WaitNode>) {
        // Clear a pending signal; failure is fine, the waiter is being
        // woken anyway
        let ws = node.status();
        if ws < 0 {
            node.cas_status(ws, 0);
        }

        // The successor to wake is normally just `next`, but if it is
        // missing or cancelled the real one is found by scanning back
        // from tail: `prev` links are never broken while a node is
        // queued, `next` links can be
        let mut successor = node.next.load_full();
        if successor.as_ref().map_or(true, |s| s.status() > 0) {
            successor = None;
            let mut cursor = self.tail.load_full();
            while let Some(c) = cursor {
                if Arc::ptr_eq(&c, node) {
                    break;
                }
                if c.status() <= 0 {
                    successor = Some(c.clone());
                }
                cursor = c.prev.load_full();
            }
        }
        if let Some(s) = successor {
            s.unpark_waiter();
        }
    }

    /// Decide whether a node that just failed to acquire should park
    ///
    /// Returns `true` only once the predecessor is committed to
    /// signalling us. On the other outcomes the caller retries the
    /// acquire, which keeps barging cheap and bounds the CAS retries.
    pub(crate) fn should_park_after_failed_acquire(
        pred: &Arc<WaitNode>,
        node: &Arc<WaitNode>,
    ) -> bool {
        let ws = pred.status();
        if ws == status::SIGNAL {
            return true;
        }
        if ws > 0 {
            // Splice out cancelled predecessors; their nodes become
            // unreachable and get reclaimed
            let mut p = pred.clone();
            loop {
                let Some(pp) = p.prev.load_full() else {
                    break;
                };
                p = pp;
                node.prev.store(Some(p.clone()));
                if p.status() <= 0 {
                    break;
                }
            }
            p.next.store(Some(node.clone()));
        } else {
            // 0 or PROPAGATE: request a signal, but retry the acquire
            // once before parking in case it is granted meanwhile
            pred.cas_status(ws, status::SIGNAL);
        }
        false
    }

    /// Abandon an in-progress acquire for `node`
    pub(crate) fn cancel_acquire(&self, node: &Arc<WaitNode>) {
        node.clear_waiter();

        // Skip over any cancelled predecessors
        let mut pred = match node.prev.load_full() {
            Some(p) => p,
            None => return, // never fully enqueued
        };
        while pred.status() > 0 {
            let Some(pp) = pred.prev.load_full() else {
                break;
            };
            pred = pp;
            node.prev.store(Some(pred.clone()));
        }
        // Snapshot for the unsplice CASes below; if it is stale they
        // fail harmlessly against a concurrent cancel or signal
        let pred_next = pred.next.load_full();

        // After this store other threads skip this node
        node.set_status(status::CANCELLED);
        log::trace!("cancelling queued acquire");

        if self.is_tail(node) && cas_link(&self.tail, &Some(node.clone()), Some(pred.clone())) {
            cas_link(&pred.next, &pred_next, None);
            return;
        }

        // Interior node: hand the signalling duty to the predecessor
        // if it can take it, otherwise wake the successor to let it
        // fix the links itself
        let ws = pred.status();
        if !self.is_head(&pred)
            && (ws == status::SIGNAL || (ws <= 0 && pred.cas_status(ws, status::SIGNAL)))
            && pred.waiter.load_full().is_some()
        {
            if let Some(next) = node.next.load_full() {
                if next.status() <= 0 {
                    cas_link(&pred.next, &pred_next, Some(next));
                }
            }
        } else {
            self.unpark_successor(node);
        }
        // Unlike the forward links, `node.next` is left alone: the node
        // is unreachable from the queue once the stores above land
    }

    /// Whether a node that started on a condition queue has been
    /// transferred to the sync queue
    pub(crate) fn is_on_sync_queue(&self, node: &Arc<WaitNode>) -> bool {
        if node.status() == status::CONDITION || node.prev.load_full().is_none() {
            return false;
        }
        if node.next.load_full().is_some() {
            // A successor implies the tail CAS completed
            return true;
        }
        // prev is set pre-CAS, so the node may not be queued yet; the
        // tail is the most likely place to find it
        self.find_node_from_tail(node)
    }

    fn find_node_from_tail(&self, node: &Arc<WaitNode>) -> bool {
        let mut cursor = self.tail.load_full();
        while let Some(c) = cursor {
            if Arc::ptr_eq(&c, node) {
                return true;
            }
            cursor = c.prev.load_full();
        }
        false
    }

    /// Whether any thread is currently queued waiting to acquire
    ///
    /// A momentary answer: it can be stale by the time the caller acts
    /// on it.
    pub fn has_queued_waiters(&self) -> bool {
        !same_node(&self.head.load_full(), &self.tail.load_full())
    }

    /// Whether any acquire has ever contended (queue was initialized)
    pub fn has_contended(&self) -> bool {
        self.head.load_full().is_some()
    }

    /// Estimated number of threads waiting to acquire
    ///
    /// Traverses backwards from tail; counts only nodes with a live
    /// waiter.
    pub fn queue_length(&self) -> usize {
        let mut n = 0;
        let mut cursor = self.tail.load_full();
        while let Some(c) = cursor {
            if c.waiter.load_full().is_some() {
                n += 1;
            }
            cursor = c.prev.load_full();
        }
        n
    }

    /// Whether the given waiter is on the sync queue
    pub fn is_queued(&self, waiter: &Arc<Waiter>) -> bool {
        let mut cursor = self.tail.load_full();
        while let Some(c) = cursor {
            if c.waiter_is(waiter) {
                return true;
            }
            cursor = c.prev.load_full();
        }
        false
    }

    /// Whether any thread has been waiting longer than the caller
    ///
    /// The fairness hook: a policy that consults this before acquiring
    /// never barges in front of an established waiter. Reads tail
    /// before head so that an in-between initialization shows up as a
    /// non-empty queue, never as an empty one.
    pub fn has_queued_predecessors(&self) -> bool {
        let t = self.tail.load_full();
        let h = self.head.load_full();
        if same_node(&h, &t) {
            return false;
        }
        let Some(h) = h else {
            return false;
        };
        match h.next.load_full() {
            // Successor link mid-update: someone is ahead, just not yet
            // reachable through `next`
            None => true,
            Some(s) => !s.waiter_is(&Waiter::current()),
        }
    }
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("contended", &self.has_contended())
            .field("length", &self.queue_length())
            .finish()
    }
}
