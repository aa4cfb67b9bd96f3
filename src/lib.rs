/*!
 * Queued Sync
 *
 * A framework for building blocking synchronizers (mutexes, semaphores,
 * latches, read-write locks) around a single atomic state word and a
 * FIFO wait queue. A concrete synchronizer supplies only the state
 * transitions through a [`SyncPolicy`]; queueing, parking, timeouts,
 * interrupts, cancellation and condition queues come from the engine.
 *
 * # Design
 *
 * - One `i64` state word, interpreted solely by the policy
 * - Wait queue derived from a CLH lock queue, with explicit successor
 *   links and a lazily installed dummy head
 * - Barging acquires by default; policies opt into fairness via
 *   [`SyncCore::has_queued_predecessors`]
 * - Exclusive and shared modes, with propagating shared wakeups
 * - Monitor-style [`Condition`] queues with signal transfer
 *
 * # Example
 *
 * ```
 * use queued_sync::{QueuedSynchronizer, SyncCore, SyncPolicy, SyncResult};
 *
 * /// A non-reentrant mutex: state 0 = free, 1 = held.
 * struct Mutex;
 *
 * impl SyncPolicy for Mutex {
 *     fn try_acquire(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
 *         Ok(core.state().compare_and_set(0, 1))
 *     }
 *     fn try_release(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
 *         core.state().set(0);
 *         Ok(true)
 *     }
 * }
 *
 * let lock = QueuedSynchronizer::new(Mutex);
 * lock.acquire(1)?;
 * lock.release(1)?;
 * # Ok::<(), queued_sync::SyncError>(())
 * ```
 */

pub mod condition;
pub mod engine;
pub mod errors;
mod node;
pub mod queue;
pub mod state;
pub mod waiter;

// Re-exports
pub use condition::Condition;
pub use engine::{QueuedSynchronizer, SyncCore, SyncPolicy};
pub use errors::{SyncError, SyncResult};
pub use state::SyncState;
pub use waiter::Waiter;
