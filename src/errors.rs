/*!
 * Error Types
 * Centralized error handling with thiserror
 */

use thiserror::Error;

/// Result type for synchronizer operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Synchronizer operation errors
///
/// Timeouts are deliberately *not* represented here: timed operations
/// report expiry through their return value (`Ok(false)` or a remaining
/// duration), so a timeout can never be confused with an interrupt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The synchronizer policy does not define this mode of operation
    #[error("operation not supported by this synchronizer")]
    Unsupported,

    /// An interruptible wait was interrupted before it completed
    #[error("wait was interrupted")]
    Interrupted,

    /// The caller does not hold the synchronizer exclusively
    #[error("synchronizer is not held exclusively by the current thread")]
    NotHeldExclusively,

    /// A policy precondition was violated (e.g. release without holding)
    #[error("illegal synchronizer state: {0}")]
    IllegalState(&'static str),
}
