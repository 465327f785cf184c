//! The error module contains the [ChallengerError] kinds that callers branch on.

use op_challenger_solvers::zk::L1Head;

/// Errors with a distinguished meaning for the game loop. Everything else travels as a plain
/// [anyhow::Error] and is logged and retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum ChallengerError {
    /// The local rollup node has not yet processed the L1 head the game is anchored to.
    #[error("Local node has not processed L1 head #{} ({:?}), current L1 is #{}", .l1_head.number, .l1_head.hash, .current_l1)]
    NotInSync {
        /// The L1 head of the game.
        l1_head: L1Head,
        /// The current L1 block of the rollup node.
        current_l1: u64,
    },
    /// The operation was aborted by its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
    /// A configuration value that cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChallengerError {
    /// Returns whether `err` is, or wraps, [ChallengerError::NotInSync].
    pub fn is_not_in_sync(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ChallengerError>(),
            Some(ChallengerError::NotInSync { .. })
        )
    }

    /// Returns whether `err` is, or wraps, [ChallengerError::Cancelled].
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ChallengerError>(),
            Some(ChallengerError::Cancelled)
        )
    }
}
