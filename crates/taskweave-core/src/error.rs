//! Error taxonomy for the scheduler core.
//!
//! The ordering engine is pure and never raises; errors originate in the goal
//! fulfillment orchestrator and the driver, which classify collaborator
//! failures into these variants instead of letting them escape the poll loop.

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, TaskweaveError>;

#[derive(Debug, Error)]
pub enum TaskweaveError {
    /// Malformed user configuration that could not be normalized in place.
    #[error("configuration error: {0}")]
    Config(String),

    /// The underlying session is not ready; treated as "not yet satisfied"
    /// by condition evaluation, surfaced only when an operation cannot proceed.
    #[error("world state unavailable: {0}")]
    StateUnavailable(String),

    /// The movement watchdog cancelled a travel operation that stopped
    /// making progress.
    #[error("travel to {target} stalled after {stalled_for_ms}ms without movement")]
    TravelStalled { target: String, stalled_for_ms: u64 },

    /// A relocation retry loop exhausted its per-call attempt cap.
    #[error("world hop to {world} failed after {attempts} attempts")]
    HopRetriesExhausted { world: i32, attempts: u32 },

    /// A mandatory goal requirement could not be fulfilled.
    #[error("mandatory requirement unmet: {0}")]
    MandatoryUnmet(String),

    /// The owning operation was cancelled from outside.
    #[error("operation cancelled")]
    Cancelled,

    /// Entry/condition persistence failure.
    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TaskweaveError {
    /// Timeout/stall and retry-cap failures are attempt failures, reported
    /// per-attempt rather than escalated as hard faults.
    pub fn is_attempt_failure(&self) -> bool {
        matches!(
            self,
            TaskweaveError::TravelStalled { .. } | TaskweaveError::HopRetriesExhausted { .. }
        )
    }
}
