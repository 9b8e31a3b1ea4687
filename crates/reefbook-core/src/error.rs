//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input, rejected before touching state.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record that was looked up.
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Illegal state transition, exhausted capacity, or duplicate action.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Optimistic concurrency conflict on a conditional update.
    #[error("stale revision on {entity} {id}: expected {expected}")]
    RevisionConflict {
        /// The kind of record that was updated.
        entity: &'static str,
        /// The record that had the conflict.
        id: Uuid,
        /// The revision the caller observed before writing.
        expected: i64,
    },

    /// The actor may not perform this action. The reason is for logs only
    /// and must not be surfaced to the caller.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Internal diagnostic, never sent to clients.
        reason: String,
    },

    /// An upstream dependency did not answer in time. Retryable.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// True when the failure is transient and the caller may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::UpstreamTimeout(_) | DomainError::RevisionConflict { .. }
        )
    }
}
