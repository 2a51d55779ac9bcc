//! Engine error taxonomy.
//!
//! Defined in `examflow-core` so the sweep engine and request handlers can
//! classify failures (expected race outcomes vs real faults) without string
//! matching.

use thiserror::Error;

/// Errors produced by the lifecycle engine and its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced exam, submission, or student does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional-update precondition no longer held. This is the
    /// expected, non-fatal outcome of the auto-submit race and is never
    /// logged at error level.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A malformed request (missing or invalid required fields).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Notifier dispatch failed. Always logged by the caller, never
    /// propagated out of a state-changing operation.
    #[error("notification failed: {0}")]
    Notification(String),

    /// The store itself is unreachable or failed. Aborts the current sweep;
    /// retried on the next tick.
    #[error("store failure: {0}")]
    Store(String),
}

impl EngineError {
    /// True for the expected loser-of-the-race outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }

    /// True when the failure is infrastructural and the whole sweep should
    /// stop and retry on the next tick instead of continuing item by item.
    pub fn aborts_sweep(&self) -> bool {
        matches!(self, EngineError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        assert!(EngineError::Conflict("already submitted".into()).is_conflict());
        assert!(!EngineError::NotFound("exam".into()).is_conflict());
    }

    #[test]
    fn only_store_failures_abort_a_sweep() {
        assert!(EngineError::Store("connection reset".into()).aborts_sweep());
        assert!(!EngineError::Conflict("raced".into()).aborts_sweep());
        assert!(!EngineError::Notification("smtp down".into()).aborts_sweep());
    }
}
