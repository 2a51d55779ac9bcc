//! Violation tracker.
//!
//! Records integrity-violation events against an in-progress attempt and
//! terminates the attempt once the configured threshold is crossed. The
//! termination goes through [`SubmissionLifecycle::auto_submit`], racing
//! against the time-expiry sweep; losing that race is a quiet non-event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{SubmissionStatus, Violation, ViolationType};
use crate::submission::SubmissionLifecycle;
use crate::traits::Store;

/// An incoming violation report from an exam client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Student the event was detected for.
    pub student_id: Uuid,
    /// Exam being attempted.
    pub exam_id: Uuid,
    /// Attempt the event was reported against.
    pub submission_id: Uuid,
    /// Detected event type.
    pub violation_type: ViolationType,
}

/// Result of recording a violation.
///
/// Whether the recording happened to trigger an auto-submit is a separate
/// boolean, never an error: the caller's report succeeded either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// The appended violation record.
    pub violation: Violation,
    /// True when this recording crossed the threshold and won the
    /// auto-submit race.
    pub auto_submitted: bool,
}

/// Records violations and enforces the termination threshold.
#[derive(Clone)]
pub struct ViolationTracker {
    store: Arc<dyn Store>,
    submissions: SubmissionLifecycle,
    threshold: u64,
}

impl ViolationTracker {
    pub fn new(store: Arc<dyn Store>, submissions: SubmissionLifecycle, threshold: u64) -> Self {
        Self {
            store,
            submissions,
            threshold,
        }
    }

    /// Record one violation event.
    ///
    /// The event is appended whenever the referenced submission exists and
    /// belongs to the reported (exam, student) pair — including after the
    /// attempt went terminal, so late-arriving client events stay auditable.
    /// The threshold trigger only fires while the attempt is still Started.
    pub async fn record(
        &self,
        report: &ViolationReport,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, EngineError> {
        validate(report)?;

        let submission = self
            .store
            .submission(report.submission_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("submission {}", report.submission_id))
            })?;
        if submission.exam_id != report.exam_id || submission.student_id != report.student_id {
            return Err(EngineError::Conflict(format!(
                "submission {} does not belong to exam {} / student {}",
                report.submission_id, report.exam_id, report.student_id
            )));
        }

        let mut violation = Violation {
            id: Uuid::new_v4(),
            student_id: report.student_id,
            exam_id: report.exam_id,
            submission_id: report.submission_id,
            violation_type: report.violation_type,
            timestamp: now,
            auto_submit_triggered: false,
        };
        self.store.append_violation(&violation).await?;
        tracing::info!(
            submission_id = %report.submission_id,
            violation_type = %report.violation_type,
            severity = %report.violation_type.severity(),
            "violation recorded"
        );

        let count = self.store.count_violations(report.submission_id).await?;
        let mut auto_submitted = false;
        if count >= self.threshold && submission.status == SubmissionStatus::Started {
            let reason = format!("auto-submitted: {count} integrity violations");
            auto_submitted = self
                .submissions
                .auto_submit(report.submission_id, now, &reason)
                .await?;
            if auto_submitted {
                // Mark the record that caused the termination. At most one
                // violation per submission ever carries this flag, because
                // auto_submit applies at most once.
                self.store.mark_violation_triggered(violation.id).await?;
                violation.auto_submit_triggered = true;
                tracing::warn!(
                    submission_id = %report.submission_id,
                    count,
                    "violation threshold crossed, attempt terminated"
                );
            }
        }

        Ok(RecordOutcome {
            violation,
            auto_submitted,
        })
    }
}

fn validate(report: &ViolationReport) -> Result<(), EngineError> {
    if report.student_id.is_nil() {
        return Err(EngineError::Validation("student_id is required".into()));
    }
    if report.exam_id.is_nil() {
        return Err(EngineError::Validation("exam_id is required".into()));
    }
    if report.submission_id.is_nil() {
        return Err(EngineError::Validation("submission_id is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ViolationReport {
        ViolationReport {
            student_id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            submission_id: Uuid::new_v4(),
            violation_type: ViolationType::TabHidden,
        }
    }

    #[test]
    fn validate_accepts_complete_report() {
        assert!(validate(&report()).is_ok());
    }

    #[test]
    fn validate_rejects_nil_ids() {
        let mut r = report();
        r.student_id = Uuid::nil();
        assert!(matches!(
            validate(&r).unwrap_err(),
            EngineError::Validation(_)
        ));

        let mut r = report();
        r.submission_id = Uuid::nil();
        assert!(matches!(
            validate(&r).unwrap_err(),
            EngineError::Validation(_)
        ));
    }
}
