//! Submission state machine and auto-submit arbitration.
//!
//! An in-progress attempt terminates through exactly one of three doors:
//! manual submit, time-expiry auto-submit, or violation-threshold
//! auto-submit. All three doors go through the same conditional transition at
//! the store, gated on `status == Started`. Whichever caller's update lands
//! first wins; every other caller observes `applied == false` and performs no
//! side effects. No in-process lock is involved — callers may run in
//! different scheduler ticks, request handlers, or processes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{ExamStatus, Submission, SubmissionStatus};
use crate::traits::{Store, SubmissionTransition};

/// Drives attempt creation and termination through the store's CAS primitive.
#[derive(Clone)]
pub struct SubmissionLifecycle {
    store: Arc<dyn Store>,
}

impl SubmissionLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Begin an attempt at an active exam.
    ///
    /// The store's uniqueness constraint on (exam, student) rejects a second
    /// attempt with `Conflict`.
    pub async fn start_attempt(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Submission, EngineError> {
        let exam = self
            .store
            .exam(exam_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("exam {exam_id}")))?;
        if exam.status != ExamStatus::Active {
            return Err(EngineError::Conflict(format!(
                "exam {exam_id} is {}, attempts require an active exam",
                exam.status
            )));
        }
        let submission = Submission::begin(exam_id, student_id, now);
        self.store.insert_submission(&submission).await?;
        tracing::info!(
            submission_id = %submission.id,
            exam_id = %exam_id,
            student_id = %student_id,
            "attempt started"
        );
        Ok(submission)
    }

    /// Manual submission by the student.
    ///
    /// Uses the identical conditional primitive as `auto_submit`, so a manual
    /// submit and an in-flight auto-submit cannot both succeed. Returns
    /// whether this call won the transition.
    pub async fn submit(
        &self,
        submission_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let submission = self.fetch(submission_id).await?;
        let applied = self
            .store
            .apply_submission_transition(
                submission_id,
                SubmissionTransition::Submit {
                    submitted_at: now,
                    time_spent_secs: time_spent(&submission, now),
                },
            )
            .await?;
        if applied {
            tracing::info!(submission_id = %submission_id, "attempt submitted");
        }
        Ok(applied)
    }

    /// System-triggered termination, used by both the time-expiry sweep and
    /// the violation tracker.
    ///
    /// Performs one atomic conditional transition: status = AutoSubmitted,
    /// submitted_at = now, submission_type = Auto, flagged and flag_reason
    /// from `reason`, time_spent from `started_at` capped at the exam's
    /// end time, WHERE status == Started.
    /// When the precondition no longer holds — another caller already
    /// terminated the attempt — this returns `false` with zero side effects.
    /// This is the only exactly-once-termination mechanism in the system.
    pub async fn auto_submit(
        &self,
        submission_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, EngineError> {
        let submission = self.fetch(submission_id).await?;
        if submission.status != SubmissionStatus::Started {
            // Already terminal; skip the write entirely.
            return Ok(false);
        }
        // The sweep may fire after the window closed; credit time only up to
        // end_time, not the sweep's own lateness.
        let credited_until = match self.store.exam(submission.exam_id).await? {
            Some(exam) => now.min(exam.end_time),
            None => now,
        };
        let applied = self
            .store
            .apply_submission_transition(
                submission_id,
                SubmissionTransition::AutoSubmit {
                    submitted_at: now,
                    time_spent_secs: time_spent(&submission, credited_until),
                    flag_reason: reason.to_string(),
                },
            )
            .await?;
        if applied {
            tracing::info!(submission_id = %submission_id, reason, "attempt auto-submitted");
        } else {
            // Expected race outcome, not an error.
            tracing::debug!(submission_id = %submission_id, "auto-submit lost the race");
        }
        Ok(applied)
    }

    async fn fetch(&self, submission_id: Uuid) -> Result<Submission, EngineError> {
        self.store
            .submission(submission_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("submission {submission_id}")))
    }
}

/// Seconds between the start of the attempt and `now`, clamped at zero for
/// clock skew.
fn time_spent(submission: &Submission, now: DateTime<Utc>) -> i64 {
    (now - submission.started_at).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_spent_is_elapsed_seconds() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let sub = Submission::begin(Uuid::new_v4(), Uuid::new_v4(), started);
        assert_eq!(
            time_spent(&sub, started + chrono::Duration::minutes(60)),
            3600
        );
    }

    #[test]
    fn time_spent_clamps_clock_skew() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let sub = Submission::begin(Uuid::new_v4(), Uuid::new_v4(), started);
        assert_eq!(time_spent(&sub, started - chrono::Duration::seconds(5)), 0);
    }
}
