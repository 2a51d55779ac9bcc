//! Core trait definitions for the persistence store and the notifier.
//!
//! These async traits are the engine's only seams to the outside world. The
//! `examflow-store` crate provides the in-memory implementations; a deployment
//! backs them with a real database and mail gateway.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{Exam, Student, Submission, Violation};

// ---------------------------------------------------------------------------
// Conditional transitions
// ---------------------------------------------------------------------------

/// A conditional exam mutation. Each variant carries its own precondition;
/// the store must check the precondition and apply the effect atomically and
/// report whether it landed.
///
/// This closed set is the only way exam records change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamTransition {
    /// WHERE status == Pending: set status = Active.
    Activate,
    /// WHERE status == Active: set status = Completed.
    Complete,
    /// WHERE reminder_sent == false: set reminder_sent = true.
    MarkReminderSent,
    /// WHERE end_warning_sent == false: set end_warning_sent = true.
    MarkEndWarningSent,
}

/// A conditional submission mutation. Both variants share the same
/// precondition, status == Started, which is what guarantees that exactly one
/// of a racing manual submit and auto-submit can win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionTransition {
    /// WHERE status == Started: set status = Submitted, submitted_at,
    /// time_spent_secs. Submission type stays Manual.
    Submit {
        submitted_at: DateTime<Utc>,
        time_spent_secs: i64,
    },
    /// WHERE status == Started: set status = AutoSubmitted, submitted_at,
    /// time_spent_secs, submission_type = Auto, flagged = !flag_reason.is_empty(),
    /// flag_reason.
    AutoSubmit {
        submitted_at: DateTime<Utc>,
        time_spent_secs: i64,
        flag_reason: String,
    },
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Persistence contract the engine requires.
///
/// The two `apply_*_transition` methods are the system's sole
/// concurrency-correctness mechanism: a compare-and-set that returns whether
/// the precondition held and the write landed. `Ok(false)` is the expected
/// loser-of-a-race outcome, not an error. No in-process locking supplements
/// this contract; callers may live in different processes entirely.
#[async_trait]
pub trait Store: Send + Sync {
    // --- fetch ---

    async fn exam(&self, id: Uuid) -> Result<Option<Exam>, EngineError>;

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, EngineError>;

    async fn submission_for(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Submission>, EngineError>;

    // --- inserts ---

    /// Insert a new exam record (used by seeding and plan loading).
    async fn insert_exam(&self, exam: &Exam) -> Result<(), EngineError>;

    /// Insert a new attempt. Fails with `Conflict` when a submission already
    /// exists for the (exam, student) pair.
    async fn insert_submission(&self, submission: &Submission) -> Result<(), EngineError>;

    /// Append to the violation log.
    async fn append_violation(&self, violation: &Violation) -> Result<(), EngineError>;

    /// Flip `auto_submit_triggered` on one violation record. The single
    /// permitted mutation of the append-only log.
    async fn mark_violation_triggered(&self, violation_id: Uuid) -> Result<(), EngineError>;

    /// Count all violations recorded against a submission.
    async fn count_violations(&self, submission_id: Uuid) -> Result<u64, EngineError>;

    // --- conditional updates ---

    /// Atomically apply an exam transition. Returns whether it landed.
    async fn apply_exam_transition(
        &self,
        exam_id: Uuid,
        transition: ExamTransition,
    ) -> Result<bool, EngineError>;

    /// Atomically apply a submission transition. Returns whether it landed.
    async fn apply_submission_transition(
        &self,
        submission_id: Uuid,
        transition: SubmissionTransition,
    ) -> Result<bool, EngineError>;

    // --- sweep queries (all evaluated against the caller's `now` snapshot) ---

    /// Pending exams with start_time <= now.
    async fn pending_exams_due_to_start(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Exam>, EngineError>;

    /// Active exams with end_time <= now.
    async fn active_exams_due_to_end(&self, now: DateTime<Utc>)
        -> Result<Vec<Exam>, EngineError>;

    /// Started submissions whose exam has end_time <= now.
    async fn started_submissions_past_exam_end(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Submission>, EngineError>;

    /// Pending exams with reminder_sent == false and
    /// now <= start_time <= now + lead.
    async fn pending_exams_needing_reminder(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> Result<Vec<Exam>, EngineError>;

    /// Active exams with end_warning_sent == false and
    /// now <= end_time <= now + lead.
    async fn active_exams_needing_end_warning(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> Result<Vec<Exam>, EngineError>;

    /// All Started submissions for one exam (end-warning targeting).
    async fn started_submissions_for_exam(
        &self,
        exam_id: Uuid,
    ) -> Result<Vec<Submission>, EngineError>;

    // --- enrollment ---

    async fn students_enrolled(&self, exam_id: Uuid) -> Result<Vec<Student>, EngineError>;

    async fn student(&self, id: Uuid) -> Result<Option<Student>, EngineError>;
}

// ---------------------------------------------------------------------------
// Notifier trait
// ---------------------------------------------------------------------------

/// Fire-and-forget notification dispatch.
///
/// The engine logs and swallows every error from these methods: dispatch is
/// off the critical path and must never block, retry synchronously, or roll
/// back a state transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell a student their exam starts soon.
    async fn send_exam_start_reminder(
        &self,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError>;

    /// Warn a student with an in-progress attempt that the exam ends soon.
    async fn send_exam_end_warning(
        &self,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_serde_roundtrip() {
        let t = SubmissionTransition::AutoSubmit {
            submitted_at: Utc::now(),
            time_spent_secs: 3600,
            flag_reason: "time expired".into(),
        };
        let json = serde_json::to_string(&t).unwrap();
        let back: SubmissionTransition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);

        let json = serde_json::to_string(&ExamTransition::MarkReminderSent).unwrap();
        assert_eq!(json, "\"mark_reminder_sent\"");
    }
}
