//! In-memory store.
//!
//! Every table lives behind one mutex, and every conditional update performs
//! its read-check-write under that single lock. That lock is what makes the
//! `apply_*_transition` methods atomic; callers still coordinate exclusively
//! through the compare-and-set contract, exactly as they would against a
//! database doing the same conditional write server-side.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use examflow_core::error::EngineError;
use examflow_core::model::{
    Exam, ExamStatus, Student, Submission, SubmissionStatus, SubmissionType, Violation,
};
use examflow_core::plan::ExamPlan;
use examflow_core::traits::{ExamTransition, Store, SubmissionTransition};

#[derive(Default)]
struct Tables {
    exams: HashMap<Uuid, Exam>,
    submissions: HashMap<Uuid, Submission>,
    /// Uniqueness index: (exam, student) → submission id.
    attempt_index: HashMap<(Uuid, Uuid), Uuid>,
    violations: Vec<Violation>,
    students: HashMap<Uuid, Student>,
    enrollments: HashMap<Uuid, Vec<Uuid>>,
}

/// In-memory [`Store`] implementation backing the CLI and the test suites.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Simulated outage: every call fails with a store error.
    outage: AtomicBool,
    /// Ids whose transitions fail as if the record vanished mid-sweep.
    poisoned: Mutex<HashSet<Uuid>>,
    /// Instrumentation for race tests.
    submission_cas_attempted: AtomicU64,
    submission_cas_applied: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a student.
    pub fn add_student(&self, student: Student) -> Result<(), EngineError> {
        self.lock()?.students.insert(student.id, student);
        Ok(())
    }

    /// Enroll a student in an exam.
    pub fn enroll(&self, exam_id: Uuid, student_id: Uuid) -> Result<(), EngineError> {
        self.lock()?
            .enrollments
            .entry(exam_id)
            .or_default()
            .push(student_id);
        Ok(())
    }

    /// Seed the store from a parsed exam plan: students, exams, enrollments,
    /// and a Started attempt for each `in_progress` student.
    pub fn seed_plan(&self, plan: &ExamPlan) -> Result<(), EngineError> {
        for student in &plan.students {
            self.add_student(student.clone())?;
        }
        for planned in &plan.exams {
            {
                let mut tables = self.lock()?;
                tables.exams.insert(planned.exam.id, planned.exam.clone());
            }
            for student_id in &planned.enrolled {
                self.enroll(planned.exam.id, *student_id)?;
            }
            for student_id in &planned.in_progress {
                let submission =
                    Submission::begin(planned.exam.id, *student_id, planned.exam.start_time);
                self.insert_submission_sync(&submission)?;
            }
        }
        Ok(())
    }

    /// Make every subsequent call fail with a store error, as if the backing
    /// database became unreachable.
    pub fn set_outage(&self, on: bool) {
        self.outage.store(on, Ordering::SeqCst);
    }

    /// Make transitions for one id fail as if the record disappeared, while
    /// every other record keeps working. For per-item isolation tests.
    pub fn poison(&self, id: Uuid) {
        if let Ok(mut poisoned) = self.poisoned.lock() {
            poisoned.insert(id);
        }
    }

    /// Number of submission CAS attempts seen.
    pub fn submission_cas_attempted(&self) -> u64 {
        self.submission_cas_attempted.load(Ordering::Relaxed)
    }

    /// Number of submission CAS attempts that landed.
    pub fn submission_cas_applied(&self) -> u64 {
        self.submission_cas_applied.load(Ordering::Relaxed)
    }

    /// All violations recorded for a submission, in append order.
    pub fn violations_for(&self, submission_id: Uuid) -> Result<Vec<Violation>, EngineError> {
        Ok(self
            .lock()?
            .violations
            .iter()
            .filter(|v| v.submission_id == submission_id)
            .cloned()
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, EngineError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(EngineError::Store("store unreachable".into()));
        }
        self.tables
            .lock()
            .map_err(|_| EngineError::Store("store lock poisoned".into()))
    }

    fn check_poison(&self, id: Uuid) -> Result<(), EngineError> {
        let poisoned = self
            .poisoned
            .lock()
            .map_err(|_| EngineError::Store("store lock poisoned".into()))?;
        if poisoned.contains(&id) {
            return Err(EngineError::NotFound(format!("record {id} vanished")));
        }
        Ok(())
    }

    fn insert_submission_sync(&self, submission: &Submission) -> Result<(), EngineError> {
        let mut tables = self.lock()?;
        let key = (submission.exam_id, submission.student_id);
        if tables.attempt_index.contains_key(&key) {
            return Err(EngineError::Conflict(format!(
                "student {} already has a submission for exam {}",
                submission.student_id, submission.exam_id
            )));
        }
        tables.attempt_index.insert(key, submission.id);
        tables.submissions.insert(submission.id, submission.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exam(&self, id: Uuid) -> Result<Option<Exam>, EngineError> {
        Ok(self.lock()?.exams.get(&id).cloned())
    }

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, EngineError> {
        Ok(self.lock()?.submissions.get(&id).cloned())
    }

    async fn submission_for(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Submission>, EngineError> {
        let tables = self.lock()?;
        Ok(tables
            .attempt_index
            .get(&(exam_id, student_id))
            .and_then(|id| tables.submissions.get(id))
            .cloned())
    }

    async fn insert_exam(&self, exam: &Exam) -> Result<(), EngineError> {
        self.lock()?.exams.insert(exam.id, exam.clone());
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), EngineError> {
        self.insert_submission_sync(submission)
    }

    async fn append_violation(&self, violation: &Violation) -> Result<(), EngineError> {
        self.lock()?.violations.push(violation.clone());
        Ok(())
    }

    async fn mark_violation_triggered(&self, violation_id: Uuid) -> Result<(), EngineError> {
        let mut tables = self.lock()?;
        let violation = tables
            .violations
            .iter_mut()
            .find(|v| v.id == violation_id)
            .ok_or_else(|| EngineError::NotFound(format!("violation {violation_id}")))?;
        violation.auto_submit_triggered = true;
        Ok(())
    }

    async fn count_violations(&self, submission_id: Uuid) -> Result<u64, EngineError> {
        Ok(self
            .lock()?
            .violations
            .iter()
            .filter(|v| v.submission_id == submission_id)
            .count() as u64)
    }

    async fn apply_exam_transition(
        &self,
        exam_id: Uuid,
        transition: ExamTransition,
    ) -> Result<bool, EngineError> {
        self.check_poison(exam_id)?;
        let mut tables = self.lock()?;
        let exam = tables
            .exams
            .get_mut(&exam_id)
            .ok_or_else(|| EngineError::NotFound(format!("exam {exam_id}")))?;

        let applied = match transition {
            ExamTransition::Activate => {
                if exam.status == ExamStatus::Pending {
                    exam.status = ExamStatus::Active;
                    true
                } else {
                    false
                }
            }
            ExamTransition::Complete => {
                if exam.status == ExamStatus::Active {
                    exam.status = ExamStatus::Completed;
                    true
                } else {
                    false
                }
            }
            ExamTransition::MarkReminderSent => {
                if exam.reminder_sent {
                    false
                } else {
                    exam.reminder_sent = true;
                    true
                }
            }
            ExamTransition::MarkEndWarningSent => {
                if exam.end_warning_sent {
                    false
                } else {
                    exam.end_warning_sent = true;
                    true
                }
            }
        };
        Ok(applied)
    }

    async fn apply_submission_transition(
        &self,
        submission_id: Uuid,
        transition: SubmissionTransition,
    ) -> Result<bool, EngineError> {
        self.check_poison(submission_id)?;
        self.submission_cas_attempted.fetch_add(1, Ordering::Relaxed);
        let mut tables = self.lock()?;
        let submission = tables
            .submissions
            .get_mut(&submission_id)
            .ok_or_else(|| EngineError::NotFound(format!("submission {submission_id}")))?;

        // Shared precondition: only an in-progress attempt can transition.
        if submission.status != SubmissionStatus::Started {
            return Ok(false);
        }

        match transition {
            SubmissionTransition::Submit {
                submitted_at,
                time_spent_secs,
            } => {
                submission.status = SubmissionStatus::Submitted;
                submission.submitted_at = Some(submitted_at);
                submission.time_spent_secs = time_spent_secs;
            }
            SubmissionTransition::AutoSubmit {
                submitted_at,
                time_spent_secs,
                flag_reason,
            } => {
                submission.status = SubmissionStatus::AutoSubmitted;
                submission.submitted_at = Some(submitted_at);
                submission.time_spent_secs = time_spent_secs;
                submission.submission_type = SubmissionType::Auto;
                submission.flagged = !flag_reason.is_empty();
                submission.flag_reason = flag_reason;
            }
        }
        self.submission_cas_applied.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn pending_exams_due_to_start(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Exam>, EngineError> {
        Ok(self
            .lock()?
            .exams
            .values()
            .filter(|e| e.status == ExamStatus::Pending && e.start_time <= now)
            .cloned()
            .collect())
    }

    async fn active_exams_due_to_end(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Exam>, EngineError> {
        Ok(self
            .lock()?
            .exams
            .values()
            .filter(|e| e.status == ExamStatus::Active && e.end_time <= now)
            .cloned()
            .collect())
    }

    async fn started_submissions_past_exam_end(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Submission>, EngineError> {
        let tables = self.lock()?;
        Ok(tables
            .submissions
            .values()
            .filter(|s| {
                s.status == SubmissionStatus::Started
                    && tables
                        .exams
                        .get(&s.exam_id)
                        .is_some_and(|e| e.end_time <= now)
            })
            .cloned()
            .collect())
    }

    async fn pending_exams_needing_reminder(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> Result<Vec<Exam>, EngineError> {
        Ok(self
            .lock()?
            .exams
            .values()
            .filter(|e| {
                e.status == ExamStatus::Pending
                    && !e.reminder_sent
                    && e.start_time > now
                    && e.start_time <= now + lead
            })
            .cloned()
            .collect())
    }

    async fn active_exams_needing_end_warning(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> Result<Vec<Exam>, EngineError> {
        Ok(self
            .lock()?
            .exams
            .values()
            .filter(|e| {
                e.status == ExamStatus::Active
                    && !e.end_warning_sent
                    && e.end_time > now
                    && e.end_time <= now + lead
            })
            .cloned()
            .collect())
    }

    async fn started_submissions_for_exam(
        &self,
        exam_id: Uuid,
    ) -> Result<Vec<Submission>, EngineError> {
        Ok(self
            .lock()?
            .submissions
            .values()
            .filter(|s| s.exam_id == exam_id && s.status == SubmissionStatus::Started)
            .cloned()
            .collect())
    }

    async fn students_enrolled(&self, exam_id: Uuid) -> Result<Vec<Student>, EngineError> {
        let tables = self.lock()?;
        let ids = tables.enrollments.get(&exam_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| tables.students.get(id))
            .cloned()
            .collect())
    }

    async fn student(&self, id: Uuid) -> Result<Option<Student>, EngineError> {
        Ok(self.lock()?.students.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn exam_at(start: DateTime<Utc>, minutes: i64) -> Exam {
        Exam::schedule(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Unit test exam",
            minutes as u32,
            start,
            start + Duration::minutes(minutes),
        )
        .unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn exam_cas_is_forward_only() {
        let store = MemoryStore::new();
        let exam = exam_at(t0(), 60);
        store.insert_exam(&exam).await.unwrap();

        assert!(store
            .apply_exam_transition(exam.id, ExamTransition::Activate)
            .await
            .unwrap());
        // A second activate sees the precondition gone.
        assert!(!store
            .apply_exam_transition(exam.id, ExamTransition::Activate)
            .await
            .unwrap());
        assert!(store
            .apply_exam_transition(exam.id, ExamTransition::Complete)
            .await
            .unwrap());
        // Completed exams accept no further status transitions.
        assert!(!store
            .apply_exam_transition(exam.id, ExamTransition::Activate)
            .await
            .unwrap());
        assert!(!store
            .apply_exam_transition(exam.id, ExamTransition::Complete)
            .await
            .unwrap());

        let stored = store.exam(exam.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExamStatus::Completed);
    }

    #[tokio::test]
    async fn reminder_flag_flips_exactly_once() {
        let store = MemoryStore::new();
        let exam = exam_at(t0(), 60);
        store.insert_exam(&exam).await.unwrap();

        assert!(store
            .apply_exam_transition(exam.id, ExamTransition::MarkReminderSent)
            .await
            .unwrap());
        assert!(!store
            .apply_exam_transition(exam.id, ExamTransition::MarkReminderSent)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn submission_uniqueness_constraint() {
        let store = MemoryStore::new();
        let exam_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();

        let first = Submission::begin(exam_id, student_id, t0());
        store.insert_submission(&first).await.unwrap();

        let second = Submission::begin(exam_id, student_id, t0());
        let err = store.insert_submission(&second).await.unwrap_err();
        assert!(err.is_conflict());

        // Same student, different exam is fine.
        let other = Submission::begin(Uuid::new_v4(), student_id, t0());
        store.insert_submission(&other).await.unwrap();
    }

    #[tokio::test]
    async fn submission_cas_applies_at_most_once() {
        let store = MemoryStore::new();
        let sub = Submission::begin(Uuid::new_v4(), Uuid::new_v4(), t0());
        store.insert_submission(&sub).await.unwrap();

        let auto = SubmissionTransition::AutoSubmit {
            submitted_at: t0() + Duration::minutes(60),
            time_spent_secs: 3600,
            flag_reason: "time expired".into(),
        };
        let manual = SubmissionTransition::Submit {
            submitted_at: t0() + Duration::minutes(61),
            time_spent_secs: 3660,
        };

        assert!(store
            .apply_submission_transition(sub.id, auto)
            .await
            .unwrap());
        // The loser performs no write at all.
        assert!(!store
            .apply_submission_transition(sub.id, manual)
            .await
            .unwrap());

        let stored = store.submission(sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::AutoSubmitted);
        assert_eq!(stored.submission_type, SubmissionType::Auto);
        assert_eq!(stored.time_spent_secs, 3600);
        assert_eq!(stored.flag_reason, "time expired");
        assert!(stored.flagged);
        assert_eq!(store.submission_cas_attempted(), 2);
        assert_eq!(store.submission_cas_applied(), 1);
    }

    #[tokio::test]
    async fn time_predicate_queries() {
        let store = MemoryStore::new();
        let due = exam_at(t0() - Duration::minutes(1), 60);
        let future = exam_at(t0() + Duration::minutes(3), 60);
        let far_future = exam_at(t0() + Duration::minutes(30), 60);
        store.insert_exam(&due).await.unwrap();
        store.insert_exam(&future).await.unwrap();
        store.insert_exam(&far_future).await.unwrap();

        let starting = store.pending_exams_due_to_start(t0()).await.unwrap();
        assert_eq!(starting.len(), 1);
        assert_eq!(starting[0].id, due.id);

        let needing_reminder = store
            .pending_exams_needing_reminder(t0(), Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(needing_reminder.len(), 1);
        assert_eq!(needing_reminder[0].id, future.id);
    }

    #[tokio::test]
    async fn outage_fails_with_store_error() {
        let store = MemoryStore::new();
        store.set_outage(true);
        let err = store.exam(Uuid::new_v4()).await.unwrap_err();
        assert!(err.aborts_sweep());

        store.set_outage(false);
        assert!(store.exam(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn violation_log_append_and_flag() {
        let store = MemoryStore::new();
        let submission_id = Uuid::new_v4();
        let v = Violation {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            submission_id,
            violation_type: examflow_core::model::ViolationType::CopyPaste,
            timestamp: t0(),
            auto_submit_triggered: false,
        };
        store.append_violation(&v).await.unwrap();
        assert_eq!(store.count_violations(submission_id).await.unwrap(), 1);

        store.mark_violation_triggered(v.id).await.unwrap();
        let stored = store.violations_for(submission_id).unwrap();
        assert!(stored[0].auto_submit_triggered);
    }
}
