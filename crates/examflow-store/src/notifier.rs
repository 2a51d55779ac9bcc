//! Notifier implementations.
//!
//! `LogNotifier` is the default production stand-in: it logs the dispatch and
//! succeeds, leaving real delivery to an external mail gateway behind the
//! same trait. `RecordingNotifier` captures every dispatch for assertions and
//! can be told to fail for specific students.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use examflow_core::error::EngineError;
use examflow_core::model::{Exam, Student};
use examflow_core::traits::Notifier;

/// Logs dispatches via tracing and always succeeds.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_exam_start_reminder(
        &self,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError> {
        tracing::info!(
            student = %student.email,
            exam = %exam.title,
            start = %exam.start_time,
            "start reminder"
        );
        Ok(())
    }

    async fn send_exam_end_warning(
        &self,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError> {
        tracing::info!(
            student = %student.email,
            exam = %exam.title,
            end = %exam.end_time,
            "end warning"
        );
        Ok(())
    }
}

/// Which kind of notification a recorded dispatch was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    StartReminder,
    EndWarning,
}

/// A notifier that records every successful dispatch for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Dispatch, Uuid, Uuid)>>,
    failing_students: Mutex<HashSet<Uuid>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatch to this student will fail with a notification error.
    pub fn fail_for(&self, student_id: Uuid) {
        self.failing_students.lock().unwrap().insert(student_id);
    }

    /// All recorded dispatches as (kind, student, exam).
    pub fn sent(&self) -> Vec<(Dispatch, Uuid, Uuid)> {
        self.sent.lock().unwrap().clone()
    }

    /// Count of recorded dispatches of one kind.
    pub fn count(&self, kind: Dispatch) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    fn dispatch(
        &self,
        kind: Dispatch,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError> {
        if self.failing_students.lock().unwrap().contains(&student.id) {
            return Err(EngineError::Notification(format!(
                "delivery to {} refused",
                student.email
            )));
        }
        self.sent.lock().unwrap().push((kind, student.id, exam.id));
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_exam_start_reminder(
        &self,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError> {
        self.dispatch(Dispatch::StartReminder, student, exam)
    }

    async fn send_exam_end_warning(
        &self,
        student: &Student,
        exam: &Exam,
    ) -> Result<(), EngineError> {
        self.dispatch(Dispatch::EndWarning, student, exam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fixtures() -> (Student, Exam) {
        let student = Student {
            id: Uuid::new_v4(),
            name: "Alice Mwangi".into(),
            email: "alice@uni.example".into(),
        };
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let exam = Exam::schedule(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Algorithms I",
            60,
            start,
            start + Duration::minutes(60),
        )
        .unwrap();
        (student, exam)
    }

    #[tokio::test]
    async fn recording_notifier_captures_dispatches() {
        let (student, exam) = fixtures();
        let notifier = RecordingNotifier::new();

        notifier
            .send_exam_start_reminder(&student, &exam)
            .await
            .unwrap();
        notifier
            .send_exam_end_warning(&student, &exam)
            .await
            .unwrap();

        assert_eq!(notifier.count(Dispatch::StartReminder), 1);
        assert_eq!(notifier.count(Dispatch::EndWarning), 1);
        assert_eq!(notifier.sent()[0], (Dispatch::StartReminder, student.id, exam.id));
    }

    #[tokio::test]
    async fn failure_injection_is_per_student() {
        let (student, exam) = fixtures();
        let notifier = RecordingNotifier::new();
        notifier.fail_for(student.id);

        let err = notifier
            .send_exam_start_reminder(&student, &exam)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Notification(_)));
        assert_eq!(notifier.count(Dispatch::StartReminder), 0);
    }
}
