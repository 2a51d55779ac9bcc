//! Exam state machine.
//!
//! Advances exams strictly forward through pending → active → completed based
//! on wall-clock time. Both operations are idempotent no-ops when the time
//! predicate or the status precondition does not hold, so the sweep can call
//! them against a stale snapshot without harm.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::model::{Exam, ExamStatus};
use crate::traits::{ExamTransition, Store};

/// Drives exam status transitions through the store's conditional updates.
#[derive(Clone)]
pub struct ExamLifecycle {
    store: Arc<dyn Store>,
}

impl ExamLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Activate a pending exam whose start time has arrived.
    ///
    /// Returns whether the transition landed. The store re-checks the status
    /// precondition, so a snapshot that went stale between query and call
    /// resolves to a quiet `false`.
    pub async fn activate(&self, exam: &Exam, now: DateTime<Utc>) -> Result<bool, EngineError> {
        if exam.status != ExamStatus::Pending || now < exam.start_time {
            return Ok(false);
        }
        let applied = self
            .store
            .apply_exam_transition(exam.id, ExamTransition::Activate)
            .await?;
        if applied {
            tracing::info!(exam_id = %exam.id, title = %exam.title, "exam activated");
        }
        Ok(applied)
    }

    /// Complete an active exam whose end time has passed.
    pub async fn complete(&self, exam: &Exam, now: DateTime<Utc>) -> Result<bool, EngineError> {
        if exam.status != ExamStatus::Active || now < exam.end_time {
            return Ok(false);
        }
        let applied = self
            .store
            .apply_exam_transition(exam.id, ExamTransition::Complete)
            .await?;
        if applied {
            tracing::info!(exam_id = %exam.id, title = %exam.title, "exam completed");
        }
        Ok(applied)
    }
}
