//! Scheduler driver: the periodic sweep and its ticker.
//!
//! One sweep snapshots `now` once and runs five ordered passes: activate due
//! exams, complete ended exams, auto-submit attempts whose exam ended, send
//! start reminders, send end warnings. Every pass isolates per-item failures;
//! only a store-level failure aborts the sweep (it is retried on the next
//! tick). Running the same sweep twice at an unchanged `now` produces zero
//! additional state changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lifecycle::ExamLifecycle;
use crate::model::Exam;
use crate::submission::SubmissionLifecycle;
use crate::traits::{ExamTransition, Notifier, Store};

/// What one sweep did. Counts only applied transitions and delivered
/// notifications, so an idempotent re-run reports all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// When the sweep's single `now` snapshot was taken.
    pub swept_at: Option<DateTime<Utc>>,
    /// Exams moved pending → active.
    pub exams_activated: u64,
    /// Exams moved active → completed.
    pub exams_completed: u64,
    /// Attempts terminated because their exam ended.
    pub attempts_auto_submitted: u64,
    /// Start reminders delivered.
    pub reminders_sent: u64,
    /// End warnings delivered.
    pub end_warnings_sent: u64,
    /// Per-item failures that were logged and skipped.
    pub item_errors: u64,
    /// Notification dispatches that failed (logged, never fatal).
    pub notification_failures: u64,
}

impl SweepReport {
    /// Total state transitions applied by this sweep.
    pub fn transitions(&self) -> u64 {
        self.exams_activated + self.exams_completed + self.attempts_auto_submitted
    }

    /// Total notifications delivered by this sweep.
    pub fn notifications(&self) -> u64 {
        self.reminders_sent + self.end_warnings_sent
    }
}

/// Runs sweeps. Owns the state machines and the notifier seam.
pub struct SweepEngine {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    exams: ExamLifecycle,
    submissions: SubmissionLifecycle,
    config: EngineConfig,
}

impl SweepEngine {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        let exams = ExamLifecycle::new(Arc::clone(&store));
        let submissions = SubmissionLifecycle::new(Arc::clone(&store));
        Self {
            store,
            notifier,
            exams,
            submissions,
            config,
        }
    }

    /// The submission state machine this engine drives, for callers that
    /// handle manual submits or build a [`crate::violations::ViolationTracker`].
    pub fn submissions(&self) -> SubmissionLifecycle {
        self.submissions.clone()
    }

    /// Run one sweep with a single captured `now`.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport {
            swept_at: Some(now),
            ..Default::default()
        };

        self.activate_due_exams(now, &mut report).await?;
        self.complete_ended_exams(now, &mut report).await?;
        self.expire_overrunning_attempts(now, &mut report).await?;
        self.send_start_reminders(now, &mut report).await?;
        self.send_end_warnings(now, &mut report).await?;

        tracing::debug!(
            transitions = report.transitions(),
            notifications = report.notifications(),
            errors = report.item_errors,
            "sweep finished"
        );
        Ok(report)
    }

    /// Pass 1: pending exams whose start time arrived.
    async fn activate_due_exams(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let due = self.store.pending_exams_due_to_start(now).await?;
        let mut tasks = FuturesUnordered::new();
        for exam in due {
            let exams = self.exams.clone();
            tasks.push(async move { (exam.id, exams.activate(&exam, now).await) });
        }
        while let Some((exam_id, result)) = tasks.next().await {
            match result {
                Ok(true) => report.exams_activated += 1,
                Ok(false) => {}
                Err(e) => isolate(e, "activate", exam_id, report)?,
            }
        }
        Ok(())
    }

    /// Pass 2: active exams whose end time passed.
    async fn complete_ended_exams(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let ended = self.store.active_exams_due_to_end(now).await?;
        let mut tasks = FuturesUnordered::new();
        for exam in ended {
            let exams = self.exams.clone();
            tasks.push(async move { (exam.id, exams.complete(&exam, now).await) });
        }
        while let Some((exam_id, result)) = tasks.next().await {
            match result {
                Ok(true) => report.exams_completed += 1,
                Ok(false) => {}
                Err(e) => isolate(e, "complete", exam_id, report)?,
            }
        }
        Ok(())
    }

    /// Pass 3: started attempts whose exam has ended. Races the
    /// violation-threshold path through the same CAS; a lost race counts as
    /// nothing here.
    async fn expire_overrunning_attempts(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let overrunning = self.store.started_submissions_past_exam_end(now).await?;
        let mut tasks = FuturesUnordered::new();
        for submission in overrunning {
            let submissions = self.submissions.clone();
            tasks.push(async move {
                (
                    submission.id,
                    submissions.auto_submit(submission.id, now, "time expired").await,
                )
            });
        }
        while let Some((submission_id, result)) = tasks.next().await {
            match result {
                Ok(true) => report.attempts_auto_submitted += 1,
                Ok(false) => {}
                Err(e) => isolate(e, "auto-submit", submission_id, report)?,
            }
        }
        Ok(())
    }

    /// Pass 4: start reminders for exams opening within the lead window.
    async fn send_start_reminders(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let upcoming = self
            .store
            .pending_exams_needing_reminder(now, self.config.reminder_lead())
            .await?;
        for exam in upcoming {
            let students = self.store.students_enrolled(exam.id).await?;
            for student in &students {
                match self.notifier.send_exam_start_reminder(student, &exam).await {
                    Ok(()) => report.reminders_sent += 1,
                    Err(e) => {
                        report.notification_failures += 1;
                        tracing::warn!(
                            exam_id = %exam.id,
                            student_id = %student.id,
                            error = %e,
                            "start reminder dispatch failed"
                        );
                    }
                }
            }
            // The flag flips exactly once regardless of individual dispatch
            // failures; a second sweep in the same window sends nothing.
            self.mark_once(&exam, ExamTransition::MarkReminderSent, report)
                .await?;
        }
        Ok(())
    }

    /// Pass 5: end warnings for active exams closing within the lead window,
    /// targeting students whose attempt is still in progress.
    async fn send_end_warnings(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let closing = self
            .store
            .active_exams_needing_end_warning(now, self.config.reminder_lead())
            .await?;
        for exam in closing {
            let in_progress = self.store.started_submissions_for_exam(exam.id).await?;
            for submission in &in_progress {
                let Some(student) = self.store.student(submission.student_id).await? else {
                    report.item_errors += 1;
                    tracing::warn!(
                        student_id = %submission.student_id,
                        exam_id = %exam.id,
                        "student missing for end warning"
                    );
                    continue;
                };
                match self.notifier.send_exam_end_warning(&student, &exam).await {
                    Ok(()) => report.end_warnings_sent += 1,
                    Err(e) => {
                        report.notification_failures += 1;
                        tracing::warn!(
                            exam_id = %exam.id,
                            student_id = %student.id,
                            error = %e,
                            "end warning dispatch failed"
                        );
                    }
                }
            }
            self.mark_once(&exam, ExamTransition::MarkEndWarningSent, report)
                .await?;
        }
        Ok(())
    }

    async fn mark_once(
        &self,
        exam: &Exam,
        transition: ExamTransition,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        match self.store.apply_exam_transition(exam.id, transition).await {
            Ok(_) => Ok(()),
            Err(e) => isolate(e, "mark dispatched", exam.id, report),
        }
    }
}

/// Per-item failure handling: store failures abort the sweep, everything else
/// is logged and counted so the batch continues.
fn isolate(
    error: EngineError,
    phase: &str,
    item: uuid::Uuid,
    report: &mut SweepReport,
) -> Result<(), EngineError> {
    if error.aborts_sweep() {
        return Err(error);
    }
    report.item_errors += 1;
    tracing::error!(%item, error = %error, "sweep {phase} failed for item, continuing");
    Ok(())
}

// ---------------------------------------------------------------------------
// Periodic ticker
// ---------------------------------------------------------------------------

/// Owns the sweep interval loop. Tests drive [`SweepEngine::run_sweep`]
/// directly instead of waiting on wall clock.
pub struct Scheduler {
    engine: Arc<SweepEngine>,
}

/// Handle to a running scheduler; dropping it does not stop the loop,
/// `shutdown` does.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the ticker and wait for the in-flight sweep, if any, to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

impl Scheduler {
    pub fn new(engine: Arc<SweepEngine>) -> Self {
        Self { engine }
    }

    /// Spawn the periodic sweep loop on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop, mut stopped) = watch::channel(false);
        let engine = self.engine;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        match engine.run_sweep(now).await {
                            Ok(report) => {
                                if report.transitions() > 0 || report.notifications() > 0 {
                                    tracing::info!(
                                        activated = report.exams_activated,
                                        completed = report.exams_completed,
                                        auto_submitted = report.attempts_auto_submitted,
                                        reminders = report.reminders_sent,
                                        warnings = report.end_warnings_sent,
                                        "sweep applied changes"
                                    );
                                }
                            }
                            // Store unreachable: skip this pass, retry next tick.
                            Err(e) => tracing::error!(error = %e, "sweep aborted"),
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
        });
        SchedulerHandle { stop, task }
    }
}
