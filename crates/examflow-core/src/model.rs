//! Core data model types for examflow.
//!
//! These are the fundamental types that the entire examflow system uses to
//! represent exams, student attempts, and integrity violations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;

/// Lifecycle states of an exam. Strictly forward: pending → active → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Pending,
    Active,
    Completed,
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamStatus::Pending => write!(f, "pending"),
            ExamStatus::Active => write!(f, "active"),
            ExamStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for ExamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExamStatus::Pending),
            "active" => Ok(ExamStatus::Active),
            "completed" => Ok(ExamStatus::Completed),
            other => Err(format!("unknown exam status: {other}")),
        }
    }
}

/// A scheduled exam. Created by a lecturer in `Pending`; mutated only by the
/// exam state machine; never deleted by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    /// Unique identifier.
    pub id: Uuid,
    /// Course this exam belongs to.
    pub course_id: Uuid,
    /// Lecturer who owns the exam.
    pub lecturer_id: Uuid,
    /// Human-readable title.
    pub title: String,
    /// Allotted duration in minutes.
    pub duration_minutes: u32,
    /// When the exam window opens.
    pub start_time: DateTime<Utc>,
    /// When the exam window closes. Always after `start_time`.
    pub end_time: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: ExamStatus,
    /// Set exactly once when the start reminder batch has been dispatched.
    #[serde(default)]
    pub reminder_sent: bool,
    /// Set exactly once when the end warning batch has been dispatched.
    #[serde(default)]
    pub end_warning_sent: bool,
}

impl Exam {
    /// Create a new pending exam, validating the schedule.
    pub fn schedule(
        course_id: Uuid,
        lecturer_id: Uuid,
        title: impl Into<String>,
        duration_minutes: u32,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        if start_time >= end_time {
            return Err(EngineError::Validation(format!(
                "exam start_time {start_time} must be before end_time {end_time}"
            )));
        }
        if duration_minutes == 0 {
            return Err(EngineError::Validation(
                "exam duration must be at least one minute".into(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            course_id,
            lecturer_id,
            title: title.into(),
            duration_minutes,
            start_time,
            end_time,
            status: ExamStatus::Pending,
            reminder_sent: false,
            end_warning_sent: false,
        })
    }
}

/// Lifecycle states of a single student attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Started,
    Submitted,
    AutoSubmitted,
    Graded,
}

impl SubmissionStatus {
    /// True once the attempt can no longer be written to by the student.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubmissionStatus::Started)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Started => write!(f, "started"),
            SubmissionStatus::Submitted => write!(f, "submitted"),
            SubmissionStatus::AutoSubmitted => write!(f, "auto_submitted"),
            SubmissionStatus::Graded => write!(f, "graded"),
        }
    }
}

/// How a terminal submission came to be terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    Manual,
    Auto,
}

/// One student attempt at one exam. Exactly one per (exam, student) pair,
/// enforced by the store's uniqueness constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Unique identifier.
    pub id: Uuid,
    /// Exam being attempted.
    pub exam_id: Uuid,
    /// Student making the attempt.
    pub student_id: Uuid,
    /// When the attempt began.
    pub started_at: DateTime<Utc>,
    /// None until the attempt is terminal, then immutable.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Current attempt state.
    pub status: SubmissionStatus,
    /// Manual until a system-triggered termination marks it Auto.
    pub submission_type: SubmissionType,
    /// Seconds spent on the attempt, written at termination.
    #[serde(default)]
    pub time_spent_secs: i64,
    /// True when the attempt was flagged for integrity review.
    #[serde(default)]
    pub flagged: bool,
    /// Why the attempt was flagged, empty when not flagged.
    #[serde(default)]
    pub flag_reason: String,
}

impl Submission {
    /// Create a fresh in-progress attempt.
    pub fn begin(exam_id: Uuid, student_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exam_id,
            student_id,
            started_at: now,
            submitted_at: None,
            status: SubmissionStatus::Started,
            submission_type: SubmissionType::Manual,
            time_spent_secs: 0,
            flagged: false,
            flag_reason: String::new(),
        }
    }
}

/// Severity of an integrity violation, derived from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Kinds of integrity-violation events reported by exam clients.
///
/// Client builds ship new event types ahead of the server, so parsing never
/// fails: anything unrecognized lands in `Unknown` and is still recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    TabHidden,
    WindowBlur,
    RouteChange,
    ExitFullscreen,
    ContextMenu,
    CopyPaste,
    DevtoolsOpen,
    #[serde(other)]
    Unknown,
}

impl ViolationType {
    /// Static severity table. Unknown types are treated as medium.
    pub fn severity(self) -> Severity {
        match self {
            ViolationType::TabHidden => Severity::High,
            ViolationType::WindowBlur => Severity::High,
            ViolationType::RouteChange => Severity::Critical,
            ViolationType::ExitFullscreen => Severity::Medium,
            ViolationType::ContextMenu => Severity::Low,
            ViolationType::CopyPaste => Severity::Medium,
            ViolationType::DevtoolsOpen => Severity::High,
            ViolationType::Unknown => Severity::Medium,
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationType::TabHidden => write!(f, "TAB_HIDDEN"),
            ViolationType::WindowBlur => write!(f, "WINDOW_BLUR"),
            ViolationType::RouteChange => write!(f, "ROUTE_CHANGE"),
            ViolationType::ExitFullscreen => write!(f, "EXIT_FULLSCREEN"),
            ViolationType::ContextMenu => write!(f, "CONTEXT_MENU"),
            ViolationType::CopyPaste => write!(f, "COPY_PASTE"),
            ViolationType::DevtoolsOpen => write!(f, "DEVTOOLS_OPEN"),
            ViolationType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for ViolationType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_uppercase().as_str() {
            "TAB_HIDDEN" => ViolationType::TabHidden,
            "WINDOW_BLUR" => ViolationType::WindowBlur,
            "ROUTE_CHANGE" => ViolationType::RouteChange,
            "EXIT_FULLSCREEN" => ViolationType::ExitFullscreen,
            "CONTEXT_MENU" => ViolationType::ContextMenu,
            "COPY_PASTE" => ViolationType::CopyPaste,
            "DEVTOOLS_OPEN" => ViolationType::DevtoolsOpen,
            _ => ViolationType::Unknown,
        })
    }
}

/// One detected integrity-breach event during an in-progress attempt.
///
/// Append-only: the only field ever mutated after insert is
/// `auto_submit_triggered`, set true on at most the one record whose
/// recording crossed the threshold and won the auto-submit race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Unique identifier.
    pub id: Uuid,
    /// Student who triggered the event.
    pub student_id: Uuid,
    /// Exam being attempted.
    pub exam_id: Uuid,
    /// Attempt the event was reported against.
    pub submission_id: Uuid,
    /// What kind of event was detected.
    pub violation_type: ViolationType,
    /// When the event was detected.
    pub timestamp: DateTime<Utc>,
    /// True only on the record that caused a threshold auto-submit.
    #[serde(default)]
    pub auto_submit_triggered: bool,
}

impl Violation {
    /// Severity derived from the violation type; never stored independently.
    pub fn severity(&self) -> Severity {
        self.violation_type.severity()
    }
}

/// A student enrolled in a course. Only the fields the notifier needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Delivery address for reminders and warnings.
    pub email: String,
}
