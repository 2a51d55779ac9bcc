//! TOML exam plan parser.
//!
//! Loads exam plans (exams, enrolled students, optional in-progress attempts)
//! from TOML files and directories, and validates them. Plans are how the CLI
//! seeds a store without the out-of-scope HTTP layer.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::model::{Exam, Student};

/// A validated exam plan.
#[derive(Debug, Clone)]
pub struct ExamPlan {
    /// Human-readable plan name.
    pub name: String,
    /// Students referenced by the plan's exams.
    pub students: Vec<Student>,
    /// The exams with their enrollment.
    pub exams: Vec<PlannedExam>,
}

/// One exam plus who is enrolled and who already has an attempt in flight.
#[derive(Debug, Clone)]
pub struct PlannedExam {
    pub exam: Exam,
    /// Students enrolled in the exam.
    pub enrolled: Vec<Uuid>,
    /// Enrolled students whose attempt should be seeded as Started.
    pub in_progress: Vec<Uuid>,
}

/// Intermediate TOML structure for parsing plan files.
#[derive(Debug, Deserialize)]
struct TomlPlanFile {
    plan: TomlPlanHeader,
    #[serde(default)]
    students: Vec<TomlStudent>,
    #[serde(default)]
    exams: Vec<TomlExam>,
}

#[derive(Debug, Deserialize)]
struct TomlPlanHeader {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TomlStudent {
    /// Short key other sections use to reference this student.
    key: String,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct TomlExam {
    title: String,
    #[serde(default)]
    course_id: Option<Uuid>,
    #[serde(default)]
    lecturer_id: Option<Uuid>,
    duration_minutes: u32,
    /// RFC 3339 timestamp, e.g. "2026-03-02T09:00:00Z".
    start_time: String,
    end_time: String,
    #[serde(default)]
    enrolled: Vec<String>,
    #[serde(default)]
    in_progress: Vec<String>,
}

/// Parse a single TOML file into an `ExamPlan`.
pub fn parse_plan(path: &Path) -> Result<ExamPlan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file: {}", path.display()))?;
    parse_plan_str(&content, path)
}

/// Parse a TOML string into an `ExamPlan` (useful for testing).
pub fn parse_plan_str(content: &str, source_path: &Path) -> Result<ExamPlan> {
    let parsed: TomlPlanFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut by_key: HashMap<String, Uuid> = HashMap::new();
    let mut students = Vec::with_capacity(parsed.students.len());
    for s in parsed.students {
        let id = Uuid::new_v4();
        if by_key.insert(s.key.clone(), id).is_some() {
            anyhow::bail!("duplicate student key '{}'", s.key);
        }
        students.push(Student {
            id,
            name: s.name,
            email: s.email,
        });
    }

    let mut exams = Vec::with_capacity(parsed.exams.len());
    for e in parsed.exams {
        let start_time = parse_timestamp(&e.start_time)
            .with_context(|| format!("exam '{}': bad start_time", e.title))?;
        let end_time = parse_timestamp(&e.end_time)
            .with_context(|| format!("exam '{}': bad end_time", e.title))?;

        let exam = Exam::schedule(
            e.course_id.unwrap_or_else(Uuid::new_v4),
            e.lecturer_id.unwrap_or_else(Uuid::new_v4),
            &e.title,
            e.duration_minutes,
            start_time,
            end_time,
        )
        .map_err(|err| anyhow::anyhow!("exam '{}': {err}", e.title))?;

        let enrolled = resolve_keys(&e.enrolled, &by_key, &e.title, "enrolled")?;
        let in_progress = resolve_keys(&e.in_progress, &by_key, &e.title, "in_progress")?;
        for id in &in_progress {
            anyhow::ensure!(
                enrolled.contains(id),
                "exam '{}': in_progress students must also be enrolled",
                e.title
            );
        }

        exams.push(PlannedExam {
            exam,
            enrolled,
            in_progress,
        });
    }

    Ok(ExamPlan {
        name: parsed.plan.name,
        students,
        exams,
    })
}

/// Load every `.toml` plan in a directory, sorted by file name.
pub fn load_plan_directory(dir: &Path) -> Result<Vec<ExamPlan>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read plan directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    entries.sort();

    entries.iter().map(|p| parse_plan(p)).collect()
}

/// A non-fatal issue found while linting a plan.
#[derive(Debug, Clone)]
pub struct PlanWarning {
    /// Title of the exam the warning is about, when exam-specific.
    pub exam_title: Option<String>,
    pub message: String,
}

/// Lint a parsed plan for issues that parse fine but are probably mistakes.
pub fn validate_plan(plan: &ExamPlan) -> Vec<PlanWarning> {
    let mut warnings = Vec::new();
    for planned in &plan.exams {
        let exam = &planned.exam;
        if planned.enrolled.is_empty() {
            warnings.push(PlanWarning {
                exam_title: Some(exam.title.clone()),
                message: "no students enrolled".into(),
            });
        }
        let window = exam.end_time - exam.start_time;
        if i64::from(exam.duration_minutes) > window.num_minutes() {
            warnings.push(PlanWarning {
                exam_title: Some(exam.title.clone()),
                message: format!(
                    "allotted duration ({} min) exceeds the exam window ({} min)",
                    exam.duration_minutes,
                    window.num_minutes()
                ),
            });
        }
    }
    warnings
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("'{s}' is not an RFC 3339 timestamp"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn resolve_keys(
    keys: &[String],
    by_key: &HashMap<String, Uuid>,
    exam_title: &str,
    field: &str,
) -> Result<Vec<Uuid>> {
    keys.iter()
        .map(|k| {
            by_key.get(k).copied().ok_or_else(|| {
                anyhow::anyhow!("exam '{exam_title}': {field} references unknown student '{k}'")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const PLAN: &str = r#"
[plan]
name = "CS101 midterm week"

[[students]]
key = "alice"
name = "Alice Mwangi"
email = "alice@uni.example"

[[students]]
key = "bob"
name = "Bob Ade"
email = "bob@uni.example"

[[exams]]
title = "Algorithms I midterm"
duration_minutes = 60
start_time = "2026-03-02T09:00:00Z"
end_time = "2026-03-02T10:00:00Z"
enrolled = ["alice", "bob"]
in_progress = ["alice"]
"#;

    fn src() -> PathBuf {
        PathBuf::from("test.toml")
    }

    #[test]
    fn parse_complete_plan() {
        let plan = parse_plan_str(PLAN, &src()).unwrap();
        assert_eq!(plan.name, "CS101 midterm week");
        assert_eq!(plan.students.len(), 2);
        assert_eq!(plan.exams.len(), 1);
        let exam = &plan.exams[0];
        assert_eq!(exam.exam.title, "Algorithms I midterm");
        assert_eq!(exam.enrolled.len(), 2);
        assert_eq!(exam.in_progress.len(), 1);
        assert!(exam.enrolled.contains(&exam.in_progress[0]));
    }

    #[test]
    fn reject_unknown_enrollment_key() {
        let bad = PLAN.replace("\"alice\", \"bob\"", "\"alice\", \"mallory\"");
        let err = parse_plan_str(&bad, &src()).unwrap_err();
        assert!(err.to_string().contains("mallory"));
    }

    #[test]
    fn reject_duplicate_student_key() {
        let bad = PLAN.replace("key = \"bob\"", "key = \"alice\"");
        let err = parse_plan_str(&bad, &src()).unwrap_err();
        assert!(err.to_string().contains("duplicate student key"));
    }

    #[test]
    fn reject_inverted_exam_window() {
        let bad = PLAN.replace("end_time = \"2026-03-02T10:00:00Z\"", "end_time = \"2026-03-02T08:00:00Z\"");
        assert!(parse_plan_str(&bad, &src()).is_err());
    }

    #[test]
    fn reject_in_progress_without_enrollment() {
        let bad = PLAN.replace("enrolled = [\"alice\", \"bob\"]", "enrolled = [\"bob\"]");
        let err = parse_plan_str(&bad, &src()).unwrap_err();
        assert!(err.to_string().contains("must also be enrolled"));
    }

    #[test]
    fn validate_flags_empty_enrollment_and_oversized_duration() {
        let plan = parse_plan_str(PLAN, &src()).unwrap();
        assert!(validate_plan(&plan).is_empty());

        let no_students = PLAN.replace("enrolled = [\"alice\", \"bob\"]\nin_progress = [\"alice\"]", "");
        let plan = parse_plan_str(&no_students, &src()).unwrap();
        let warnings = validate_plan(&plan);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("no students enrolled"));

        let oversized = PLAN.replace("duration_minutes = 60", "duration_minutes = 90");
        let plan = parse_plan_str(&oversized, &src()).unwrap();
        let warnings = validate_plan(&plan);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("exceeds the exam window"));
    }

    #[test]
    fn load_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.toml"), PLAN).unwrap();
        std::fs::write(
            dir.path().join("a.toml"),
            PLAN.replace("CS101 midterm week", "CS100 quizzes"),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let plans = load_plan_directory(dir.path()).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].name, "CS100 quizzes");
        assert_eq!(plans[1].name, "CS101 midterm week");
    }
}
