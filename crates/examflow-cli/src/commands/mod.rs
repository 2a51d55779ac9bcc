//! CLI subcommand implementations.

pub mod init;
pub mod serve;
pub mod sweep;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use examflow_core::plan::{load_plan_directory, parse_plan, ExamPlan};
use examflow_store::MemoryStore;

/// Load one plan file or every plan in a directory.
pub(crate) fn load_plans(path: &Path) -> Result<Vec<ExamPlan>> {
    if path.is_dir() {
        load_plan_directory(path)
    } else {
        Ok(vec![parse_plan(path)?])
    }
}

/// Build a memory store seeded from the given plans.
pub(crate) fn seed_store(plans: &[ExamPlan]) -> Result<Arc<MemoryStore>> {
    let store = Arc::new(MemoryStore::new());
    for plan in plans {
        store.seed_plan(plan)?;
        eprintln!(
            "Seeded plan '{}': {} exams, {} students",
            plan.name,
            plan.exams.len(),
            plan.students.len()
        );
    }
    Ok(store)
}
