//! The `examflow validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examflow_core::plan::validate_plan;

pub fn execute(plan_path: PathBuf) -> Result<()> {
    let plans = super::load_plans(&plan_path)?;

    let mut total_warnings = 0;

    for plan in &plans {
        println!("Plan: {} ({} exams)", plan.name, plan.exams.len());

        let warnings = validate_plan(plan);
        for w in &warnings {
            let prefix = w
                .exam_title
                .as_ref()
                .map(|t| format!("  [{t}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All plans valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
