//! The `examflow sweep` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use examflow_core::sweep::{SweepEngine, SweepReport};
use examflow_store::config::load_config_from;
use examflow_store::LogNotifier;

pub async fn execute(
    plan_path: PathBuf,
    at: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let plans = super::load_plans(&plan_path)?;
    let store = super::seed_store(&plans)?;

    let now = match at {
        Some(ts) => DateTime::parse_from_rfc3339(&ts)
            .with_context(|| format!("--at: '{ts}' is not an RFC 3339 timestamp"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let engine = SweepEngine::new(store, Arc::new(LogNotifier), config.engine_config());
    let report = engine.run_sweep(now).await?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &SweepReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Phase", "Count"]);
    table.add_row(vec![Cell::new("Exams activated"), Cell::new(report.exams_activated)]);
    table.add_row(vec![Cell::new("Exams completed"), Cell::new(report.exams_completed)]);
    table.add_row(vec![
        Cell::new("Attempts auto-submitted"),
        Cell::new(report.attempts_auto_submitted),
    ]);
    table.add_row(vec![Cell::new("Reminders sent"), Cell::new(report.reminders_sent)]);
    table.add_row(vec![
        Cell::new("End warnings sent"),
        Cell::new(report.end_warnings_sent),
    ]);
    table.add_row(vec![Cell::new("Item errors"), Cell::new(report.item_errors)]);
    table.add_row(vec![
        Cell::new("Notification failures"),
        Cell::new(report.notification_failures),
    ]);

    if let Some(at) = report.swept_at {
        println!("Sweep at {at}:");
    }
    println!("{table}");
}
