//! The `examflow serve` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use examflow_core::sweep::{Scheduler, SweepEngine};
use examflow_store::config::load_config_from;
use examflow_store::LogNotifier;

pub async fn execute(plan_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let plans = super::load_plans(&plan_path)?;
    let store = super::seed_store(&plans)?;

    let engine = Arc::new(SweepEngine::new(
        store,
        Arc::new(LogNotifier),
        config.engine_config(),
    ));

    eprintln!(
        "examflow v0.1.0 — sweeping every {}s (violation threshold {}, reminder lead {}m)",
        config.sweep_interval_seconds, config.violation_threshold, config.reminder_lead_minutes
    );
    eprintln!("Press Ctrl-C to stop.");

    let handle = Scheduler::new(engine).spawn();
    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");
    handle.shutdown().await;

    Ok(())
}
