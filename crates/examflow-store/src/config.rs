//! Configuration loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examflow_core::config::EngineConfig;

/// Top-level examflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamflowConfig {
    /// Violation count at which an attempt is forcibly terminated.
    #[serde(default = "default_threshold")]
    pub violation_threshold: u64,
    /// Seconds between scheduler sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Minutes of lead time for start reminders and end warnings.
    #[serde(default = "default_reminder_lead")]
    pub reminder_lead_minutes: i64,
}

fn default_threshold() -> u64 {
    3
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_reminder_lead() -> i64 {
    5
}

impl Default for ExamflowConfig {
    fn default() -> Self {
        Self {
            violation_threshold: default_threshold(),
            sweep_interval_seconds: default_sweep_interval(),
            reminder_lead_minutes: default_reminder_lead(),
        }
    }
}

impl ExamflowConfig {
    /// The engine-facing view of this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            violation_threshold: self.violation_threshold,
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
            reminder_lead_minutes: self.reminder_lead_minutes,
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examflow.toml` in the current directory
/// 2. `~/.config/examflow/config.toml`
///
/// Environment variable overrides: `VIOLATION_THRESHOLD`,
/// `SWEEP_INTERVAL_SECONDS`, `REMINDER_LEAD_MINUTES`.
pub fn load_config() -> Result<ExamflowConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamflowConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examflow.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamflowConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamflowConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut ExamflowConfig) -> Result<()> {
    if let Ok(v) = std::env::var("VIOLATION_THRESHOLD") {
        config.violation_threshold = v
            .parse()
            .with_context(|| format!("VIOLATION_THRESHOLD: '{v}' is not an integer"))?;
    }
    if let Ok(v) = std::env::var("SWEEP_INTERVAL_SECONDS") {
        config.sweep_interval_seconds = v
            .parse()
            .with_context(|| format!("SWEEP_INTERVAL_SECONDS: '{v}' is not an integer"))?;
    }
    if let Ok(v) = std::env::var("REMINDER_LEAD_MINUTES") {
        config.reminder_lead_minutes = v
            .parse()
            .with_context(|| format!("REMINDER_LEAD_MINUTES: '{v}' is not an integer"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examflow"))
}
