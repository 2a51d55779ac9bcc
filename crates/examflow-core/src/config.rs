//! Engine configuration.

use std::time::Duration;

/// Tunables for the lifecycle engine and scheduler driver.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Violation count at which an attempt is forcibly terminated.
    pub violation_threshold: u64,
    /// How often the scheduler runs a sweep.
    pub sweep_interval: Duration,
    /// How far ahead of start/end time reminders and warnings go out.
    pub reminder_lead_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            violation_threshold: 3,
            sweep_interval: Duration::from_secs(60),
            reminder_lead_minutes: 5,
        }
    }
}

impl EngineConfig {
    /// The reminder lead window as a chrono duration, for time predicates.
    pub fn reminder_lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reminder_lead_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.violation_threshold, 3);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.reminder_lead(), chrono::Duration::minutes(5));
    }
}
