//! The `examflow init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create examflow.toml
    if std::path::Path::new("examflow.toml").exists() {
        println!("examflow.toml already exists, skipping.");
    } else {
        std::fs::write("examflow.toml", SAMPLE_CONFIG)?;
        println!("Created examflow.toml");
    }

    // Create example exam plan
    std::fs::create_dir_all("plans")?;
    let example_path = std::path::Path::new("plans/example.toml");
    if example_path.exists() {
        println!("plans/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_PLAN)?;
        println!("Created plans/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Adjust examflow.toml thresholds if needed");
    println!("  2. Run: examflow validate --plan plans/example.toml");
    println!("  3. Run: examflow serve --plan plans/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examflow configuration

# Violation count at which an in-progress attempt is forcibly terminated.
violation_threshold = 3

# Seconds between scheduler sweeps.
sweep_interval_seconds = 60

# Minutes of lead time for start reminders and end warnings.
reminder_lead_minutes = 5
"#;

const EXAMPLE_PLAN: &str = r#"[plan]
name = "Example midterm week"

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

[[exams]]
title = "Databases quiz"
duration_minutes = 30
start_time = "2026-03-03T14:00:00Z"
end_time = "2026-03-03T14:30:00Z"
enrolled = ["alice"]
"#;
