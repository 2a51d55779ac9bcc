//! examflow CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examflow", version, about = "Exam lifecycle and integrity enforcement engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic scheduler against a seeded store until interrupted
    Serve {
        /// Path to a .toml exam plan or a directory of plans
        #[arg(long)]
        plan: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run exactly one sweep and print what it did
    Sweep {
        /// Path to a .toml exam plan or a directory of plans
        #[arg(long)]
        plan: PathBuf,

        /// Sweep time as RFC 3339 (default: now)
        #[arg(long)]
        at: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate exam plan TOML files
    Validate {
        /// Path to a plan file or directory
        #[arg(long)]
        plan: PathBuf,
    },

    /// Create starter config and example exam plan
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examflow=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { plan, config } => commands::serve::execute(plan, config).await,
        Commands::Sweep { plan, at, config } => commands::sweep::execute(plan, at, config).await,
        Commands::Validate { plan } => commands::validate::execute(plan),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
