//! examflow-store — Store and notifier implementations.
//!
//! Implements the `Store` and `Notifier` traits from `examflow-core` with an
//! in-memory compare-and-set store and logging/recording notifiers, plus
//! configuration loading for the CLI.

pub mod config;
pub mod memory;
pub mod notifier;

pub use config::{load_config, load_config_from, ExamflowConfig};
pub use memory::MemoryStore;
pub use notifier::{Dispatch, LogNotifier, RecordingNotifier};
