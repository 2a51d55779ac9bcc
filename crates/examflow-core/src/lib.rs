//! examflow-core — Exam lifecycle engine, trait seams, and violation tracking.
//!
//! This crate defines the data model, the store and notifier contracts, the
//! exam and submission state machines, and the periodic sweep that the entire
//! examflow system builds on.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod plan;
pub mod submission;
pub mod sweep;
pub mod traits;
pub mod violations;
