//! Overtime report job
//!
//! This library collects daily overtime records kept as ConfigMaps, merges
//! them into a per-month aggregate, and mails the finished month as a
//! spreadsheet attachment.

pub mod config;
pub mod error;
pub mod helpers;
pub mod merge;
pub mod models;
pub mod service;
pub mod store;

pub use config::{Config, ReportFormat};
pub use error::Error;
pub use service::{Job, OvertimeService, RunSummary};

// Re-export key types for convenience
pub use models::overtime::{Entry, Report, ReportLine};
pub use store::{MemoryStore, OvertimeStore};
