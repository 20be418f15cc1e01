//! Attendance ingestion, per-student summaries and detention risk.

pub mod analytics;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ingest;
pub mod models;
pub mod report;
pub mod risk;
pub mod session;
