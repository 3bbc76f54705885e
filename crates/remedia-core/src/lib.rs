//! remedia-core — Assessment analytics and the remediation engine.
//!
//! This crate owns the data model, the tolerant schema resolution and
//! attempt reduction of assessment tables, per-student and per-question
//! statistics, weak-item classification, and the orchestrator that turns
//! each weak student into a delivered study guide.

pub mod analysis;
pub mod classify;
pub mod engine;
pub mod error;
pub mod job;
pub mod message;
pub mod model;
pub mod reducer;
pub mod report;
pub mod schema;
pub mod statistics;
pub mod table;
pub mod topics;
pub mod traits;
