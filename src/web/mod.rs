//! HTTP interface for operators: manual drive, tracking toggle, maintenance
//! requests and the latest telemetry.

pub mod api;
pub mod models;
