//! End-to-end tests for the OrbitWatch cycle engine
//!
//! This suite validates:
//! - Catalog ingest, including malformed records
//! - Screening and scoring of a known collision course
//! - Population aggregates: compliance, forecasts, Kessler Risk Index
//! - Deterministic re-runs and durable cycle history

pub mod fixtures;

#[cfg(test)]
mod cycle_scenarios;

#[cfg(test)]
mod history_tests;
