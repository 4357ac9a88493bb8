//! Integration test infrastructure for the gNMI southbound bridge
//!
//! Provides:
//! - A fixture schema and device records
//! - A harness wiring the daemon to mock sessions
//! - Operational store verification helpers
//! - Cross-crate scenario tests

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
