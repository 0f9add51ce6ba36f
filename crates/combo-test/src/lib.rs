//! Combo Test Harness - Scenario builders and engine validation
//!
//! This crate provides:
//! - Ready-made field configurations for common form layouts
//! - Seeded random-configuration fuzzing of the update loop
//! - Tracing setup for tests

pub mod scenarios;
pub mod fuzzer;

pub use scenarios::*;
pub use fuzzer::*;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber honoring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
