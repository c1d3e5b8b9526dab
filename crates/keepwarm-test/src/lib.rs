//! Helpers for testing the keepwarm engine.
//!
//! When writing tests, call [`setup`] first in every test. This sets up the
//! logger so that all console output is captured by the test runner.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
/// - Initializes logs: the logger only captures logs from the
///   `keepwarm-service` crate and mutes everything else.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("keepwarm_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}
