//! Helpers for testing the engine.
//!
//! This module re-exports all helpers from the `keepwarm-test` crate so test
//! code can use them through `crate::test`.

pub use keepwarm_test::*;
