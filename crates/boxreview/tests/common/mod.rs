//! Shared test utilities for boxreview integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution against a temp-dir database
//! - Builder patterns for batches and config files

pub mod builders;
pub mod harness;

#[allow(unused_imports)]
pub use builders::*;
pub use harness::TestHarness;
