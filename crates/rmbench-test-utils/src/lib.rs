//! Shared test utilities for rmbench
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and test run ID generation
//! - [`fixtures`]: benchmark definition directories and sample results
//! - [`fake_tools`]: stand-in `terraform`, `ssh` and `scp` executables

pub mod aws;
#[cfg(unix)]
pub mod fake_tools;
pub mod fixtures;

// Re-export commonly used items
pub use aws::{get_test_region, test_bucket, test_run_id};
#[cfg(unix)]
pub use fake_tools::{FakeTools, FakeToolsBuilder, sample_outputs};
pub use fixtures::{BenchmarkDir, sample_results};
