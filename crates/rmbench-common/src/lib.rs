//! rmbench-common - Shared types for rmbench
//!
//! This crate holds everything that does not talk to remote systems, so it
//! stays free of AWS and process-spawning dependencies.
//!
//! ## Modules
//!
//! - [`definition`]: YAML benchmark definitions and deployment targets
//! - [`defaults`]: Default configuration values and remote paths
//! - [`error`]: Definition loading errors
//! - [`expectations`]: Result thresholds and their validation
//! - [`naming`]: Setup names and artifact keys

pub mod defaults;
pub mod definition;
pub mod error;
pub mod expectations;
pub mod naming;

// Re-export commonly used types
pub use definition::{
    BenchmarkDefinition, ClientConfig, DatasetSource, DbConfig, DeploymentTarget, Query,
    load_definitions,
};
pub use error::DefinitionError;
pub use expectations::{Comparator, Expectation, ExpectationOutcome, ValidationReport, validate};
