//! Benchmark definition loading and validation errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating benchmark definitions
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// Failed to read a definition file or directory
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("Failed to parse definition '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// name field is empty
    #[error("{path}: name cannot be empty")]
    EmptyName { path: PathBuf },

    /// clientconfig.queries is empty
    #[error("{path}: clientconfig.queries must contain at least one query")]
    NoQueries { path: PathBuf },

    /// A query has an empty statement
    #[error("{path}: query #{index} has an empty statement")]
    EmptyQuery { path: PathBuf, index: usize },

    /// A query ratio is zero, negative or not finite
    #[error("{path}: query #{index} ratio must be a positive number, got {ratio}")]
    InvalidRatio {
        path: PathBuf,
        index: usize,
        ratio: f64,
    },

    /// clientconfig.clients is zero
    #[error("{path}: clientconfig.clients must be at least 1")]
    InvalidClients { path: PathBuf },

    /// An expectation path is empty
    #[error("{path}: expectation #{index} has an empty result path")]
    EmptyExpectationPath { path: PathBuf, index: usize },

    /// A ci.terraform entry does not name a setup directory
    #[error("{path}: ci.terraform entry '{target}' does not name a setup directory")]
    InvalidTarget { path: PathBuf, target: String },

    /// Directory contains no definitions
    #[error("No benchmark definitions (*.yml, *.yaml) found in '{0}'")]
    NoDefinitions(PathBuf),
}

impl DefinitionError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DefinitionError::InvalidRatio {
            path: PathBuf::from("bench.yml"),
            index: 2,
            ratio: -1.0,
        };
        assert_eq!(
            err.to_string(),
            "bench.yml: query #2 ratio must be a positive number, got -1"
        );
        assert_eq!(
            DefinitionError::NoDefinitions(PathBuf::from("/tmp/empty")).to_string(),
            "No benchmark definitions (*.yml, *.yaml) found in '/tmp/empty'"
        );
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DefinitionError::io("/path/to/bench.yml", io_err);
        assert!(err.to_string().contains("/path/to/bench.yml"));
    }
}
