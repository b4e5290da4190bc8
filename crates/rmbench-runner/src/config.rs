//! Configuration types for the runner

use std::path::PathBuf;

/// Where definitions come from and which of them run
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Directory scanned for `*.yml` / `*.yaml` definitions
    pub benchmarks_dir: PathBuf,
    /// Only run definitions with these names (empty = all)
    pub tests: Vec<String>,
}

impl SelectionConfig {
    /// Whether a definition with this name is part of the run
    pub fn selects(&self, name: &str) -> bool {
        self.tests.is_empty() || self.tests.iter().any(|t| t == name)
    }
}

/// Terraform provisioning parameters
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// terraform binary
    pub terraform_bin: String,
    /// Appended to the setup basename before the sha
    pub setup_name_suffix: String,
    /// Value of the `redis_module` terraform variable
    pub redis_module: String,
}

/// Benchmark execution parameters
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Local module build copied to the server
    pub module_path: PathBuf,
    /// Where the private key is written for ssh/scp
    pub private_key_path: PathBuf,
    /// Local path results are fetched to
    pub results_file: PathBuf,
    /// Download URL of the benchmark client
    pub benchmark_tool_url: String,
    /// Benchmark timeout in seconds
    pub benchmark_timeout: u64,
}

/// Result publishing
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub upload_results_s3: bool,
    pub s3_bucket: String,
}

/// Runtime behavior flags
#[derive(Debug, Clone, Default)]
pub struct RuntimeFlags {
    /// Leave infrastructure up after the benchmark
    pub keep: bool,
    /// Validate definitions and print the plan without touching anything remote
    pub dry_run: bool,
    /// Output JSON report path
    pub output: Option<PathBuf>,
}

/// Configuration for a benchmark run
///
/// Composed of focused sub-configs. The repository identity is resolved
/// separately since it may need `git`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub selection: SelectionConfig,
    pub provision: ProvisionConfig,
    pub benchmark: BenchmarkConfig,
    pub publish: PublishConfig,
    pub flags: RuntimeFlags,
}

impl RunConfig {
    pub fn keep(&self) -> bool {
        self.flags.keep
    }
    pub fn dry_run(&self) -> bool {
        self.flags.dry_run
    }
    pub fn output(&self) -> Option<&std::path::Path> {
        self.flags.output.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        let all = SelectionConfig {
            benchmarks_dir: PathBuf::from("."),
            tests: vec![],
        };
        assert!(all.selects("UPDATE-BASELINE"));

        let some = SelectionConfig {
            benchmarks_dir: PathBuf::from("."),
            tests: vec!["UPDATE-BASELINE".to_string()],
        };
        assert!(some.selects("UPDATE-BASELINE"));
        assert!(!some.selects("GRAPH500-SCALE18"));
    }
}
