//! Benchmark definition fixtures

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding benchmark definition files
pub struct BenchmarkDir {
    dir: TempDir,
}

impl Default for BenchmarkDir {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `{name}.yml` with one query, the given targets and
    /// `(comparator, path, value)` expectations.
    pub fn add_definition(
        &self,
        name: &str,
        targets: &[&str],
        expectations: &[(&str, &str, &str)],
    ) -> PathBuf {
        let mut yaml = format!("name: \"{name}\"\ndescription: \"{name} fixture\"\nci:\n  terraform:\n");
        for target in targets {
            yaml.push_str(&format!("    - \"{target}\"\n"));
        }
        yaml.push_str(
            "clientconfig:\n  graph: \"g\"\n  clients: 4\n  requests: 100\n  queries:\n    - q: \"MATCH (n) RETURN count(n)\"\n",
        );
        if !expectations.is_empty() {
            yaml.push_str("expectations:\n");
            for (comparator, path, value) in expectations {
                yaml.push_str(&format!("  - {comparator}: {{ \"{path}\": {value} }}\n"));
            }
        }
        self.write_file(&format!("{name}.yml"), &yaml)
    }

    /// Write an arbitrary file into the directory
    pub fn write_file(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    /// Write a JSON results file
    pub fn write_results(&self, file_name: &str, results: &Value) -> PathBuf {
        self.write_file(
            file_name,
            &serde_json::to_string_pretty(results).expect("serialize results"),
        )
    }
}

/// A results document shaped like the benchmark client's JSON output
pub fn sample_results() -> Value {
    json!({
        "StartTime": 1614857167,
        "EndTime": 1614857227,
        "Clients": 4,
        "MaxRps": 0,
        "OverallQueryRates": { "Total": 15234.5 },
        "OverallClientLatencies": {
            "Total": { "q50": 1.2, "q95": 2.5, "q99": 3.1 }
        },
        "OverallGraphInternalLatencies": {
            "Total": { "q50": 0.4, "q95": 0.9, "q99": 1.3 }
        },
        "Totals": { "Errors": 0 }
    })
}
