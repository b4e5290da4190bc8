//! Local validation of definitions and results files
//!
//! Lets definitions and expectations be checked without provisioning anything.

use crate::benchmark::read_results;
use anyhow::Result;
use rmbench_common::{BenchmarkDefinition, ValidationReport, load_definitions, validate};
use std::path::Path;

/// Outcome of `rmbench check`
#[derive(Debug)]
pub struct CheckReport {
    pub definitions: Vec<BenchmarkDefinition>,
    /// Test name and report, when a results file was validated
    pub validation: Option<(String, ValidationReport)>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.validation
            .as_ref()
            .is_none_or(|(_, report)| report.passed())
    }
}

/// Load every definition in `dir`; optionally validate `results` against one of them.
///
/// `test` may be omitted when the directory holds exactly one definition.
pub fn run_check(dir: &Path, results: Option<&Path>, test: Option<&str>) -> Result<CheckReport> {
    let definitions = load_definitions(dir)?;

    let validation = match results {
        None => None,
        Some(results_path) => {
            let definition = match test {
                Some(name) => definitions
                    .iter()
                    .find(|d| d.name == name)
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "No benchmark definition named '{}' in {}",
                            name,
                            dir.display()
                        )
                    })?,
                None => match definitions.as_slice() {
                    [only] => only,
                    _ => anyhow::bail!(
                        "{} definitions found, use --test to pick the one to validate against",
                        definitions.len()
                    ),
                },
            };
            let values = read_results(results_path)?;
            let report = validate(&definition.expectations, &values);
            Some((definition.name.clone(), report))
        }
    };

    Ok(CheckReport {
        definitions,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmbench_test_utils::{BenchmarkDir, sample_results};

    #[test]
    fn test_check_definitions_only() {
        let dir = BenchmarkDir::new();
        dir.add_definition("A", &["./setup"], &[("ge", "$.OverallQueryRates.Total", "10")]);
        dir.add_definition("B", &["./setup"], &[]);

        let report = run_check(dir.path(), None, None).unwrap();
        assert_eq!(report.definitions.len(), 2);
        assert!(report.validation.is_none());
        assert!(report.passed());
    }

    #[test]
    fn test_check_results() {
        let dir = BenchmarkDir::new();
        dir.add_definition("A", &["./setup"], &[("ge", "$.OverallQueryRates.Total", "10")]);
        dir.add_definition(
            "B",
            &["./setup"],
            &[("ge", "$.OverallQueryRates.Total", "1000000")],
        );
        let results = dir.write_results("results.json", &sample_results());

        let ok = run_check(dir.path(), Some(&results), Some("A")).unwrap();
        assert!(ok.passed());
        assert_eq!(ok.validation.as_ref().unwrap().0, "A");

        let failing = run_check(dir.path(), Some(&results), Some("B")).unwrap();
        assert!(!failing.passed());

        let ambiguous = run_check(dir.path(), Some(&results), None).unwrap_err();
        assert!(ambiguous.to_string().contains("use --test"));

        let unknown = run_check(dir.path(), Some(&results), Some("C")).unwrap_err();
        assert!(unknown.to_string().contains("'C'"));
    }
}
