//! Result expectations and their validation
//!
//! Definitions declare expectations as a list of `{comparator: {path: value}}`
//! maps, e.g.
//!
//! ```yaml
//! expectations:
//!   - le: { "$.OverallClientLatencies.Total.q50": 2.0 }
//!   - ge: { "$.OverallQueryRates.Total": 18000 }
//! ```
//!
//! Each entry is flattened into one [`Expectation`] per path, in file order.
//! [`validate`] checks them against the benchmark's JSON results.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{error, info};

/// Tolerance used by `eq` and `ne`
const EPSILON: f64 = 1e-9;

/// How an actual value is compared to the declared threshold
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    /// Whether `actual <op> expected` holds
    pub fn holds(self, actual: f64, expected: f64) -> bool {
        match self {
            Self::Eq => (actual - expected).abs() <= EPSILON,
            Self::Ne => (actual - expected).abs() > EPSILON,
            Self::Lt => actual < expected,
            Self::Le => actual <= expected,
            Self::Gt => actual > expected,
            Self::Ge => actual >= expected,
        }
    }

    /// Mathematical symbol, for log lines and tables
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A single threshold on one field of the benchmark results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expectation {
    pub comparator: Comparator,
    /// Dotted JSON path, e.g. `$.OverallQueryRates.Total`
    pub path: String,
    pub expected: f64,
}

impl Expectation {
    pub fn new(comparator: Comparator, path: impl Into<String>, expected: f64) -> Self {
        Self {
            comparator,
            path: path.into(),
            expected,
        }
    }

    /// Check this expectation against a results document
    pub fn check(&self, results: &Value) -> ExpectationOutcome {
        let (actual, reason) = match lookup(results, &self.path) {
            None => (None, Some("path not found".to_string())),
            Some(value) => match as_number(value) {
                Some(n) => (Some(n), None),
                None => (None, Some(format!("value is not numeric: {value}"))),
            },
        };

        let passed = actual.is_some_and(|a| self.comparator.holds(a, self.expected));
        let reason = reason.or_else(|| {
            (!passed).then(|| {
                format!(
                    "actual {}, expected {} {}",
                    actual.unwrap_or_default(),
                    self.comparator.symbol(),
                    self.expected
                )
            })
        });

        ExpectationOutcome {
            comparator: self.comparator,
            path: self.path.clone(),
            expected: self.expected,
            actual,
            passed,
            reason,
        }
    }
}

/// Outcome of checking one [`Expectation`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectationOutcome {
    pub comparator: Comparator,
    pub path: String,
    pub expected: f64,
    /// Value found in the results (None if missing or not numeric)
    pub actual: Option<f64>,
    pub passed: bool,
    /// Why the check failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// All expectation outcomes for one deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub outcomes: Vec<ExpectationOutcome>,
}

impl ValidationReport {
    /// True when every expectation held (or there were none)
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExpectationOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

/// Validate benchmark results against a list of expectations.
///
/// Every expectation is checked even after a failure so the report lists all
/// of them. Failures are logged at error level.
pub fn validate(expectations: &[Expectation], results: &Value) -> ValidationReport {
    let outcomes = expectations
        .iter()
        .map(|expectation| {
            let outcome = expectation.check(results);
            if outcome.passed {
                info!(
                    path = %outcome.path,
                    actual = ?outcome.actual,
                    condition = %format!("{} {}", outcome.comparator.symbol(), outcome.expected),
                    "Expectation met"
                );
            } else {
                error!(
                    path = %outcome.path,
                    actual = ?outcome.actual,
                    condition = %format!("{} {}", outcome.comparator.symbol(), outcome.expected),
                    reason = outcome.reason.as_deref().unwrap_or_default(),
                    "Expectation failed"
                );
            }
            outcome
        })
        .collect();

    ValidationReport { outcomes }
}

/// Resolve a dotted JSON path (`$.a.b[0].c`) inside a document
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);

    let mut current = document;
    if trimmed.is_empty() {
        return Some(current);
    }

    for segment in trimmed.split('.') {
        let (key, indices) = split_indices(segment)?;
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Split `key[1][2]` into `("key", [1, 2])`
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };

    let key = &segment[..open];
    let mut rest = &segment[open..];
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((key, indices))
}

/// Numbers and numeric strings both count as numeric
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deserialize the `expectations:` list, flattening each comparator map.
pub(crate) fn deserialize_expectations<'de, D>(deserializer: D) -> Result<Vec<Expectation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_yaml::Mapping>> = Option::deserialize(deserializer)?;

    let mut expectations = Vec::new();
    for entry in raw.unwrap_or_default() {
        for (key, rules) in entry {
            let comparator: Comparator = serde_yaml::from_value(key.clone()).map_err(|_| {
                D::Error::custom(format!(
                    "unknown comparator {key:?}, expected one of eq, ne, lt, le, gt, ge"
                ))
            })?;
            let serde_yaml::Value::Mapping(rules) = rules else {
                return Err(D::Error::custom(format!(
                    "comparator '{comparator}' must map result paths to numbers"
                )));
            };
            for (path, threshold) in rules {
                let path = path
                    .as_str()
                    .ok_or_else(|| D::Error::custom("expectation path must be a string"))?;
                let expected = yaml_number(&threshold).ok_or_else(|| {
                    D::Error::custom(format!("threshold for '{path}' must be numeric"))
                })?;
                expectations.push(Expectation::new(comparator, path, expected));
            }
        }
    }
    Ok(expectations)
}

fn yaml_number(value: &serde_yaml::Value) -> Option<f64> {
    match value {
        serde_yaml::Value::Number(n) => n.as_f64(),
        serde_yaml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_results() -> Value {
        json!({
            "OverallQueryRates": { "Total": 18250.5 },
            "OverallClientLatencies": { "Total": { "q50": 1.75, "q99": "4.2" } },
            "Totals": [ { "Errors": 0 } ],
            "Tool": "redisgraph-benchmark-go"
        })
    }

    #[test]
    fn test_lookup_paths() {
        let results = sample_results();
        assert_eq!(
            lookup(&results, "$.OverallQueryRates.Total"),
            Some(&json!(18250.5))
        );
        assert_eq!(
            lookup(&results, "OverallClientLatencies.Total.q50"),
            Some(&json!(1.75))
        );
        assert_eq!(lookup(&results, "$.Totals[0].Errors"), Some(&json!(0)));
        assert_eq!(lookup(&results, "$"), Some(&results));
        assert!(lookup(&results, "$.Totals[3].Errors").is_none());
        assert!(lookup(&results, "$.Missing.Field").is_none());
        assert!(lookup(&results, "$.Totals[x]").is_none());
    }

    #[test]
    fn test_comparators() {
        assert!(Comparator::Ge.holds(10.0, 10.0));
        assert!(!Comparator::Gt.holds(10.0, 10.0));
        assert!(Comparator::Le.holds(1.0, 2.0));
        assert!(!Comparator::Lt.holds(2.0, 2.0));
        assert!(Comparator::Eq.holds(0.1 + 0.2, 0.3));
        assert!(Comparator::Ne.holds(1.0, 1.5));
    }

    #[test]
    fn test_validate_all_pass() {
        let expectations = vec![
            Expectation::new(Comparator::Ge, "$.OverallQueryRates.Total", 18000.0),
            Expectation::new(Comparator::Le, "$.OverallClientLatencies.Total.q50", 2.0),
            // Numeric strings are accepted
            Expectation::new(Comparator::Lt, "$.OverallClientLatencies.Total.q99", 5.0),
        ];
        let report = validate(&expectations, &sample_results());
        assert!(report.passed());
        assert_eq!(report.passed_count(), 3);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn test_validate_reports_every_failure() {
        let expectations = vec![
            Expectation::new(Comparator::Ge, "$.OverallQueryRates.Total", 20000.0),
            Expectation::new(Comparator::Le, "$.OverallClientLatencies.Total.q50", 2.0),
            Expectation::new(Comparator::Eq, "$.Nope", 1.0),
            Expectation::new(Comparator::Eq, "$.Tool", 1.0),
        ];
        let report = validate(&expectations, &sample_results());
        assert!(!report.passed());
        assert_eq!(report.total(), 4);
        assert_eq!(report.passed_count(), 1);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].actual, Some(18250.5));
        assert_eq!(
            failures[0].reason.as_deref(),
            Some("actual 18250.5, expected >= 20000")
        );
        assert_eq!(failures[1].reason.as_deref(), Some("path not found"));
        assert!(failures[2].reason.as_deref().unwrap().starts_with("value is not numeric"));
    }

    #[test]
    fn test_no_expectations_pass() {
        let report = validate(&[], &sample_results());
        assert!(report.passed());
        assert_eq!(report.total(), 0);
    }

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "deserialize_expectations")]
        expectations: Vec<Expectation>,
    }

    #[test]
    fn test_deserialize_flattens_in_order() {
        let yaml = r#"
expectations:
  - le: { "$.OverallClientLatencies.Total.q50": 2.0 }
  - ge:
      "$.OverallQueryRates.Total": 18000
      "$.OverallQueryRates.Read": "9000"
    eq: { "$.Totals[0].Errors": 0 }
"#;
        let parsed: Wrapper = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed.expectations,
            vec![
                Expectation::new(Comparator::Le, "$.OverallClientLatencies.Total.q50", 2.0),
                Expectation::new(Comparator::Ge, "$.OverallQueryRates.Total", 18000.0),
                Expectation::new(Comparator::Ge, "$.OverallQueryRates.Read", 9000.0),
                Expectation::new(Comparator::Eq, "$.Totals[0].Errors", 0.0),
            ]
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_comparator() {
        let yaml = "expectations:\n  - between: { \"$.x\": 1 }\n";
        let err = serde_yaml::from_str::<Wrapper>(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown comparator"));
    }

    #[test]
    fn test_deserialize_null_is_empty() {
        let parsed: Wrapper = serde_yaml::from_str("expectations:\n").unwrap();
        assert!(parsed.expectations.is_empty());
    }
}
