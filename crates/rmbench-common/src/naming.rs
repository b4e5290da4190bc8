//! Names for remote setups and published artifacts

use chrono::{DateTime, Utc};

/// Full terraform setup name: `{setup}{suffix}-{sha}`
pub fn setup_name(setup_basename: &str, suffix: &str, sha: &str) -> String {
    format!("{setup_basename}{suffix}-{sha}")
}

/// Replace characters that do not belong in an object key component
pub fn sanitize_key_component(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '-' } else { c })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Object key for a published results file:
/// `{project}/{test}/{setup}/{YYYYMMDD-HHMMSS}-{sha}-benchmark-result.json`
pub fn artifact_key(
    project: &str,
    test_name: &str,
    setup_name: &str,
    sha: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}/{}/{}/{}-{}-benchmark-result.json",
        sanitize_key_component(&project.to_lowercase()),
        sanitize_key_component(test_name),
        sanitize_key_component(setup_name),
        at.format("%Y%m%d-%H%M%S"),
        sanitize_key_component(sha),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_setup_name() {
        assert_eq!(
            setup_name("tf-oss-redisgraph-standalone-r5", "", "abc123"),
            "tf-oss-redisgraph-standalone-r5-abc123"
        );
        assert_eq!(
            setup_name("tf-oss-redisgraph-standalone-r5", "-nightly", "abc123"),
            "tf-oss-redisgraph-standalone-r5-nightly-abc123"
        );
    }

    #[test]
    fn test_sanitize_key_component() {
        assert_eq!(sanitize_key_component("UPDATE BASELINE"), "UPDATE-BASELINE");
        assert_eq!(sanitize_key_component("a/b\\c"), "a-b-c");
        assert_eq!(sanitize_key_component("  "), "unnamed");
    }

    #[test]
    fn test_artifact_key() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            artifact_key("RedisGraph", "UPDATE-BASELINE", "tf-r5-abc", "abc", at),
            "redisgraph/UPDATE-BASELINE/tf-r5-abc/20240309-140507-abc-benchmark-result.json"
        );
    }
}
