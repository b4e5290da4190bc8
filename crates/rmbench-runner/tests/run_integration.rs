//! `run_benchmarks` entry point tests that need no remote tooling

use rmbench_runner::config::{
    BenchmarkConfig, ProvisionConfig, PublishConfig, RunConfig, RuntimeFlags, SelectionConfig,
};
use rmbench_runner::env::Identity;
use rmbench_runner::orchestrator::{DeploymentStatus, run_benchmarks};
use rmbench_test_utils::BenchmarkDir;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

fn identity() -> Identity {
    Identity {
        repo: "RedisGraph".to_string(),
        sha: "abc123".to_string(),
        actor: "ci".to_string(),
    }
}

fn dry_run_config(dir: &BenchmarkDir, tests: Vec<String>, output: Option<PathBuf>) -> RunConfig {
    RunConfig {
        selection: SelectionConfig {
            benchmarks_dir: dir.path().to_path_buf(),
            tests,
        },
        provision: ProvisionConfig {
            terraform_bin: "terraform-not-installed".to_string(),
            setup_name_suffix: "-nightly".to_string(),
            redis_module: "RedisGraph".to_string(),
        },
        benchmark: BenchmarkConfig {
            module_path: PathBuf::from("/nonexistent/redisgraph.so"),
            private_key_path: dir.path().join("key.pem"),
            results_file: dir.path().join("benchmark-result.json"),
            benchmark_tool_url: "https://example.com/tool".to_string(),
            benchmark_timeout: 60,
        },
        publish: PublishConfig {
            upload_results_s3: false,
            s3_bucket: "unused".to_string(),
        },
        flags: RuntimeFlags {
            keep: false,
            dry_run: true,
            output,
        },
    }
}

#[tokio::test]
async fn test_dry_run_plans_every_deployment() {
    let dir = BenchmarkDir::new();
    dir.add_definition("A-TEST", &["./setup-r5", "./setup-m5"], &[]);
    dir.add_definition("B-TEST", &["./setup-r5"], &[]);
    let report = dir.path().join("report.json");

    let summary = run_benchmarks(
        dry_run_config(&dir, vec![], Some(report.clone())),
        identity(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.outcomes.len(), 3);
    assert!(
        summary
            .outcomes
            .iter()
            .all(|o| o.status == DeploymentStatus::Skipped)
    );
    assert_eq!(summary.outcomes[0].setup_name, "setup-r5-nightly-abc123");
    assert_eq!(summary.exit_code(), 0);
    assert!(!dir.path().join("key.pem").exists());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(written["dry_run"], true);
    assert_eq!(written["outcomes"].as_array().unwrap().len(), 3);
    assert_eq!(written["identity"]["repo"], "RedisGraph");
}

#[tokio::test]
async fn test_dry_run_test_filter() {
    let dir = BenchmarkDir::new();
    dir.add_definition("A-TEST", &["./setup-r5"], &[]);
    dir.add_definition("B-TEST", &["./setup-r5", "./setup-m5"], &[]);

    let summary = run_benchmarks(
        dry_run_config(&dir, vec!["B-TEST".to_string()], None),
        identity(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.outcomes.iter().all(|o| o.test_name == "B-TEST"));
}

#[tokio::test]
async fn test_unknown_test_is_rejected() {
    let dir = BenchmarkDir::new();
    dir.add_definition("A-TEST", &["./setup-r5"], &[]);

    let err = run_benchmarks(
        dry_run_config(&dir, vec!["MISSING".to_string()], None),
        identity(),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("MISSING"));
}

#[tokio::test]
async fn test_invalid_definition_aborts_run() {
    let dir = BenchmarkDir::new();
    dir.add_definition("A-TEST", &["./setup-r5"], &[]);
    dir.write_file("broken.yml", "name: \"\"\nclientconfig:\n  queries:\n    - q: RETURN 1\n");

    let err = run_benchmarks(
        dry_run_config(&dir, vec![], None),
        identity(),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("broken.yml"));
}

#[tokio::test]
async fn test_empty_directory_aborts_run() {
    let dir = BenchmarkDir::new();
    let err = run_benchmarks(
        dry_run_config(&dir, vec![], None),
        identity(),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(!err.to_string().is_empty());
}
