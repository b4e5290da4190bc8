//! Main orchestration logic for benchmark runs
//!
//! Loads and selects definitions, prepares credentials and tooling, then
//! hands the deployments to [`RunEngine`].

pub mod engine;
pub mod results;
pub mod types;

pub use engine::RunEngine;
pub use results::{print_results_summary, write_report};
pub use types::{DeploymentOutcome, DeploymentStatus, RunSummary};

use crate::aws::AwsContext;
use crate::benchmark::benchmark_command;
use crate::config::{RunConfig, SelectionConfig};
use crate::env::{Credentials, CredentialsError, Identity};
use crate::publish::ArtifactPublisher;
use crate::remote::Ssh;
use anyhow::{Context, Result};
use chrono::Utc;
use rmbench_common::defaults::DEFAULT_SERVER_PORT;
use rmbench_common::{BenchmarkDefinition, load_definitions};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Keep the definitions the selection asks for.
///
/// Every requested name must exist.
pub fn select_definitions(
    definitions: Vec<BenchmarkDefinition>,
    selection: &SelectionConfig,
) -> Result<Vec<BenchmarkDefinition>> {
    for name in &selection.tests {
        if !definitions.iter().any(|d| &d.name == name) {
            anyhow::bail!(
                "No benchmark definition named '{}' in {}",
                name,
                selection.benchmarks_dir.display()
            );
        }
    }
    Ok(definitions
        .into_iter()
        .filter(|d| selection.selects(&d.name))
        .collect())
}

/// Print what a run would do, and return the skipped outcomes
fn print_plan(
    engine: &RunEngine,
    definitions: &[BenchmarkDefinition],
    identity: &Identity,
) -> Vec<DeploymentOutcome> {
    let config = engine.config();
    println!("\n=== DRY RUN ===\n");
    println!("  Repository:     {}", identity.repo);
    println!("  Commit:         {}", identity.sha);
    println!("  Actor:          {}", identity.actor);
    println!("  Module:         {}", config.benchmark.module_path.display());
    println!("  Terraform:      {}", config.provision.terraform_bin);
    println!();

    let mut outcomes = Vec::new();
    for definition in definitions {
        println!("  {}", definition.name);
        if let Some(description) = &definition.description {
            println!("    {description}");
        }
        println!(
            "    expectations: {}",
            definition.expectations.len()
        );
        println!(
            "    benchmark:    {}",
            benchmark_command(&definition.clientconfig, "<server_private_ip>", DEFAULT_SERVER_PORT)
        );
        for target in definition.deployment_targets() {
            let setup_name = engine.setup_name(&target);
            println!(
                "    - {} ({})",
                setup_name,
                target.working_dir.display()
            );
            outcomes.push(DeploymentOutcome::new(
                &definition.name,
                &target.declared,
                &setup_name,
            ));
        }
        println!();
    }

    println!("  Options:");
    println!("    - Keep infrastructure: {}", config.keep());
    println!("    - Upload results:      {}", config.publish.upload_results_s3);
    if let Some(output) = config.output() {
        println!("    - Output file:         {}", output.display());
    }
    println!();
    println!("To run for real, remove the --dry-run flag.");
    outcomes
}

/// Run the benchmarks described by `config`.
///
/// Returns an error only for setup problems (definitions, credentials,
/// private key). Deployment failures are reported in the summary.
pub async fn run_benchmarks(
    config: RunConfig,
    identity: Identity,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    run_benchmarks_with(config, identity, cancel, Credentials::from_env).await
}

/// [`run_benchmarks`] with credentials supplied by `credentials` instead of
/// the process environment. Not called for a dry run.
pub async fn run_benchmarks_with<F>(
    config: RunConfig,
    identity: Identity,
    cancel: CancellationToken,
    credentials: F,
) -> Result<RunSummary>
where
    F: FnOnce() -> Result<Credentials, CredentialsError>,
{
    let definitions = load_definitions(&config.selection.benchmarks_dir)?;
    let definitions = select_definitions(definitions, &config.selection)?;
    info!(
        count = definitions.len(),
        dir = %config.selection.benchmarks_dir.display(),
        "Loaded benchmark definitions"
    );

    let summary = if config.dry_run() {
        let started_at = Utc::now();
        let ssh = Ssh::new(config.benchmark.private_key_path.clone());
        let engine = RunEngine::new(config.clone(), identity.clone(), ssh);
        let outcomes = print_plan(&engine, &definitions, &identity);
        RunSummary {
            run_id: Uuid::now_v7().to_string(),
            identity,
            started_at,
            finished_at: Utc::now(),
            dry_run: true,
            outcomes,
        }
    } else {
        let credentials = credentials()?;
        credentials
            .write_private_key(&config.benchmark.private_key_path)
            .context("Failed to prepare private key")?;

        let ssh = Ssh::new(config.benchmark.private_key_path.clone());
        let mut engine = RunEngine::new(config.clone(), identity, ssh)
            .with_terraform_env(credentials.provider_env());
        if config.publish.upload_results_s3 {
            let aws = AwsContext::from_credentials(&credentials).await;
            engine = engine.with_publisher(ArtifactPublisher::new(&aws, &config.publish.s3_bucket));
        }
        engine.run(&definitions, &cancel).await
    };

    print_results_summary(&summary);
    if let Some(path) = config.output() {
        write_report(path, &summary)?;
    }
    Ok(summary)
}
