//! Orchestration engine for benchmark runs
//!
//! `RunEngine` walks every selected definition over every terraform setup it
//! declares, one deployment at a time. Each deployment is provisioned,
//! benchmarked, validated and (unless `--keep`) torn down again.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rmbench_common::defaults::DEFAULT_SSH_READY_TIMEOUT;
use rmbench_common::naming::setup_name;
use rmbench_common::{BenchmarkDefinition, DeploymentTarget, validate};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::types::{DeploymentOutcome, DeploymentStatus, RunSummary};
use crate::benchmark::run_remote_benchmark;
use crate::config::RunConfig;
use crate::env::Identity;
use crate::aws::{ObjectStore, S3Client};
use crate::publish::{ArtifactMeta, ArtifactPublisher};
use crate::remote::{RemoteHost, Ssh};
use crate::setup::{install_benchmark_tool, spin_up_server};
use crate::terraform::{Deployment, ProvisionVars, Terraform};

/// Run `fut` unless `cancel` fires first, in which case it is dropped
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        result = fut => result,
        _ = cancel.cancelled() => Err(anyhow::anyhow!("Deployment cancelled")),
    }
}

/// Sequential deployment engine for one run
pub struct RunEngine<S = S3Client> {
    config: RunConfig,
    identity: Identity,
    ssh: Ssh,
    terraform_env: Vec<(String, String)>,
    publisher: Option<ArtifactPublisher<S>>,
    ssh_ready_timeout: Duration,
}

impl<S> std::fmt::Debug for RunEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEngine")
            .field("identity", &self.identity)
            .field("publishing", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

impl RunEngine {
    pub fn new(config: RunConfig, identity: Identity, ssh: Ssh) -> Self {
        Self {
            config,
            identity,
            ssh,
            terraform_env: Vec::new(),
            publisher: None,
            ssh_ready_timeout: Duration::from_secs(DEFAULT_SSH_READY_TIMEOUT),
        }
    }
}

impl<S: ObjectStore> RunEngine<S> {
    /// Extra environment for every terraform invocation (provider credentials)
    pub fn with_terraform_env(mut self, env: Vec<(String, String)>) -> Self {
        self.terraform_env = env;
        self
    }

    /// Publish every results file through `publisher`
    pub fn with_publisher<T: ObjectStore>(self, publisher: ArtifactPublisher<T>) -> RunEngine<T> {
        RunEngine {
            config: self.config,
            identity: self.identity,
            ssh: self.ssh,
            terraform_env: self.terraform_env,
            publisher: Some(publisher),
            ssh_ready_timeout: self.ssh_ready_timeout,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Full setup name of a target for this run
    pub fn setup_name(&self, target: &DeploymentTarget) -> String {
        setup_name(
            &target.setup_basename(),
            &self.config.provision.setup_name_suffix,
            &self.identity.sha,
        )
    }

    fn provision_vars(&self, setup_name: &str) -> ProvisionVars {
        ProvisionVars {
            github_sha: self.identity.sha.clone(),
            github_actor: self.identity.actor.clone(),
            setup_name: setup_name.to_string(),
            github_repo: self.identity.repo.clone(),
            redis_module: self.config.provision.redis_module.clone(),
        }
    }

    /// Run every deployment of every definition, in order
    pub async fn run(
        &self,
        definitions: &[BenchmarkDefinition],
        cancel: &CancellationToken,
    ) -> RunSummary {
        let run_id = Uuid::now_v7().to_string();
        let started_at = Utc::now();
        let mut outcomes = Vec::new();

        info!(
            run_id = %run_id,
            definitions = definitions.len(),
            repo = %self.identity.repo,
            sha = %self.identity.sha,
            "Starting benchmark run"
        );

        for definition in definitions {
            let targets = definition.deployment_targets();
            if targets.is_empty() {
                warn!(test = %definition.name, "No terraform targets declared, skipping");
            }
            for target in targets {
                let outcome = self.run_deployment(definition, &target, cancel).await;
                info!(
                    test = %outcome.test_name,
                    setup = %outcome.setup_name,
                    status = %outcome.status,
                    duration_secs = outcome.duration_secs,
                    "Deployment finished"
                );
                outcomes.push(outcome);
            }
        }

        RunSummary {
            run_id,
            identity: self.identity.clone(),
            started_at,
            finished_at: Utc::now(),
            dry_run: false,
            outcomes,
        }
    }

    /// One definition on one setup. Never fails: errors end up in the outcome.
    pub async fn run_deployment(
        &self,
        definition: &BenchmarkDefinition,
        target: &DeploymentTarget,
        cancel: &CancellationToken,
    ) -> DeploymentOutcome {
        let setup_name = self.setup_name(target);
        let mut outcome = DeploymentOutcome::new(&definition.name, &target.declared, &setup_name);

        if cancel.is_cancelled() {
            outcome.status = DeploymentStatus::Cancelled;
            outcome.finish();
            return outcome;
        }

        info!(
            test = %definition.name,
            setup = %setup_name,
            dir = %target.working_dir.display(),
            "Starting deployment"
        );

        // terraform is interrupted with SIGINT on cancel, so it can record
        // whatever it already created before teardown starts.
        let terraform = Terraform::new(
            self.config.provision.terraform_bin.as_str(),
            target.working_dir.as_path(),
        )
        .with_env(self.terraform_env.clone())
        .with_cancel(cancel);
        let vars = self.provision_vars(&setup_name);

        if let Err(e) = terraform.init().await {
            if cancel.is_cancelled() {
                outcome.status = DeploymentStatus::Cancelled;
            } else {
                error!(setup = %setup_name, error = %e, "terraform init failed");
                outcome.record_error(&e);
            }
            outcome.finish();
            return outcome;
        }
        if cancel.is_cancelled() {
            outcome.status = DeploymentStatus::Cancelled;
            outcome.finish();
            return outcome;
        }

        // From here on the setup may hold resources: always tear down.
        match self
            .execute(definition, &terraform, &vars, &mut outcome, cancel)
            .await
        {
            Err(_) if cancel.is_cancelled() => {
                warn!(setup = %setup_name, "Deployment cancelled");
                outcome.status = DeploymentStatus::Cancelled;
            }
            Err(e) => {
                error!(setup = %setup_name, error = %e, "Deployment failed");
                outcome.record_error(&e);
            }
            Ok(()) => {}
        }

        if self.config.keep() {
            info!(setup = %setup_name, "Keeping infrastructure (--keep)");
            outcome.kept = true;
        } else if let Err(e) = terraform.destroy(&vars).await {
            error!(setup = %setup_name, error = %e, "Teardown failed");
            outcome.teardown_error = Some(format!("{e:#}"));
            outcome.status = DeploymentStatus::Errored;
        }

        outcome.finish();
        outcome
    }

    async fn execute(
        &self,
        definition: &BenchmarkDefinition,
        terraform: &Terraform,
        vars: &ProvisionVars,
        outcome: &mut DeploymentOutcome,
        cancel: &CancellationToken,
    ) -> Result<()> {
        terraform.apply(vars).await?;
        let deployment = Deployment::from_outputs(&terraform.outputs().await?)?;
        info!(
            setup = %vars.setup_name,
            server = %deployment.server_public_ip,
            client = %deployment.client_public_ip,
            "Setup provisioned"
        );

        let server = RemoteHost::new(&deployment.server_public_ip, &deployment.username);
        let client = RemoteHost::new(&deployment.client_public_ip, &deployment.username);
        self.ssh
            .wait_until_reachable(&server, self.ssh_ready_timeout, Some(cancel))
            .await?;
        self.ssh
            .wait_until_reachable(&client, self.ssh_ready_timeout, Some(cancel))
            .await?;

        let benchmark = &self.config.benchmark;
        until_cancelled(
            cancel,
            spin_up_server(
                &self.ssh,
                &server,
                deployment.server_port,
                &definition.dbconfig,
                definition.base_dir(),
                &benchmark.module_path,
                Some(cancel),
            ),
        )
        .await?;
        until_cancelled(
            cancel,
            install_benchmark_tool(&self.ssh, &client, &benchmark.benchmark_tool_url),
        )
        .await?;

        let results = until_cancelled(
            cancel,
            run_remote_benchmark(
                &self.ssh,
                &client,
                &deployment.server_private_ip,
                deployment.server_port,
                &definition.clientconfig,
                &benchmark.results_file,
                benchmark.benchmark_timeout,
            ),
        )
        .await?;

        outcome.validation = validate(&definition.expectations, &results);
        outcome.status = if outcome.validation.passed() {
            DeploymentStatus::Passed
        } else {
            DeploymentStatus::Failed
        };

        if let Some(publisher) = &self.publisher {
            let meta = ArtifactMeta {
                project: &self.config.provision.redis_module,
                test_name: &definition.name,
                setup_name: &vars.setup_name,
                sha: &self.identity.sha,
                at: Utc::now(),
            };
            let location =
                until_cancelled(cancel, publisher.publish(&benchmark.results_file, &meta)).await?;
            outcome.artifact = Some(location);
        }

        Ok(())
    }
}
