//! Terraform driver
//!
//! Brings a named remote environment up and down by running the terraform CLI
//! in a setup's working directory, and reads back the connection details the
//! setup exports as outputs. Cancellation interrupts init, apply and output;
//! destroy always runs to completion.

use crate::command::{CommandConfig, CommandSpec, run_checked};
use anyhow::{Context, Result};
use rmbench_common::defaults::{DEFAULT_SERVER_PORT, DEFAULT_SSH_USER, DEFAULT_TERRAFORM_TIMEOUT};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Variables every setup receives with `-var`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionVars {
    pub github_sha: String,
    pub github_actor: String,
    pub setup_name: String,
    pub github_repo: String,
    pub redis_module: String,
}

impl ProvisionVars {
    /// `-var key=value` pairs in a stable order
    pub fn to_args(&self) -> Vec<String> {
        [
            ("github_sha", &self.github_sha),
            ("github_actor", &self.github_actor),
            ("setup_name", &self.setup_name),
            ("github_repo", &self.github_repo),
            ("redis_module", &self.redis_module),
        ]
        .into_iter()
        .flat_map(|(key, value)| ["-var".to_string(), format!("{key}={value}")])
        .collect()
    }
}

/// Terraform CLI bound to one working directory
#[derive(Debug, Clone)]
pub struct Terraform {
    bin: String,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
    timeout_secs: u64,
    cancel: Option<CancellationToken>,
}

impl Terraform {
    pub fn new(bin: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            working_dir: working_dir.into(),
            env: Vec::new(),
            timeout_secs: DEFAULT_TERRAFORM_TIMEOUT,
            cancel: None,
        }
    }

    /// Extra environment for every invocation (provider credentials)
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Interrupt init, apply and output with SIGINT when `cancel` fires
    pub fn with_cancel(mut self, cancel: &CancellationToken) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }

    fn command(&self, subcommand: &str) -> CommandSpec<'_> {
        CommandSpec::new(&self.bin)
            .arg(format!("-chdir={}", self.working_dir.display()))
            .arg(subcommand)
            .envs(&self.env)
            .arg("-no-color")
    }

    fn config(&self) -> CommandConfig {
        let config = CommandConfig::with_timeout_secs(self.timeout_secs);
        match &self.cancel {
            Some(cancel) => config.cancellable(cancel),
            None => config,
        }
    }

    pub async fn init(&self) -> Result<()> {
        info!(dir = %self.working_dir.display(), "Running terraform init");
        run_checked(&self.command("init").arg("-input=false"), &self.config())
            .await
            .context("terraform init failed")?;
        Ok(())
    }

    pub async fn apply(&self, vars: &ProvisionVars) -> Result<()> {
        info!(dir = %self.working_dir.display(), setup = %vars.setup_name, "Running terraform apply");
        let spec = self
            .command("apply")
            .args(["-auto-approve", "-input=false"])
            .args(vars.to_args());
        run_checked(&spec, &self.config())
            .await
            .context("terraform apply failed")?;
        Ok(())
    }

    pub async fn outputs(&self) -> Result<TerraformOutputs> {
        let output = run_checked(
            &self.command("output").arg("-json"),
            &self.config().quiet(),
        )
        .await
        .context("terraform output failed")?;
        TerraformOutputs::parse(&output.stdout)
    }

    pub async fn destroy(&self, vars: &ProvisionVars) -> Result<()> {
        info!(dir = %self.working_dir.display(), setup = %vars.setup_name, "Running terraform destroy");
        let spec = self
            .command("destroy")
            .args(["-auto-approve", "-input=false"])
            .args(vars.to_args());
        let config = CommandConfig::with_timeout_secs(self.timeout_secs);
        run_checked(&spec, &config)
            .await
            .context("terraform destroy failed")?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
    value: Value,
}

/// Parsed `terraform output -json`
#[derive(Debug, Default)]
pub struct TerraformOutputs {
    values: HashMap<String, Value>,
}

impl TerraformOutputs {
    pub fn parse(json: &str) -> Result<Self> {
        let entries: HashMap<String, OutputEntry> =
            serde_json::from_str(json).context("Failed to parse terraform output JSON")?;
        Ok(Self {
            values: entries.into_iter().map(|(k, e)| (k, e.value)).collect(),
        })
    }

    /// Output as a string. Numbers are stringified and lists yield their first element
    /// (setups often export `aws_instance.x.*.public_ip`).
    pub fn get_string(&self, name: &str) -> Option<String> {
        scalar_string(self.values.get(name)?)
    }

    pub fn require_string(&self, name: &str) -> Result<String> {
        self.get_string(name)
            .with_context(|| format!("terraform output '{name}' is missing or empty"))
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(scalar_string),
        _ => None,
    }
}

/// Connection details of a provisioned setup
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Deployment {
    pub username: String,
    pub server_private_ip: String,
    pub server_public_ip: String,
    pub server_port: u16,
    pub client_private_ip: String,
    pub client_public_ip: String,
}

impl Deployment {
    pub fn from_outputs(outputs: &TerraformOutputs) -> Result<Self> {
        let server_port = match outputs.get_string("server_plaintext_port") {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid server_plaintext_port output: {port}"))?,
            None => DEFAULT_SERVER_PORT,
        };

        Ok(Self {
            username: outputs
                .get_string("ssh_user")
                .unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
            server_private_ip: outputs.require_string("server_private_ip")?,
            server_public_ip: outputs.require_string("server_public_ip")?,
            server_port,
            client_private_ip: outputs.require_string("client_private_ip")?,
            client_public_ip: outputs.require_string("client_public_ip")?,
        })
    }
}
