//! Core types for the orchestrator
//!
//! `DeploymentOutcome` records what happened to one definition on one
//! terraform setup; `RunSummary` collects them for the whole run.

use crate::env::Identity;
use chrono::{DateTime, Utc};
use rmbench_common::ValidationReport;
use serde::Serialize;

/// Final status of a deployment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentStatus {
    /// Benchmark ran and every expectation held
    Passed,
    /// Benchmark ran but at least one expectation failed
    Failed,
    /// A step errored (provisioning, setup, benchmark, upload or teardown)
    Errored,
    /// Interrupted before completion
    Cancelled,
    /// Not executed (dry run)
    Skipped,
}

impl DeploymentStatus {
    pub fn is_success(self) -> bool {
        matches!(self, DeploymentStatus::Passed)
    }
}

/// Outcome of one definition on one setup
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    pub test_name: String,
    /// Target as declared in the definition
    pub target: String,
    /// Full terraform setup name
    pub setup_name: String,
    pub status: DeploymentStatus,
    pub validation: ValidationReport,
    /// Error chain of the first failing step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error from `terraform destroy`, if teardown failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
    /// Whether infrastructure was left up
    pub kept: bool,
    /// Location of published results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl DeploymentOutcome {
    pub fn new(test_name: &str, target: &str, setup_name: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            target: target.to_string(),
            setup_name: setup_name.to_string(),
            status: DeploymentStatus::Skipped,
            validation: ValidationReport::default(),
            error: None,
            teardown_error: None,
            kept: false,
            artifact: None,
            started_at: Utc::now(),
            duration_secs: 0.0,
        }
    }

    /// Record an error; the first one wins
    pub fn record_error(&mut self, error: &anyhow::Error) {
        self.status = DeploymentStatus::Errored;
        if self.error.is_none() {
            self.error = Some(format!("{error:#}"));
        }
    }

    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_secs = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub identity: Identity,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub outcomes: Vec<DeploymentOutcome>,
}

impl RunSummary {
    /// True when there was at least one deployment and all of them passed
    pub fn all_passed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.status.is_success())
    }

    pub fn count(&self, status: DeploymentStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Process exit code: 0 iff every deployment passed. A dry run that
    /// got this far only had valid definitions, so it exits 0.
    pub fn exit_code(&self) -> i32 {
        if self.dry_run || self.all_passed() { 0 } else { 1 }
    }
}
