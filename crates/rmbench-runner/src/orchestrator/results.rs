//! Results writing and summary display
//!
//! This module handles writing the run report to a JSON file and
//! printing summary tables to stdout.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tracing::info;

use super::types::{DeploymentOutcome, DeploymentStatus, RunSummary};

/// Write the run report as pretty JSON
pub fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

fn status_cell(status: DeploymentStatus) -> Cell {
    let color = match status {
        DeploymentStatus::Passed => Color::Green,
        DeploymentStatus::Failed | DeploymentStatus::Errored => Color::Red,
        DeploymentStatus::Cancelled => Color::Yellow,
        DeploymentStatus::Skipped => Color::DarkGrey,
    };
    Cell::new(status.as_ref()).fg(color)
}

fn expectations_cell(outcome: &DeploymentOutcome) -> String {
    match outcome.status {
        DeploymentStatus::Passed | DeploymentStatus::Failed => format!(
            "{}/{}",
            outcome.validation.passed_count(),
            outcome.validation.total()
        ),
        _ => "-".to_string(),
    }
}

/// Build the summary table (one row per deployment, in run order)
pub fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Test"),
            Cell::new("Setup"),
            Cell::new("Status"),
            Cell::new("Expectations"),
            Cell::new("Duration (s)"),
        ]);

    for outcome in &summary.outcomes {
        table.add_row(vec![
            Cell::new(&outcome.test_name),
            Cell::new(&outcome.setup_name),
            status_cell(outcome.status),
            Cell::new(expectations_cell(outcome)),
            Cell::new(format!("{:.1}", outcome.duration_secs)),
        ]);
    }
    table
}

/// Print a summary of the run to stdout
pub fn print_results_summary(summary: &RunSummary) {
    if summary.outcomes.is_empty() {
        return;
    }

    println!("\n=== Benchmark Results ===\n");
    println!("{}", summary_table(summary));

    for outcome in &summary.outcomes {
        for failure in outcome.validation.failures() {
            println!(
                "  {} on {}: {}",
                outcome.test_name,
                outcome.setup_name,
                failure.reason.as_deref().unwrap_or("expectation failed")
            );
        }
        if let Some(error) = &outcome.error {
            println!("  {} on {}: {}", outcome.test_name, outcome.setup_name, error);
        }
        if let Some(error) = &outcome.teardown_error {
            println!(
                "  {} on {}: teardown failed: {}",
                outcome.test_name, outcome.setup_name, error
            );
        }
    }

    println!(
        "\n{} passed, {} failed, {} errored, {} cancelled, {} skipped",
        summary.count(DeploymentStatus::Passed),
        summary.count(DeploymentStatus::Failed),
        summary.count(DeploymentStatus::Errored),
        summary.count(DeploymentStatus::Cancelled),
        summary.count(DeploymentStatus::Skipped),
    );
}
