//! `wafprobe run` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wafprobe_azure::AzureWafInspector;
use wafprobe_harness::catalog::{self, CatalogOptions};
use wafprobe_harness::{
    CheckStatus, RunnerSettings, ScenarioOutcome, ScenarioReport, ScenarioRunner, TestScenario,
};
use wafprobe_terraform::TerraformEngine;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
///
/// Ctrl-C cancels running scenarios; their resources are still destroyed
/// before the command returns `CliError::Interrupted`.
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut config = super::load_or_default(config_path).await?;
    if let Some(parallel) = args.parallel {
        config.harness.max_parallel = parallel;
        config.validate()?;
    }

    let options = CatalogOptions::from_config(&config.harness);
    let scenarios = select_scenarios(&args.scenarios, &options)?;

    let settings = RunnerSettings::from_config(&config)?;
    let engine = TerraformEngine::from_config(&config.terraform);
    let inspector = AzureWafInspector::from_config(&config.azure)
        .map_err(|e| CliError::Command(format!("failed to build azure inspector: {}", e)))?;
    let runner = ScenarioRunner::new(Arc::new(engine), Arc::new(inspector), settings);

    info!(
        scenarios = scenarios.len(),
        max_parallel = config.harness.max_parallel,
        "running scenarios"
    );

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let reports = runner.run_all(scenarios, cancel.clone()).await;
    interrupt.abort();

    let summary = RunSummary::new(reports);
    writer.render(&summary)?;

    if cancel.is_cancelled() {
        return Err(CliError::Interrupted);
    }
    if summary.failed > 0 {
        return Err(CliError::ScenarioFailures {
            failed: summary.failed,
            total: summary.total,
        });
    }
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received, cancelling scenarios and destroying resources");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
    }
}

/// Resolve `--scenario` names against the catalog.
///
/// No names selects the whole catalog. Duplicates are dropped, order is kept.
fn select_scenarios(
    names: &[String],
    options: &CatalogOptions,
) -> Result<Vec<TestScenario>, CliError> {
    if names.is_empty() {
        return Ok(catalog::waf_scenarios(options));
    }

    let mut selected: Vec<TestScenario> = Vec::with_capacity(names.len());
    for name in names {
        if selected.iter().any(|s| s.name() == name) {
            continue;
        }
        let scenario = catalog::scenario(name, options).ok_or_else(|| {
            CliError::Command(format!(
                "unknown scenario: {} (expected: {})",
                name,
                catalog::SCENARIO_NAMES.join(", ")
            ))
        })?;
        selected.push(scenario);
    }
    Ok(selected)
}

/// Result of a `run` invocation.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    pub fn new(reports: Vec<ScenarioReport>) -> Self {
        let passed = reports.iter().filter(|r| r.passed()).count();
        Self {
            total: reports.len(),
            passed,
            failed: reports.len() - passed,
            reports,
        }
    }
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for report in &self.reports {
            let label = if report.passed() {
                "PASS".green().bold()
            } else {
                "FAIL".red().bold()
            };
            writeln!(
                w,
                "{} {} (fixture {}, id {}, {:.1}s)",
                label,
                report.scenario.bold(),
                report.fixture,
                report.unique_id,
                report.duration_ms as f64 / 1000.0
            )?;

            match &report.outcome {
                ScenarioOutcome::Passed | ScenarioOutcome::Failed { .. } => {}
                ScenarioOutcome::Errored { error } => writeln!(w, "  error: {}", error.red())?,
                ScenarioOutcome::CleanupFailed { error } => {
                    writeln!(w, "  cleanup failed: {}", error.red())?
                }
                ScenarioOutcome::TimedOut { secs } => {
                    writeln!(w, "  {}", format!("timed out after {}s", secs).red())?
                }
                ScenarioOutcome::Cancelled => writeln!(w, "  {}", "cancelled".yellow())?,
                ScenarioOutcome::Panicked { message } => {
                    writeln!(w, "  panicked: {}", message.red())?
                }
            }

            for check in &report.checks {
                match &check.status {
                    CheckStatus::Passed => {}
                    CheckStatus::Failed { expected, observed } => writeln!(
                        w,
                        "  {} {}: expected {}, observed {}",
                        "✗".red(),
                        check.name,
                        expected,
                        observed
                    )?,
                    CheckStatus::Skipped { reason } => {
                        writeln!(w, "  {} {}: {}", "-".yellow(), check.name, reason)?
                    }
                }
            }

            // CleanupFailed already printed the destroy error
            if !matches!(report.outcome, ScenarioOutcome::CleanupFailed { .. }) {
                if let Some(ref error) = report.cleanup_error {
                    writeln!(w, "  cleanup error: {}", error.red())?;
                }
            }
        }

        writeln!(w)?;
        let summary = format!(
            "{} scenarios: {} passed, {} failed",
            self.total, self.passed, self.failed
        );
        if self.failed == 0 {
            writeln!(w, "{}", summary.green().bold())?;
        } else {
            writeln!(w, "{}", summary.red().bold())?;
        }
        Ok(())
    }
}
