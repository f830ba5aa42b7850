//! `wafprobe list` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use wafprobe_harness::TestScenario;
use wafprobe_harness::catalog::{self, CatalogOptions};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let config = super::load_or_default(config_path).await?;
    let options = CatalogOptions::from_config(&config.harness);
    let report = ScenarioListReport::from_scenarios(&catalog::waf_scenarios(&options));
    writer.render(&report)
}

#[derive(Debug, Serialize)]
pub struct ScenarioListReport {
    pub total: usize,
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub fixture: String,
    pub outputs: Vec<String>,
    /// Whether the scenario reads the deployed policy back from Azure
    pub inspects: bool,
}

impl ScenarioListReport {
    pub fn from_scenarios(scenarios: &[TestScenario]) -> Self {
        Self {
            total: scenarios.len(),
            scenarios: scenarios
                .iter()
                .map(|s| ScenarioEntry {
                    name: s.name().to_owned(),
                    fixture: s.fixture().to_owned(),
                    outputs: s.outputs().to_vec(),
                    inspects: s.inspects(),
                })
                .collect(),
        }
    }
}

impl Render for ScenarioListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scenarios ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(w, "{:<18} {:<18} {:<8} Outputs", "Name", "Fixture", "Inspect")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for entry in &self.scenarios {
            writeln!(
                w,
                "{:<18} {:<18} {:<8} {}",
                entry.name,
                entry.fixture,
                if entry.inspects { "yes" } else { "no" },
                entry.outputs.join(", ")
            )?;
        }
        Ok(())
    }
}
