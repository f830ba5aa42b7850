//! `wafprobe check-id` command handler

use std::io::Write;

use serde::Serialize;

use wafprobe_core::types::{ResourceId, ResourceLocator, validate_waf_policy_id};

use crate::cli::CheckIdArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `check-id` command.
///
/// Exits non-zero when the identifier is not a WAF policy identifier.
pub fn execute(args: CheckIdArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = CheckIdReport::check(&args.id);
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Command(format!(
            "invalid waf policy id: {}",
            report.error.as_deref().unwrap_or_default()
        )));
    }
    Ok(())
}

/// Result of checking one identifier.
#[derive(Debug, Serialize)]
pub struct CheckIdReport {
    pub id: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured form, when the identifier also parses as a full ARM path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ResourceId>,
    /// What the inspector would query for this policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<ResourceLocator>,
}

impl CheckIdReport {
    pub fn check(id: &str) -> Self {
        match validate_waf_policy_id(id) {
            Ok(()) => {
                let parsed = id
                    .parse::<ResourceId>()
                    .ok()
                    .filter(ResourceId::is_waf_policy);
                Self {
                    id: id.to_owned(),
                    valid: true,
                    error: None,
                    lookup: parsed.as_ref().map(ResourceId::locator),
                    parsed,
                }
            }
            Err(e) => Self {
                id: id.to_owned(),
                valid: false,
                error: Some(e.to_string()),
                parsed: None,
                lookup: None,
            },
        }
    }
}

impl Render for CheckIdReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Resource ID: {}", self.id.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }
        if let Some(ref error) = self.error {
            writeln!(w, "  Error: {}", error.red())?;
        }
        if let Some(ref parsed) = self.parsed {
            writeln!(w, "  Subscription:   {}", parsed.subscription_id)?;
            writeln!(w, "  Resource group: {}", parsed.resource_group)?;
            writeln!(
                w,
                "  Type:           {}/{}",
                parsed.namespace, parsed.resource_type
            )?;
            writeln!(w, "  Name:           {}", parsed.name)?;
        }
        if let Some(ref lookup) = self.lookup {
            writeln!(w, "  Lookup:         {}", lookup)?;
        }
        Ok(())
    }
}
