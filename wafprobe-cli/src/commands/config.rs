//! `wafprobe config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use wafprobe_core::config::WafprobeConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
pub const SECTIONS: [&str; 4] = ["general", "terraform", "azure", "harness"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the file, reporting any error.
///
/// Returns `CliError::Config` when the file is missing, malformed or invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match WafprobeConfig::load(config_path).await {
        Ok(config) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
            warnings: config_warnings(&config),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Problems that do not make the file invalid but will stop `run`.
fn config_warnings(config: &WafprobeConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Err(e) = config.azure.resolve_subscription() {
        warnings.push(e.to_string());
    }
    if !Path::new(&config.terraform.fixtures_dir).is_dir() {
        warnings.push(format!(
            "fixtures directory '{}' does not exist",
            config.terraform.fixtures_dir
        ));
    }
    warnings
}

/// Display the effective configuration (file + env overrides + defaults).
///
/// Subscription and tenant ids are masked. Endpoint URLs lose any userinfo.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let mut config = WafprobeConfig::load(config_path).await?;
    redact_secrets(&mut config);

    let config_toml = match section.as_deref() {
        None => to_toml(&config),
        Some("general") => to_toml(&config.general),
        Some("terraform") => to_toml(&config.terraform),
        Some("azure") => to_toml(&config.azure),
        Some("harness") => to_toml(&config.harness),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    let report = ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
    };
    writer.render(&report)?;

    Ok(())
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

fn redact_secrets(config: &mut WafprobeConfig) {
    config.azure.subscription_id = mask_id(&config.azure.subscription_id);
    config.azure.tenant_id = mask_id(&config.azure.tenant_id);
    config.azure.management_endpoint = redact_url(&config.azure.management_endpoint);
    config.azure.login_endpoint = redact_url(&config.azure.login_endpoint);
}

/// Keep the last four characters of an identifier.
fn mask_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Replace `user:password@` in a URL with `***REDACTED***@`.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let (scheme, rest) = url.split_at(scheme_end + 3);
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at_pos) => format!("{}***REDACTED***{}", scheme, &rest[at_pos..]),
        None => url.to_owned(),
    }
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }
        for err in &self.errors {
            writeln!(w, "  Error: {}", err.red())?;
        }
        for warning in &self.warnings {
            writeln!(w, "  Warning: {}", warning.yellow())?;
        }

        Ok(())
    }
}
