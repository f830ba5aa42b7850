//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// wafprobe -- end-to-end WAF policy tests on Terraform and Azure.
///
/// Use `wafprobe <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "wafprobe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the wafprobe.toml configuration file.
    #[arg(short, long, global = true, default_value = "wafprobe.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision, verify and destroy WAF policy scenarios.
    Run(RunArgs),

    /// List the scenario catalog.
    List,

    /// Manage configuration.
    Config(ConfigArgs),

    /// Validate a WAF policy resource identifier.
    CheckId(CheckIdArgs),
}

// ---- run ----

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario to run (repeatable; default: the whole catalog).
    #[arg(short, long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Override [harness].max_parallel.
    #[arg(short, long)]
    pub parallel: Option<usize>,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, terraform, azure, harness).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- check-id ----

#[derive(Args, Debug)]
pub struct CheckIdArgs {
    /// Resource identifier, e.g. /subscriptions/.../providers/Microsoft.Network/...
    pub id: String,
}
