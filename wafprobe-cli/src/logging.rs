//! Logging initialization for the wafprobe CLI.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `WafprobeConfig`. Logs go to stderr so stdout stays clean for
//! `--output json`.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use wafprobe_core::config::GeneralConfig;

/// Crates whose events follow the configured level. Everything else
/// (reqwest, hyper, rustls) stays at `warn`.
const WAFPROBE_TARGETS: &[&str] = &[
    "wafprobe",
    "wafprobe_core",
    "wafprobe_terraform",
    "wafprobe_azure",
    "wafprobe_harness",
];

/// Initialize the global tracing subscriber.
///
/// Level precedence: `RUST_LOG`, then `--log-level`, then `config.log_level`.
///
/// # Formats
///
/// * `"json"` - JSON lines
/// * `"pretty"` - human-readable output
pub fn init_tracing(config: &GeneralConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&config.log_level);
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter = build_filter(level, rust_log.as_deref())?;

    let fmt_layer = match config.log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
        other => {
            anyhow::bail!("unknown log format '{}', expected 'json' or 'pretty'", other);
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}

/// `RUST_LOG` is used verbatim when set; otherwise `level` applies to the
/// wafprobe crates only.
fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::try_new(directives).context("invalid RUST_LOG");
    }
    EnvFilter::try_new(filter_directives(level))
        .with_context(|| format!("invalid log level '{}'", level))
}

fn filter_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in WAFPROBE_TARGETS {
        directives.push_str(&format!(",{}={}", target, level));
    }
    directives
}
