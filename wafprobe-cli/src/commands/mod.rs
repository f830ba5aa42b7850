//! Command handlers -- one module per subcommand

pub mod check_id;
pub mod config;
pub mod list;
pub mod run;

use std::path::Path;

use tracing::warn;

use wafprobe_core::config::WafprobeConfig;
use wafprobe_core::error::{ConfigError, WafprobeError};

use crate::error::CliError;

/// Load the configuration for commands that can run on defaults.
///
/// A missing file falls back to defaults plus environment overrides.
/// Any other load failure is returned as is.
pub(crate) async fn load_or_default(config_path: &Path) -> Result<WafprobeConfig, CliError> {
    match WafprobeConfig::load(config_path).await {
        Ok(config) => Ok(config),
        Err(WafprobeError::Config(ConfigError::FileNotFound { path })) => {
            warn!(path = %path, "config file not found, using defaults");
            let mut config = WafprobeConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}
