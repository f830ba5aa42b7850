//! CLI-specific error types and exit code mapping

use wafprobe_core::error::{ConfigError, WafprobeError};

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// At least one scenario did not pass.
    #[error("{failed} of {total} scenarios did not pass")]
    ScenarioFailures { failed: usize, total: usize },

    /// Ctrl-C arrived while scenarios were running.
    #[error("interrupted")]
    Interrupted,

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from wafprobe-core.
    #[error("{0}")]
    Core(#[from] WafprobeError),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Core(WafprobeError::Config(e))
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command error          |
    /// | 2    | Configuration error              |
    /// | 5    | One or more scenarios failed     |
    /// | 10   | IO error                         |
    /// | 130  | Interrupted (Ctrl-C)             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(WafprobeError::Config(_)) => 2,
            Self::ScenarioFailures { .. } => 5,
            Self::Io(_) | Self::Core(WafprobeError::Io(_)) => 10,
            Self::Interrupted => 130,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}
