//! Terraform-backed provisioning engine.
//!
//! [`TerraformEngine`] implements [`ProvisioningEngine`] by driving the
//! `terraform` CLI in an isolated workspace per scenario run:
//!
//! ```text
//! apply   : prepare workspace -> init -> apply -var-file=wafprobe.tfvars.json
//! output  : output -json <name>
//! destroy : settle interrupted commands -> destroy -var-file=wafprobe.tfvars.json
//!           -> remove workspace
//! ```
//!
//! `init`, `apply` and `destroy` run under the configuration's
//! [`RetryPolicy`]; the combined stdout/stderr of a failed command is what
//! the retryable-error table is matched against.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use wafprobe_core::config::TerraformConfig;
use wafprobe_core::engine::ProvisioningEngine;
use wafprobe_core::error::ProvisionError;
use wafprobe_core::metrics as m;
use wafprobe_core::provision::{ProvisioningConfiguration, ResourceHandle};
use wafprobe_core::retry::{RetryFailure, RetryPolicy};

use crate::runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use crate::workspace::{self, VAR_FILE_NAME};

/// Environment passed to every terraform invocation.
const TERRAFORM_ENV: &[(&str, &str)] = &[("TF_IN_AUTOMATION", "1"), ("TF_INPUT", "0")];

/// Provisioning engine driving the `terraform` CLI.
pub struct TerraformEngine<R: CommandRunner = ProcessRunner> {
    runner: Arc<R>,
    binary: String,
    command_timeout: Duration,
}

impl TerraformEngine<ProcessRunner> {
    /// Creates an engine that spawns real `terraform` processes.
    pub fn from_config(config: &TerraformConfig) -> Self {
        Self::with_runner(
            Arc::new(ProcessRunner::with_grace(config.interrupt_grace())),
            config.binary.clone(),
            config.command_timeout(),
        )
    }
}

impl<R: CommandRunner> TerraformEngine<R> {
    /// Creates an engine on top of an arbitrary command runner.
    pub fn with_runner(runner: Arc<R>, binary: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            runner,
            binary: binary.into(),
            command_timeout,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn spec(&self, cwd: &Path, args: &[String]) -> CommandSpec {
        CommandSpec {
            program: self.binary.clone(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
            env: TERRAFORM_ENV
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            timeout: Some(self.command_timeout),
        }
    }

    /// Runs one command and returns its output whatever the exit code.
    async fn execute(&self, cwd: &Path, args: &[String]) -> Result<CommandOutput, ProvisionError> {
        let spec = self.spec(cwd, args);
        metrics::counter!(m::PROVISION_ATTEMPTS_TOTAL, m::LABEL_OPERATION => spec.operation().to_owned())
            .increment(1);
        self.runner.run(&spec).await
    }

    /// Runs one command, turning a non-zero exit into [`ProvisionError::CommandFailed`].
    async fn run_once(
        &self,
        operation: &str,
        cwd: &Path,
        args: &[String],
    ) -> Result<CommandOutput, ProvisionError> {
        let output = self.execute(cwd, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProvisionError::CommandFailed {
                operation: operation.to_owned(),
                exit_code: output.exit_code,
                message: output.combined(),
            })
        }
    }

    async fn run_retrying(
        &self,
        operation: &str,
        cwd: &Path,
        args: &[String],
        retry: &RetryPolicy,
    ) -> Result<CommandOutput, ProvisionError> {
        retry
            .run(operation, move |attempt| {
                debug!(operation, attempt, cwd = %cwd.display(), "running terraform");
                self.run_once(operation, cwd, args)
            })
            .await
            .map_err(|failure| match failure {
                RetryFailure::Fatal { error, .. } => error,
                RetryFailure::Exhausted {
                    attempts,
                    description,
                    error,
                } => ProvisionError::RetriesExhausted {
                    operation: operation.to_owned(),
                    attempts,
                    description,
                    message: raw_message(error),
                },
            })
    }
}

impl<R: CommandRunner> ProvisioningEngine for TerraformEngine<R> {
    async fn apply(
        &self,
        config: &ProvisioningConfiguration,
    ) -> Result<ResourceHandle, ProvisionError> {
        let workspace = config.workspace_dir();
        info!(
            fixture = config.fixture(),
            workspace = %workspace.display(),
            "applying terraform configuration"
        );

        workspace::prepare(config).await?;
        self.run_retrying("init", workspace, &init_args(), config.retry())
            .await?;
        workspace::mark_apply_started(workspace).await?;
        self.run_retrying("apply", workspace, &apply_args(), config.retry())
            .await?;

        let handle = ResourceHandle::for_configuration(config);
        info!(handle = handle.label(), "terraform apply complete");
        Ok(handle)
    }

    async fn output(&self, handle: &ResourceHandle, name: &str) -> Result<String, ProvisionError> {
        let args = vec![
            "output".to_owned(),
            "-no-color".to_owned(),
            "-json".to_owned(),
            name.to_owned(),
        ];
        let output = self.execute(handle.workspace(), &args).await?;

        if !output.success() {
            let message = output.combined();
            if is_missing_output(&message) {
                return Err(ProvisionError::OutputNotFound {
                    name: name.to_owned(),
                });
            }
            return Err(ProvisionError::CommandFailed {
                operation: "output".to_owned(),
                exit_code: output.exit_code,
                message,
            });
        }

        decode_output(name, &output.stdout)
    }

    async fn destroy(&self, handle: &ResourceHandle) -> Result<(), ProvisionError> {
        let workspace = handle.workspace();

        // 중단된 apply가 state를 기록하고 종료할 때까지 대기
        self.runner.settle().await;

        if !workspace::has_state(workspace).await {
            if !workspace::apply_started(workspace).await {
                debug!(
                    handle = handle.label(),
                    "apply never started in workspace, skipping destroy command"
                );
                metrics::counter!(m::DESTROY_TOTAL, m::LABEL_RESULT => "skipped").increment(1);
                return workspace::remove(workspace).await;
            }
            warn!(
                handle = handle.label(),
                "apply started but no state was written, running destroy anyway"
            );
        }

        info!(handle = handle.label(), "destroying terraform resources");
        match self
            .run_retrying("destroy", workspace, &destroy_args(), handle.retry())
            .await
        {
            Ok(_) => {
                metrics::counter!(m::DESTROY_TOTAL, m::LABEL_RESULT => "success").increment(1);
                if let Err(e) = workspace::remove(workspace).await {
                    warn!(handle = handle.label(), error = %e, "failed to remove workspace");
                }
                info!(handle = handle.label(), "terraform destroy complete");
                Ok(())
            }
            Err(e) => {
                metrics::counter!(m::DESTROY_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                error!(
                    handle = handle.label(),
                    workspace = %workspace.display(),
                    error = %e,
                    "terraform destroy failed, workspace kept for manual cleanup"
                );
                Err(e)
            }
        }
    }
}

fn init_args() -> Vec<String> {
    ["init", "-input=false", "-no-color"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn apply_args() -> Vec<String> {
    vec![
        "apply".to_owned(),
        "-input=false".to_owned(),
        "-auto-approve".to_owned(),
        "-no-color".to_owned(),
        format!("-var-file={VAR_FILE_NAME}"),
    ]
}

fn destroy_args() -> Vec<String> {
    vec![
        "destroy".to_owned(),
        "-input=false".to_owned(),
        "-auto-approve".to_owned(),
        "-no-color".to_owned(),
        format!("-var-file={VAR_FILE_NAME}"),
    ]
}

fn is_missing_output(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("could not be found")
}

/// JSON strings are unwrapped; any other value is returned compact-serialized.
fn decode_output(name: &str, stdout: &str) -> Result<String, ProvisionError> {
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).map_err(|e| ProvisionError::OutputDecode {
            name: name.to_owned(),
            reason: e.to_string(),
        })?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Err(ProvisionError::OutputNotFound {
            name: name.to_owned(),
        }),
        other => Ok(other.to_string()),
    }
}

/// Tool output without the error wrapper text.
fn raw_message(error: ProvisionError) -> String {
    match error {
        ProvisionError::CommandFailed { message, .. } => message,
        other => other.to_string(),
    }
}
