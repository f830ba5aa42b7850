//! External command abstraction for testability.
//!
//! The [`CommandRunner`] trait hides process spawning so that
//! [`TerraformEngine`](crate::TerraformEngine) can run against the real
//! `terraform` binary via [`ProcessRunner`] while unit tests use a scripted
//! runner that records invocations.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wafprobe_core::error::ProvisionError;

/// Default time between SIGINT and SIGKILL for an interrupted command.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(60);

/// Extra time `settle` allows on top of the grace period.
const SETTLE_MARGIN: Duration = Duration::from_secs(5);

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (looked up in `PATH` when not absolute)
    pub program: String,
    /// Arguments; the first one is the terraform subcommand
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Interrupt the process when it runs longer than this
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Subcommand name used in logs and errors.
    pub fn operation(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("command")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output (exit code 1) with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined, the text matched against retryable errors.
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_owned(),
            (out, "") => out.to_owned(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Trait abstracting process execution.
///
/// Non-zero exit codes are not errors at this level; the runner only fails
/// when the process cannot be spawned or exceeds its timeout.
pub trait CommandRunner: Send + Sync + 'static {
    /// Runs the command to completion and captures its output.
    fn run(
        &self,
        spec: &CommandSpec,
    ) -> impl Future<Output = Result<CommandOutput, ProvisionError>> + Send;

    /// Waits until processes interrupted by a dropped `run` future have exited.
    fn settle(&self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// Production runner backed by `tokio::process`.
///
/// A command that times out, or whose `run` future is dropped, gets SIGINT
/// and is killed only if it is still running after the grace period. For
/// terraform this is the difference between a clean stop that writes state
/// for already-created resources and an orphaned deployment.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace: Duration,
    /// Number of interrupted processes still being reaped in the background
    interrupted: Arc<watch::Sender<usize>>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::with_grace(DEFAULT_INTERRUPT_GRACE)
    }
}

impl ProcessRunner {
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            grace,
            interrupted: Arc::new(watch::channel(0).0),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        debug!(
            program = %spec.program,
            args = ?spec.args,
            cwd = %spec.cwd.display(),
            "spawning command"
        );

        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| spawn_error(spec, &e))?;
        let stdout = collect(child.stdout.take());
        let stderr = collect(child.stderr.take());
        let mut running = RunningChild {
            child: Some(child),
            signalled: false,
            grace: self.grace,
            interrupted: Arc::clone(&self.interrupted),
            operation: spec.operation().to_owned(),
        };

        let status = match spec.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, running.wait()).await;
                match waited {
                    Ok(status) => status,
                    Err(_elapsed) => {
                        warn!(
                            operation = spec.operation(),
                            timeout_secs = limit.as_secs(),
                            grace_secs = self.grace.as_secs(),
                            "command timed out, interrupting"
                        );
                        running.stop().await;
                        return Err(ProvisionError::Timeout {
                            operation: spec.operation().to_owned(),
                            secs: limit.as_secs(),
                        });
                    }
                }
            }
            None => running.wait().await,
        }
        .map_err(|e| spawn_error(spec, &e))?;
        running.child = None;

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout.await.unwrap_or_default()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.await.unwrap_or_default()).into_owned(),
        })
    }

    async fn settle(&self) {
        let mut pending = self.interrupted.subscribe();
        let limit = self.grace + SETTLE_MARGIN;
        let settled = tokio::time::timeout(limit, async {
            let _ = pending.wait_for(|count| *count == 0).await;
        })
        .await;
        if settled.is_err() {
            warn!(
                waited_secs = limit.as_secs(),
                "interrupted commands still running, continuing anyway"
            );
        }
    }
}

/// A spawned child that is interrupted rather than killed when abandoned.
struct RunningChild {
    /// `None` once the process has been reaped
    child: Option<Child>,
    signalled: bool,
    grace: Duration,
    interrupted: Arc<watch::Sender<usize>>,
    operation: String,
}

impl RunningChild {
    async fn wait(&mut self) -> io::Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => Err(io::Error::other("process already reaped")),
        }
    }

    /// SIGINT, then wait up to the grace period, then SIGKILL.
    async fn stop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if !self.signalled {
                interrupt(child);
                self.signalled = true;
            }
            reap(child, self.grace, &self.operation).await;
        }
        self.child = None;
    }
}

impl Drop for RunningChild {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let _ = child.start_kill();
            return;
        };

        warn!(
            operation = %self.operation,
            grace_secs = self.grace.as_secs(),
            "command abandoned, interrupting process"
        );
        if !self.signalled {
            interrupt(&mut child);
        }

        self.interrupted.send_modify(|count| *count += 1);
        let interrupted = Arc::clone(&self.interrupted);
        let grace = self.grace;
        let operation = std::mem::take(&mut self.operation);
        runtime.spawn(async move {
            reap(&mut child, grace, &operation).await;
            interrupted.send_modify(|count| *count = count.saturating_sub(1));
        });
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: kill(2) targets our own child, which has not been reaped yet
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if result != 0 {
        warn!(pid, error = %io::Error::last_os_error(), "failed to send SIGINT, killing");
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    let _ = child.start_kill();
}

async fn reap(child: &mut Child, grace: Duration, operation: &str) {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(operation, ?status, "interrupted command exited"),
        Ok(Err(e)) => warn!(operation, error = %e, "failed to wait for interrupted command"),
        Err(_elapsed) => {
            warn!(
                operation,
                grace_secs = grace.as_secs(),
                "command ignored SIGINT, killing"
            );
            if let Err(e) = child.kill().await {
                warn!(operation, error = %e, "failed to kill command");
            }
        }
    }
}

fn collect<P>(pipe: Option<P>) -> JoinHandle<Vec<u8>>
where
    P: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

fn spawn_error(spec: &CommandSpec, e: &io::Error) -> ProvisionError {
    ProvisionError::Spawn {
        program: spec.program.clone(),
        reason: e.to_string(),
    }
}

/// 테스트용 스크립트 러너
///
/// 서브커맨드별 응답 큐를 가지며, 큐가 비면 빈 성공 출력을 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    responses: std::sync::Mutex<
        std::collections::HashMap<String, std::collections::VecDeque<CommandOutput>>,
    >,
    invocations: std::sync::Mutex<Vec<CommandSpec>>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 서브커맨드에 대한 다음 응답을 추가합니다.
    pub(crate) fn respond(self, subcommand: &str, output: CommandOutput) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(subcommand.to_owned())
            .or_default()
            .push_back(output);
        self
    }

    pub(crate) fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().unwrap().clone()
    }

    /// 서브커맨드 호출 횟수
    pub(crate) fn calls(&self, subcommand: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| spec.operation() == subcommand)
            .count()
    }
}

#[cfg(test)]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        self.invocations.lock().unwrap().push(spec.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(spec.operation())
            .and_then(|queue| queue.pop_front());
        Ok(next.unwrap_or_else(|| CommandOutput::ok("")))
    }
}
