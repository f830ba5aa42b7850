//! 시나리오 실행기
//!
//! 한 시나리오 실행은 다음 순서를 따릅니다.
//!
//! ```text
//! UniqueId ──> ResourceNames ──> render ──> DestroyGuard::new
//!   ──> apply ──> output* ──> exists/get ──> expectation
//!   ──> DestroyGuard::release (항상)
//! ```
//!
//! apply부터 검증까지는 취소 토큰과 시나리오 타임아웃과 경쟁하며,
//! 어느 쪽으로 끝나든 정리는 그 뒤에 실행됩니다. [`ScenarioRunner::run_all`]은
//! 시나리오마다 태스크를 띄우고 세마포어로 동시 실행 수를 제한합니다.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wafprobe_core::config::WafprobeConfig;
use wafprobe_core::engine::{ProvisioningEngine, ResourceInspector};
use wafprobe_core::error::{ConfigError, InspectError};
use wafprobe_core::metrics as m;
use wafprobe_core::provision::ProvisioningConfiguration;
use wafprobe_core::retry::RetryPolicy;

use crate::error::ScenarioError;
use crate::guard::{DestroyGuard, Phase};
use crate::ident::{ResourceNames, UniqueId};
use crate::render::ConfigurationRenderer;
use crate::scenario::{Observation, TestScenario};
use crate::verify::{CheckOutcome, Checks};

/// 실행기 설정
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub fixtures_dir: PathBuf,
    pub work_dir: PathBuf,
    pub subscription_id: String,
    /// 시나리오가 `name_prefix` 변수를 주지 않을 때 쓰는 접두어
    pub name_prefix: String,
    /// 시나리오가 재시도 정책을 주지 않을 때 쓰는 기본값
    pub retry: RetryPolicy,
    pub max_parallel: usize,
    pub scenario_timeout: Duration,
    /// apply 실패 후 best-effort destroy 여부
    pub cleanup_on_apply_failure: bool,
}

impl RunnerSettings {
    /// 설정 파일로부터 실행기 설정을 만듭니다.
    ///
    /// 구독 ID를 찾을 수 없으면 [`ConfigError::MissingSubscription`]을 반환합니다.
    pub fn from_config(config: &WafprobeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            fixtures_dir: PathBuf::from(&config.terraform.fixtures_dir),
            work_dir: config.terraform.resolved_work_dir(),
            subscription_id: config.azure.resolve_subscription()?,
            name_prefix: config.harness.name_prefix.clone(),
            retry: config.terraform.retry_policy()?,
            max_parallel: config.harness.max_parallel,
            scenario_timeout: config.harness.scenario_timeout(),
            cleanup_on_apply_failure: config.terraform.cleanup_on_apply_failure,
        })
    }
}

/// 시나리오 최종 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// 모든 검증 통과, 정리 성공
    Passed,
    /// 하나 이상의 검증 실패
    Failed { failed_checks: usize },
    /// 치명적 에러로 중단
    Errored { error: String },
    /// 검증은 통과했지만 destroy 실패
    CleanupFailed { error: String },
    TimedOut { secs: u64 },
    Cancelled,
    Panicked { message: String },
}

impl ScenarioOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// 메트릭 라벨
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed { .. } => "failed",
            Self::Errored { .. } => "errored",
            Self::CleanupFailed { .. } => "cleanup_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Panicked { .. } => "panicked",
        }
    }
}

/// 시나리오 실행 보고서
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub fixture: String,
    pub unique_id: UniqueId,
    pub names: ResourceNames,
    pub phases: Vec<Phase>,
    pub checks: Vec<CheckOutcome>,
    pub outcome: ScenarioOutcome,
    pub cleanup_error: Option<String>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    fn aborted(pending: PendingScenario, outcome: ScenarioOutcome) -> Self {
        Self {
            scenario: pending.scenario,
            fixture: pending.fixture,
            unique_id: pending.unique_id,
            names: pending.names,
            phases: Vec::new(),
            checks: Vec::new(),
            outcome,
            cleanup_error: None,
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_passed()
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| c.is_failed())
    }

    /// destroy가 성공적으로 끝났는지 여부
    pub fn destroyed(&self) -> bool {
        self.phases.contains(&Phase::Destroyed)
    }
}

/// 태스크가 보고서 없이 끝났을 때 쓰는 정보
struct PendingScenario {
    scenario: String,
    fixture: String,
    unique_id: UniqueId,
    names: ResourceNames,
}

/// 시나리오 실행기
///
/// 엔진과 조회기는 `Arc`로 공유되어 여러 시나리오 태스크가 동시에 사용합니다.
pub struct ScenarioRunner<E: ProvisioningEngine, I: ResourceInspector> {
    engine: Arc<E>,
    inspector: Arc<I>,
    renderer: ConfigurationRenderer,
    settings: Arc<RunnerSettings>,
}

impl<E: ProvisioningEngine, I: ResourceInspector> Clone for ScenarioRunner<E, I> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            inspector: Arc::clone(&self.inspector),
            renderer: self.renderer.clone(),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<E: ProvisioningEngine, I: ResourceInspector> ScenarioRunner<E, I> {
    pub fn new(engine: Arc<E>, inspector: Arc<I>, settings: RunnerSettings) -> Self {
        Self {
            renderer: ConfigurationRenderer::new(&settings.fixtures_dir, &settings.work_dir),
            engine,
            inspector,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// 시나리오 하나를 실행합니다.
    pub async fn run(&self, scenario: &TestScenario) -> ScenarioReport {
        self.run_with_cancel(scenario, &CancellationToken::new())
            .await
    }

    /// 취소 토큰과 함께 시나리오 하나를 실행합니다.
    pub async fn run_with_cancel(
        &self,
        scenario: &TestScenario,
        cancel: &CancellationToken,
    ) -> ScenarioReport {
        self.run_identified(scenario, UniqueId::generate(), cancel)
            .await
    }

    /// 시나리오를 병렬로 실행하고 입력 순서대로 보고서를 반환합니다.
    ///
    /// 한 시나리오의 실패나 패닉은 다른 시나리오에 영향을 주지 않습니다.
    pub async fn run_all(
        &self,
        scenarios: Vec<TestScenario>,
        cancel: CancellationToken,
    ) -> Vec<ScenarioReport> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel.max(1)));
        let mut tasks: Vec<(PendingScenario, JoinHandle<ScenarioReport>)> =
            Vec::with_capacity(scenarios.len());

        info!(
            scenarios = scenarios.len(),
            max_parallel = self.settings.max_parallel,
            "running scenarios"
        );

        for scenario in scenarios {
            let unique_id = UniqueId::generate();
            let info = PendingScenario {
                scenario: scenario.name().to_owned(),
                fixture: scenario.fixture().to_owned(),
                names: self.names_for(&scenario, &unique_id),
                unique_id: unique_id.clone(),
            };

            let runner = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let task = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                runner.run_identified(&scenario, unique_id, &cancel).await
            });
            tasks.push((info, task));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for (info, task) in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(join_error) => {
                    let outcome = if join_error.is_panic() {
                        ScenarioOutcome::Panicked {
                            message: panic_message(join_error.into_panic().as_ref()),
                        }
                    } else {
                        ScenarioOutcome::Cancelled
                    };
                    error!(scenario = %info.scenario, unique_id = %info.unique_id, outcome = outcome.label(), "scenario task aborted");
                    record_outcome(&info.scenario, &outcome, Duration::ZERO);
                    reports.push(ScenarioReport::aborted(info, outcome));
                }
            }
        }
        reports
    }

    fn names_for(&self, scenario: &TestScenario, id: &UniqueId) -> ResourceNames {
        let prefix = scenario
            .var_str("name_prefix")
            .unwrap_or(&self.settings.name_prefix);
        ResourceNames::derive(prefix, id)
    }

    async fn run_identified(
        &self,
        scenario: &TestScenario,
        unique_id: UniqueId,
        cancel: &CancellationToken,
    ) -> ScenarioReport {
        let started = tokio::time::Instant::now();
        let names = self.names_for(scenario, &unique_id);

        let mut vars = scenario.vars().clone();
        vars.extend(names.as_vars());
        let retry = scenario
            .retry()
            .unwrap_or(&self.settings.retry)
            .clone();
        let config = self
            .renderer
            .render(scenario.fixture(), vars, retry, &unique_id);

        info!(
            scenario = scenario.name(),
            unique_id = %unique_id,
            fixture = scenario.fixture(),
            resource_group = %names.resource_group,
            "scenario started"
        );

        let mut guard = DestroyGuard::new(
            Arc::clone(&self.engine),
            &config,
            self.settings.cleanup_on_apply_failure,
        );
        let mut checks = Checks::new();
        let timeout = self.settings.scenario_timeout;

        let result = {
            let body = self.execute(scenario, &config, &names, &mut guard, &mut checks);
            tokio::pin!(body);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ScenarioError::Cancelled),
                _ = tokio::time::sleep(timeout) => Err(ScenarioError::TimedOut { secs: timeout.as_secs() }),
                result = &mut body => result,
            }
        };

        if let Err(e) = &result {
            warn!(scenario = scenario.name(), unique_id = %unique_id, error = %e, "scenario aborted");
        }

        let cleanup = guard.release().await;
        let cleanup_error = cleanup.result.as_ref().err().map(ToString::to_string);
        let outcome = decide_outcome(result, &checks, cleanup_error.as_deref());
        let elapsed = started.elapsed();

        record_outcome(scenario.name(), &outcome, elapsed);
        info!(
            scenario = scenario.name(),
            unique_id = %unique_id,
            outcome = outcome.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scenario finished"
        );

        ScenarioReport {
            scenario: scenario.name().to_owned(),
            fixture: scenario.fixture().to_owned(),
            unique_id,
            names,
            phases: cleanup.phases,
            checks: checks.into_outcomes(),
            outcome,
            cleanup_error,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    async fn execute(
        &self,
        scenario: &TestScenario,
        config: &ProvisioningConfiguration,
        names: &ResourceNames,
        guard: &mut DestroyGuard<E>,
        checks: &mut Checks,
    ) -> Result<(), ScenarioError> {
        guard.applying();
        let handle = match self.engine.apply(config).await {
            Ok(handle) => handle,
            Err(source) => {
                guard.apply_failed();
                return Err(ScenarioError::provision("apply", source));
            }
        };
        let handle = guard.applied(handle);
        debug!(resource = handle.label(), "apply complete");

        let mut outputs = BTreeMap::new();
        for name in scenario.outputs() {
            let value = self
                .engine
                .output(handle, name)
                .await
                .map_err(|source| ScenarioError::provision("output", source))?;
            outputs.insert(name.clone(), value);
        }

        let (exists, policy) = if scenario.inspects() {
            let locator = names.locator(&self.settings.subscription_id);
            let exists = self.inspector.exists(&locator).await?;
            checks.is_true("waf policy exists", exists);
            let policy = if exists {
                match self.inspector.get(&locator).await {
                    Ok(policy) => Some(policy),
                    Err(InspectError::NotFound { resource }) => {
                        checks.fail("waf policy readable", "policy", format!("not found: {resource}"));
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                None
            };
            (Some(exists), policy)
        } else {
            (None, None)
        };

        let observation = Observation {
            names: names.clone(),
            outputs,
            exists,
            policy,
        };

        std::panic::catch_unwind(AssertUnwindSafe(|| scenario.verify(&observation, checks)))
            .map_err(|payload| ScenarioError::Panicked {
                message: panic_message(payload.as_ref()),
            })
    }
}

fn decide_outcome(
    result: Result<(), ScenarioError>,
    checks: &Checks,
    cleanup_error: Option<&str>,
) -> ScenarioOutcome {
    match result {
        Err(ScenarioError::TimedOut { secs }) => ScenarioOutcome::TimedOut { secs },
        Err(ScenarioError::Cancelled) => ScenarioOutcome::Cancelled,
        Err(ScenarioError::Panicked { message }) => ScenarioOutcome::Panicked { message },
        Err(e) => ScenarioOutcome::Errored {
            error: e.to_string(),
        },
        Ok(()) => match (checks.failed(), cleanup_error) {
            (0, None) => ScenarioOutcome::Passed,
            (0, Some(error)) => ScenarioOutcome::CleanupFailed {
                error: error.to_owned(),
            },
            (failed_checks, _) => ScenarioOutcome::Failed { failed_checks },
        },
    }
}

fn record_outcome(scenario: &str, outcome: &ScenarioOutcome, elapsed: Duration) {
    metrics::counter!(m::SCENARIOS_TOTAL, m::LABEL_RESULT => outcome.label()).increment(1);
    metrics::histogram!(m::SCENARIO_DURATION_SECONDS, m::LABEL_SCENARIO => scenario.to_owned())
        .record(elapsed.as_secs_f64());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
