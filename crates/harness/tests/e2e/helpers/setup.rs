//! Runner construction for E2E tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use wafprobe_core::retry::RetryPolicy;
use wafprobe_harness::{RunnerSettings, ScenarioRunner};

use super::fake_cloud::{FakeCloud, FakeEngine, FakeInspector, SUBSCRIPTION};

/// Retry interval short enough for real-time tests.
pub const FAST_RETRY_INTERVAL: Duration = Duration::from_millis(1);

pub type FakeRunner = ScenarioRunner<FakeEngine, FakeInspector>;

/// Retry 3 times on `ResourceInUse`, 1ms apart.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, FAST_RETRY_INTERVAL, BTreeMap::new())
        .with_retryable("ResourceInUse", "Resource is in use by another resource")
}

pub fn settings() -> RunnerSettings {
    RunnerSettings {
        fixtures_dir: "fixtures".into(),
        work_dir: std::env::temp_dir().join("wafprobe-e2e"),
        subscription_id: SUBSCRIPTION.to_owned(),
        name_prefix: "terratest".to_owned(),
        retry: fast_retry(),
        max_parallel: 4,
        scenario_timeout: Duration::from_secs(60),
        cleanup_on_apply_failure: true,
    }
}

/// Everything a test needs to drive and observe runs.
pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub engine: Arc<FakeEngine>,
    pub inspector: Arc<FakeInspector>,
    pub runner: FakeRunner,
}

impl Harness {
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self::with_settings(cloud, settings())
    }

    pub fn with_settings(cloud: Arc<FakeCloud>, settings: RunnerSettings) -> Self {
        let engine = Arc::new(FakeEngine::new(Arc::clone(&cloud)));
        let inspector = Arc::new(FakeInspector::new(Arc::clone(&cloud)));
        let runner = ScenarioRunner::new(Arc::clone(&engine), Arc::clone(&inspector), settings);
        Self {
            cloud,
            engine,
            inspector,
            runner,
        }
    }
}
