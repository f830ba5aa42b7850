//! S5: Concurrent scenarios -> isolated names, bounded parallelism, fault isolation.
//!
//! Validates that `run_all` gives every scenario its own identifier and
//! workspace, never exceeds `max_parallel` concurrent applies, and that one
//! scenario failing or panicking leaves its siblings untouched.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::helpers::assertions::*;
use crate::helpers::fake_cloud::{FakeCloud, FakeEngine, FakeInspector};
use crate::helpers::setup::{Harness, settings};

use wafprobe_harness::{ScenarioOutcome, ScenarioRunner, TestScenario};

fn simple(name: &str) -> TestScenario {
    TestScenario::builder(name, "basic")
        .var("location", "East US")
        .output("waf_policy_name")
        .expect(|obs, checks| {
            checks.required(
                "waf_policy_name output",
                obs.names.policy.as_str(),
                obs.output("waf_policy_name"),
            );
        })
        .build()
        .expect("valid scenario")
}

/// Eight scenarios with max_parallel = 2 -> all pass, distinct names,
/// at most two applies in flight.
#[tokio::test(start_paused = true)]
async fn test_e2e_run_all_bounded_and_isolated() {
    let mut s = settings();
    s.max_parallel = 2;
    let h = Harness::with_settings(FakeCloud::new(), s);
    h.engine.delay_apply(Duration::from_millis(100));

    let scenarios: Vec<_> = (0..8).map(|i| simple(&format!("s{i}"))).collect();
    let reports = h.runner.run_all(scenarios, CancellationToken::new()).await;

    assert_eq!(reports.len(), 8);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.scenario, format!("s{i}"), "reports keep input order");
        assert_passed(report);
    }
    let ids: HashSet<_> = reports.iter().map(|r| r.unique_id.clone()).collect();
    let groups: HashSet<_> = reports
        .iter()
        .map(|r| r.names.resource_group.clone())
        .collect();
    assert_eq!(ids.len(), 8);
    assert_eq!(groups.len(), 8);
    assert!(h.engine.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_destroyed_once(&h.engine, &reports.iter().collect::<Vec<_>>());
    assert_eq!(h.cloud.len(), 0);
}

/// One scenario fails its checks -> siblings still pass and all clean up.
#[tokio::test]
async fn test_e2e_failure_does_not_affect_siblings() {
    let h = Harness::new(FakeCloud::new());
    let failing = TestScenario::builder("failing", "basic")
        .var("location", "East US")
        .expect(|_, checks| {
            checks.fail("always", "pass", "fail");
        })
        .build()
        .expect("valid scenario");

    let reports = h
        .runner
        .run_all(
            vec![simple("a"), failing, simple("b")],
            CancellationToken::new(),
        )
        .await;

    assert_passed(&reports[0]);
    assert_eq!(reports[1].outcome, ScenarioOutcome::Failed { failed_checks: 1 });
    assert_passed(&reports[2]);
    assert_destroyed_once(&h.engine, &reports.iter().collect::<Vec<_>>());
}

/// Engine panics inside one scenario task -> that report is panicked, the
/// guard destroys during unwinding, siblings are unaffected.
#[tokio::test]
async fn test_e2e_engine_panic_is_isolated() {
    let cloud = FakeCloud::new();
    let exploding = Arc::new(FakeEngine::new(Arc::clone(&cloud)));
    exploding.panic_on_output();
    let inspector = Arc::new(FakeInspector::new(Arc::clone(&cloud)));
    let runner = ScenarioRunner::new(Arc::clone(&exploding), inspector, settings());

    let reports = runner
        .run_all(vec![simple("explodes")], CancellationToken::new())
        .await;

    assert!(matches!(
        reports[0].outcome,
        ScenarioOutcome::Panicked { ref message } if message.contains("output exploded")
    ));
    assert_eq!(exploding.destroy_count(), 1);
    assert_eq!(cloud.len(), 0);

    // A healthy runner on the same cloud is unaffected.
    let h = Harness::new(cloud);
    let report = h.runner.run(&simple("healthy")).await;
    assert_passed(&report);
}

/// Cancelled before any scenario starts -> every report cancelled, nothing applied.
#[tokio::test]
async fn test_e2e_run_all_cancelled_upfront() {
    let h = Harness::new(FakeCloud::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let reports = h
        .runner
        .run_all(vec![simple("a"), simple("b")], cancel)
        .await;

    assert!(reports.iter().all(|r| r.outcome == ScenarioOutcome::Cancelled));
    assert_eq!(h.engine.apply_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(h.engine.destroy_count(), 0);
}
