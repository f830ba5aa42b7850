//! S2: Guaranteed cleanup -> every exit path destroys exactly once.
//!
//! Validates that a successful apply is followed by one destroy when the
//! verification fails, panics, times out, is cancelled, or when the run
//! future is dropped, and that apply failures follow the best-effort setting.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::helpers::assertions::*;
use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::setup::{Harness, settings};

use wafprobe_harness::{Phase, ScenarioOutcome, TestScenario};

fn scenario_with_outputs() -> TestScenario {
    TestScenario::builder("cleanup", "basic")
        .var("location", "East US")
        .outputs(["waf_policy_id", "waf_policy_name"])
        .build()
        .expect("valid scenario")
}

/// Expectation panics -> reported as panicked, resource still destroyed.
#[tokio::test]
async fn test_e2e_panicking_expectation_still_destroys() {
    let h = Harness::new(FakeCloud::new());
    let scenario = TestScenario::builder("panics", "basic")
        .var("location", "East US")
        .expect(|_, _| panic!("verification blew up"))
        .build()
        .expect("valid scenario");

    let report = h.runner.run(&scenario).await;

    assert_eq!(
        report.outcome,
        ScenarioOutcome::Panicked {
            message: "verification blew up".to_owned()
        }
    );
    assert_eq!(report.phases, CLEAN_RUN);
    assert_destroyed_once(&h.engine, &[&report]);
    assert_eq!(h.cloud.len(), 0);
}

/// Scenario timeout while waiting on an output -> timed out, destroyed.
#[tokio::test(start_paused = true)]
async fn test_e2e_timeout_destroys() {
    let mut s = settings();
    s.scenario_timeout = Duration::from_millis(50);
    let h = Harness::with_settings(FakeCloud::new(), s);
    h.engine.delay_outputs(Duration::from_secs(10));

    let report = h.runner.run(&scenario_with_outputs()).await;

    assert_eq!(report.outcome, ScenarioOutcome::TimedOut { secs: 0 });
    assert_eq!(report.phases, CLEAN_RUN);
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Cancellation token fires mid-run -> cancelled, destroyed.
#[tokio::test(start_paused = true)]
async fn test_e2e_cancel_destroys() {
    let h = Harness::new(FakeCloud::new());
    h.engine.delay_outputs(Duration::from_secs(10));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let report = h
        .runner
        .run_with_cancel(&scenario_with_outputs(), &cancel)
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Cancelled);
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Cancelled before start -> nothing applied, nothing destroyed.
#[tokio::test]
async fn test_e2e_cancel_before_apply_skips_everything() {
    let h = Harness::new(FakeCloud::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = h
        .runner
        .run_with_cancel(&scenario_with_outputs(), &cancel)
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Cancelled);
    assert_eq!(report.phases, vec![Phase::NotApplied]);
    assert_eq!(h.engine.destroy_count(), 0);
}

/// The run future is dropped by the caller -> the guard destroys on drop.
#[tokio::test(start_paused = true)]
async fn test_e2e_dropped_run_future_destroys() {
    let h = Harness::new(FakeCloud::new());
    h.engine.delay_outputs(Duration::from_secs(10));

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        h.runner.run(&scenario_with_outputs()),
    )
    .await;

    assert!(result.is_err(), "run should still be waiting on outputs");
    assert_eq!(h.engine.destroy_count(), 1);
    assert_eq!(h.cloud.len(), 0);
}

/// Output never declared -> fatal error, destroyed.
#[tokio::test]
async fn test_e2e_missing_output_is_fatal_and_destroys() {
    let h = Harness::new(FakeCloud::new());
    let scenario = TestScenario::builder("bad-output", "basic")
        .var("location", "East US")
        .output("waf_policy_does_not_exist")
        .build()
        .expect("valid scenario");

    let report = h.runner.run(&scenario).await;

    match &report.outcome {
        ScenarioOutcome::Errored { error } => {
            assert!(error.contains("output"), "{error}");
            assert!(error.contains("waf_policy_does_not_exist"), "{error}");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Non-retryable apply failure with best-effort cleanup -> one destroy of the
/// scenario workspace.
#[tokio::test]
async fn test_e2e_apply_failure_best_effort_cleanup() {
    let h = Harness::new(FakeCloud::new());
    h.engine.fail_apply_with(["Error: InvalidResourceName"]);

    let report = h.runner.run(&scenario_with_outputs()).await;

    assert!(matches!(report.outcome, ScenarioOutcome::Errored { .. }));
    assert_eq!(
        report.phases,
        vec![
            Phase::NotApplied,
            Phase::Applying,
            Phase::ApplyFailed,
            Phase::Destroying,
            Phase::Destroyed,
        ]
    );
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Apply failure with cleanup disabled -> ApplyFailed is terminal.
#[tokio::test]
async fn test_e2e_apply_failure_without_cleanup() {
    let mut s = settings();
    s.cleanup_on_apply_failure = false;
    let h = Harness::with_settings(FakeCloud::new(), s);
    h.engine.fail_apply_with(["Error: InvalidResourceName"]);

    let report = h.runner.run(&scenario_with_outputs()).await;

    assert_eq!(report.phases.last(), Some(&Phase::ApplyFailed));
    assert_eq!(h.engine.destroy_count(), 0);
    assert_eq!(h.engine.output_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

/// Destroy fails after passing checks -> cleanup failure outcome.
#[tokio::test]
async fn test_e2e_destroy_failure_is_reported() {
    let h = Harness::new(FakeCloud::new());
    h.engine.fail_destroy_with("Error: deleting Web Application Firewall Policy");

    let report = h.runner.run(&scenario_with_outputs()).await;

    assert!(matches!(
        report.outcome,
        ScenarioOutcome::CleanupFailed { ref error } if error.contains("deleting Web Application Firewall Policy")
    ));
    assert_eq!(report.phases.last(), Some(&Phase::DestroyFailed));
    assert!(!report.destroyed());
    assert!(report.cleanup_error.is_some());
    assert_eq!(h.engine.destroy_count(), 1);
}
