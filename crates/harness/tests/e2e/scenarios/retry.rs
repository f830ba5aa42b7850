//! S3: Retry policy -> transient apply errors retried by substring match.
//!
//! Validates that only errors containing a recognized substring are retried,
//! that the retry count bounds the attempts, and that exhaustion is fatal.

use std::sync::atomic::Ordering;

use crate::helpers::assertions::*;
use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::setup::Harness;

use wafprobe_harness::{ScenarioOutcome, TestScenario};

fn scenario() -> TestScenario {
    TestScenario::builder("retry", "basic")
        .var("location", "East US")
        .output("waf_policy_name")
        .build()
        .expect("valid scenario")
}

const IN_USE: &str = "Error: deleting Resource Group: ResourceInUse: the policy is attached";

/// Transient error twice, then success, with 3 retries -> 3 attempts, pass.
#[tokio::test]
async fn test_e2e_transient_error_retried_until_success() {
    let h = Harness::new(FakeCloud::new());
    h.engine.fail_apply_with([IN_USE, IN_USE]);

    let report = h.runner.run(&scenario()).await;

    assert_passed(&report);
    assert_eq!(h.engine.apply_attempts.load(Ordering::SeqCst), 3);
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Unrecognized error -> exactly one attempt.
#[tokio::test]
async fn test_e2e_unrecognized_error_not_retried() {
    let h = Harness::new(FakeCloud::new());
    h.engine
        .fail_apply_with(["Error: creating Web Application Firewall Policy: InvalidResourceName"]);

    let report = h.runner.run(&scenario()).await;

    assert_eq!(h.engine.apply_attempts.load(Ordering::SeqCst), 1);
    match &report.outcome {
        ScenarioOutcome::Errored { error } => {
            assert!(error.starts_with("apply failed"), "{error}");
            assert!(error.contains("InvalidResourceName"), "raw message kept: {error}");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
}

/// Transient error on every attempt -> retries exhausted after 4 attempts.
#[tokio::test]
async fn test_e2e_retries_exhausted_is_fatal() {
    let h = Harness::new(FakeCloud::new());
    h.engine.fail_apply_with([IN_USE; 5]);

    let report = h.runner.run(&scenario()).await;

    assert_eq!(h.engine.apply_attempts.load(Ordering::SeqCst), 4);
    match &report.outcome {
        ScenarioOutcome::Errored { error } => {
            assert!(error.contains("after 4 attempts"), "{error}");
            assert!(error.contains("Resource is in use by another resource"), "{error}");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
    assert_eq!(h.engine.output_calls.load(Ordering::SeqCst), 0);
}

/// A scenario-level retry policy overrides the runner default.
#[tokio::test]
async fn test_e2e_scenario_retry_override() {
    let h = Harness::new(FakeCloud::new());
    h.engine.fail_apply_with([IN_USE]);
    let no_retry = TestScenario::builder("no-retry", "basic")
        .var("location", "East US")
        .retry(wafprobe_core::retry::RetryPolicy::none())
        .build()
        .expect("valid scenario");

    let report = h.runner.run(&no_retry).await;

    assert!(matches!(report.outcome, ScenarioOutcome::Errored { .. }));
    assert_eq!(h.engine.apply_attempts.load(Ordering::SeqCst), 1);
}
