//! S1: Scenario lifecycle -> apply -> output -> inspect -> verify -> destroy.
//!
//! Validates the happy path of a single scenario run: names derived from the
//! unique identifier reach the engine, outputs and live state are observed,
//! and the resource is destroyed exactly once.

use crate::helpers::assertions::*;
use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::setup::Harness;

use wafprobe_harness::{CheckStatus, Phase, ScenarioOutcome, TestScenario};

fn location_scenario() -> TestScenario {
    TestScenario::builder("basic", "basic")
        .var("name_prefix", "t")
        .var("location", "East US")
        .output("waf_policy_location")
        .expect(|obs, checks| {
            checks.required(
                "waf_policy_location output",
                "East US",
                obs.output("waf_policy_location"),
            );
            checks.guarded("policy", obs.policy.as_ref(), |checks, policy| {
                checks.location_eq("policy location", "East US", policy.location.as_deref());
            });
        })
        .build()
        .expect("valid scenario")
}

/// Mocked end-to-end run: apply ok, location output and live location match,
/// destroy once.
#[tokio::test]
async fn test_e2e_basic_location_round_trip() {
    // Given: an empty cloud and the basic fixture with prefix "t"
    let h = Harness::new(FakeCloud::new());

    // When: running the scenario
    let report = h.runner.run(&location_scenario()).await;

    // Then: it passes and cleans up
    assert_passed(&report);
    assert_eq!(report.phases, CLEAN_RUN);
    assert_destroyed_once(&h.engine, &[&report]);
    assert_eq!(h.cloud.len(), 0, "policy should be gone after destroy");

    assert_eq!(
        check(&report, "waf_policy_location output").status,
        CheckStatus::Passed
    );
    assert_eq!(check(&report, "policy location").status, CheckStatus::Passed);
    assert_eq!(check(&report, "waf policy exists").status, CheckStatus::Passed);
}

/// Names are derived from the prefix and the run's unique identifier.
#[tokio::test]
async fn test_e2e_names_reach_engine_vars() {
    let h = Harness::new(FakeCloud::new());

    let report = h.runner.run(&location_scenario()).await;

    let id = report.unique_id.to_string();
    assert_eq!(report.names.resource_group, format!("t-waf-rg-{id}"));
    assert_eq!(report.names.policy, format!("t-waf-policy-{id}"));

    let applied = h.engine.applied_vars();
    let vars = applied
        .get(&format!("basic-{id}"))
        .expect("engine saw the run's workspace");
    assert_eq!(vars["resource_group_name"], format!("t-waf-rg-{id}"));
    assert_eq!(vars["waf_policy_name"], format!("t-waf-policy-{id}"));
    assert_eq!(vars["location"], "East US");
    assert_eq!(vars["name_prefix"], "t");
}

/// Without a `name_prefix` var the runner's configured prefix is used.
#[tokio::test]
async fn test_e2e_default_prefix_from_settings() {
    let h = Harness::new(FakeCloud::new());
    let scenario = TestScenario::builder("plain", "basic")
        .var("location", "East US")
        .inspect(false)
        .build()
        .expect("valid scenario");

    let report = h.runner.run(&scenario).await;

    assert_passed(&report);
    assert!(report.names.policy.starts_with("terratest-waf-policy-"));
    assert!(report.checks.is_empty());
    assert_eq!(h.inspector.lookups.load(std::sync::atomic::Ordering::SeqCst), 0);
}

/// A failing check fails the scenario but never skips cleanup.
#[tokio::test]
async fn test_e2e_failed_check_reports_expected_and_observed() {
    let h = Harness::new(FakeCloud::new());
    let scenario = TestScenario::builder("wrong-location", "basic")
        .var("location", "West Europe")
        .output("waf_policy_location")
        .expect(|obs, checks| {
            checks.required(
                "waf_policy_location output",
                "East US",
                obs.output("waf_policy_location"),
            );
        })
        .build()
        .expect("valid scenario");

    let report = h.runner.run(&scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed { failed_checks: 1 });
    assert_eq!(
        check(&report, "waf_policy_location output").status,
        CheckStatus::Failed {
            expected: "East US".to_owned(),
            observed: "West Europe".to_owned(),
        }
    );
    assert_eq!(report.phases.last(), Some(&Phase::Destroyed));
    assert_destroyed_once(&h.engine, &[&report]);
}
