//! S4: Presence-guarded verification -> absent fields skipped, not failed.
//!
//! Validates that observed state with missing optional blocks (custom rules,
//! tags, policy settings) produces skipped checks, and that a missing resource
//! is an assertion failure rather than a fatal error.

use crate::helpers::assertions::*;
use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::setup::Harness;

use wafprobe_core::types::{PolicySettings, WafPolicy};
use wafprobe_harness::catalog::{self, CatalogOptions};
use wafprobe_harness::{CheckStatus, ScenarioOutcome};

/// Custom rule list absent in live state -> custom rule checks skipped.
#[tokio::test]
async fn test_e2e_absent_custom_rules_are_skipped() {
    // Given: a cloud whose policies have no custom rule list
    let h = Harness::new(FakeCloud::new());
    let scenario = catalog::scenario("custom_rules", &CatalogOptions::default()).unwrap();

    // When
    let report = h.runner.run(&scenario).await;

    // Then
    assert_passed(&report);
    assert!(matches!(
        check(&report, "custom rules").status,
        CheckStatus::Skipped { .. }
    ));
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Sparse policy settings -> required `enabled` fails, others skipped.
#[tokio::test]
async fn test_e2e_sparse_policy_settings() {
    let cloud = FakeCloud::new();
    cloud.set_template(WafPolicy {
        policy_settings: Some(PolicySettings {
            enabled: Some(true),
            ..PolicySettings::default()
        }),
        ..WafPolicy::default()
    });
    let h = Harness::new(cloud);
    let scenario = catalog::scenario("policy_settings", &CatalogOptions::default()).unwrap();

    let report = h.runner.run(&scenario).await;

    assert_passed(&report);
    assert_eq!(check(&report, "policy enabled").status, CheckStatus::Passed);
    for name in [
        "policy mode",
        "request body check",
        "max request body size (KB)",
        "file upload limit (MB)",
    ] {
        assert!(
            matches!(check(&report, name).status, CheckStatus::Skipped { .. }),
            "{name} should be skipped"
        );
    }
}

/// Apply reports success but the policy does not exist -> assertion failure,
/// cleanup still runs.
#[tokio::test]
async fn test_e2e_missing_resource_is_assertion_failure() {
    let h = Harness::new(FakeCloud::new());
    h.engine.skip_create();
    let scenario = catalog::scenario("basic", &CatalogOptions::default()).unwrap();

    let report = h.runner.run(&scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed { failed_checks: 1 });
    assert_eq!(
        check(&report, "waf policy exists").status,
        CheckStatus::Failed {
            expected: "true".to_owned(),
            observed: "false".to_owned(),
        }
    );
    assert!(matches!(
        check(&report, "waf policy state").status,
        CheckStatus::Skipped { .. }
    ));
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Management API error on lookup -> fatal, cleanup still runs.
#[tokio::test]
async fn test_e2e_inspector_error_is_fatal() {
    let h = Harness::new(FakeCloud::new());
    h.inspector
        .fail_with_api_error(503, "ServiceUnavailable: try again later");
    let scenario = catalog::scenario("basic", &CatalogOptions::default()).unwrap();

    let report = h.runner.run(&scenario).await;

    match &report.outcome {
        ScenarioOutcome::Errored { error } => assert!(error.contains("503"), "{error}"),
        other => panic!("expected Errored, got {other:?}"),
    }
    assert_destroyed_once(&h.engine, &[&report]);
}
