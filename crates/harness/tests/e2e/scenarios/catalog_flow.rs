//! S6: WAF catalog -> every catalog scenario against a fully configured cloud.
//!
//! Validates the six catalog scenarios end to end, including the tags output
//! and resource-id format checks.

use tokio_util::sync::CancellationToken;

use crate::helpers::assertions::*;
use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::setup::Harness;

use wafprobe_harness::catalog::{self, CatalogOptions, SCENARIO_NAMES};
use wafprobe_harness::{CheckStatus, ScenarioOutcome};

/// Full catalog against complete policies -> all six pass.
#[tokio::test]
async fn test_e2e_full_catalog_passes() {
    let h = Harness::new(FakeCloud::with_full_policies());

    let reports = h
        .runner
        .run_all(
            catalog::waf_scenarios(&CatalogOptions::default()),
            CancellationToken::new(),
        )
        .await;

    let names: Vec<_> = reports.iter().map(|r| r.scenario.as_str()).collect();
    assert_eq!(names, SCENARIO_NAMES);
    for report in &reports {
        assert_passed(report);
        assert!(
            report.failed_checks().next().is_none(),
            "{}: {:?}",
            report.scenario,
            report.checks
        );
    }
    assert_eq!(
        check(&reports[1], "BlockSuspiciousIPs priority").status,
        CheckStatus::Passed
    );
    assert_eq!(check(&reports[3], "tag Owner").status, CheckStatus::Passed);
    assert_destroyed_once(&h.engine, &reports.iter().collect::<Vec<_>>());
}

/// Malformed id output -> the id format check fails.
#[tokio::test]
async fn test_e2e_id_format_rejects_malformed_id() {
    let h = Harness::new(FakeCloud::new());
    h.engine
        .override_output("waf_policy_id", "resourceGroups/rg1/providers/x");
    let scenario = catalog::scenario("id_format", &CatalogOptions::default()).unwrap();

    let report = h.runner.run(&scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed { failed_checks: 1 });
    assert!(matches!(
        check(&report, "waf_policy_id format").status,
        CheckStatus::Failed { ref observed, .. } if observed.contains("/subscriptions/")
    ));
    assert_destroyed_once(&h.engine, &[&report]);
}

/// Empty id output -> fatal check, format check never runs.
#[tokio::test]
async fn test_e2e_id_format_empty_id_stops_early() {
    let h = Harness::new(FakeCloud::new());
    h.engine.override_output("waf_policy_id", "");
    let scenario = catalog::scenario("id_format", &CatalogOptions::default()).unwrap();

    let report = h.runner.run(&scenario).await;

    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.outcome, ScenarioOutcome::Failed { failed_checks: 1 });
}
