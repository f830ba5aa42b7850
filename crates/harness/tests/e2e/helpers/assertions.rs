//! Report assertion helpers for E2E tests.

use wafprobe_harness::{CheckOutcome, Phase, ScenarioReport};

use super::fake_cloud::FakeEngine;

/// Phase history of a passing run.
pub const CLEAN_RUN: [Phase; 5] = [
    Phase::NotApplied,
    Phase::Applying,
    Phase::Applied,
    Phase::Destroying,
    Phase::Destroyed,
];

/// Find a check by name.
///
/// # Panics
///
/// Panics if the report has no check with that name.
#[allow(dead_code)]
pub fn check<'a>(report: &'a ScenarioReport, name: &str) -> &'a CheckOutcome {
    report
        .checks
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no check named '{name}' in {:#?}", report.checks))
}

/// Assert that the engine destroyed each workspace exactly once.
#[allow(dead_code)]
pub fn assert_destroyed_once(engine: &FakeEngine, reports: &[&ScenarioReport]) {
    let destroyed = engine.destroyed();
    for report in reports {
        let label = format!("{}-{}", report.fixture, report.unique_id);
        let count = destroyed.iter().filter(|l| **l == label).count();
        assert_eq!(
            count, 1,
            "workspace {label} destroyed {count} times (all destroys: {destroyed:?})"
        );
    }
}

/// Assert that the report passed, printing it otherwise.
#[allow(dead_code)]
pub fn assert_passed(report: &ScenarioReport) {
    assert!(
        report.passed(),
        "scenario '{}' did not pass: {:#?}",
        report.scenario,
        report
    );
}
