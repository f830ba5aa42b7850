//! Verification checks with field-presence guards.
//!
//! Every comparison is recorded as a [`CheckOutcome`]. A value missing from the
//! observed state becomes [`CheckStatus::Skipped`] ("not verified") instead of
//! a failure, unless the check explicitly requires it.

use std::fmt::Display;

use serde::Serialize;
use wafprobe_core::types::{normalize_location, validate_waf_policy_id};

const ABSENT: &str = "<absent>";

/// Result of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: CheckStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed { expected: String, observed: String },
    Skipped { reason: String },
}

impl CheckOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, CheckStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, CheckStatus::Skipped { .. })
    }
}

/// Accumulates check outcomes for one scenario run.
///
/// Comparison methods return whether the check passed (a skip counts as
/// passed) so a caller can stop early after a check it treats as fatal.
#[derive(Debug, Default)]
pub struct Checks {
    outcomes: Vec<CheckOutcome>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&mut self, name: impl Into<String>) -> bool {
        self.push(name, CheckStatus::Passed);
        true
    }

    pub fn fail(
        &mut self,
        name: impl Into<String>,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) -> bool {
        self.push(
            name,
            CheckStatus::Failed {
                expected: expected.into(),
                observed: observed.into(),
            },
        );
        false
    }

    pub fn skip(&mut self, name: impl Into<String>, reason: impl Into<String>) -> bool {
        self.push(
            name,
            CheckStatus::Skipped {
                reason: reason.into(),
            },
        );
        true
    }

    /// Value must be present and non-empty.
    pub fn not_empty(&mut self, name: impl Into<String>, observed: Option<&str>) -> bool {
        match observed {
            Some(value) if !value.is_empty() => self.pass(name),
            Some(_) => self.fail(name, "non-empty value", "\"\""),
            None => self.fail(name, "non-empty value", ABSENT),
        }
    }

    pub fn equal<T: PartialEq + Display>(
        &mut self,
        name: impl Into<String>,
        expected: T,
        observed: T,
    ) -> bool {
        if expected == observed {
            self.pass(name)
        } else {
            self.fail(name, expected.to_string(), observed.to_string())
        }
    }

    /// Value must be present and equal.
    pub fn required<T: PartialEq + Display>(
        &mut self,
        name: impl Into<String>,
        expected: T,
        observed: Option<T>,
    ) -> bool {
        match observed {
            Some(observed) => self.equal(name, expected, observed),
            None => self.fail(name, expected.to_string(), ABSENT),
        }
    }

    /// Compares only when the value was observed.
    pub fn equal_if_present<T: PartialEq + Display>(
        &mut self,
        name: impl Into<String>,
        expected: T,
        observed: Option<T>,
    ) -> bool {
        match observed {
            Some(observed) => self.equal(name, expected, observed),
            None => self.skip(name, "not verified: field absent"),
        }
    }

    pub fn is_true(&mut self, name: impl Into<String>, observed: bool) -> bool {
        self.equal(name, true, observed)
    }

    pub fn contains(&mut self, name: impl Into<String>, haystack: &str, needle: &str) -> bool {
        if haystack.contains(needle) {
            self.pass(name)
        } else {
            self.fail(name, format!("contains '{needle}'"), haystack)
        }
    }

    /// Runs `verify` only when `observed` is present, otherwise records a skip.
    pub fn guarded<T>(
        &mut self,
        name: impl Into<String>,
        observed: Option<T>,
        verify: impl FnOnce(&mut Self, T),
    ) {
        match observed {
            Some(value) => verify(self, value),
            None => {
                self.skip(name, "not verified: field absent");
            }
        }
    }

    /// Azure location comparison: case-insensitive, whitespace-insensitive
    /// ("East US" == "eastus"). Skipped when absent.
    pub fn location_eq(
        &mut self,
        name: impl Into<String>,
        expected: &str,
        observed: Option<&str>,
    ) -> bool {
        match observed {
            Some(observed) if normalize_location(expected) == normalize_location(observed) => {
                self.pass(name)
            }
            Some(observed) => self.fail(name, expected, observed),
            None => self.skip(name, "not verified: field absent"),
        }
    }

    /// Value must be a well-formed WAF policy resource id.
    pub fn waf_policy_id(&mut self, name: impl Into<String>, observed: &str) -> bool {
        match validate_waf_policy_id(observed) {
            Ok(()) => self.pass(name),
            Err(e) => self.fail(name, "well-formed waf policy id", e.to_string()),
        }
    }

    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|c| c.is_failed()).count()
    }

    pub fn into_outcomes(self) -> Vec<CheckOutcome> {
        self.outcomes
    }

    fn push(&mut self, name: impl Into<String>, status: CheckStatus) {
        self.outcomes.push(CheckOutcome {
            name: name.into(),
            status,
        });
    }
}
