//! ARM JSON shapes for `ApplicationGatewayWebApplicationFirewallPolicies`.
//!
//! Only the fields wafprobe verifies are modelled; everything else in the
//! response is ignored. Every field is optional so a partial response still
//! decodes and the missing parts are reported as "not verified".

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use wafprobe_core::types::{CustomRule, ManagedRuleSet, PolicySettings, WafPolicy};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArmWafPolicy {
    id: Option<String>,
    name: Option<String>,
    location: Option<String>,
    tags: Option<BTreeMap<String, String>>,
    properties: Option<ArmProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmProperties {
    custom_rules: Option<Vec<ArmCustomRule>>,
    managed_rules: Option<ArmManagedRules>,
    policy_settings: Option<ArmPolicySettings>,
    provisioning_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmCustomRule {
    name: Option<String>,
    priority: Option<i32>,
    rule_type: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmManagedRules {
    managed_rule_sets: Option<Vec<ArmManagedRuleSet>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmManagedRuleSet {
    rule_set_type: Option<String>,
    rule_set_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmPolicySettings {
    /// "Enabled" | "Disabled"
    state: Option<String>,
    mode: Option<String>,
    request_body_check: Option<bool>,
    max_request_body_size_in_kb: Option<i32>,
    file_upload_limit_in_mb: Option<i32>,
}

impl From<ArmWafPolicy> for WafPolicy {
    fn from(arm: ArmWafPolicy) -> Self {
        let properties = arm.properties.unwrap_or_default();
        Self {
            id: arm.id,
            name: arm.name,
            location: arm.location,
            tags: arm.tags,
            custom_rules: properties.custom_rules.map(|rules| {
                rules
                    .into_iter()
                    .map(|r| CustomRule {
                        name: r.name,
                        priority: r.priority,
                        rule_type: r.rule_type,
                        action: r.action,
                    })
                    .collect()
            }),
            managed_rule_sets: properties
                .managed_rules
                .and_then(|m| m.managed_rule_sets)
                .map(|sets| {
                    sets.into_iter()
                        .map(|s| ManagedRuleSet {
                            rule_set_type: s.rule_set_type,
                            rule_set_version: s.rule_set_version,
                        })
                        .collect()
                }),
            policy_settings: properties.policy_settings.map(|s| PolicySettings {
                enabled: s.state.map(|state| state.eq_ignore_ascii_case("Enabled")),
                mode: s.mode,
                request_body_check: s.request_body_check,
                max_request_body_size_in_kb: s.max_request_body_size_in_kb,
                file_upload_limit_in_mb: s.file_upload_limit_in_mb,
            }),
            provisioning_state: properties.provisioning_state,
        }
    }
}

/// Formats an ARM error body as `code: message`.
pub(crate) fn parse_arm_error(body: &Value) -> String {
    let err = body
        .get("error")
        .or_else(|| body.get("Error"))
        .unwrap_or(body);
    let code = err["code"].as_str().unwrap_or("Unknown");
    let message = err["message"]
        .as_str()
        .or_else(|| body.as_str())
        .unwrap_or("unknown error");
    format!("{code}: {message}")
}
