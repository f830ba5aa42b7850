//! WAF 정책 시나리오 카탈로그
//!
//! | 시나리오 | 픽스처 | 검증 |
//! |---|---|---|
//! | `basic` | basic | id, name, location output / 존재 / name, location 조회 |
//! | `custom_rules` | custom-rules | `BlockSuspiciousIPs` 규칙 (priority 1) |
//! | `managed_rules` | managed-rules | `OWASP` 관리 규칙 세트 |
//! | `tags` | basic + tags | tags output 키 / 조회한 태그 값 |
//! | `policy_settings` | policy-settings | enabled, Prevention 모드, 본문 검사, 크기 제한 |
//! | `id_format` | basic | id output 형식 |
//!
//! 관측 상태에 없는 필드(규칙 목록, 태그, 정책 설정)는 `skipped`로 기록됩니다.

use wafprobe_core::config::HarnessConfig;

use crate::error::ScenarioError;
use crate::scenario::{Observation, TestScenario, TestScenarioBuilder};
use crate::verify::Checks;

pub const OUTPUT_ID: &str = "waf_policy_id";
pub const OUTPUT_NAME: &str = "waf_policy_name";
pub const OUTPUT_LOCATION: &str = "waf_policy_location";
pub const OUTPUT_TAGS: &str = "waf_policy_tags";

/// `custom-rules` 픽스처가 만드는 규칙
pub const CUSTOM_RULE_NAME: &str = "BlockSuspiciousIPs";
pub const CUSTOM_RULE_PRIORITY: i32 = 1;

/// `managed-rules` 픽스처의 규칙 세트 종류
pub const MANAGED_RULE_SET_TYPE: &str = "OWASP";

/// `tags` 시나리오가 넣는 태그
pub const EXPECTED_TAGS: [(&str, &str); 3] = [
    ("Environment", "test"),
    ("Project", "terratest"),
    ("Owner", "terratest"),
];

/// 카탈로그 공통 입력
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    pub name_prefix: String,
    pub location: String,
}

impl CatalogOptions {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            name_prefix: config.name_prefix.clone(),
            location: config.location.clone(),
        }
    }
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

/// 카탈로그 시나리오 이름 (실행 순서)
pub const SCENARIO_NAMES: [&str; 6] = [
    "basic",
    "custom_rules",
    "managed_rules",
    "tags",
    "policy_settings",
    "id_format",
];

/// 전체 카탈로그
pub fn waf_scenarios(options: &CatalogOptions) -> Vec<TestScenario> {
    SCENARIO_NAMES
        .iter()
        .filter_map(|name| scenario(name, options))
        .collect()
}

/// 이름으로 시나리오 하나를 만듭니다.
pub fn scenario(name: &str, options: &CatalogOptions) -> Option<TestScenario> {
    let built = match name {
        "basic" => basic(options),
        "custom_rules" => custom_rules(options),
        "managed_rules" => managed_rules(options),
        "tags" => tags(options),
        "policy_settings" => policy_settings(options),
        "id_format" => id_format(options),
        _ => return None,
    };
    // 카탈로그 정의는 모두 유효한 픽스처 이름을 사용
    built.ok()
}

fn common(name: &str, fixture: &str, options: &CatalogOptions) -> TestScenarioBuilder {
    TestScenario::builder(name, fixture)
        .var("name_prefix", options.name_prefix.as_str())
        .var("location", options.location.as_str())
}

fn check_id_and_name(obs: &Observation, checks: &mut Checks) {
    checks.not_empty("waf_policy_id output", obs.output(OUTPUT_ID));
    checks.required(
        "waf_policy_name output",
        obs.names.policy.as_str(),
        obs.output(OUTPUT_NAME),
    );
}

fn basic(options: &CatalogOptions) -> Result<TestScenario, ScenarioError> {
    let location = options.location.clone();
    common("basic", "basic", options)
        .outputs([OUTPUT_ID, OUTPUT_NAME, OUTPUT_LOCATION])
        .expect(move |obs, checks| {
            check_id_and_name(obs, checks);
            checks.required(
                "waf_policy_location output",
                location.as_str(),
                obs.output(OUTPUT_LOCATION),
            );
            checks.guarded("waf policy state", obs.policy.as_ref(), |checks, policy| {
                checks.equal_if_present(
                    "policy name",
                    obs.names.policy.as_str(),
                    policy.name.as_deref(),
                );
                checks.location_eq("policy location", &location, policy.location.as_deref());
            });
        })
        .build()
}

fn custom_rules(options: &CatalogOptions) -> Result<TestScenario, ScenarioError> {
    common("custom_rules", "custom-rules", options)
        .outputs([OUTPUT_ID, OUTPUT_NAME])
        .expect(|obs, checks| {
            check_id_and_name(obs, checks);
            let rules = obs
                .policy
                .as_ref()
                .and_then(|p| p.custom_rules.as_ref())
                .filter(|rules| !rules.is_empty());
            checks.guarded("custom rules", rules, |checks, _| {
                let rule = obs
                    .policy
                    .as_ref()
                    .and_then(|p| p.custom_rule(CUSTOM_RULE_NAME));
                match rule {
                    Some(rule) => {
                        checks.required(
                            format!("{CUSTOM_RULE_NAME} priority"),
                            CUSTOM_RULE_PRIORITY,
                            rule.priority,
                        );
                    }
                    None => {
                        checks.fail(
                            format!("{CUSTOM_RULE_NAME} present"),
                            CUSTOM_RULE_NAME,
                            "<absent>",
                        );
                    }
                }
            });
        })
        .build()
}

fn managed_rules(options: &CatalogOptions) -> Result<TestScenario, ScenarioError> {
    common("managed_rules", "managed-rules", options)
        .outputs([OUTPUT_ID, OUTPUT_NAME])
        .expect(|obs, checks| {
            check_id_and_name(obs, checks);
            let sets = obs
                .policy
                .as_ref()
                .and_then(|p| p.managed_rule_sets.as_ref())
                .filter(|sets| !sets.is_empty());
            checks.guarded("managed rule sets", sets, |checks, sets| {
                let found = obs
                    .policy
                    .as_ref()
                    .and_then(|p| p.managed_rule_set(MANAGED_RULE_SET_TYPE))
                    .is_some();
                if found {
                    checks.pass(format!("{MANAGED_RULE_SET_TYPE} rule set present"));
                } else {
                    let observed = sets
                        .iter()
                        .filter_map(|s| s.rule_set_type.as_deref())
                        .collect::<Vec<_>>()
                        .join(", ");
                    checks.fail(
                        format!("{MANAGED_RULE_SET_TYPE} rule set present"),
                        MANAGED_RULE_SET_TYPE,
                        observed,
                    );
                }
            });
        })
        .build()
}

fn tags(options: &CatalogOptions) -> Result<TestScenario, ScenarioError> {
    let tags: serde_json::Map<String, serde_json::Value> = EXPECTED_TAGS
        .iter()
        .map(|(k, v)| ((*k).to_owned(), serde_json::Value::from(*v)))
        .collect();

    common("tags", "basic", options)
        .var("tags", tags)
        .output(OUTPUT_TAGS)
        .expect(|obs, checks| {
            let output = obs.output(OUTPUT_TAGS);
            if !checks.not_empty("waf_policy_tags output", output) {
                return;
            }
            let output = output.unwrap_or_default();
            for (key, _) in EXPECTED_TAGS {
                checks.contains(format!("tags output has {key}"), output, &format!("\"{key}\""));
            }
            checks.guarded(
                "policy tags",
                obs.policy.as_ref().and_then(|p| p.tags.as_ref()),
                |checks, tags| {
                    for (key, value) in EXPECTED_TAGS {
                        checks.required(
                            format!("tag {key}"),
                            value,
                            tags.get(key).map(String::as_str),
                        );
                    }
                },
            );
        })
        .build()
}

fn policy_settings(options: &CatalogOptions) -> Result<TestScenario, ScenarioError> {
    common("policy_settings", "policy-settings", options)
        .outputs([OUTPUT_ID, OUTPUT_NAME])
        .expect(|obs, checks| {
            check_id_and_name(obs, checks);
            checks.guarded(
                "policy settings",
                obs.policy.as_ref().and_then(|p| p.policy_settings.as_ref()),
                |checks, settings| {
                    checks.required("policy enabled", true, settings.enabled);
                    checks.equal_if_present("policy mode", "Prevention", settings.mode.as_deref());
                    checks.equal_if_present(
                        "request body check",
                        true,
                        settings.request_body_check,
                    );
                    checks.equal_if_present(
                        "max request body size (KB)",
                        128,
                        settings.max_request_body_size_in_kb,
                    );
                    checks.equal_if_present(
                        "file upload limit (MB)",
                        100,
                        settings.file_upload_limit_in_mb,
                    );
                },
            );
        })
        .build()
}

fn id_format(options: &CatalogOptions) -> Result<TestScenario, ScenarioError> {
    common("id_format", "basic", options)
        .output(OUTPUT_ID)
        .inspect(false)
        .expect(|obs, checks| {
            let id = obs.output(OUTPUT_ID);
            if !checks.not_empty("waf_policy_id output", id) {
                return;
            }
            checks.waf_policy_id("waf_policy_id format", id.unwrap_or_default());
        })
        .build()
}
