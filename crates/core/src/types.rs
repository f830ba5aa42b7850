//! 도메인 타입 — WAF 정책 상태, 리소스 식별자, 리소스 위치
//!
//! 조회 결과([`WafPolicy`])의 모든 중첩 필드는 `Option`입니다.
//! 관리 API가 필드를 돌려주지 않으면 검증 단계에서 해당 비교를 건너뜁니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResourceIdError;

/// WAF 정책 리소스의 provider 경로
pub const WAF_POLICY_PROVIDER_PATH: &str =
    "/providers/Microsoft.Network/ApplicationGatewayWebApplicationFirewallPolicies/";

/// WAF 정책 리소스 네임스페이스
pub const WAF_POLICY_NAMESPACE: &str = "Microsoft.Network";

/// WAF 정책 리소스 타입
pub const WAF_POLICY_TYPE: &str = "ApplicationGatewayWebApplicationFirewallPolicies";

/// 리소스 식별자가 WAF 정책 식별자 형식인지 검증합니다.
///
/// 비어 있지 않고, `/subscriptions/`로 시작하며,
/// [`WAF_POLICY_PROVIDER_PATH`]를 포함해야 합니다.
pub fn validate_waf_policy_id(id: &str) -> Result<(), ResourceIdError> {
    if id.is_empty() {
        return Err(ResourceIdError::Empty);
    }
    if !id.starts_with("/subscriptions/") {
        return Err(ResourceIdError::MissingSubscriptionPrefix(id.to_owned()));
    }
    if !id.contains(WAF_POLICY_PROVIDER_PATH) {
        return Err(ResourceIdError::MissingProviderPath {
            id: id.to_owned(),
            expected: WAF_POLICY_PROVIDER_PATH.to_owned(),
        });
    }
    Ok(())
}

/// 파싱된 ARM 리소스 식별자
///
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}`
/// 형식만 다룹니다. 키워드 세그먼트는 대소문자를 구분하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace: String,
    pub resource_type: String,
    pub name: String,
}

impl ResourceId {
    /// WAF 정책 리소스 식별자를 생성합니다.
    pub fn waf_policy(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            namespace: WAF_POLICY_NAMESPACE.to_owned(),
            resource_type: WAF_POLICY_TYPE.to_owned(),
            name: name.into(),
        }
    }

    /// WAF 정책 리소스인지 확인합니다.
    pub fn is_waf_policy(&self) -> bool {
        self.namespace.eq_ignore_ascii_case(WAF_POLICY_NAMESPACE)
            && self.resource_type.eq_ignore_ascii_case(WAF_POLICY_TYPE)
    }

    /// 조회용 위치 정보로 변환합니다.
    pub fn locator(&self) -> ResourceLocator {
        ResourceLocator::new(&self.subscription_id, &self.resource_group, &self.name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id, self.resource_group, self.namespace, self.resource_type, self.name
        )
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ResourceIdError::Empty);
        }
        let malformed = |reason: &str| ResourceIdError::Malformed {
            id: s.to_owned(),
            reason: reason.to_owned(),
        };

        let Some(rest) = s.strip_prefix('/') else {
            return Err(ResourceIdError::MissingSubscriptionPrefix(s.to_owned()));
        };
        let segments: Vec<&str> = rest.split('/').collect();
        if !segments[0].eq_ignore_ascii_case("subscriptions") {
            return Err(ResourceIdError::MissingSubscriptionPrefix(s.to_owned()));
        }
        if segments.len() != 8 {
            return Err(malformed("expected 8 path segments"));
        }
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(malformed("empty path segment"));
        }
        if !segments[2].eq_ignore_ascii_case("resourceGroups") {
            return Err(malformed("expected 'resourceGroups' segment"));
        }
        if !segments[4].eq_ignore_ascii_case("providers") {
            return Err(malformed("expected 'providers' segment"));
        }

        Ok(Self {
            subscription_id: segments[1].to_owned(),
            resource_group: segments[3].to_owned(),
            namespace: segments[5].to_owned(),
            resource_type: segments[6].to_owned(),
            name: segments[7].to_owned(),
        })
    }
}

/// 조회 대상 리소스 위치 (이름, 리소스 그룹, 구독)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLocator {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl ResourceLocator {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.resource_group, self.name, self.subscription_id)
    }
}

/// 관리 API에서 조회한 WAF 정책 상태
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WafPolicy {
    pub id: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
    pub custom_rules: Option<Vec<CustomRule>>,
    pub managed_rule_sets: Option<Vec<ManagedRuleSet>>,
    pub policy_settings: Option<PolicySettings>,
    pub provisioning_state: Option<String>,
}

impl WafPolicy {
    /// 이름으로 사용자 정의 규칙을 찾습니다.
    pub fn custom_rule(&self, name: &str) -> Option<&CustomRule> {
        self.custom_rules
            .as_ref()?
            .iter()
            .find(|rule| rule.name.as_deref() == Some(name))
    }

    /// 타입으로 관리형 규칙 집합을 찾습니다. 타입 이름은 정확히 일치해야 합니다.
    pub fn managed_rule_set(&self, rule_set_type: &str) -> Option<&ManagedRuleSet> {
        self.managed_rule_sets
            .as_ref()?
            .iter()
            .find(|set| set.rule_set_type.as_deref() == Some(rule_set_type))
    }
}

/// 사용자 정의 규칙
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub rule_type: Option<String>,
    pub action: Option<String>,
}

/// 관리형 규칙 집합
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedRuleSet {
    /// 규칙 집합 타입 (예: OWASP)
    pub rule_set_type: Option<String>,
    pub rule_set_version: Option<String>,
}

/// 정책 설정 블록
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub enabled: Option<bool>,
    /// Prevention 또는 Detection
    pub mode: Option<String>,
    pub request_body_check: Option<bool>,
    pub max_request_body_size_in_kb: Option<i32>,
    pub file_upload_limit_in_mb: Option<i32>,
}

/// 지역 이름을 비교용으로 정규화합니다.
///
/// 관리 API는 `eastus`를, Terraform 입력은 `East US`를 사용하므로
/// 소문자화 후 공백을 제거합니다.
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
