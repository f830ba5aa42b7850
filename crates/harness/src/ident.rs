//! 고유 식별자와 리소스 이름
//!
//! 시나리오 실행마다 [`UniqueId`]를 한 번 생성하고, 이 식별자로 리소스 그룹과
//! WAF 정책 이름을 만듭니다. 동시에 실행되는 시나리오의 격리는 이 이름 공간으로만
//! 보장됩니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use wafprobe_core::types::ResourceLocator;

/// 식별자 길이
pub const UNIQUE_ID_LEN: usize = 8;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 소문자 영숫자 8자리 식별자
///
/// UUID v4의 무작위 비트에서 base-36 8자리(약 41비트)를 취합니다.
/// Azure 리소스 이름에 그대로 넣을 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UniqueId(String);

impl UniqueId {
    /// 새 식별자를 생성합니다.
    pub fn generate() -> Self {
        Self::from_bits(uuid::Uuid::new_v4().as_u128())
    }

    fn from_bits(mut bits: u128) -> Self {
        let mut id = String::with_capacity(UNIQUE_ID_LEN);
        for _ in 0..UNIQUE_ID_LEN {
            id.push(char::from(ALPHABET[(bits % 36) as usize]));
            bits /= 36;
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 식별자로부터 만든 리소스 이름
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNames {
    /// `{prefix}-waf-rg-{id}`
    pub resource_group: String,
    /// `{prefix}-waf-policy-{id}`
    pub policy: String,
}

impl ResourceNames {
    pub fn derive(prefix: &str, id: &UniqueId) -> Self {
        Self {
            resource_group: format!("{prefix}-waf-rg-{id}"),
            policy: format!("{prefix}-waf-policy-{id}"),
        }
    }

    /// 픽스처 입력 변수 (`resource_group_name`, `waf_policy_name`)
    pub fn as_vars(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([
            (
                "resource_group_name".to_owned(),
                serde_json::Value::String(self.resource_group.clone()),
            ),
            (
                "waf_policy_name".to_owned(),
                serde_json::Value::String(self.policy.clone()),
            ),
        ])
    }

    /// 구독 안에서 WAF 정책의 위치
    pub fn locator(&self, subscription_id: &str) -> ResourceLocator {
        ResourceLocator::new(subscription_id, &self.resource_group, &self.policy)
    }
}
