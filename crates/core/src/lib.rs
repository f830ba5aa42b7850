#![doc = include_str!("../README.md")]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod provision;
pub mod retry;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, InspectError, ProvisionError, ResourceIdError, WafprobeError,
};

// 설정
pub use config::WafprobeConfig;

// 협력자 trait
pub use engine::{ProvisioningEngine, ResourceInspector};

// 프로비저닝
pub use provision::{ProvisioningConfiguration, ResourceHandle};
pub use retry::{RetryFailure, RetryPolicy, parse_duration};

// 도메인 타입
pub use types::{
    CustomRule, ManagedRuleSet, PolicySettings, ResourceId, ResourceLocator, WafPolicy,
    normalize_location, validate_waf_policy_id,
};
