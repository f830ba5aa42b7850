//! 협력자 trait — 프로비저닝 엔진과 리소스 조회기
//!
//! 시나리오 실행기는 이 두 trait에만 의존합니다.
//! 프로덕션 구현은 `wafprobe-terraform`과 `wafprobe-azure`에 있고,
//! 테스트는 메모리 기반 mock을 사용합니다.
//!
//! ```text
//!            ┌────────────────┐
//!            │ ScenarioRunner │
//!            └───┬────────┬───┘
//!                │        │
//!                ▼        ▼
//! ┌──────────────────┐ ┌──────────────────┐
//! │ProvisioningEngine│ │ResourceInspector │ (trait)
//! └────────┬─────────┘ └────────┬─────────┘
//!          ▼                    ▼
//!     terraform CLI      Azure Resource Manager
//! ```

use std::future::Future;

use crate::error::{InspectError, ProvisionError};
use crate::provision::{ProvisioningConfiguration, ResourceHandle};
use crate::types::{ResourceLocator, WafPolicy};

/// 인프라 프로비저닝 엔진
///
/// `Send + Sync + 'static`이므로 `Arc`로 여러 시나리오 태스크가 공유할 수 있습니다.
pub trait ProvisioningEngine: Send + Sync + 'static {
    /// 설정을 적용하고 리소스 핸들을 반환합니다.
    ///
    /// 재시도 가능한 에러는 설정의 재시도 정책에 따라 재시도하고,
    /// 그 외 에러는 즉시 반환합니다.
    fn apply(
        &self,
        config: &ProvisioningConfiguration,
    ) -> impl Future<Output = Result<ResourceHandle, ProvisionError>> + Send;

    /// 선언된 output 값을 문자열로 읽습니다.
    ///
    /// 선언되지 않은 이름이면 [`ProvisionError::OutputNotFound`]를 반환합니다.
    fn output(
        &self,
        handle: &ResourceHandle,
        name: &str,
    ) -> impl Future<Output = Result<String, ProvisionError>> + Send;

    /// 핸들에 해당하는 apply가 만든 모든 리소스를 제거합니다.
    fn destroy(
        &self,
        handle: &ResourceHandle,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;
}

/// 클라우드 리소스 조회기
///
/// 프로비저닝 엔진의 상태 파일과 무관하게 관리 API에서 직접 읽습니다.
pub trait ResourceInspector: Send + Sync + 'static {
    /// 리소스 존재 여부
    fn exists(
        &self,
        locator: &ResourceLocator,
    ) -> impl Future<Output = Result<bool, InspectError>> + Send;

    /// WAF 정책 상태 조회. 없으면 [`InspectError::NotFound`].
    fn get(
        &self,
        locator: &ResourceLocator,
    ) -> impl Future<Output = Result<WafPolicy, InspectError>> + Send;
}
