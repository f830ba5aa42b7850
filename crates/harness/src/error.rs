//! 시나리오 실행 에러
//!
//! [`ScenarioError`]는 한 시나리오를 중단시키는 치명적 에러입니다.
//! 검증 실패는 에러가 아니라 [`CheckOutcome`](crate::verify::CheckOutcome)으로 기록됩니다.

use wafprobe_core::error::{InspectError, ProvisionError};

/// 시나리오 중단 사유
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// 프로비저닝 엔진 실패 (apply, output)
    #[error("{operation} failed: {source}")]
    Provision {
        /// 실패한 작업
        operation: String,
        #[source]
        source: ProvisionError,
    },

    /// 리소스 조회 실패 (not-found 제외)
    #[error("inspect failed: {0}")]
    Inspect(#[from] InspectError),

    /// 잘못 정의된 시나리오
    #[error("invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    /// 시나리오 타임아웃
    #[error("scenario timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// 외부 취소 (Ctrl-C 등)
    #[error("scenario cancelled")]
    Cancelled,

    /// 검증 단계 패닉
    #[error("scenario panicked: {message}")]
    Panicked { message: String },
}

impl ScenarioError {
    pub(crate) fn provision(operation: impl Into<String>, source: ProvisionError) -> Self {
        Self::Provision {
            operation: operation.into(),
            source,
        }
    }
}
