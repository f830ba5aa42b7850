//! 에러 타입 — 도메인별 에러 정의

/// wafprobe 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WafprobeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 프로비저닝 엔진 에러
    #[error("provision error: {0}")]
    Provision(#[from] ProvisionError),

    /// 리소스 조회 에러
    #[error("inspect error: {0}")]
    Inspect(#[from] InspectError),

    /// 리소스 식별자 형식 에러
    #[error("resource id error: {0}")]
    ResourceId(#[from] ResourceIdError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 기간 문자열 파싱 실패 (예: "5s", "1m30s")
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// 구독 ID를 설정이나 환경변수에서 찾을 수 없음
    #[error(
        "azure subscription id is not configured (set [azure].subscription_id or ARM_SUBSCRIPTION_ID)"
    )]
    MissingSubscription,
}

/// 프로비저닝 엔진 에러
///
/// 외부 도구(terraform) 실행 중 발생한 에러를 표현합니다.
/// `message`에는 도구가 출력한 원본 메시지가 그대로 담깁니다.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// 재시도 불가능한 명령 실패
    #[error("{operation} failed (exit code {exit_code:?}): {message}")]
    CommandFailed {
        /// 실패한 작업 (init, apply, destroy, output)
        operation: String,
        /// 프로세스 종료 코드
        exit_code: Option<i32>,
        /// 도구 출력 (stdout + stderr)
        message: String,
    },

    /// 재시도 가능한 에러가 재시도 한도를 모두 소진
    #[error("{operation} failed after {attempts} attempts ({description}): {message}")]
    RetriesExhausted {
        /// 실패한 작업
        operation: String,
        /// 총 시도 횟수
        attempts: u32,
        /// 매칭된 재시도 가능 에러 설명
        description: String,
        /// 마지막 시도의 에러 메시지
        message: String,
    },

    /// 선언되지 않은 output 요청
    #[error("output '{name}' not found")]
    OutputNotFound { name: String },

    /// output 값 디코딩 실패
    #[error("failed to decode output '{name}': {reason}")]
    OutputDecode { name: String, reason: String },

    /// 작업 디렉토리 준비/정리 실패
    #[error("workspace error at {path}: {reason}")]
    Workspace { path: String, reason: String },

    /// 외부 프로세스 실행 실패
    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// 명령 타임아웃
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// 리소스 조회 에러
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// 리소스가 존재하지 않음
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// 인증 토큰 획득 또는 권한 실패
    #[error("authentication failed: {0}")]
    Auth(String),

    /// HTTP 요청 실패 (연결, 타임아웃 등)
    #[error("request failed: {0}")]
    Request(String),

    /// 관리 API가 에러 응답을 반환
    #[error("management api returned {status}: {message}")]
    Api { status: u16, message: String },

    /// 응답 본문 디코딩 실패
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// 리소스 식별자 형식 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceIdError {
    /// 빈 식별자
    #[error("resource id must not be empty")]
    Empty,

    /// `/subscriptions/` 접두어 없음
    #[error("resource id must start with '/subscriptions/': {0}")]
    MissingSubscriptionPrefix(String),

    /// 기대한 provider 경로 세그먼트 없음
    #[error("resource id must contain '{expected}': {id}")]
    MissingProviderPath { id: String, expected: String },

    /// 세그먼트 구조 불일치
    #[error("malformed resource id '{id}': {reason}")]
    Malformed { id: String, reason: String },
}
