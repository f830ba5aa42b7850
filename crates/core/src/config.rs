//! 설정 관리 — wafprobe.toml 파싱 및 런타임 설정
//!
//! [`WafprobeConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`WAFPROBE_TERRAFORM_MAX_RETRIES=5` 형식)
//! 3. 설정 파일 (`wafprobe.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), wafprobe_core::error::WafprobeError> {
//! use wafprobe_core::config::WafprobeConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WafprobeConfig::load("wafprobe.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WafprobeConfig::parse("[terraform]\nmax_retries = 5")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WafprobeError};
use crate::retry::{RetryPolicy, parse_duration};

/// 재시도 최대 횟수 상한
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// 동시 실행 시나리오 수 상한
pub const MAX_PARALLEL_LIMIT: usize = 64;

/// 구독 ID를 읽어올 환경변수 (우선순위 순)
pub const SUBSCRIPTION_ENV_VARS: &[&str] = &["ARM_SUBSCRIPTION_ID", "AZURE_SUBSCRIPTION_ID"];

/// wafprobe 통합 설정
///
/// `wafprobe.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 크레이트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WafprobeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Terraform 엔진 설정
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// Azure 조회 설정
    #[serde(default)]
    pub azure: AzureConfig,
    /// 시나리오 실행 설정
    #[serde(default)]
    pub harness: HarnessConfig,
}

impl WafprobeConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WafprobeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WafprobeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WafprobeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WafprobeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WafprobeError> {
        toml::from_str(toml_str).map_err(|e| {
            WafprobeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `WAFPROBE_{SECTION}_{FIELD}`
    /// 예: `WAFPROBE_HARNESS_LOCATION=westeurope`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WAFPROBE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WAFPROBE_GENERAL_LOG_FORMAT");

        // Terraform
        override_string(&mut self.terraform.binary, "WAFPROBE_TERRAFORM_BINARY");
        override_string(
            &mut self.terraform.fixtures_dir,
            "WAFPROBE_TERRAFORM_FIXTURES_DIR",
        );
        override_string(&mut self.terraform.work_dir, "WAFPROBE_TERRAFORM_WORK_DIR");
        override_u32(
            &mut self.terraform.max_retries,
            "WAFPROBE_TERRAFORM_MAX_RETRIES",
        );
        override_string(
            &mut self.terraform.time_between_retries,
            "WAFPROBE_TERRAFORM_TIME_BETWEEN_RETRIES",
        );
        override_u64(
            &mut self.terraform.command_timeout_secs,
            "WAFPROBE_TERRAFORM_COMMAND_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.terraform.interrupt_grace_secs,
            "WAFPROBE_TERRAFORM_INTERRUPT_GRACE_SECS",
        );
        override_bool(
            &mut self.terraform.cleanup_on_apply_failure,
            "WAFPROBE_TERRAFORM_CLEANUP_ON_APPLY_FAILURE",
        );

        // Azure
        override_string(
            &mut self.azure.subscription_id,
            "WAFPROBE_AZURE_SUBSCRIPTION_ID",
        );
        override_string(&mut self.azure.tenant_id, "WAFPROBE_AZURE_TENANT_ID");
        override_string(
            &mut self.azure.management_endpoint,
            "WAFPROBE_AZURE_MANAGEMENT_ENDPOINT",
        );
        override_string(
            &mut self.azure.login_endpoint,
            "WAFPROBE_AZURE_LOGIN_ENDPOINT",
        );
        override_string(&mut self.azure.api_version, "WAFPROBE_AZURE_API_VERSION");
        override_u64(
            &mut self.azure.request_timeout_secs,
            "WAFPROBE_AZURE_REQUEST_TIMEOUT_SECS",
        );

        // Harness
        override_string(&mut self.harness.name_prefix, "WAFPROBE_HARNESS_NAME_PREFIX");
        override_string(&mut self.harness.location, "WAFPROBE_HARNESS_LOCATION");
        override_usize(
            &mut self.harness.max_parallel,
            "WAFPROBE_HARNESS_MAX_PARALLEL",
        );
        override_u64(
            &mut self.harness.scenario_timeout_secs,
            "WAFPROBE_HARNESS_SCENARIO_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WafprobeError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.terraform.validate()?;
        self.azure.validate()?;
        self.harness.validate()?;
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> WafprobeError {
    WafprobeError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    })
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Terraform 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    /// terraform 실행 파일 (PATH 검색 또는 절대 경로)
    pub binary: String,
    /// 픽스처 모듈 루트 디렉토리
    pub fixtures_dir: String,
    /// 시나리오별 작업 디렉토리 루트 (비어 있으면 시스템 임시 디렉토리 하위)
    pub work_dir: String,
    /// 재시도 가능한 에러의 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간 대기 시간 ("5s", "500ms", "1m30s")
    pub time_between_retries: String,
    /// 단일 terraform 명령 타임아웃 (초)
    pub command_timeout_secs: u64,
    /// 중단된 명령에 SIGINT를 보낸 뒤 강제 종료까지 기다리는 시간 (초).
    /// terraform이 진행 중인 작업을 멈추고 state를 기록할 시간입니다.
    pub interrupt_grace_secs: u64,
    /// apply 실패 시에도 destroy를 시도할지 여부
    pub cleanup_on_apply_failure: bool,
    /// 재시도 가능한 에러 테이블 (에러 메시지 부분 문자열 → 설명)
    pub retryable_errors: BTreeMap<String, String>,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        let mut retryable_errors = BTreeMap::new();
        retryable_errors.insert(
            "ResourceInUse".to_owned(),
            "Resource is in use by another resource".to_owned(),
        );
        Self {
            binary: "terraform".to_owned(),
            fixtures_dir: "fixtures".to_owned(),
            work_dir: String::new(),
            max_retries: 3,
            time_between_retries: "5s".to_owned(),
            command_timeout_secs: 1800,
            interrupt_grace_secs: 60,
            cleanup_on_apply_failure: true,
            retryable_errors,
        }
    }
}

impl TerraformConfig {
    fn validate(&self) -> Result<(), WafprobeError> {
        if self.binary.trim().is_empty() {
            return Err(invalid("terraform.binary", "must not be empty"));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(invalid(
                "terraform.max_retries",
                format!("must be at most {MAX_RETRIES_LIMIT}"),
            ));
        }
        let interval = parse_duration(&self.time_between_retries)?;
        if self.max_retries > 0 && interval.is_zero() {
            return Err(invalid(
                "terraform.time_between_retries",
                "must be greater than zero when retries are enabled",
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid(
                "terraform.command_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.interrupt_grace_secs == 0 {
            return Err(invalid(
                "terraform.interrupt_grace_secs",
                "must be greater than zero",
            ));
        }
        if self.retryable_errors.keys().any(|k| k.is_empty()) {
            return Err(invalid(
                "terraform.retryable_errors",
                "error substrings must not be empty",
            ));
        }
        Ok(())
    }

    /// 설정에서 재시도 정책을 생성합니다.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy::new(
            self.max_retries,
            parse_duration(&self.time_between_retries)?,
            self.retryable_errors.clone(),
        ))
    }

    /// 단일 명령 타임아웃
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// SIGINT 후 강제 종료까지의 유예 시간
    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_secs(self.interrupt_grace_secs)
    }

    /// 작업 디렉토리 루트. 설정이 비어 있으면 `$TMPDIR/wafprobe`.
    pub fn resolved_work_dir(&self) -> PathBuf {
        if self.work_dir.trim().is_empty() {
            std::env::temp_dir().join("wafprobe")
        } else {
            PathBuf::from(&self.work_dir)
        }
    }
}

/// Azure 조회 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// 구독 ID (비어 있으면 환경변수에서 찾음)
    pub subscription_id: String,
    /// 테넌트 ID (Azure CLI 토큰 요청 시 사용)
    pub tenant_id: String,
    /// ARM 관리 엔드포인트
    pub management_endpoint: String,
    /// 로그인 엔드포인트
    pub login_endpoint: String,
    /// WAF 정책 API 버전
    pub api_version: String,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            tenant_id: String::new(),
            management_endpoint: "https://management.azure.com".to_owned(),
            login_endpoint: "https://login.microsoftonline.com".to_owned(),
            api_version: "2023-09-01".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

impl AzureConfig {
    fn validate(&self) -> Result<(), WafprobeError> {
        if self.management_endpoint.trim().is_empty() {
            return Err(invalid("azure.management_endpoint", "must not be empty"));
        }
        if self.login_endpoint.trim().is_empty() {
            return Err(invalid("azure.login_endpoint", "must not be empty"));
        }
        if self.api_version.trim().is_empty() {
            return Err(invalid("azure.api_version", "must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid(
                "azure.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// 구독 ID를 결정합니다.
    ///
    /// 설정값 → `ARM_SUBSCRIPTION_ID` → `AZURE_SUBSCRIPTION_ID` 순으로 찾습니다.
    pub fn resolve_subscription(&self) -> Result<String, ConfigError> {
        if !self.subscription_id.trim().is_empty() {
            return Ok(self.subscription_id.trim().to_owned());
        }
        SUBSCRIPTION_ENV_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .map(|v| v.trim().to_owned())
            .find(|v| !v.is_empty())
            .ok_or(ConfigError::MissingSubscription)
    }

    /// HTTP 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 시나리오 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// 리소스 이름 접두어
    pub name_prefix: String,
    /// 리소스 배포 지역
    pub location: String,
    /// 동시에 실행할 시나리오 수
    pub max_parallel: usize,
    /// 시나리오 하나의 전체 타임아웃 (초)
    pub scenario_timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            name_prefix: "terratest".to_owned(),
            location: "East US".to_owned(),
            max_parallel: 4,
            scenario_timeout_secs: 3600,
        }
    }
}

impl HarnessConfig {
    fn validate(&self) -> Result<(), WafprobeError> {
        if self.name_prefix.trim().is_empty() {
            return Err(invalid("harness.name_prefix", "must not be empty"));
        }
        if self.location.trim().is_empty() {
            return Err(invalid("harness.location", "must not be empty"));
        }
        if self.max_parallel == 0 || self.max_parallel > MAX_PARALLEL_LIMIT {
            return Err(invalid(
                "harness.max_parallel",
                format!("must be between 1 and {MAX_PARALLEL_LIMIT}"),
            ));
        }
        if self.scenario_timeout_secs == 0 {
            return Err(invalid(
                "harness.scenario_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// 시나리오 타임아웃
    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, kind: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                kind,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
