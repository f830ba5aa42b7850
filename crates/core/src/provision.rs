//! 프로비저닝 입력/출력 — 불변 설정과 리소스 핸들
//!
//! [`ProvisioningConfiguration`]은 시나리오와 고유 식별자로부터 한 번 만들어지며
//! 이후 변경되지 않습니다. [`ResourceHandle`]은 성공한 apply가 돌려주는 참조로,
//! 같은 시나리오 실행 안에서 output과 destroy에만 사용됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::retry::RetryPolicy;

/// 프로비저닝 엔진 입력
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningConfiguration {
    fixture: String,
    module_dir: PathBuf,
    workspace_dir: PathBuf,
    vars: BTreeMap<String, serde_json::Value>,
    retry: RetryPolicy,
}

impl ProvisioningConfiguration {
    pub fn new(
        fixture: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        workspace_dir: impl Into<PathBuf>,
        vars: BTreeMap<String, serde_json::Value>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fixture: fixture.into(),
            module_dir: module_dir.into(),
            workspace_dir: workspace_dir.into(),
            vars,
            retry,
        }
    }

    /// 픽스처 이름 (예: `basic`)
    pub fn fixture(&self) -> &str {
        &self.fixture
    }

    /// 원본 모듈 디렉토리
    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// 시나리오 전용 작업 디렉토리
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// 입력 변수
    pub fn vars(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.vars
    }

    /// 문자열 입력 변수 조회
    pub fn var_str(&self, name: &str) -> Option<&str> {
        self.vars.get(name).and_then(serde_json::Value::as_str)
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// 성공한 apply가 반환하는 리소스 핸들
///
/// `Clone`을 구현하지 않아 하나의 apply에 하나의 소유자만 존재합니다.
/// destroy는 핸들을 빌려서 수행하며, 정리 가드가 소유권을 가집니다.
#[derive(Debug, PartialEq)]
pub struct ResourceHandle {
    label: String,
    workspace: PathBuf,
    retry: RetryPolicy,
}

impl ResourceHandle {
    /// 설정과 같은 작업 디렉토리를 가리키는 핸들을 만듭니다.
    ///
    /// apply 실패 후 best-effort 정리를 할 때도 사용합니다.
    pub fn for_configuration(config: &ProvisioningConfiguration) -> Self {
        let label = config
            .workspace_dir()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.fixture().to_owned());
        Self {
            label,
            workspace: config.workspace_dir().to_path_buf(),
            retry: config.retry().clone(),
        }
    }

    /// 로그용 이름 (`<fixture>-<unique_id>`)
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}
