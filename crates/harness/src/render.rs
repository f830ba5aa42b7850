//! 설정 렌더러
//!
//! 픽스처 이름, 입력 변수, 재시도 정책, 고유 식별자로부터
//! [`ProvisioningConfiguration`]을 만듭니다. I/O 없이 입력만으로 결과가 결정됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use wafprobe_core::provision::ProvisioningConfiguration;
use wafprobe_core::retry::RetryPolicy;

use crate::ident::UniqueId;

/// 픽스처 디렉토리와 작업 디렉토리 루트를 묶은 렌더러
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRenderer {
    fixtures_dir: PathBuf,
    work_dir: PathBuf,
}

impl ConfigurationRenderer {
    pub fn new(fixtures_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn fixtures_dir(&self) -> &Path {
        &self.fixtures_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// 시나리오 실행 하나의 프로비저닝 설정을 만듭니다.
    ///
    /// 작업 디렉토리는 `<work_dir>/<fixture>-<unique_id>`입니다.
    pub fn render(
        &self,
        fixture: &str,
        vars: BTreeMap<String, serde_json::Value>,
        retry: RetryPolicy,
        id: &UniqueId,
    ) -> ProvisioningConfiguration {
        ProvisioningConfiguration::new(
            fixture,
            self.fixtures_dir.join(fixture),
            self.work_dir.join(format!("{fixture}-{id}")),
            vars,
            retry,
        )
    }
}
