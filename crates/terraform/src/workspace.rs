//! 작업 디렉토리 — 시나리오별 격리된 terraform 작업 공간
//!
//! 픽스처 모듈을 `<work_dir>/<fixture>-<unique_id>`로 복사하고
//! 입력 변수를 JSON var 파일로 기록합니다. 동시에 실행되는 시나리오는
//! 서로 다른 디렉토리와 state 파일을 사용합니다.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use wafprobe_core::error::ProvisionError;
use wafprobe_core::provision::ProvisioningConfiguration;

/// 작업 디렉토리에 기록하는 var 파일 이름
pub const VAR_FILE_NAME: &str = "wafprobe.tfvars.json";

/// 로컬 state 파일 이름
pub const STATE_FILE_NAME: &str = "terraform.tfstate";

/// apply를 시작한 작업 디렉토리에 남기는 표식 파일
pub const APPLY_MARKER_NAME: &str = ".wafprobe-apply-started";

/// 작업 디렉토리를 준비합니다.
///
/// 같은 경로에 남은 디렉토리가 있으면 지우고 새로 복사합니다.
pub async fn prepare(config: &ProvisioningConfiguration) -> Result<PathBuf, ProvisionError> {
    let module_dir = config.module_dir().to_path_buf();
    let workspace = config.workspace_dir().to_path_buf();

    if !tokio::fs::metadata(&module_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(workspace_error(
            &module_dir,
            "fixture module directory does not exist",
        ));
    }

    remove(&workspace).await?;

    let src = module_dir.clone();
    let dst = workspace.clone();
    tokio::task::spawn_blocking(move || copy_module(&src, &dst))
        .await
        .map_err(|e| workspace_error(&workspace, format!("copy task failed: {e}")))?
        .map_err(|e| workspace_error(&workspace, format!("failed to copy module: {e}")))?;

    let var_file = workspace.join(VAR_FILE_NAME);
    let body = serde_json::to_vec_pretty(config.vars())
        .map_err(|e| workspace_error(&var_file, format!("failed to encode vars: {e}")))?;
    tokio::fs::write(&var_file, body)
        .await
        .map_err(|e| workspace_error(&var_file, e.to_string()))?;

    debug!(
        fixture = config.fixture(),
        workspace = %workspace.display(),
        vars = config.vars().len(),
        "workspace prepared"
    );
    Ok(var_file)
}

/// 작업 디렉토리를 삭제합니다. 없으면 아무 것도 하지 않습니다.
pub async fn remove(workspace: &Path) -> Result<(), ProvisionError> {
    match tokio::fs::remove_dir_all(workspace).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(workspace_error(workspace, e.to_string())),
    }
}

/// 작업 디렉토리에 state 파일이 있는지 확인합니다.
pub async fn has_state(workspace: &Path) -> bool {
    tokio::fs::try_exists(workspace.join(STATE_FILE_NAME))
        .await
        .unwrap_or(false)
}

/// apply 시작을 기록합니다.
///
/// state가 기록되기 전에 apply가 중단되어도 destroy를 건너뛰지 않게 합니다.
pub async fn mark_apply_started(workspace: &Path) -> Result<(), ProvisionError> {
    let marker = workspace.join(APPLY_MARKER_NAME);
    tokio::fs::write(&marker, b"")
        .await
        .map_err(|e| workspace_error(&marker, e.to_string()))
}

/// 이 작업 디렉토리에서 apply가 시작된 적이 있는지 확인합니다.
pub async fn apply_started(workspace: &Path) -> bool {
    tokio::fs::try_exists(workspace.join(APPLY_MARKER_NAME))
        .await
        .unwrap_or(false)
}

/// 복사에서 제외할 항목 (provider 캐시, 이전 state)
fn is_excluded(name: &str) -> bool {
    name == ".terraform" || name == APPLY_MARKER_NAME || name.contains(".tfstate")
}

fn copy_module(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if is_excluded(&name.to_string_lossy()) {
            continue;
        }
        let target = dst.join(&name);
        if entry.file_type()?.is_dir() {
            copy_module(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

fn workspace_error(path: &Path, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::Workspace {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}
