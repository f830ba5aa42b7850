//! 정리 가드 -- apply가 만든 리소스의 destroy 보장
//!
//! [`DestroyGuard`]는 apply 직전에 만들어져 시나리오 실행 내내 살아 있습니다.
//! 정상 경로에서는 [`DestroyGuard::release`]가 destroy를 한 번 실행하고,
//! 패닉이나 future drop(태스크 abort, 외부 타임아웃)으로 release에 도달하지 못하면
//! `Drop`이 같은 destroy를 실행합니다.
//!
//! ```text
//! NotApplied ──> Applying ──┬──> Applied ──> Destroying ──> Destroyed | DestroyFailed
//!                           └──> ApplyFailed ──(best effort)──> Destroying ──> ...
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use wafprobe_core::engine::ProvisioningEngine;
use wafprobe_core::error::ProvisionError;
use wafprobe_core::provision::{ProvisioningConfiguration, ResourceHandle};

/// 리소스 생명주기 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotApplied,
    Applying,
    Applied,
    ApplyFailed,
    Destroying,
    Destroyed,
    DestroyFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    /// apply를 시작하지 않음 -- 정리할 것이 없음
    Idle,
    /// apply를 시작했지만 핸들을 받지 못함
    Applying,
    /// 성공한 apply의 핸들을 보유
    Applied,
}

/// release 결과
#[derive(Debug)]
pub struct Cleanup {
    /// 전체 단계 기록
    pub phases: Vec<Phase>,
    /// destroy 결과. destroy가 필요 없었으면 `Ok`
    pub result: Result<(), ProvisionError>,
}

/// 스코프 종료 시 destroy를 보장하는 가드
pub struct DestroyGuard<E: ProvisioningEngine> {
    engine: Arc<E>,
    handle: Option<ResourceHandle>,
    state: GuardState,
    /// apply 실패 후에도 작업 디렉토리를 정리할지 여부
    best_effort: bool,
    phases: Vec<Phase>,
}

impl<E: ProvisioningEngine> DestroyGuard<E> {
    /// apply 전에 가드를 만듭니다.
    ///
    /// `best_effort`가 `true`이면 apply가 실패해도 같은 작업 디렉토리에 대해
    /// destroy를 시도합니다 (부분 생성된 리소스 정리).
    pub fn new(engine: Arc<E>, config: &ProvisioningConfiguration, best_effort: bool) -> Self {
        Self {
            engine,
            handle: Some(ResourceHandle::for_configuration(config)),
            state: GuardState::Idle,
            best_effort,
            phases: vec![Phase::NotApplied],
        }
    }

    pub fn applying(&mut self) {
        self.state = GuardState::Applying;
        self.phases.push(Phase::Applying);
    }

    /// 성공한 apply의 핸들을 넘겨받습니다.
    pub fn applied(&mut self, handle: ResourceHandle) -> &ResourceHandle {
        self.state = GuardState::Applied;
        self.phases.push(Phase::Applied);
        self.handle.insert(handle)
    }

    pub fn apply_failed(&mut self) {
        self.phases.push(Phase::ApplyFailed);
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    fn needs_destroy(&self) -> bool {
        match self.state {
            GuardState::Idle => false,
            GuardState::Applying => self.best_effort,
            GuardState::Applied => true,
        }
    }

    /// destroy를 실행하고 가드를 해제합니다.
    ///
    /// destroy가 끝나기 전에 이 future가 drop되면 `Drop`이 destroy를 다시 실행합니다.
    pub async fn release(mut self) -> Cleanup {
        let mut result = Ok(());
        if self.needs_destroy() {
            if let Some(handle) = self.handle.as_ref() {
                self.phases.push(Phase::Destroying);
                result = self.engine.destroy(handle).await;
                match &result {
                    Ok(()) => {
                        info!(resource = handle.label(), "resources destroyed");
                        self.phases.push(Phase::Destroyed);
                    }
                    Err(e) => {
                        error!(resource = handle.label(), error = %e, "destroy failed, resources may be left behind");
                        self.phases.push(Phase::DestroyFailed);
                    }
                }
            }
        }
        self.handle = None;

        Cleanup {
            phases: std::mem::take(&mut self.phases),
            result,
        }
    }
}

impl<E: ProvisioningEngine> Drop for DestroyGuard<E> {
    fn drop(&mut self) {
        if !self.needs_destroy() {
            return;
        }
        let Some(handle) = self.handle.take() else {
            return;
        };

        warn!(
            resource = handle.label(),
            panicking = std::thread::panicking(),
            "scenario aborted before cleanup, destroying from guard"
        );

        // 호출 스레드가 런타임 워커일 수 있으므로 별도 스레드의 새 런타임에서 실행
        let engine = &*self.engine;
        let joined = std::thread::scope(|scope| {
            scope
                .spawn(|| -> Result<(), String> {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| format!("failed to build cleanup runtime: {e}"))?;
                    runtime
                        .block_on(engine.destroy(&handle))
                        .map_err(|e| e.to_string())
                })
                .join()
        });

        match joined {
            Ok(Ok(())) => {
                self.phases.push(Phase::Destroyed);
                info!(resource = handle.label(), "resources destroyed by guard");
            }
            Ok(Err(e)) => {
                self.phases.push(Phase::DestroyFailed);
                error!(resource = handle.label(), error = %e, "guard destroy failed, resources may be left behind");
            }
            Err(_) => {
                self.phases.push(Phase::DestroyFailed);
                error!(resource = handle.label(), "guard destroy panicked");
            }
        }
    }
}
