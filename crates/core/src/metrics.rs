//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//! recorder가 설치되지 않으면 기록은 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `wafprobe_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use wafprobe_core::metrics as m;
//!
//! metrics::counter!(m::DESTROY_TOTAL, m::LABEL_RESULT => "success").increment(1);
//! ```

use metrics::{describe_counter, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 작업 레이블 키 (init, apply, destroy, output)
pub const LABEL_OPERATION: &str = "operation";

/// 결과 레이블 키 (success, failure, passed, failed)
pub const LABEL_RESULT: &str = "result";

/// 시나리오 이름 레이블 키
pub const LABEL_SCENARIO: &str = "scenario";

/// HTTP 상태 레이블 키
pub const LABEL_STATUS: &str = "status";

// ─── 프로비저닝 메트릭 ─────────────────────────────────────────────

/// 프로비저닝 명령 시도 수 (counter, label: operation)
pub const PROVISION_ATTEMPTS_TOTAL: &str = "wafprobe_provision_attempts_total";

/// 재시도 가능한 에러로 인한 재시도 수 (counter, label: operation)
pub const PROVISION_RETRIES_TOTAL: &str = "wafprobe_provision_retries_total";

/// destroy 실행 수 (counter, label: result)
pub const DESTROY_TOTAL: &str = "wafprobe_destroy_total";

// ─── 시나리오 메트릭 ───────────────────────────────────────────────

/// 완료된 시나리오 수 (counter, label: result)
pub const SCENARIOS_TOTAL: &str = "wafprobe_scenarios_total";

/// 시나리오 실행 시간 (histogram, 초, label: scenario)
pub const SCENARIO_DURATION_SECONDS: &str = "wafprobe_scenario_duration_seconds";

// ─── 조회기 메트릭 ─────────────────────────────────────────────────

/// 관리 API 요청 수 (counter, label: status)
pub const INSPECTOR_REQUESTS_TOTAL: &str = "wafprobe_inspector_requests_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 후 한 번 호출합니다. recorder가 없어도 패닉하지 않습니다.
pub fn describe_all() {
    describe_counter!(
        PROVISION_ATTEMPTS_TOTAL,
        "Total number of provisioning command attempts"
    );
    describe_counter!(
        PROVISION_RETRIES_TOTAL,
        "Total number of retries caused by recognized transient errors"
    );
    describe_counter!(DESTROY_TOTAL, "Total number of destroy runs by result");
    describe_counter!(SCENARIOS_TOTAL, "Total number of scenarios completed by result");
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Wall-clock duration of a single scenario run in seconds"
    );
    describe_counter!(
        INSPECTOR_REQUESTS_TOTAL,
        "Total number of management API requests by HTTP status"
    );
}
