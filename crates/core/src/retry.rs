//! 재시도 정책 — 부분 문자열 매칭 기반 일시적 에러 재시도
//!
//! [`RetryPolicy`]는 "에러 메시지 부분 문자열 → 설명" 테이블을 가지며,
//! 실패 메시지가 테이블의 키를 포함할 때만 고정 간격으로 재시도합니다.
//! 테이블에 없는 에러는 즉시 실패로 처리됩니다.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::metrics as m;

/// 재시도 정책
///
/// 한 작업의 총 시도 횟수는 최대 `max_retries + 1`입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    time_between_retries: Duration,
    retryable_errors: BTreeMap<String, String>,
}

impl RetryPolicy {
    /// 새 재시도 정책을 생성합니다.
    pub fn new(
        max_retries: u32,
        time_between_retries: Duration,
        retryable_errors: BTreeMap<String, String>,
    ) -> Self {
        Self {
            max_retries,
            time_between_retries,
            retryable_errors,
        }
    }

    /// 재시도하지 않는 정책
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, BTreeMap::new())
    }

    /// 재시도 가능한 에러를 하나 추가합니다.
    pub fn with_retryable(
        mut self,
        substring: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.retryable_errors
            .insert(substring.into(), description.into());
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn time_between_retries(&self) -> Duration {
        self.time_between_retries
    }

    pub fn retryable_errors(&self) -> &BTreeMap<String, String> {
        &self.retryable_errors
    }

    /// 메시지에 포함된 재시도 가능 에러의 설명을 반환합니다.
    ///
    /// 여러 키가 매칭되면 키 정렬 순서상 첫 번째를 사용합니다.
    pub fn matching_error(&self, message: &str) -> Option<&str> {
        self.retryable_errors
            .iter()
            .find(|(substring, _)| message.contains(substring.as_str()))
            .map(|(_, description)| description.as_str())
    }

    /// 재시도 정책에 따라 작업을 실행합니다.
    ///
    /// `op`은 1부터 시작하는 시도 번호를 받습니다.
    /// 실패 메시지(`Display`)가 테이블과 매칭되지 않으면 즉시
    /// [`RetryFailure::Fatal`]을, 재시도 한도를 넘기면
    /// [`RetryFailure::Exhausted`]를 반환합니다.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryFailure<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let message = error.to_string();
            let Some(description) = self.matching_error(&message) else {
                debug!(operation, attempt, "error is not retryable");
                return Err(RetryFailure::Fatal {
                    attempts: attempt,
                    error,
                });
            };

            if attempt > self.max_retries {
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    description: description.to_owned(),
                    error,
                });
            }

            warn!(
                operation,
                attempt,
                max_retries = self.max_retries,
                description,
                "retryable error, retrying in {:?}",
                self.time_between_retries
            );
            metrics::counter!(m::PROVISION_RETRIES_TOTAL, m::LABEL_OPERATION => operation.to_owned())
                .increment(1);
            tokio::time::sleep(self.time_between_retries).await;
        }
    }
}

/// 재시도 실패 결과
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// 재시도 불가능한 에러
    Fatal { attempts: u32, error: E },
    /// 재시도 한도 소진
    Exhausted {
        attempts: u32,
        description: String,
        error: E,
    },
}

impl<E> RetryFailure<E> {
    /// 총 시도 횟수
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// 마지막 에러
    pub fn into_error(self) -> E {
        match self {
            Self::Fatal { error, .. } | Self::Exhausted { error, .. } => error,
        }
    }
}

/// 기간 문자열을 파싱합니다.
///
/// `ms`, `s`, `m`, `h` 단위를 지원하며 `1m30s`처럼 이어 쓸 수 있습니다.
/// 단위 없는 값은 `0`만 허용됩니다.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let input = value.trim();
    if input.is_empty() {
        return Err(invalid_duration(value, "duration must not be empty"));
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid_duration(value, "expected a number"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| invalid_duration(value, "number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.saturating_mul(60)),
            "h" => Duration::from_secs(amount.saturating_mul(3600)),
            "" => return Err(invalid_duration(value, "missing unit (ms, s, m, h)")),
            other => {
                return Err(invalid_duration(value, format!("unknown unit '{other}'")));
            }
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| invalid_duration(value, "duration overflow"))?;
    }
    Ok(total)
}

fn invalid_duration(value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidDuration {
        value: value.to_owned(),
        reason: reason.into(),
    }
}
