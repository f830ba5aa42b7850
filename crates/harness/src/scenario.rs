//! 시나리오 정의와 관측 상태
//!
//! [`TestScenario`]는 한 번 만들어진 뒤 변경되지 않으며, 실행할 때마다 새 고유
//! 식별자와 함께 사용됩니다. 검증 로직은 [`Observation`]을 받아 [`Checks`]에
//! 결과를 기록하는 클로저입니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use wafprobe_core::retry::RetryPolicy;
use wafprobe_core::types::WafPolicy;

use crate::error::ScenarioError;
use crate::ident::ResourceNames;
use crate::verify::Checks;

/// 검증 클로저
pub type Expectation = Arc<dyn Fn(&Observation, &mut Checks) + Send + Sync>;

/// apply 이후 관측한 상태
#[derive(Debug, Clone)]
pub struct Observation {
    /// 이번 실행의 리소스 이름
    pub names: ResourceNames,
    /// 선언된 output 값
    pub outputs: BTreeMap<String, String>,
    /// 조회기 존재 여부 (조회하지 않는 시나리오는 `None`)
    pub exists: Option<bool>,
    /// 조회기로 읽은 정책 (조회하지 않았거나 없으면 `None`)
    pub policy: Option<WafPolicy>,
}

impl Observation {
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }
}

/// 시나리오 하나
#[derive(Clone)]
pub struct TestScenario {
    name: String,
    fixture: String,
    vars: BTreeMap<String, serde_json::Value>,
    outputs: Vec<String>,
    inspect: bool,
    retry: Option<RetryPolicy>,
    expect: Expectation,
}

impl TestScenario {
    pub fn builder(name: impl Into<String>, fixture: impl Into<String>) -> TestScenarioBuilder {
        TestScenarioBuilder {
            name: name.into(),
            fixture: fixture.into(),
            vars: BTreeMap::new(),
            outputs: Vec::new(),
            inspect: true,
            retry: None,
            expect: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fixture(&self) -> &str {
        &self.fixture
    }

    pub fn vars(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.vars
    }

    pub fn var_str(&self, name: &str) -> Option<&str> {
        self.vars.get(name).and_then(serde_json::Value::as_str)
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn inspects(&self) -> bool {
        self.inspect
    }

    /// 시나리오 전용 재시도 정책. `None`이면 실행기 기본값을 사용합니다.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub(crate) fn verify(&self, observation: &Observation, checks: &mut Checks) {
        (self.expect)(observation, checks)
    }
}

impl fmt::Debug for TestScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestScenario")
            .field("name", &self.name)
            .field("fixture", &self.fixture)
            .field("vars", &self.vars)
            .field("outputs", &self.outputs)
            .field("inspect", &self.inspect)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// [`TestScenario`] 빌더
pub struct TestScenarioBuilder {
    name: String,
    fixture: String,
    vars: BTreeMap<String, serde_json::Value>,
    outputs: Vec<String>,
    inspect: bool,
    retry: Option<RetryPolicy>,
    expect: Option<Expectation>,
}

impl TestScenarioBuilder {
    pub fn var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn outputs<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.outputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// 조회기로 라이브 상태를 읽을지 여부 (기본값 `true`)
    pub fn inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn expect<F>(mut self, expect: F) -> Self
    where
        F: Fn(&Observation, &mut Checks) + Send + Sync + 'static,
    {
        self.expect = Some(Arc::new(expect));
        self
    }

    pub fn build(self) -> Result<TestScenario, ScenarioError> {
        let invalid = |reason: &str| ScenarioError::InvalidScenario {
            name: self.name.clone(),
            reason: reason.to_owned(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.fixture.trim().is_empty() {
            return Err(invalid("fixture must not be empty"));
        }
        if self.fixture.contains(['/', '\\']) || self.fixture.contains("..") {
            return Err(invalid("fixture must be a plain directory name"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for output in &self.outputs {
            if output.is_empty() {
                return Err(invalid("output name must not be empty"));
            }
            if !seen.insert(output.as_str()) {
                return Err(invalid(&format!("output '{output}' declared twice")));
            }
        }

        let expect: Expectation = match self.expect {
            Some(expect) => expect,
            None => Arc::new(no_checks),
        };
        Ok(TestScenario {
            expect,
            name: self.name,
            fixture: self.fixture,
            vars: self.vars,
            outputs: self.outputs,
            inspect: self.inspect,
            retry: self.retry,
        })
    }
}

fn no_checks(_: &Observation, _: &mut Checks) {}
