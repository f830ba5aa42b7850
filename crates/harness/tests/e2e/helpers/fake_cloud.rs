//! In-memory cloud shared by a fake provisioning engine and a fake inspector.
//!
//! `FakeEngine::apply` creates a WAF policy in [`FakeCloud`] from the rendered
//! input variables and `destroy` removes it, so the inspector sees exactly what
//! the engine left behind. Failure injection covers:
//! - apply error messages returned on successive attempts
//! - slow or panicking outputs
//! - destroy errors
//! - resources that never appear in the cloud

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wafprobe_core::engine::{ProvisioningEngine, ResourceInspector};
use wafprobe_core::error::{InspectError, ProvisionError};
use wafprobe_core::provision::{ProvisioningConfiguration, ResourceHandle};
use wafprobe_core::retry::RetryFailure;
use wafprobe_core::types::{
    CustomRule, ManagedRuleSet, PolicySettings, ResourceId, ResourceLocator, WafPolicy,
};

/// Subscription used by every e2e test.
pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Shared resource store keyed by `resource_group/name`.
#[derive(Default)]
pub struct FakeCloud {
    policies: Mutex<BTreeMap<String, WafPolicy>>,
    /// Fields copied into every created policy (rules, settings).
    template: Mutex<WafPolicy>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cloud whose policies carry the full fixture configuration.
    pub fn with_full_policies() -> Arc<Self> {
        let cloud = Self::new();
        cloud.set_template(WafPolicy {
            custom_rules: Some(vec![CustomRule {
                name: Some("BlockSuspiciousIPs".to_owned()),
                priority: Some(1),
                rule_type: Some("MatchRule".to_owned()),
                action: Some("Block".to_owned()),
            }]),
            managed_rule_sets: Some(vec![ManagedRuleSet {
                rule_set_type: Some("OWASP".to_owned()),
                rule_set_version: Some("3.2".to_owned()),
            }]),
            policy_settings: Some(PolicySettings {
                enabled: Some(true),
                mode: Some("Prevention".to_owned()),
                request_body_check: Some(true),
                max_request_body_size_in_kb: Some(128),
                file_upload_limit_in_mb: Some(100),
            }),
            provisioning_state: Some("Succeeded".to_owned()),
            ..WafPolicy::default()
        });
        cloud
    }

    pub fn set_template(&self, template: WafPolicy) {
        *self.policies_template() = template;
    }

    /// Number of policies currently deployed.
    pub fn len(&self) -> usize {
        self.policies.lock().unwrap().len()
    }

    fn policies_template(&self) -> std::sync::MutexGuard<'_, WafPolicy> {
        self.template.lock().unwrap()
    }

    fn key(resource_group: &str, name: &str) -> String {
        format!("{resource_group}/{name}")
    }
}

/// Provisioning engine backed by [`FakeCloud`].
pub struct FakeEngine {
    cloud: Arc<FakeCloud>,
    apply_failures: Mutex<VecDeque<String>>,
    apply_delay: Mutex<Option<Duration>>,
    output_delay: Mutex<Option<Duration>>,
    output_overrides: Mutex<HashMap<String, String>>,
    destroy_error: Mutex<Option<String>>,
    panic_on_output: AtomicBool,
    skip_create: AtomicBool,
    /// Input variables of each successful apply, keyed by handle label.
    applied: Mutex<HashMap<String, BTreeMap<String, serde_json::Value>>>,
    /// Labels passed to destroy, in call order.
    destroyed: Mutex<Vec<String>>,
    pub apply_attempts: AtomicUsize,
    pub output_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeEngine {
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self {
            cloud,
            apply_failures: Mutex::new(VecDeque::new()),
            apply_delay: Mutex::new(None),
            output_delay: Mutex::new(None),
            output_overrides: Mutex::new(HashMap::new()),
            destroy_error: Mutex::new(None),
            panic_on_output: AtomicBool::new(false),
            skip_create: AtomicBool::new(false),
            applied: Mutex::new(HashMap::new()),
            destroyed: Mutex::new(Vec::new()),
            apply_attempts: AtomicUsize::new(0),
            output_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue error messages returned by the next apply attempts.
    pub fn fail_apply_with<S: Into<String>>(&self, messages: impl IntoIterator<Item = S>) {
        self.apply_failures
            .lock()
            .unwrap()
            .extend(messages.into_iter().map(Into::into));
    }

    pub fn delay_apply(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_outputs(&self, delay: Duration) {
        *self.output_delay.lock().unwrap() = Some(delay);
    }

    pub fn override_output(&self, name: &str, value: &str) {
        self.output_overrides
            .lock()
            .unwrap()
            .insert(name.to_owned(), value.to_owned());
    }

    pub fn fail_destroy_with(&self, message: &str) {
        *self.destroy_error.lock().unwrap() = Some(message.to_owned());
    }

    pub fn panic_on_output(&self) {
        self.panic_on_output.store(true, Ordering::SeqCst);
    }

    /// Apply succeeds but nothing appears in the cloud.
    pub fn skip_create(&self) {
        self.skip_create.store(true, Ordering::SeqCst);
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.lock().unwrap().len()
    }

    /// Variables the engine received, keyed by workspace label.
    pub fn applied_vars(&self) -> HashMap<String, BTreeMap<String, serde_json::Value>> {
        self.applied.lock().unwrap().clone()
    }

    fn next_apply_result(&self) -> Result<(), ProvisionError> {
        self.apply_attempts.fetch_add(1, Ordering::SeqCst);
        match self.apply_failures.lock().unwrap().pop_front() {
            Some(message) => Err(ProvisionError::CommandFailed {
                operation: "apply".to_owned(),
                exit_code: Some(1),
                message,
            }),
            None => Ok(()),
        }
    }

    fn create_policy(&self, config: &ProvisioningConfiguration) {
        let (Some(resource_group), Some(name)) = (
            config.var_str("resource_group_name"),
            config.var_str("waf_policy_name"),
        ) else {
            return;
        };

        let mut policy = self.cloud.policies_template().clone();
        policy.id = Some(ResourceId::waf_policy(SUBSCRIPTION, resource_group, name).to_string());
        policy.name = Some(name.to_owned());
        policy.location = config
            .var_str("location")
            .map(|l| l.to_lowercase().replace(' ', ""));
        policy.tags = config.vars().get("tags").and_then(|tags| {
            tags.as_object().map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_owned()))
                    .collect()
            })
        });

        self.cloud
            .policies
            .lock()
            .unwrap()
            .insert(FakeCloud::key(resource_group, name), policy);
    }

    fn vars_for(&self, handle: &ResourceHandle) -> Option<BTreeMap<String, serde_json::Value>> {
        self.applied.lock().unwrap().get(handle.label()).cloned()
    }
}

impl ProvisioningEngine for FakeEngine {
    async fn apply(
        &self,
        config: &ProvisioningConfiguration,
    ) -> Result<ResourceHandle, ProvisionError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = *self.apply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        config
            .retry()
            .run("apply", move |_attempt| async move { self.next_apply_result() })
            .await
            .map_err(|failure| match failure {
                RetryFailure::Fatal { error, .. } => error,
                RetryFailure::Exhausted {
                    attempts,
                    description,
                    error,
                } => ProvisionError::RetriesExhausted {
                    operation: "apply".to_owned(),
                    attempts,
                    description,
                    message: error.to_string(),
                },
            })?;

        if !self.skip_create.load(Ordering::SeqCst) {
            self.create_policy(config);
        }
        let handle = ResourceHandle::for_configuration(config);
        self.applied
            .lock()
            .unwrap()
            .insert(handle.label().to_owned(), config.vars().clone());
        Ok(handle)
    }

    async fn output(&self, handle: &ResourceHandle, name: &str) -> Result<String, ProvisionError> {
        self.output_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_output.load(Ordering::SeqCst) {
            panic!("fake engine: output exploded");
        }
        let delay = *self.output_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let overridden = self.output_overrides.lock().unwrap().get(name).cloned();
        if let Some(value) = overridden {
            return Ok(value);
        }

        let not_found = || ProvisionError::OutputNotFound {
            name: name.to_owned(),
        };
        let vars = self.vars_for(handle).ok_or_else(not_found)?;
        let var = |key: &str| {
            vars.get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
                .ok_or_else(not_found)
        };

        match name {
            "waf_policy_id" => Ok(ResourceId::waf_policy(
                SUBSCRIPTION,
                var("resource_group_name")?,
                var("waf_policy_name")?,
            )
            .to_string()),
            "waf_policy_name" => var("waf_policy_name"),
            "waf_policy_location" => var("location"),
            "waf_policy_tags" => vars
                .get("tags")
                .map(|tags| tags.to_string())
                .ok_or_else(not_found),
            _ => Err(not_found()),
        }
    }

    async fn destroy(&self, handle: &ResourceHandle) -> Result<(), ProvisionError> {
        self.destroyed
            .lock()
            .unwrap()
            .push(handle.label().to_owned());

        if let Some(message) = self.destroy_error.lock().unwrap().clone() {
            return Err(ProvisionError::CommandFailed {
                operation: "destroy".to_owned(),
                exit_code: Some(1),
                message,
            });
        }

        if let Some(vars) = self.vars_for(handle) {
            let key = FakeCloud::key(
                vars.get("resource_group_name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default(),
                vars.get("waf_policy_name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default(),
            );
            self.cloud.policies.lock().unwrap().remove(&key);
        }
        Ok(())
    }
}

/// Resource inspector reading [`FakeCloud`].
pub struct FakeInspector {
    cloud: Arc<FakeCloud>,
    failure: Mutex<Option<InspectError>>,
    pub lookups: AtomicUsize,
}

impl FakeInspector {
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self {
            cloud,
            failure: Mutex::new(None),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Every lookup fails with a management API error.
    pub fn fail_with_api_error(&self, status: u16, message: &str) {
        *self.failure.lock().unwrap() = Some(InspectError::Api {
            status,
            message: message.to_owned(),
        });
    }

    fn lookup(&self, locator: &ResourceLocator) -> Result<WafPolicy, InspectError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(InspectError::Api { status, message }) = &*self.failure.lock().unwrap() {
            return Err(InspectError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        self.cloud
            .policies
            .lock()
            .unwrap()
            .get(&FakeCloud::key(&locator.resource_group, &locator.name))
            .cloned()
            .ok_or_else(|| InspectError::NotFound {
                resource: locator.to_string(),
            })
    }
}

impl ResourceInspector for FakeInspector {
    async fn exists(&self, locator: &ResourceLocator) -> Result<bool, InspectError> {
        match self.lookup(locator) {
            Ok(_) => Ok(true),
            Err(InspectError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, locator: &ResourceLocator) -> Result<WafPolicy, InspectError> {
        self.lookup(locator)
    }
}
