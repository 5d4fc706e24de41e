//! In-memory collaborators for tests
//!
//! Exported so that integration tests and the CLI crate can exercise the
//! controller and router without a cluster or a Prometheus server.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ControllerSettings;
use crate::controller::LifecycleController;
use crate::error::InstanceError;
use crate::metrics::MetricsSource;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::registry::MemoryRegistry;
use crate::types::{InstanceMetrics, ResourceKind, STORAGE_USAGE_PLACEHOLDER};

pub const TEST_TEMPLATE_CONFIG_MAP: &str = "postgres-template";
pub const TEST_TEMPLATE_KEY: &str = "postgres-statefulset.yaml";

/// StatefulSet + Service template using all four placeholders
pub const TEST_TEMPLATE: &str = r#"apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: postgres-{{INSTANCE_NAME}}
  labels:
    app: postgres-{{INSTANCE_NAME}}
spec:
  serviceName: postgres-{{INSTANCE_NAME}}
  replicas: 1
  selector:
    matchLabels:
      app: postgres-{{INSTANCE_NAME}}
  template:
    metadata:
      labels:
        app: postgres-{{INSTANCE_NAME}}
    spec:
      containers:
        - name: postgres
          image: postgres:16
          env:
            - name: POSTGRES_DB
              value: "{{DB_NAME}}"
            - name: POSTGRES_USER
              value: "{{DB_USER}}"
            - name: POSTGRES_PASSWORD
              value: "{{DB_PASSWORD}}"
---
apiVersion: v1
kind: Service
metadata:
  name: postgres-{{INSTANCE_NAME}}
spec:
  selector:
    app: postgres-{{INSTANCE_NAME}}
  ports:
    - port: 5432
"#;

#[derive(Default)]
struct FakeState {
    config_maps: BTreeMap<String, BTreeMap<String, String>>,
    config_map_failure: Option<String>,
    resources: Vec<(ResourceKind, String)>,
    documents: Vec<serde_json::Value>,
    create_failures: HashMap<ResourceKind, String>,
    delete_failures: HashMap<ResourceKind, String>,
    delete_delay: Option<Duration>,
    delete_calls: usize,
}

/// Orchestrator that keeps resources in memory
#[derive(Default)]
pub struct FakeOrchestrator {
    state: Mutex<FakeState>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake preloaded with [`TEST_TEMPLATE`] under the default ConfigMap name and key
    pub fn with_default_template() -> Self {
        let fake = Self::new();
        fake.put_config_map(TEST_TEMPLATE_CONFIG_MAP, TEST_TEMPLATE_KEY, TEST_TEMPLATE);
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put_config_map(&self, name: &str, key: &str, value: &str) {
        self.state()
            .config_maps
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn fail_config_map(&self, reason: &str) {
        self.state().config_map_failure = Some(reason.to_string());
    }

    pub fn fail_create(&self, kind: ResourceKind, reason: &str) {
        self.state().create_failures.insert(kind, reason.to_string());
    }

    pub fn fail_delete(&self, kind: ResourceKind, reason: &str) {
        self.state().delete_failures.insert(kind, reason.to_string());
    }

    /// Make every `delete_resource` call wait before answering
    pub fn delay_delete(&self, delay: Duration) {
        self.state().delete_delay = Some(delay);
    }

    /// Number of `delete_resource` calls received
    pub fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }

    /// Resources currently present, in creation order
    pub fn created(&self) -> Vec<(ResourceKind, String)> {
        self.state().resources.clone()
    }

    /// Every manifest document ever accepted by `create_resource`
    pub fn documents(&self) -> Vec<serde_json::Value> {
        self.state().documents.clone()
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.state()
            .resources
            .iter()
            .any(|(k, n)| *k == kind && n == name)
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn read_config_map(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, String>, OrchestratorError> {
        let state = self.state();
        if let Some(reason) = &state.config_map_failure {
            return Err(OrchestratorError::Transport(reason.clone()));
        }
        state
            .config_maps
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound {
                name: name.to_string(),
            })
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        document: &serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        let mut state = self.state();
        if let Some(reason) = state.create_failures.get(&kind) {
            return Err(OrchestratorError::Api {
                code: 500,
                reason: reason.clone(),
            });
        }

        let name = document
            .pointer("/metadata/name")
            .and_then(|name| name.as_str())
            .ok_or_else(|| OrchestratorError::InvalidManifest {
                reason: "metadata.name is required".to_string(),
            })?
            .to_string();

        if state.resources.iter().any(|(k, n)| *k == kind && *n == name) {
            return Err(OrchestratorError::AlreadyExists { name });
        }

        state.resources.push((kind, name));
        state.documents.push(document.clone());
        Ok(())
    }

    async fn delete_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), OrchestratorError> {
        let delay = {
            let mut state = self.state();
            state.delete_calls += 1;
            state.delete_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(reason) = state.delete_failures.get(&kind) {
            return Err(OrchestratorError::Transport(reason.clone()));
        }

        let before = state.resources.len();
        state.resources.retain(|(k, n)| !(*k == kind && n == name));
        if state.resources.len() == before {
            return Err(OrchestratorError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Metrics source answering from memory
pub struct FakeMetrics {
    failure: Mutex<Option<String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeMetrics {
    pub fn new() -> Self {
        Self {
            failure: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, reason: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(reason.to_string());
        }
    }

    /// Instance names asked for so far
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Default for FakeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for FakeMetrics {
    async fn fetch(&self, instance_name: &str) -> Result<InstanceMetrics, InstanceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(instance_name.to_string());
        }
        if let Some(reason) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(InstanceError::MetricsBackendUnavailable { reason });
        }

        Ok(InstanceMetrics {
            cpu_usage: vec![serde_json::json!({
                "metric": {"pod": format!("postgres-{}-0", instance_name)},
                "value": [1700000000.0, "0.01"]
            })],
            memory_usage: Vec::new(),
            storage_usage: STORAGE_USAGE_PLACEHOLDER.to_string(),
        })
    }
}

/// Controller wired to in-memory fakes, with handles to inspect them
pub struct TestHarness {
    pub orchestrator: Arc<FakeOrchestrator>,
    pub metrics: Arc<FakeMetrics>,
    pub registry: Arc<MemoryRegistry>,
    pub controller: Arc<LifecycleController>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_orchestrator(Arc::new(FakeOrchestrator::with_default_template()))
    }

    pub fn with_orchestrator(orchestrator: Arc<FakeOrchestrator>) -> Self {
        Self::build(orchestrator, |controller| controller)
    }

    /// Default fakes, with a chance to adjust the controller before it is shared
    pub fn new_with(
        customize: impl FnOnce(LifecycleController) -> LifecycleController,
    ) -> Self {
        Self::build(Arc::new(FakeOrchestrator::with_default_template()), customize)
    }

    fn build(
        orchestrator: Arc<FakeOrchestrator>,
        customize: impl FnOnce(LifecycleController) -> LifecycleController,
    ) -> Self {
        let metrics = Arc::new(FakeMetrics::new());
        let registry = Arc::new(MemoryRegistry::new());
        let controller = LifecycleController::new(
            orchestrator.clone(),
            registry.clone(),
            metrics.clone(),
            ControllerSettings::default(),
        );

        Self {
            orchestrator,
            metrics,
            registry,
            controller: Arc::new(customize(controller)),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
