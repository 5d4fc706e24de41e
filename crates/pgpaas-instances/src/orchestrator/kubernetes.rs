use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{Orchestrator, OrchestratorError};
use crate::types::ResourceKind;

/// Orchestrator backed by a Kubernetes API server, scoped to one namespace
#[derive(Clone)]
pub struct KubeOrchestrator {
    client: Client,
    namespace: String,
}

impl KubeOrchestrator {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Build a client from the in-cluster service account, falling back to
    /// the local kubeconfig
    pub async fn try_default(namespace: impl Into<String>) -> Result<Self, OrchestratorError> {
        let client = Client::try_default()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        Ok(Self::new(client, namespace))
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn create_typed<K>(&self, document: &serde_json::Value) -> Result<(), OrchestratorError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let resource: K = serde_json::from_value(document.clone()).map_err(|e| {
            OrchestratorError::InvalidManifest {
                reason: e.to_string(),
            }
        })?;
        let name = resource.name_any();

        self.api::<K>()
            .create(&PostParams::default(), &resource)
            .await
            .map_err(|e| classify(e, &name))?;

        debug!("Created {} in namespace {}", name, self.namespace);
        Ok(())
    }

    async fn delete_typed<K>(&self, name: &str) -> Result<(), OrchestratorError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify(e, name))?;

        debug!("Deleted {} in namespace {}", name, self.namespace);
        Ok(())
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn read_config_map(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, String>, OrchestratorError> {
        let config_map = self
            .api::<ConfigMap>()
            .get(name)
            .await
            .map_err(|e| classify(e, name))?;
        Ok(config_map.data.unwrap_or_default())
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        document: &serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        match kind {
            ResourceKind::StatefulSet => self.create_typed::<StatefulSet>(document).await,
            ResourceKind::Service => self.create_typed::<Service>(document).await,
        }
    }

    async fn delete_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), OrchestratorError> {
        match kind {
            ResourceKind::StatefulSet => self.delete_typed::<StatefulSet>(name).await,
            ResourceKind::Service => self.delete_typed::<Service>(name).await,
        }
    }
}

/// Sort a kube error into conflict, missing, API refusal or transport failure
fn classify(err: kube::Error, name: &str) -> OrchestratorError {
    match err {
        kube::Error::Api(response) if response.code == 409 => OrchestratorError::AlreadyExists {
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 404 => OrchestratorError::NotFound {
            name: name.to_string(),
        },
        kube::Error::Api(response) => OrchestratorError::Api {
            code: response.code,
            reason: response.message,
        },
        other => OrchestratorError::Transport(other.to_string()),
    }
}
