//! Seam between the controller and the orchestration API
//!
//! [`Orchestrator`] exposes the handful of namespaced calls the service needs.
//! [`KubeOrchestrator`] talks to a real cluster; tests use the in-memory fake
//! from [`crate::test_utils`].

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::InstanceError;
use crate::types::ResourceKind;

pub mod kubernetes;

pub use self::kubernetes::KubeOrchestrator;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("{name} already exists")]
    AlreadyExists { name: String },

    #[error("{name} not found")]
    NotFound { name: String },

    #[error("API error ({code}): {reason}")]
    Api { code: u16, reason: String },

    #[error("Invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Read the `data` section of a ConfigMap
    async fn read_config_map(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, String>, OrchestratorError>;

    /// Create a resource of `kind` from a full manifest document
    async fn create_resource(
        &self,
        kind: ResourceKind,
        document: &serde_json::Value,
    ) -> Result<(), OrchestratorError>;

    /// Delete the resource of `kind` called `name`
    async fn delete_resource(&self, kind: ResourceKind, name: &str)
        -> Result<(), OrchestratorError>;
}

/// Run an external call under `limit`, reporting expiry as `ExternalTimeout`
pub async fn with_timeout<T, F>(
    limit: Duration,
    operation: impl Into<String>,
    call: F,
) -> Result<T, InstanceError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| InstanceError::ExternalTimeout {
            operation: operation.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), "noop", async { 42 })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_reports_expiry() {
        let err = with_timeout(Duration::from_millis(10), "read ConfigMap", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await
        .unwrap_err();

        match err {
            InstanceError::ExternalTimeout { operation } => {
                assert_eq!(operation, "read ConfigMap")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
