//! Applies rendered resources to the cluster and tears them down again

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::InstanceError;
use crate::orchestrator::{with_timeout, Orchestrator, OrchestratorError};
use crate::template::RenderedResource;
use crate::types::{resource_name, ResourceKind};

/// What `apply` does with a document whose kind it does not recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKindPolicy {
    /// Log and leave the document out
    #[default]
    Skip,
    /// Fail the whole batch before anything is created
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedResource {
    pub kind: ResourceKind,
    pub name: String,
}

/// Result of a successful `apply`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedSet {
    pub created: Vec<AppliedResource>,
    /// Kinds of documents left out under [`UnknownKindPolicy::Skip`]
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Deleted,
    /// Nothing to delete; counts as success
    Absent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalStep {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: RemovalOutcome,
}

/// Per-resource outcome of a best-effort teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    pub instance_name: String,
    pub steps: Vec<RemovalStep>,
}

impl RemovalReport {
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RemovalStep> {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, RemovalOutcome::Failed(_)))
    }
}

pub struct ResourceProvisioner {
    orchestrator: Arc<dyn Orchestrator>,
    unknown_kinds: UnknownKindPolicy,
    call_timeout: Duration,
}

impl ResourceProvisioner {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        unknown_kinds: UnknownKindPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            unknown_kinds,
            call_timeout,
        }
    }

    /// Create `resources` in order.
    ///
    /// There is no rollback: the first failure stops the batch and whatever
    /// was already created stays in the cluster.
    pub async fn apply(&self, resources: &[RenderedResource]) -> Result<AppliedSet, InstanceError> {
        let mut planned = Vec::with_capacity(resources.len());
        let mut applied = AppliedSet::default();

        for resource in resources {
            match ResourceKind::from_kind(&resource.kind) {
                Some(kind) => planned.push((kind, resource)),
                None if self.unknown_kinds == UnknownKindPolicy::Reject => {
                    return Err(InstanceError::Provisioning {
                        kind: resource.kind.clone(),
                        reason: "resource kind is not supported".to_string(),
                    });
                }
                None => {
                    warn!("Skipping unsupported resource kind {}", resource.kind);
                    applied.skipped.push(resource.kind.clone());
                }
            }
        }

        for (kind, resource) in planned {
            let name = resource.name.clone().unwrap_or_default();
            let result = with_timeout(
                self.call_timeout,
                format!("create {}", kind),
                self.orchestrator.create_resource(kind, &resource.document),
            )
            .await?;

            match result {
                Ok(()) => {
                    info!("Created {} {}", kind, name);
                    applied.created.push(AppliedResource { kind, name });
                }
                Err(OrchestratorError::AlreadyExists { name }) => {
                    return Err(InstanceError::AlreadyExists { kind, name });
                }
                Err(e) => {
                    return Err(InstanceError::Provisioning {
                        kind: kind.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(applied)
    }

    /// Delete every known resource kind for `instance_name`.
    ///
    /// Each deletion is attempted regardless of the others; failures are
    /// logged and reported, never returned as an error.
    pub async fn remove(&self, instance_name: &str) -> RemovalReport {
        let name = resource_name(instance_name);
        let mut steps = Vec::with_capacity(ResourceKind::TEARDOWN_ORDER.len());

        for kind in ResourceKind::TEARDOWN_ORDER {
            let outcome = match with_timeout(
                self.call_timeout,
                format!("delete {}", kind),
                self.orchestrator.delete_resource(kind, &name),
            )
            .await
            {
                Ok(Ok(())) => {
                    info!("Deleted {} for {}", kind, instance_name);
                    RemovalOutcome::Deleted
                }
                Ok(Err(OrchestratorError::NotFound { .. })) => {
                    info!("{} for {} was already gone", kind, instance_name);
                    RemovalOutcome::Absent
                }
                Ok(Err(e)) => {
                    warn!("Error deleting {} for {}: {}", kind, instance_name, e);
                    RemovalOutcome::Failed(e.to_string())
                }
                Err(e) => {
                    warn!("Error deleting {} for {}: {}", kind, instance_name, e);
                    RemovalOutcome::Failed(e.to_string())
                }
            };

            steps.push(RemovalStep {
                kind,
                name: name.clone(),
                outcome,
            });
        }

        RemovalReport {
            instance_name: instance_name.to_string(),
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeOrchestrator;
    use serde_json::json;

    fn resource(kind: &str, name: &str) -> RenderedResource {
        RenderedResource {
            kind: kind.to_string(),
            name: Some(name.to_string()),
            document: json!({"kind": kind, "metadata": {"name": name}}),
        }
    }

    fn provisioner(fake: &Arc<FakeOrchestrator>, policy: UnknownKindPolicy) -> ResourceProvisioner {
        ResourceProvisioner::new(fake.clone(), policy, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_apply_creates_in_order_and_skips_unknown() {
        let fake = Arc::new(FakeOrchestrator::new());
        let resources = vec![
            resource("StatefulSet", "postgres-db-1"),
            resource("ConfigMap", "extra"),
            resource("Service", "postgres-db-1"),
        ];

        let applied = provisioner(&fake, UnknownKindPolicy::Skip)
            .apply(&resources)
            .await
            .unwrap();

        assert_eq!(applied.created.len(), 2);
        assert_eq!(applied.skipped, vec!["ConfigMap".to_string()]);
        assert_eq!(
            fake.created(),
            vec![
                (ResourceKind::StatefulSet, "postgres-db-1".to_string()),
                (ResourceKind::Service, "postgres-db-1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_reject_policy_creates_nothing() {
        let fake = Arc::new(FakeOrchestrator::new());
        let resources = vec![
            resource("StatefulSet", "postgres-db-1"),
            resource("Ingress", "web"),
        ];

        let err = provisioner(&fake, UnknownKindPolicy::Reject)
            .apply(&resources)
            .await
            .unwrap_err();

        assert!(matches!(err, InstanceError::Provisioning { ref kind, .. } if kind == "Ingress"));
        assert!(fake.created().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_stops_without_rollback() {
        let fake = Arc::new(FakeOrchestrator::new());
        fake.fail_create(ResourceKind::Service, "quota exceeded");
        let resources = vec![
            resource("StatefulSet", "postgres-db-1"),
            resource("Service", "postgres-db-1"),
        ];

        let err = provisioner(&fake, UnknownKindPolicy::Skip)
            .apply(&resources)
            .await
            .unwrap_err();

        match err {
            InstanceError::Provisioning { kind, reason } => {
                assert_eq!(kind, "Service");
                assert!(reason.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(fake.contains(ResourceKind::StatefulSet, "postgres-db-1"));
    }

    #[tokio::test]
    async fn test_existing_resource_is_reported_distinctly() {
        let fake = Arc::new(FakeOrchestrator::new());
        let resources = vec![resource("StatefulSet", "postgres-db-1")];
        let provisioner = provisioner(&fake, UnknownKindPolicy::Skip);

        provisioner.apply(&resources).await.unwrap();
        let err = provisioner.apply(&resources).await.unwrap_err();

        assert!(matches!(
            err,
            InstanceError::AlreadyExists {
                kind: ResourceKind::StatefulSet,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_remove_is_best_effort() {
        let fake = Arc::new(FakeOrchestrator::new());
        let resources = vec![
            resource("StatefulSet", "postgres-db-1"),
            resource("Service", "postgres-db-1"),
        ];
        let provisioner = provisioner(&fake, UnknownKindPolicy::Skip);
        provisioner.apply(&resources).await.unwrap();
        fake.fail_delete(ResourceKind::StatefulSet, "connection reset");

        let report = provisioner.remove("db-1").await;

        assert!(!report.is_complete());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.steps[1].outcome, RemovalOutcome::Deleted);
        assert!(!fake.contains(ResourceKind::Service, "postgres-db-1"));
    }

    #[tokio::test]
    async fn test_remove_of_missing_resources_is_complete() {
        let fake = Arc::new(FakeOrchestrator::new());

        let report = provisioner(&fake, UnknownKindPolicy::Skip)
            .remove("db-gone")
            .await;

        assert!(report.is_complete());
        assert!(report
            .steps
            .iter()
            .all(|step| step.outcome == RemovalOutcome::Absent));
        assert_eq!(report.steps[0].name, "postgres-db-gone");
    }
}
