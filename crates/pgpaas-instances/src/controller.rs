//! Instance lifecycle: create, inspect, delete, observe
//!
//! The controller ties the template, provisioner, registry and metrics
//! source together. It never holds the registry across a network call: the
//! cluster work for a create happens first and the record is written only
//! once every resource was accepted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{SubsecRound, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ControllerSettings;
use crate::error::InstanceError;
use crate::metrics::MetricsSource;
use crate::orchestrator::{with_timeout, Orchestrator};
use crate::provisioner::{RemovalReport, ResourceProvisioner};
use crate::registry::InstanceRegistry;
use crate::template::{self, TemplateVars};
use crate::types::{InstanceConfig, InstanceMetrics, InstanceRecord, InstanceStatus};

/// Upper bound on id draws before giving up; collisions in 32 bits are rare
const MAX_ID_ATTEMPTS: usize = 16;

type IdSource = Box<dyn Fn() -> String + Send + Sync>;

pub struct LifecycleController {
    orchestrator: Arc<dyn Orchestrator>,
    provisioner: ResourceProvisioner,
    registry: Arc<dyn InstanceRegistry>,
    metrics: Arc<dyn MetricsSource>,
    settings: ControllerSettings,
    issued_ids: Mutex<HashSet<String>>,
    deleting: Mutex<HashSet<String>>,
    id_source: IdSource,
}

/// Exclusive right to tear down one instance, released on drop
struct DeleteClaim<'a> {
    deleting: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for DeleteClaim<'_> {
    fn drop(&mut self) {
        let mut deleting = self
            .deleting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        deleting.remove(&self.id);
    }
}

impl LifecycleController {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        registry: Arc<dyn InstanceRegistry>,
        metrics: Arc<dyn MetricsSource>,
        settings: ControllerSettings,
    ) -> Self {
        let provisioner = ResourceProvisioner::new(
            orchestrator.clone(),
            settings.unknown_kinds,
            settings.external_timeout,
        );
        Self {
            orchestrator,
            provisioner,
            registry,
            metrics,
            settings,
            issued_ids: Mutex::new(HashSet::new()),
            deleting: Mutex::new(HashSet::new()),
            id_source: Box::new(random_id),
        }
    }

    /// Replace the id generator, mainly so tests can force collisions
    pub fn with_id_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_source = Box::new(source);
        self
    }

    /// Provision a new instance and register it as `creating`.
    ///
    /// Nothing is registered unless every resource was created. Resources
    /// created before a failure are left in place.
    pub async fn create(&self, config: InstanceConfig) -> Result<InstanceRecord, InstanceError> {
        let id = self.issue_id().await?;
        let name = InstanceRecord::instance_name(&id);
        info!("Creating database {} ({:?})", name, config);

        let source = self.fetch_template().await?;
        let vars = TemplateVars {
            instance_name: &name,
            db_name: &config.db_name,
            db_user: &config.db_user,
            db_password: &config.db_password,
        };
        let resources = template::render(&source, &vars)?;

        let applied = self.provisioner.apply(&resources).await?;
        debug!(
            "Applied {} resources for {} ({} skipped)",
            applied.created.len(),
            name,
            applied.skipped.len()
        );

        let record = InstanceRecord {
            id,
            name,
            db_name: config.db_name,
            db_user: config.db_user,
            status: InstanceStatus::Creating,
            // Microseconds, the finest precision the persistent registry keeps
            created_at: Utc::now().trunc_subsecs(6),
        };
        self.registry.put(record.clone()).await?;

        info!("Database {} registered", record.name);
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<InstanceRecord>, InstanceError> {
        self.registry.list().await
    }

    pub async fn get(&self, id: &str) -> Result<InstanceRecord, InstanceError> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| InstanceError::NotFound { id: id.to_string() })
    }

    /// Tear down the instance's resources and forget it.
    ///
    /// The record is evicted even when some deletions failed; the report
    /// says which. Only one delete per id runs at a time; a concurrent one
    /// sees the instance as already gone.
    pub async fn delete(&self, id: &str) -> Result<RemovalReport, InstanceError> {
        let not_found = || InstanceError::NotFound { id: id.to_string() };
        let _claim = self.claim_delete(id).ok_or_else(not_found)?;
        let record = self.get(id).await?;
        info!("Deleting database {}", record.name);

        let report = self.provisioner.remove(&record.name).await;
        self.registry.delete(id).await?.ok_or_else(not_found)?;

        if report.is_complete() {
            info!("Database {} deleted", record.name);
        } else {
            warn!(
                "Database {} evicted with {} teardown failures",
                record.name,
                report.failures().count()
            );
        }
        Ok(report)
    }

    pub async fn metrics(&self, id: &str) -> Result<InstanceMetrics, InstanceError> {
        let record = self.get(id).await?;
        self.metrics.fetch(&record.name).await
    }

    async fn fetch_template(&self) -> Result<String, InstanceError> {
        let config_map = &self.settings.template_config_map;
        let data = with_timeout(
            self.settings.external_timeout,
            format!("read ConfigMap {}", config_map),
            self.orchestrator.read_config_map(config_map),
        )
        .await?
        .map_err(|e| InstanceError::TemplateSourceUnavailable {
            reason: format!("ConfigMap {}: {}", config_map, e),
        })?;

        data.get(&self.settings.template_key)
            .cloned()
            .ok_or_else(|| InstanceError::TemplateSourceUnavailable {
                reason: format!(
                    "ConfigMap {} has no key {}",
                    config_map, self.settings.template_key
                ),
            })
    }

    /// Draw an id that neither the registry nor this process has seen
    async fn issue_id(&self) -> Result<String, InstanceError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = (self.id_source)();
            if !self.reserve(&candidate) {
                continue;
            }
            if self.registry.contains(&candidate).await? {
                continue;
            }
            return Ok(candidate);
        }
        Err(InstanceError::Registry {
            reason: "could not allocate an unused instance id".to_string(),
        })
    }

    fn claim_delete(&self, id: &str) -> Option<DeleteClaim<'_>> {
        let mut deleting = self
            .deleting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        deleting.insert(id.to_string()).then(|| DeleteClaim {
            deleting: &self.deleting,
            id: id.to_string(),
        })
    }

    fn reserve(&self, id: &str) -> bool {
        let mut issued = self
            .issued_ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        issued.insert(id.to_string())
    }
}

fn random_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
