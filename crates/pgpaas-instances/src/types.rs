use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_DB_NAME: &str = "postgres";
pub const DEFAULT_DB_USER: &str = "postgres";
/// Plaintext fallback password, passed through the template as-is.
pub const DEFAULT_DB_PASSWORD: &str = "password";

/// Static storage figure reported until storage is actually measured
pub const STORAGE_USAGE_PLACEHOLDER: &str = "1Gi";

/// Observed lifecycle state of an instance.
///
/// Only `Creating` is assigned today; the other states exist so that a
/// status watcher can be added without changing the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Creating,
    Ready,
    Deleting,
    Failed,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Creating => write!(f, "creating"),
            InstanceStatus::Ready => write!(f, "ready"),
            InstanceStatus::Deleting => write!(f, "deleting"),
            InstanceStatus::Failed => write!(f, "failed"),
        }
    }
}

impl InstanceStatus {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "creating" => Some(InstanceStatus::Creating),
            "ready" => Some(InstanceStatus::Ready),
            "deleting" => Some(InstanceStatus::Deleting),
            "failed" => Some(InstanceStatus::Failed),
            _ => None,
        }
    }
}

/// A database instance tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InstanceRecord {
    /// Short random identifier (8 hex characters)
    #[schema(example = "3f9a0c1e")]
    pub id: String,
    /// Naming root for the cluster resources, always `db-<id>`
    #[schema(example = "db-3f9a0c1e")]
    pub name: String,
    #[schema(example = "app1")]
    pub db_name: String,
    #[schema(example = "alice")]
    pub db_user: String,
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
}

impl InstanceRecord {
    pub fn instance_name(id: &str) -> String {
        format!("db-{}", id)
    }
}

/// Kubernetes resource kinds the provisioner knows how to create and delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ResourceKind {
    StatefulSet,
    Service,
}

impl ResourceKind {
    /// Kinds removed on teardown, in deletion order
    pub const TEARDOWN_ORDER: [ResourceKind; 2] = [ResourceKind::StatefulSet, ResourceKind::Service];

    /// Map a manifest `kind` field onto a known kind (case-sensitive, as Kubernetes is)
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "StatefulSet" => Some(ResourceKind::StatefulSet),
            "Service" => Some(ResourceKind::Service),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::Service => "Service",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster resource name for an instance, shared by every kind: `postgres-<instance_name>`
pub fn resource_name(instance_name: &str) -> String {
    format!("postgres-{}", instance_name)
}

/// Instance configuration after defaults have been applied
#[derive(Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

impl InstanceConfig {
    pub fn new(
        db_name: Option<String>,
        db_user: Option<String>,
        db_password: Option<String>,
    ) -> Self {
        Self {
            db_name: db_name.unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            db_user: db_user.unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            db_password: db_password.unwrap_or_else(|| DEFAULT_DB_PASSWORD.to_string()),
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl std::fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .finish()
    }
}

/// Usage figures for one instance, as returned by the metrics backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InstanceMetrics {
    /// Raw Prometheus samples for the CPU rate query
    #[schema(value_type = Vec<Object>)]
    pub cpu_usage: Vec<serde_json::Value>,
    /// Raw Prometheus samples for the memory query
    #[schema(value_type = Vec<Object>)]
    pub memory_usage: Vec<serde_json::Value>,
    /// Static placeholder, storage is not measured
    #[schema(example = "1Gi")]
    pub storage_usage: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&InstanceStatus::Creating).unwrap();
        assert_eq!(json, "\"creating\"");
        assert_eq!(
            InstanceStatus::from_str("READY"),
            Some(InstanceStatus::Ready)
        );
        assert_eq!(InstanceStatus::from_str("gone"), None);
    }

    #[test]
    fn resource_kind_matching_is_exact() {
        assert_eq!(
            ResourceKind::from_kind("StatefulSet"),
            Some(ResourceKind::StatefulSet)
        );
        assert_eq!(ResourceKind::from_kind("service"), None);
        assert_eq!(ResourceKind::from_kind("ConfigMap"), None);
    }

    #[test]
    fn names_derive_from_id() {
        let name = InstanceRecord::instance_name("abcd1234");
        assert_eq!(name, "db-abcd1234");
        assert_eq!(resource_name(&name), "postgres-db-abcd1234");
    }

    #[test]
    fn config_defaults_only_fill_missing_fields() {
        let config = InstanceConfig::new(Some("app1".into()), None, None);
        assert_eq!(config.db_name, "app1");
        assert_eq!(config.db_user, "postgres");
        assert_eq!(config.db_password, "password");
    }

    #[test]
    fn config_debug_hides_password() {
        let config = InstanceConfig::new(None, None, Some("s3cret".into()));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
    }
}
