//! Request and response types for instance handlers

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::controller::LifecycleController;
use crate::types::InstanceConfig;

/// Application state for instance handlers
pub struct AppState {
    pub controller: Arc<LifecycleController>,
}

/// Request to create a database instance; every field is optional
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct CreateDatabaseRequest {
    /// Database created inside the instance (default `postgres`)
    #[schema(example = "app1")]
    #[serde(default)]
    pub db_name: Option<String>,

    /// Owner role (default `postgres`)
    #[schema(example = "alice")]
    #[serde(default)]
    pub db_user: Option<String>,

    /// Password for the owner role (default `password`)
    #[serde(default)]
    pub db_password: Option<String>,
}

impl std::fmt::Debug for CreateDatabaseRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateDatabaseRequest")
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &self.db_password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl From<CreateDatabaseRequest> for InstanceConfig {
    fn from(request: CreateDatabaseRequest) -> Self {
        InstanceConfig::new(request.db_name, request.db_user, request.db_password)
    }
}

/// Confirmation returned after a delete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteDatabaseResponse {
    #[schema(example = "Database deleted")]
    pub message: String,
}

impl DeleteDatabaseResponse {
    pub fn deleted() -> Self {
        Self {
            message: "Database deleted".to_string(),
        }
    }
}
