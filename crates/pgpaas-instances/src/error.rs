use pgpaas_core::error_builder::{
    bad_gateway, bad_request, conflict, gateway_timeout, internal_server_error, not_found,
};
use pgpaas_core::problemdetails::Problem;
use thiserror::Error;

use crate::types::ResourceKind;

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Database {id} not found")]
    NotFound { id: String },

    #[error("Template source unavailable: {reason}")]
    TemplateSourceUnavailable { reason: String },

    #[error("Template could not be parsed: {reason}")]
    TemplateParse { reason: String },

    #[error("Failed to create {kind}: {reason}")]
    Provisioning { kind: String, reason: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("Timed out waiting for {operation}")]
    ExternalTimeout { operation: String },

    #[error("Metrics backend unavailable: {reason}")]
    MetricsBackendUnavailable { reason: String },

    #[error("Registry error: {reason}")]
    Registry { reason: String },

    #[error("Instance id {id} is already registered")]
    Conflict { id: String },
}

impl InstanceError {
    /// Whether the same request may succeed when retried unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InstanceError::ExternalTimeout { .. } | InstanceError::MetricsBackendUnavailable { .. }
        )
    }
}

impl From<sea_orm::DbErr> for InstanceError {
    fn from(err: sea_orm::DbErr) -> Self {
        InstanceError::Registry {
            reason: err.to_string(),
        }
    }
}

impl From<InstanceError> for Problem {
    fn from(err: InstanceError) -> Self {
        match &err {
            InstanceError::Validation { reason } => bad_request().detail(reason.clone()).build(),
            InstanceError::NotFound { .. } => not_found().detail("Database not found").build(),
            InstanceError::AlreadyExists { .. } | InstanceError::Conflict { .. } => {
                conflict().detail(err.to_string()).build()
            }
            InstanceError::MetricsBackendUnavailable { .. } => {
                bad_gateway().detail(err.to_string()).build()
            }
            InstanceError::ExternalTimeout { .. } => {
                gateway_timeout().detail(err.to_string()).build()
            }
            InstanceError::TemplateSourceUnavailable { .. }
            | InstanceError::TemplateParse { .. }
            | InstanceError::Provisioning { .. }
            | InstanceError::Registry { .. } => {
                internal_server_error().detail(err.to_string()).build()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_found_maps_to_404() {
        let problem: Problem = InstanceError::NotFound {
            id: "deadbeef".into(),
        }
        .into();
        assert_eq!(problem.status_code, StatusCode::NOT_FOUND);
        assert_eq!(problem.get_str("detail"), Some("Database not found"));
    }

    #[test]
    fn provisioning_failure_carries_reason() {
        let problem: Problem = InstanceError::Provisioning {
            kind: "Service".into(),
            reason: "quota exceeded".into(),
        }
        .into();
        assert_eq!(problem.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            problem.get_str("detail"),
            Some("Failed to create Service: quota exceeded")
        );
    }

    #[test]
    fn already_exists_is_distinct_from_generic_failures() {
        let problem: Problem = InstanceError::AlreadyExists {
            kind: ResourceKind::StatefulSet,
            name: "postgres-db-1".into(),
        }
        .into();
        assert_eq!(problem.status_code, StatusCode::CONFLICT);
    }

    #[test]
    fn upstream_failures_are_retryable() {
        assert!(InstanceError::ExternalTimeout {
            operation: "create StatefulSet".into()
        }
        .is_retryable());
        assert!(!InstanceError::TemplateParse {
            reason: "bad".into()
        }
        .is_retryable());
    }
}
