//! HTTP handlers for instance lifecycle operations

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use pgpaas_core::problemdetails::Problem;
use pgpaas_core::ProblemDetails;
use tracing::{error, info};
use utoipa::OpenApi;

use super::types::*;
use crate::error::InstanceError;
use crate::types::{InstanceMetrics, InstanceRecord, InstanceStatus};

/// OpenAPI documentation for instance endpoints
#[derive(OpenApi)]
#[openapi(
    paths(
        create_database,
        list_databases,
        get_database,
        delete_database,
        get_database_metrics,
    ),
    components(
        schemas(
            CreateDatabaseRequest,
            DeleteDatabaseResponse,
            InstanceRecord,
            InstanceStatus,
            InstanceMetrics,
            ProblemDetails,
        )
    ),
    tags(
        (name = "Databases", description = "PostgreSQL instance lifecycle")
    )
)]
pub struct DatabasesApiDoc;

/// Configure instance routes
pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/databases", get(list_databases).post(create_database))
        .route(
            "/databases/{id}",
            get(get_database).delete(delete_database),
        )
        .route("/databases/{id}/metrics", get(get_database_metrics))
}

/// Create a database instance
#[utoipa::path(
    tag = "Databases",
    post,
    path = "/databases",
    request_body = CreateDatabaseRequest,
    responses(
        (status = 201, description = "Instance provisioned", body = InstanceRecord),
        (status = 400, description = "Missing or malformed body", body = ProblemDetails),
        (status = 409, description = "A resource for this instance already exists", body = ProblemDetails),
        (status = 500, description = "Template or provisioning failure", body = ProblemDetails),
        (status = 504, description = "Orchestration API timed out", body = ProblemDetails)
    )
)]
pub async fn create_database(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateDatabaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Problem> {
    let Json(request) = payload.map_err(|rejection| InstanceError::Validation {
        reason: rejection.body_text(),
    })?;

    let record = state
        .controller
        .create(request.into())
        .await
        .map_err(|e| {
            error!("Failed to create database: {}", e);
            e
        })?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// List all database instances
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/databases",
    responses(
        (status = 200, description = "Instances in creation order", body = Vec<InstanceRecord>),
        (status = 500, description = "Registry failure", body = ProblemDetails)
    )
)]
pub async fn list_databases(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Problem> {
    let records = state.controller.list().await?;
    Ok(Json(records))
}

/// Get one database instance
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/databases/{id}",
    params(("id" = String, Path, description = "Instance id")),
    responses(
        (status = 200, description = "Instance found", body = InstanceRecord),
        (status = 404, description = "Database not found", body = ProblemDetails)
    )
)]
pub async fn get_database(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let record = state.controller.get(&id).await?;
    Ok(Json(record))
}

/// Delete a database instance and its cluster resources
///
/// Teardown is best-effort: the instance is forgotten even if some
/// resources could not be removed.
#[utoipa::path(
    tag = "Databases",
    delete,
    path = "/databases/{id}",
    params(("id" = String, Path, description = "Instance id")),
    responses(
        (status = 200, description = "Instance deleted", body = DeleteDatabaseResponse),
        (status = 404, description = "Database not found", body = ProblemDetails)
    )
)]
pub async fn delete_database(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let report = state.controller.delete(&id).await?;
    info!(
        "Delete of {} finished ({} failed steps)",
        report.instance_name,
        report.failures().count()
    );
    Ok(Json(DeleteDatabaseResponse::deleted()))
}

/// Current CPU and memory usage of an instance
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/databases/{id}/metrics",
    params(("id" = String, Path, description = "Instance id")),
    responses(
        (status = 200, description = "Raw metric samples", body = InstanceMetrics),
        (status = 404, description = "Database not found", body = ProblemDetails),
        (status = 502, description = "Metrics backend unavailable", body = ProblemDetails)
    )
)]
pub async fn get_database_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let metrics = state.controller.metrics(&id).await.map_err(|e| {
        if e.is_retryable() {
            error!("Metrics for {} unavailable: {}", id, e);
        }
        e
    })?;
    Ok(Json(metrics))
}
