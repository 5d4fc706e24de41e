use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use pgpaas_core::openapi::merge_openapi_schemas;
use pgpaas_instances::handlers::{configure_routes, AppState, DatabasesApiDoc};
use pgpaas_instances::{LifecycleController, ServerConfig};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::shutdown::shutdown_signal;

const SERVICE_NAME: &str = "pgpaas-api";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn root() -> &'static str {
    "pgpaas: PostgreSQL instances on Kubernetes"
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

fn create_openapi() -> utoipa::openapi::OpenApi {
    use utoipa::openapi::*;

    let base = OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("pgpaas")
                .description(Some("Provision and manage PostgreSQL instances on Kubernetes"))
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .servers(Some(vec![ServerBuilder::new()
            .url("/api/v1")
            .description(Some("Base path for all API endpoints"))
            .build()]))
        .build();

    merge_openapi_schemas(base, vec![DatabasesApiDoc::openapi()])
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Full application router: health, docs and the versioned API
pub fn build_router(
    config: &ServerConfig,
    controller: Arc<LifecycleController>,
) -> anyhow::Result<Router> {
    let state = Arc::new(AppState { controller });

    Ok(Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", configure_routes().with_state(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", create_openapi()))
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http()))
}

pub async fn start_api(
    config: Arc<ServerConfig>,
    controller: Arc<LifecycleController>,
) -> anyhow::Result<()> {
    let app = build_router(&config, controller)?;

    let listener = TcpListener::bind(config.socket_addr()?).await?;
    info!("pgpaas API listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pgpaas API exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use pgpaas_instances::test_utils::TestHarness;
    use tower::ServiceExt;

    fn router(harness: &TestHarness) -> Router {
        build_router(&ServerConfig::default(), harness.controller.clone()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let harness = TestHarness::new();

        let response = router(&harness)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "healthy", "service": "pgpaas-api"})
        );
    }

    #[tokio::test]
    async fn test_root_greeting() {
        let harness = TestHarness::new();

        let response = router(&harness)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_databases_are_nested_under_api_v1() {
        let harness = TestHarness::new();

        let response = router(&harness)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/databases")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let harness = TestHarness::new();

        let response = router(&harness)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/databases")
                    .header(header::ORIGIN, "http://localhost:8086")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:8086")
        );
    }

    #[test]
    fn test_openapi_documents_database_paths() {
        let doc = create_openapi();

        assert!(doc.paths.paths.contains_key("/databases"));
        assert!(doc.paths.paths.contains_key("/databases/{id}"));
        assert!(doc.paths.paths.contains_key("/databases/{id}/metrics"));
    }
}
