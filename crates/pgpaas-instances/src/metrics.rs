//! Prometheus-backed usage metrics for instances

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::InstanceError;
use crate::types::{resource_name, InstanceMetrics, STORAGE_USAGE_PLACEHOLDER};

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, instance_name: &str) -> Result<InstanceMetrics, InstanceError>;
}

/// Instant-query response; `data` and `result` may be absent when there is nothing to report
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

pub struct PrometheusGateway {
    client: Client,
    base_url: String,
}

impl PrometheusGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InstanceError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            InstanceError::MetricsBackendUnavailable {
                reason: e.to_string(),
            }
        })?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn cpu_query(instance_name: &str) -> String {
        format!(
            "rate(container_cpu_usage_seconds_total{{pod=~\"{}.*\"}}[5m])",
            resource_name(instance_name)
        )
    }

    pub fn memory_query(instance_name: &str) -> String {
        format!(
            "container_memory_usage_bytes{{pod=~\"{}.*\"}}",
            resource_name(instance_name)
        )
    }

    async fn instant_query(&self, query: &str) -> Result<Vec<serde_json::Value>, InstanceError> {
        let unavailable = |e: reqwest::Error| InstanceError::MetricsBackendUnavailable {
            reason: e.to_string(),
        };

        debug!("Prometheus query: {}", query);
        let response = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", query)])
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;

        let body: QueryResponse = response.json().await.map_err(unavailable)?;
        Ok(body.data.map(|data| data.result).unwrap_or_default())
    }
}

#[async_trait]
impl MetricsSource for PrometheusGateway {
    async fn fetch(&self, instance_name: &str) -> Result<InstanceMetrics, InstanceError> {
        let cpu_query = Self::cpu_query(instance_name);
        let memory_query = Self::memory_query(instance_name);

        let (cpu_usage, memory_usage) = tokio::try_join!(
            self.instant_query(&cpu_query),
            self.instant_query(&memory_query)
        )?;

        Ok(InstanceMetrics {
            cpu_usage,
            memory_usage,
            storage_usage: STORAGE_USAGE_PLACEHOLDER.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> PrometheusGateway {
        PrometheusGateway::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_queries_select_pods_by_prefix() {
        assert_eq!(
            PrometheusGateway::cpu_query("db-1234abcd"),
            "rate(container_cpu_usage_seconds_total{pod=~\"postgres-db-1234abcd.*\"}[5m])"
        );
        assert_eq!(
            PrometheusGateway::memory_query("db-1234abcd"),
            "container_memory_usage_bytes{pod=~\"postgres-db-1234abcd.*\"}"
        );
    }

    #[tokio::test]
    async fn test_fetch_returns_raw_results() {
        let server = MockServer::start().await;
        let sample = json!({"metric": {"pod": "postgres-db-1-0"}, "value": [1700000000.0, "0.02"]});

        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(query_param(
                "query",
                PrometheusGateway::cpu_query("db-1").as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"resultType": "vector", "result": [sample.clone()]}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(query_param(
                "query",
                PrometheusGateway::memory_query("db-1").as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"resultType": "vector", "result": []}
            })))
            .mount(&server)
            .await;

        let metrics = gateway(&server).fetch("db-1").await.unwrap();

        assert_eq!(metrics.cpu_usage, vec![sample]);
        assert!(metrics.memory_usage.is_empty());
        assert_eq!(metrics.storage_usage, "1Gi");
    }

    #[tokio::test]
    async fn test_missing_data_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let metrics = gateway(&server).fetch("db-1").await.unwrap();

        assert!(metrics.cpu_usage.is_empty());
        assert!(metrics.memory_usage.is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = gateway(&server).fetch("db-1").await.unwrap_err();

        assert!(matches!(err, InstanceError::MetricsBackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let gateway = PrometheusGateway::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();

        let err = gateway.fetch("db-1").await.unwrap_err();

        assert!(err.is_retryable());
    }
}
