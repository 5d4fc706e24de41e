//! Runtime configuration shared by the CLI and the controller

use std::net::SocketAddr;
use std::time::Duration;

use pgpaas_core::{ServiceError, ServiceResult};
use url::Url;

use crate::provisioner::UnknownKindPolicy;

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_TEMPLATE_CONFIG_MAP: &str = "postgres-template";
pub const DEFAULT_TEMPLATE_KEY: &str = "postgres-statefulset.yaml";
pub const DEFAULT_PROMETHEUS_URL: &str = "http://prometheus:9090";
pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8086";

/// Settings the lifecycle controller reads on every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub template_config_map: String,
    pub template_key: String,
    pub external_timeout: Duration,
    pub unknown_kinds: UnknownKindPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            template_config_map: DEFAULT_TEMPLATE_CONFIG_MAP.to_string(),
            template_key: DEFAULT_TEMPLATE_KEY.to_string(),
            external_timeout: Duration::from_secs(DEFAULT_EXTERNAL_TIMEOUT_SECS),
            unknown_kinds: UnknownKindPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub namespace: String,
    pub prometheus_url: String,
    /// Selects the persistent registry when set
    pub database_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub controller: ControllerSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            prometheus_url: DEFAULT_PROMETHEUS_URL.to_string(),
            database_url: None,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            controller: ControllerSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Check the values that would otherwise only fail on first use
    pub fn validate(&self) -> ServiceResult<()> {
        self.socket_addr()?;

        let prometheus = Url::parse(&self.prometheus_url).map_err(|e| invalid(format!(
            "prometheus url '{}' is invalid: {}",
            self.prometheus_url, e
        )))?;
        if !matches!(prometheus.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "prometheus url must be http or https, got '{}'",
                prometheus.scheme()
            )));
        }

        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace must not be empty"));
        }
        if self.controller.template_config_map.trim().is_empty()
            || self.controller.template_key.trim().is_empty()
        {
            return Err(invalid("template ConfigMap name and key must not be empty"));
        }
        if self.controller.external_timeout.is_zero() {
            return Err(invalid("external timeout must be greater than zero"));
        }

        for origin in &self.cors_origins {
            Url::parse(origin)
                .map_err(|e| invalid(format!("CORS origin '{}' is invalid: {}", origin, e)))?;
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> ServiceResult<SocketAddr> {
        self.address
            .parse()
            .map_err(|e| invalid(format!("address '{}' is invalid: {}", self.address, e)))
    }
}

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::Configuration {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
        assert_eq!(config.controller.template_config_map, "postgres-template");
        assert_eq!(config.controller.template_key, "postgres-statefulset.yaml");
    }

    #[test]
    fn test_rejects_bad_address() {
        let config = ServerConfig {
            address: "localhost".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServiceError::Configuration { .. })
        ));
    }

    #[test]
    fn test_rejects_non_http_prometheus() {
        let config = ServerConfig {
            prometheus_url: "ftp://prometheus:9090".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = ServerConfig::default();
        config.controller.external_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
