mod api;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use pgpaas_instances::config::{
    ControllerSettings, ServerConfig, DEFAULT_ADDRESS, DEFAULT_CORS_ORIGIN,
    DEFAULT_EXTERNAL_TIMEOUT_SECS, DEFAULT_NAMESPACE, DEFAULT_PROMETHEUS_URL,
    DEFAULT_TEMPLATE_CONFIG_MAP, DEFAULT_TEMPLATE_KEY,
};
use pgpaas_instances::{
    DatabaseRegistry, InstanceRegistry, KubeOrchestrator, LifecycleController, MemoryRegistry,
    PrometheusGateway, UnknownKindPolicy,
};
use tracing::{debug, info};

use api::start_api;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = DEFAULT_ADDRESS, env = "PGPAAS_ADDRESS")]
    pub address: String,

    /// Namespace instances are created in
    #[arg(long, default_value = DEFAULT_NAMESPACE, env = "PGPAAS_NAMESPACE")]
    pub namespace: String,

    /// ConfigMap holding the workload template
    #[arg(
        long,
        default_value = DEFAULT_TEMPLATE_CONFIG_MAP,
        env = "PGPAAS_TEMPLATE_CONFIG_MAP"
    )]
    pub template_config_map: String,

    /// Key of the template inside the ConfigMap
    #[arg(long, default_value = DEFAULT_TEMPLATE_KEY, env = "PGPAAS_TEMPLATE_KEY")]
    pub template_key: String,

    /// Prometheus base URL
    #[arg(long, default_value = DEFAULT_PROMETHEUS_URL, env = "PGPAAS_PROMETHEUS_URL")]
    pub prometheus_url: String,

    /// Timeout for each Kubernetes or Prometheus call, in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_EXTERNAL_TIMEOUT_SECS,
        env = "PGPAAS_EXTERNAL_TIMEOUT_SECS"
    )]
    pub external_timeout_secs: u64,

    /// Database URL for a persistent registry (sqlite:// or postgres://); in-memory when unset
    #[arg(long, env = "PGPAAS_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Fail creation when the template contains kinds other than StatefulSet and Service
    #[arg(long, env = "PGPAAS_REJECT_UNKNOWN_KINDS")]
    pub reject_unknown_kinds: bool,

    /// Allowed CORS origins, comma separated
    #[arg(
        long,
        default_value = DEFAULT_CORS_ORIGIN,
        env = "PGPAAS_CORS_ORIGINS",
        value_delimiter = ','
    )]
    pub cors_origins: Vec<String>,
}

impl ServeCommand {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            address: self.address.clone(),
            namespace: self.namespace.clone(),
            prometheus_url: self.prometheus_url.clone(),
            database_url: self.database_url.clone(),
            cors_origins: self.cors_origins.clone(),
            controller: ControllerSettings {
                template_config_map: self.template_config_map.clone(),
                template_key: self.template_key.clone(),
                external_timeout: Duration::from_secs(self.external_timeout_secs),
                unknown_kinds: if self.reject_unknown_kinds {
                    UnknownKindPolicy::Reject
                } else {
                    UnknownKindPolicy::Skip
                },
            },
        }
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.server_config();
        config.validate()?;

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            let controller = build_controller(&config).await?;
            start_api(Arc::new(config), controller).await
        })
    }
}

async fn build_controller(config: &ServerConfig) -> anyhow::Result<Arc<LifecycleController>> {
    debug!("Connecting to Kubernetes (namespace {})", config.namespace);
    let orchestrator = KubeOrchestrator::try_default(config.namespace.clone()).await?;

    let registry: Arc<dyn InstanceRegistry> = match &config.database_url {
        Some(url) => {
            info!("Using persistent instance registry");
            Arc::new(DatabaseRegistry::connect(url).await?)
        }
        None => {
            info!("Using in-memory instance registry");
            Arc::new(MemoryRegistry::new())
        }
    };

    let metrics =
        PrometheusGateway::new(config.prometheus_url.clone(), config.controller.external_timeout)?;

    Ok(Arc::new(LifecycleController::new(
        Arc::new(orchestrator),
        registry,
        Arc::new(metrics),
        config.controller.clone(),
    )))
}
