//! pgpaas-instances: PostgreSQL instance lifecycle on Kubernetes
//!
//! Renders a workload template per instance, creates the resulting
//! StatefulSet and Service, tracks instances in a registry and reports
//! usage from Prometheus.

pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod orchestrator;
pub mod provisioner;
pub mod registry;
pub mod template;
pub mod test_utils;
pub mod types;

pub use config::{ControllerSettings, ServerConfig};
pub use controller::LifecycleController;
pub use error::InstanceError;
pub use metrics::{MetricsSource, PrometheusGateway};
pub use orchestrator::{KubeOrchestrator, Orchestrator};
pub use provisioner::{RemovalReport, ResourceProvisioner, UnknownKindPolicy};
pub use registry::{DatabaseRegistry, InstanceRegistry, MemoryRegistry};
pub use types::{InstanceConfig, InstanceMetrics, InstanceRecord, InstanceStatus};
