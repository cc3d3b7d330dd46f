//! Kubernetes integration for the harness:
//! - thin client wrapper scoped to the test namespace
//! - fluent builders for the resources a functional test deploys

mod client;
mod resources;

pub use client::K8sClient;
pub use resources::{framework_labels, ConfigMapBuilder, ContainerBuilder, PodBuilder, ServiceBuilder};
