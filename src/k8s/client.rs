//! Kubernetes client wrapper for the harness

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Namespace, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, AttachParams, DeleteParams, LogParams, PostParams},
    Client, Config,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};

/// Wrapper around `kube::Client` scoped to one test namespace
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
    namespace: String,
}

impl K8sClient {
    /// Create a new K8sClient using the default kubeconfig or in-cluster config
    #[instrument(skip_all)]
    pub async fn new(namespace: &str) -> Result<Self> {
        let config = Config::infer()
            .await
            .map_err(kube::Error::InferConfig)?;
        let client = Client::try_from(config)?;

        info!(namespace, "Connected to Kubernetes cluster");

        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    /// Get the namespace this client operates in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the inner kube Client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Create the test namespace. Namespaces are unique per test run, so an
    /// already-exists response is an error here, not a benign race.
    #[instrument(skip(self, labels))]
    pub async fn create_namespace(&self, labels: BTreeMap<String, String>) -> Result<Namespace> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        };

        let created = namespaces.create(&PostParams::default(), &ns).await?;
        info!(namespace = %self.namespace, "Created namespace");
        Ok(created)
    }

    /// Delete the test namespace and everything in it
    #[instrument(skip(self))]
    pub async fn delete_namespace(&self) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .delete(&self.namespace, &DeleteParams::default())
            .await?;
        info!(namespace = %self.namespace, "Deleted namespace");
        Ok(())
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Create a config map
    #[instrument(skip(self, config_map), fields(name = %config_map.metadata.name.as_deref().unwrap_or("unknown")))]
    pub async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let created = api.create(&PostParams::default(), config_map).await?;
        info!("Created config map");
        Ok(created)
    }

    /// Create a service
    #[instrument(skip(self, service), fields(name = %service.metadata.name.as_deref().unwrap_or("unknown")))]
    pub async fn create_service(&self, service: &Service) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        let created = api.create(&PostParams::default(), service).await?;
        info!("Created service");
        Ok(created)
    }

    /// Create a pod
    #[instrument(skip(self, pod), fields(name = %pod.metadata.name.as_deref().unwrap_or("unknown")))]
    pub async fn create_pod(&self, pod: &Pod) -> Result<Pod> {
        let created = self.pods().create(&PostParams::default(), pod).await?;
        info!("Created pod");
        Ok(created)
    }

    /// Get a pod by name, refreshing the caller's view of its status
    pub async fn get_pod(&self, name: &str) -> Result<Pod> {
        Ok(self.pods().get(name).await?)
    }

    /// Get the endpoint list backing a service
    pub async fn get_endpoints(&self, name: &str) -> Result<Endpoints> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(api.get(name).await?)
    }

    /// Get logs from a specific container in a pod
    #[instrument(skip(self))]
    pub async fn pod_logs(&self, pod_name: &str, container_name: &str) -> Result<String> {
        let log_params = LogParams {
            container: Some(container_name.to_string()),
            ..Default::default()
        };
        Ok(self.pods().logs(pod_name, &log_params).await?)
    }

    /// Run a command inside a named container of a pod, returning captured
    /// stdout. Errors if the container is unreachable or the command exits
    /// non-zero.
    #[instrument(skip(self, command))]
    pub async fn exec(
        &self,
        pod_name: &str,
        container_name: &str,
        command: Vec<String>,
    ) -> Result<String> {
        debug!(?command, "Running command in container");

        let ap = AttachParams {
            container: Some(container_name.to_string()),
            stdin: false,
            stdout: true,
            stderr: true,
            tty: false,
            ..Default::default()
        };

        let mut attached = self
            .pods()
            .exec(pod_name, command, &ap)
            .await
            .map_err(|e| Error::Exec {
                container: container_name.to_string(),
                message: e.to_string(),
            })?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        let stdout_stream = attached.stdout();
        let stderr_stream = attached.stderr();
        tokio::join!(
            async {
                if let Some(mut s) = stdout_stream {
                    let _ = s.read_to_string(&mut stdout).await;
                }
            },
            async {
                if let Some(mut s) = stderr_stream {
                    let _ = s.read_to_string(&mut stderr).await;
                }
            }
        );

        let status = match attached.take_status() {
            Some(status) => status.await,
            None => None,
        };
        let _ = attached.join().await;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                let message = status
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| stderr.trim().to_string());
                return Err(Error::Exec {
                    container: container_name.to_string(),
                    message,
                });
            }
        }

        debug!(stdout_len = stdout.len(), "Command finished");
        Ok(stdout)
    }
}
