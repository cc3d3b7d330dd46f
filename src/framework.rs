//! Functional test framework for the log-forwarding pipeline.
//!
//! Deploys a stand-alone forwarder pod (plus one sidecar per configured
//! output) into a fresh namespace, drives it with synthetic log lines and
//! reads back what the output sidecars captured.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{Endpoints, Pod};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::generate::{CertificateGenerator, ConfigGenerator};
use crate::k8s::{framework_labels, ConfigMapBuilder, K8sClient, PodBuilder, ServiceBuilder};
use crate::models::ForwardingSpec;
use crate::outputs::{self, AdapterContext, CAPTURE_FILE};
use crate::wait::poll_immediate;

/// Name of the primary container running the forwarding engine.
pub const FORWARDER_CONTAINER: &str = "forwarder";

/// Port the pipeline's internal metrics endpoint listens on.
const METRICS_PORT: i32 = 24231;

/// Deploys a stand-alone forwarder configured from the forwarding spec and
/// verifies it end to end.
///
/// One `TestFramework` owns one deployment in one unique namespace; it is not
/// shared across concurrent tests.
pub struct TestFramework {
    pub name: String,
    pub namespace: String,
    /// Forwarding spec; populate before `deploy()`, immutable afterwards.
    pub spec: ForwardingSpec,
    /// Generated pipeline configuration, filled in by `deploy()`.
    pub conf: String,
    image: String,
    labels: BTreeMap<String, String>,
    settings: Settings,
    client: K8sClient,
    config_generator: Box<dyn ConfigGenerator + Send + Sync>,
    certificate_generator: Box<dyn CertificateGenerator + Send + Sync>,
    pod: Option<Pod>,
    container_id: Option<String>,
}

impl TestFramework {
    /// Creates the framework and its unique test namespace.
    #[instrument(skip_all)]
    pub async fn new(
        settings: Settings,
        config_generator: Box<dyn ConfigGenerator + Send + Sync>,
        certificate_generator: Box<dyn CertificateGenerator + Send + Sync>,
    ) -> Result<Self> {
        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = &suffix[..8];
        let name = format!("test-forward-{suffix}");
        let namespace = format!("test-{suffix}");

        let client = K8sClient::new(&namespace).await?;
        client.create_namespace(framework_labels(&name)).await?;
        info!(namespace = %namespace, "test namespace created");

        Ok(Self {
            labels: framework_labels(&name),
            image: settings.forwarder_image.clone(),
            name,
            namespace,
            spec: ForwardingSpec::default(),
            conf: String::new(),
            settings,
            client,
            config_generator,
            certificate_generator,
            pod: None,
            container_id: None,
        })
    }

    /// Deploy the objects needed to functional test the forwarder.
    ///
    /// Not safe to call twice on the same instance: the resources it creates
    /// are named after this framework and already exist after the first call.
    #[instrument(skip(self))]
    pub async fn deploy(&mut self) -> Result<()> {
        debug!("Generating config");
        let spec_yaml = serde_yaml::to_string(&self.spec)?;
        self.conf = self.config_generator.generate(&spec_yaml, false)?;

        debug!("Generating certificates");
        self.certificate_generator.generate(
            &self.namespace,
            &self.settings.scripts_dir,
            &self.name,
            &self.settings.working_dir,
        )?;

        debug!("Creating config configmap");
        let entrypoint = std::fs::read_to_string(&self.settings.entrypoint_path)?;
        let config = ConfigMapBuilder::new(&self.namespace, &self.name)
            .with_labels(self.labels.clone())
            .add("forwarder.conf", self.conf.clone())
            .add("run.sh", entrypoint)
            .build();
        self.client.create_config_map(&config).await?;

        debug!("Creating certs configmap");
        let certs_name = format!("certs-{}", self.name);
        let tls_key = std::fs::read_to_string(
            self.settings.working_dir.join(&self.settings.tls_key_file),
        )?;
        let tls_crt = std::fs::read_to_string(
            self.settings.working_dir.join(&self.settings.tls_cert_file),
        )?;
        let certs = ConfigMapBuilder::new(&self.namespace, &certs_name)
            .with_labels(self.labels.clone())
            .add("tls.key", tls_key)
            .add("tls.crt", tls_crt)
            .build();
        self.client.create_config_map(&certs).await?;

        debug!("Creating service");
        let service = ServiceBuilder::new(&self.namespace, &self.name)
            .add_service_port(METRICS_PORT, METRICS_PORT)
            .with_selector(self.labels.clone())
            .build();
        self.client.create_service(&service).await?;

        debug!("Defining pod");
        let builder = PodBuilder::new(&self.namespace, &self.name)
            .with_labels(self.labels.clone())
            .add_config_map_volume("config", &self.name)
            .add_config_map_volume("entrypoint", &self.name)
            .add_config_map_volume("certs", &certs_name)
            .add_container(FORWARDER_CONTAINER, &self.image)
            .add_container_port("metrics", METRICS_PORT)
            .add_env_var("LOG_LEVEL", "debug")
            .add_env_var_from_field_ref("POD_IP", "status.podIP")
            .add_volume_mount("config", "/etc/forwarder/configs.d/user", "", true)
            .add_volume_mount("entrypoint", "/opt/app-root/src/run.sh", "run.sh", true)
            .add_volume_mount("certs", "/etc/forwarder/metrics", "", true)
            .end();
        let builder = self.add_output_containers(builder).await?;

        debug!("Creating pod");
        let pod = self.client.create_pod(&builder.build()).await?;
        self.pod = Some(pod);

        self.wait_for_pod_ready().await?;
        // refresh so container statuses carry runtime identifiers
        let pod = self.client.get_pod(&self.name).await?;
        self.pod = Some(pod);

        self.wait_for_service_endpoints().await?;
        self.wait_for_forwarder_started().await?;

        self.container_id = self
            .pod
            .as_ref()
            .and_then(|pod| primary_container_id(pod, FORWARDER_CONTAINER));
        Ok(())
    }

    /// One sidecar per output in the forwarding spec, wired through the adapter
    /// registry. Output types with no registered adapter are skipped.
    async fn add_output_containers(&self, mut builder: PodBuilder) -> Result<PodBuilder> {
        debug!(outputs = self.spec.outputs.len(), "Adding outputs");
        for output in &self.spec.outputs {
            let type_name = output.output_type.to_string();
            let Some(adapter) = outputs::resolve(&type_name) else {
                debug!(output = %output.name, output_type = %type_name, "No adapter registered, skipping");
                continue;
            };
            let ctx = AdapterContext {
                namespace: &self.namespace,
            };
            let attachment = adapter(&ctx, output)?;
            for config_map in &attachment.config_maps {
                self.client.create_config_map(config_map).await?;
            }
            for volume in attachment.volumes {
                builder = builder.add_volume(volume);
            }
            builder = builder.push_container(attachment.container);
        }
        Ok(builder)
    }

    async fn wait_for_pod_ready(&self) -> Result<()> {
        info!("waiting for pod to be ready");
        let timeout = self.settings.pod_ready_timeout();
        poll_immediate(self.settings.pod_ready_interval(), timeout, || async move {
            match self.client.get_pod(&self.name).await {
                Ok(pod) if pod_is_ready(&pod) => Some(()),
                Ok(_) => None,
                Err(e) => {
                    trace!(error = %e, "Pod not yet visible");
                    None
                }
            }
        })
        .await
        .ok_or_else(|| Error::PodNotReady {
            pod: self.name.clone(),
            timeout,
        })
    }

    async fn wait_for_service_endpoints(&self) -> Result<()> {
        info!("waiting for service endpoints to be ready");
        poll_immediate(
            self.settings.endpoint_interval(),
            self.settings.endpoint_deadline(),
            || async move {
                match self.client.get_endpoints(&self.name).await {
                    // an address in the endpoint list means the service is available
                    Ok(endpoints) if endpoints_populated(&endpoints) => Some(()),
                    Ok(_) => None,
                    Err(e) => {
                        trace!(error = %e, "Endpoints not yet visible");
                        None
                    }
                }
            },
        )
        .await
        .ok_or(Error::ServiceNotStarted)
    }

    async fn wait_for_forwarder_started(&self) -> Result<()> {
        info!("waiting for the forwarder to be ready");
        poll_immediate(
            self.settings.startup_interval(),
            self.settings.startup_deadline(),
            || async move {
                match self.client.pod_logs(&self.name, FORWARDER_CONTAINER).await {
                    Ok(output) if output.contains(&self.settings.startup_marker) => Some(()),
                    Ok(_) => None,
                    Err(e) => {
                        trace!(error = %e, "Logs not yet readable");
                        None
                    }
                }
            },
        )
        .await
        .ok_or(Error::ForwarderNotStarted)
    }

    /// Run a command inside a named container of the test pod.
    pub async fn run_command(&self, container: &str, cmd: Vec<String>) -> Result<String> {
        debug!(container, ?cmd, "Running");
        let out = self.client.exec(&self.name, container, cmd).await;
        debug!(?out, "Exec'd");
        out
    }

    /// Write `count` CRI-formatted default lines to the application log.
    pub async fn write_application_logs(&self, count: usize) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let msg = format!("{timestamp} stdout F Functional test message $n");
        self.write_lines(&msg, count).await
    }

    /// Append `count` copies of `text`, each as an independent line, to the
    /// exact file the pipeline's source is configured to tail.
    ///
    /// `text` is interpolated into a shell echo; callers embedding double
    /// quotes must escape them.
    pub async fn write_lines(&self, text: &str, count: usize) -> Result<()> {
        let path = self.application_log_path()?;
        let script = format!(
            "mkdir -p {root};for n in {{1..{count}}};do echo {text} >> {path}; done",
            root = self.settings.containers_log_root,
        );
        let result = self
            .run_command(
                FORWARDER_CONTAINER,
                vec!["bash".to_string(), "-c".to_string(), script],
            )
            .await;
        trace!(?result, "write_lines finished");
        result.map(|_| ())
    }

    /// Poll the named output's capture file until readable, then return its
    /// non-empty lines in order. A readable-but-empty file yields an empty
    /// list, not an error.
    pub async fn read_from(&self, output_name: &str) -> Result<Vec<String>> {
        let container = output_name.to_lowercase();
        let container = container.as_str();
        let timeout = self.settings.read_deadline();
        let content = poll_immediate(self.settings.read_interval(), timeout, || async move {
            match self
                .run_command(
                    container,
                    vec!["cat".to_string(), CAPTURE_FILE.to_string()],
                )
                .await
            {
                Ok(content) => Some(content),
                Err(e) => {
                    trace!(error = %e, "Polling application logs");
                    None
                }
            }
        })
        .await;

        match content {
            Some(content) => Ok(parse_records(&content)),
            None => Err(Error::ReadTimeout {
                output: output_name.to_string(),
                timeout,
            }),
        }
    }

    /// Release the cluster resources this test created.
    ///
    /// With `retain_on_failure` set (the default), a failed test keeps its
    /// namespace for post-mortem inspection and the manual-cleanup commands
    /// are printed instead.
    pub async fn cleanup(&self, test_failed: bool) {
        if test_failed && self.settings.retain_on_failure {
            println!("\n\n============");
            println!(
                "Not removing test namespace since the test failed. Run \"kubectl delete ns {}\" to delete it manually",
                self.namespace
            );
            println!(
                "To delete all lingering test namespaces, run \"kubectl delete ns -l app.kubernetes.io/managed-by=logforward-harness\""
            );
            println!("============\n");
            return;
        }
        if let Err(e) = self.client.delete_namespace().await {
            warn!(error = %e, "Failed to delete test namespace");
        }
    }

    /// Runtime identifier of the primary container, available after a
    /// successful `deploy()`.
    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    fn application_log_path(&self) -> Result<String> {
        let pod = self.pod.as_ref().ok_or(Error::NotDeployed)?;
        let container_id = self.container_id.as_deref().ok_or(Error::NotDeployed)?;
        let pod_name = pod.metadata.name.as_deref().unwrap_or(&self.name);
        Ok(format!(
            "{}/{}_{}_{}-{}.log",
            self.settings.containers_log_root,
            pod_name,
            self.namespace,
            FORWARDER_CONTAINER,
            container_id
        ))
    }
}

/// True once the pod reports the Ready condition.
pub(crate) fn pod_is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// True once at least one backing address populates the endpoint list.
pub(crate) fn endpoints_populated(endpoints: &Endpoints) -> bool {
    endpoints
        .subsets
        .as_ref()
        .map(|subsets| {
            subsets
                .iter()
                .any(|s| s.addresses.as_ref().map(|a| !a.is_empty()).unwrap_or(false))
        })
        .unwrap_or(false)
}

/// Runtime identifier of the named container, with any container-runtime URI
/// prefix (`cri-o://`, `containerd://`, ...) stripped.
pub(crate) fn primary_container_id(pod: &Pod, container: &str) -> Option<String> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find(|cs| cs.name == container)
        .and_then(|cs| cs.container_id.as_ref())
        .map(|id| strip_runtime_prefix(id).to_string())
}

fn strip_runtime_prefix(id: &str) -> &str {
    id.split_once("://").map(|(_, rest)| rest).unwrap_or(id)
}

fn parse_records(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Structured application log lines with the canonical record keys, for
/// record-field reference tests.
pub fn json_application_logs(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            serde_json::json!({
                "timestamp": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                "appname_key": "rec_appname",
                "procid_key": "rec_procid",
                "msgid_key": "rec_msgid",
                "msgcontent": "My life is my message",
            })
            .to_string()
        })
        .collect()
}
