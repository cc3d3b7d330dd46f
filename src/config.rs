use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Harness settings, loaded from the environment with sane defaults.
///
/// Every stage deadline and poll interval lives here so tests can shrink
/// them instead of waiting on production-length timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Image for the primary forwarder container.
    #[serde(default = "default_forwarder_image")]
    pub forwarder_image: String,

    /// Directory holding the certificate generation script.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Directory the certificate generator writes TLS material into.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Path of the entrypoint script mounted into the forwarder container.
    #[serde(default = "default_entrypoint_path")]
    pub entrypoint_path: PathBuf,

    /// Key/cert file names the certificate generator produces, relative to
    /// `working_dir`.
    #[serde(default = "default_tls_key_file")]
    pub tls_key_file: String,

    #[serde(default = "default_tls_cert_file")]
    pub tls_cert_file: String,

    /// Root directory the pipeline's file source is configured to tail.
    #[serde(default = "default_containers_log_root")]
    pub containers_log_root: String,

    /// Substring in the forwarder's log output that signals startup is done.
    /// Engine-specific, so injected here rather than hard-coded.
    #[serde(default = "default_startup_marker")]
    pub startup_marker: String,

    #[serde(default = "default_pod_ready_interval_secs")]
    pub pod_ready_interval_secs: u64,

    #[serde(default = "default_pod_ready_secs")]
    pub pod_ready_secs: u64,

    #[serde(default = "default_endpoint_interval_secs")]
    pub endpoint_interval_secs: u64,

    #[serde(default = "default_endpoint_deadline_secs")]
    pub endpoint_deadline_secs: u64,

    #[serde(default = "default_startup_interval_secs")]
    pub startup_interval_secs: u64,

    #[serde(default = "default_startup_deadline_secs")]
    pub startup_deadline_secs: u64,

    #[serde(default = "default_read_interval_millis")]
    pub read_interval_millis: u64,

    #[serde(default = "default_read_deadline_secs")]
    pub read_deadline_secs: u64,

    /// Keep the test namespace around when the test failed.
    #[serde(default = "default_retain_on_failure")]
    pub retain_on_failure: bool,
}

fn default_forwarder_image() -> String {
    "quay.io/openshift/origin-logging-fluentd:latest".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("/tmp/logforward-harness")
}

fn default_entrypoint_path() -> PathBuf {
    PathBuf::from("scripts/forwarder/run.sh")
}

fn default_tls_key_file() -> String {
    "forwarder.key".to_string()
}

fn default_tls_cert_file() -> String {
    "forwarder.crt".to_string()
}

fn default_containers_log_root() -> String {
    "/var/log/containers".to_string()
}

fn default_startup_marker() -> String {
    "flush_thread actually running".to_string()
}

fn default_pod_ready_interval_secs() -> u64 {
    2
}

fn default_pod_ready_secs() -> u64 {
    120
}

fn default_endpoint_interval_secs() -> u64 {
    2
}

fn default_endpoint_deadline_secs() -> u64 {
    10
}

fn default_startup_interval_secs() -> u64 {
    2
}

fn default_startup_deadline_secs() -> u64 {
    30
}

fn default_read_interval_millis() -> u64 {
    1
}

fn default_read_deadline_secs() -> u64 {
    120
}

fn default_retain_on_failure() -> bool {
    true
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("LOGFORWARD"))
            .build()
            .ok()
            .and_then(|c| c.try_deserialize().ok())
            .unwrap_or_else(Settings::default);

        Ok(settings)
    }

    pub fn pod_ready_interval(&self) -> Duration {
        Duration::from_secs(self.pod_ready_interval_secs)
    }

    pub fn pod_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.pod_ready_secs)
    }

    pub fn endpoint_interval(&self) -> Duration {
        Duration::from_secs(self.endpoint_interval_secs)
    }

    pub fn endpoint_deadline(&self) -> Duration {
        Duration::from_secs(self.endpoint_deadline_secs)
    }

    pub fn startup_interval(&self) -> Duration {
        Duration::from_secs(self.startup_interval_secs)
    }

    pub fn startup_deadline(&self) -> Duration {
        Duration::from_secs(self.startup_deadline_secs)
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_millis)
    }

    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            forwarder_image: default_forwarder_image(),
            scripts_dir: default_scripts_dir(),
            working_dir: default_working_dir(),
            entrypoint_path: default_entrypoint_path(),
            tls_key_file: default_tls_key_file(),
            tls_cert_file: default_tls_cert_file(),
            containers_log_root: default_containers_log_root(),
            startup_marker: default_startup_marker(),
            pod_ready_interval_secs: default_pod_ready_interval_secs(),
            pod_ready_secs: default_pod_ready_secs(),
            endpoint_interval_secs: default_endpoint_interval_secs(),
            endpoint_deadline_secs: default_endpoint_deadline_secs(),
            startup_interval_secs: default_startup_interval_secs(),
            startup_deadline_secs: default_startup_deadline_secs(),
            read_interval_millis: default_read_interval_millis(),
            read_deadline_secs: default_read_deadline_secs(),
            retain_on_failure: default_retain_on_failure(),
        }
    }
}
