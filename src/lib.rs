//! Functional test harness for a log-forwarding pipeline on Kubernetes.
//!
//! The harness deploys a stand-alone forwarder pod — configured from a
//! declarative [`models::ForwardingSpec`] — together with one verification
//! sidecar per output, into a namespace created just for the test. It then
//! walks a three-stage readiness protocol (pod Ready, service endpoints
//! populated, startup marker observed in the engine's logs), injects
//! synthetic log lines into the file the pipeline tails, and reads back the
//! records each output sidecar captured.
//!
//! ```no_run
//! use logforward_harness::{
//!     config::Settings,
//!     framework::TestFramework,
//!     generate::{ConfigGenerator, ScriptCertificateGenerator},
//!     models::{PipelineBuilder, INPUT_APPLICATION},
//! };
//! # async fn example(config_generator: Box<dyn ConfigGenerator + Send + Sync>) -> logforward_harness::error::Result<()> {
//! let mut framework = TestFramework::new(
//!     Settings::load()?,
//!     config_generator,
//!     Box::new(ScriptCertificateGenerator),
//! )
//! .await?;
//! PipelineBuilder::new(&mut framework.spec)
//!     .from_input(INPUT_APPLICATION)
//!     .to_syslog_output();
//! framework.deploy().await?;
//! framework.write_application_logs(10).await?;
//! let records = framework.read_from("syslog").await?;
//! assert_eq!(records.len(), 10);
//! framework.cleanup(false).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod framework;
pub mod generate;
pub mod k8s;
pub mod models;
pub mod outputs;
pub mod wait;

pub use config::Settings;
pub use error::{Error, Result};
pub use framework::{json_application_logs, TestFramework, FORWARDER_CONTAINER};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for test binaries. Verbosity comes from `RUST_LOG`,
/// defaulting to `info`. Safe to call from several tests in one process.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
