//! Output adapter registry.
//!
//! Each forwarding-output type that can be verified end-to-end registers an
//! adapter here. An adapter is a pure function from an output spec to the
//! sidecar container, config maps and volumes needed to receive that output;
//! the orchestrator creates the config maps and folds the rest into the pod.
//! Output types with no registered adapter are skipped, by policy.

mod syslog;

use std::collections::HashMap;
use std::sync::RwLock;

use k8s_openapi::api::core::v1::{ConfigMap, Container, Volume};
use once_cell::sync::Lazy;

use crate::error::Result;
use crate::models::OutputSpec;

pub use syslog::CAPTURE_FILE;

/// Everything an output sidecar needs, ready for the orchestrator to apply.
#[derive(Debug, Clone)]
pub struct OutputAttachment {
    /// The sidecar container receiving the forwarded output.
    pub container: Container,
    /// Config maps the orchestrator must create before the pod.
    pub config_maps: Vec<ConfigMap>,
    /// Volumes to add to the pod spec.
    pub volumes: Vec<Volume>,
}

/// Context an adapter needs beyond the output spec itself.
#[derive(Debug, Clone, Copy)]
pub struct AdapterContext<'a> {
    pub namespace: &'a str,
}

pub type AdapterFn = fn(&AdapterContext<'_>, &OutputSpec) -> Result<OutputAttachment>;

static REGISTRY: Lazy<RwLock<HashMap<String, AdapterFn>>> = Lazy::new(|| {
    let mut adapters: HashMap<String, AdapterFn> = HashMap::new();
    adapters.insert("syslog".to_string(), syslog::attach as AdapterFn);
    RwLock::new(adapters)
});

/// Register an adapter for `output_type`, replacing any existing one.
/// Call at process start, before deployments begin.
pub fn register(output_type: &str, adapter: AdapterFn) {
    REGISTRY
        .write()
        .expect("adapter registry poisoned")
        .insert(output_type.to_string(), adapter);
}

/// Look up the adapter for `output_type`.
pub fn resolve(output_type: &str) -> Option<AdapterFn> {
    REGISTRY
        .read()
        .expect("adapter registry poisoned")
        .get(output_type)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutputType, SyslogSpec};

    fn syslog_output() -> OutputSpec {
        OutputSpec {
            name: "Syslog".to_string(),
            output_type: OutputType::Syslog,
            url: None,
            syslog: Some(SyslogSpec::default()),
        }
    }

    #[test]
    fn test_syslog_adapter_is_builtin() {
        assert!(resolve("syslog").is_some());
    }

    #[test]
    fn test_unknown_type_resolves_to_none() {
        assert!(resolve("kafka").is_none());
    }

    #[test]
    fn test_registered_adapter_is_resolvable() {
        fn noop(_: &AdapterContext<'_>, _: &OutputSpec) -> Result<OutputAttachment> {
            Ok(OutputAttachment {
                container: Default::default(),
                config_maps: vec![],
                volumes: vec![],
            })
        }
        register("noop-test", noop);
        assert!(resolve("noop-test").is_some());
    }

    #[test]
    fn test_syslog_attachment_shape() {
        let ctx = AdapterContext { namespace: "ns-1" };
        let attachment = resolve("syslog").unwrap()(&ctx, &syslog_output()).unwrap();

        // container is named after the lowercased output name
        assert_eq!(attachment.container.name, "syslog");
        assert_eq!(attachment.config_maps.len(), 1);
        assert_eq!(
            attachment.config_maps[0].metadata.namespace,
            Some("ns-1".to_string())
        );
        assert_eq!(attachment.volumes.len(), 1);
    }
}
