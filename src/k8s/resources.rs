//! Kubernetes resource builders for the harness
//!
//! Fluent builders over `k8s-openapi` types for the config maps, service and
//! multi-container pod a functional test deploys. Builders only mutate
//! in-memory structures; validation is left to the cluster's create calls.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
    ObjectFieldSelector, Pod, PodSpec, SecurityContext, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Create labels for every resource a test run owns
pub fn framework_labels(test_name: &str) -> BTreeMap<String, String> {
    [
        (
            "app.kubernetes.io/managed-by".to_string(),
            "logforward-harness".to_string(),
        ),
        (
            "logforward.io/testtype".to_string(),
            "functional".to_string(),
        ),
        ("logforward.io/testname".to_string(), test_name.to_string()),
    ]
    .into_iter()
    .collect()
}

/// Builder for a namespaced ConfigMap
#[derive(Debug, Clone)]
pub struct ConfigMapBuilder {
    config_map: ConfigMap,
}

impl ConfigMapBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            config_map: ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.config_map.metadata.labels = Some(labels);
        self
    }

    pub fn add(mut self, key: &str, value: impl Into<String>) -> Self {
        self.config_map
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> ConfigMap {
        self.config_map
    }
}

/// Builder for a ClusterIP Service
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    service: Service,
}

impl ServiceBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            service: Service {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: Some(ServiceSpec {
                    type_: Some("ClusterIP".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    pub fn add_service_port(mut self, port: i32, target_port: i32) -> Self {
        let spec = self.service.spec.get_or_insert_with(ServiceSpec::default);
        spec.ports.get_or_insert_with(Vec::new).push(ServicePort {
            port,
            target_port: Some(IntOrString::Int(target_port)),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        });
        self
    }

    pub fn with_selector(mut self, selector: BTreeMap<String, String>) -> Self {
        let spec = self.service.spec.get_or_insert_with(ServiceSpec::default);
        spec.selector = Some(selector);
        self
    }

    pub fn build(self) -> Service {
        self.service
    }
}

/// Builder for the test pod: one primary container plus output sidecars
#[derive(Debug, Clone)]
pub struct PodBuilder {
    pod: Pod,
}

impl PodBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            pod: Pod {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: Some(PodSpec {
                    restart_policy: Some("Always".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    pub fn namespace(&self) -> &str {
        self.pod.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.pod.metadata.labels = Some(labels);
        self
    }

    /// Mounts `config_map_name` into the pod as volume `volume_name`.
    /// Config map volumes are mounted world-readable and executable so
    /// entrypoint scripts can run in place.
    pub fn add_config_map_volume(mut self, volume_name: &str, config_map_name: &str) -> Self {
        let spec = self.pod_spec();
        spec.volumes.get_or_insert_with(Vec::new).push(Volume {
            name: volume_name.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(config_map_name.to_string()),
                default_mode: Some(0o555),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    /// Adds an already-built volume (used by output adapters).
    pub fn add_volume(mut self, volume: Volume) -> Self {
        self.pod_spec().volumes.get_or_insert_with(Vec::new).push(volume);
        self
    }

    /// Starts a new container; finish it with [`ContainerBuilder::end`].
    pub fn add_container(self, name: &str, image: &str) -> ContainerBuilder {
        ContainerBuilder {
            pod: self,
            container: Container {
                name: name.to_string(),
                image: Some(image.to_string()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                ..Default::default()
            },
        }
    }

    /// Adds an already-built container (used by output adapters).
    pub fn push_container(mut self, container: Container) -> Self {
        self.pod_spec().containers.push(container);
        self
    }

    pub fn build(self) -> Pod {
        self.pod
    }

    fn pod_spec(&mut self) -> &mut PodSpec {
        self.pod.spec.get_or_insert_with(PodSpec::default)
    }
}

/// Builder for one container of the pod under construction
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    pod: PodBuilder,
    container: Container,
}

impl ContainerBuilder {
    pub fn add_env_var(mut self, name: &str, value: &str) -> Self {
        self.container.env.get_or_insert_with(Vec::new).push(EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn add_env_var_from_field_ref(mut self, name: &str, field_path: &str) -> Self {
        self.container.env.get_or_insert_with(Vec::new).push(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: field_path.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn add_volume_mount(
        mut self,
        name: &str,
        mount_path: &str,
        sub_path: &str,
        read_only: bool,
    ) -> Self {
        self.container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .push(VolumeMount {
                name: name.to_string(),
                mount_path: mount_path.to_string(),
                sub_path: (!sub_path.is_empty()).then(|| sub_path.to_string()),
                read_only: Some(read_only),
                ..Default::default()
            });
        self
    }

    pub fn add_container_port(mut self, name: &str, port: i32) -> Self {
        self.container
            .ports
            .get_or_insert_with(Vec::new)
            .push(ContainerPort {
                container_port: port,
                name: Some(name.to_string()),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            });
        self
    }

    pub fn with_cmd_args(mut self, args: Vec<String>) -> Self {
        self.container.args = Some(args);
        self
    }

    pub fn with_privilege(mut self) -> Self {
        self.container.security_context = Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        });
        self
    }

    /// Folds the container into its pod and hands the pod builder back.
    pub fn end(mut self) -> PodBuilder {
        self.pod.pod_spec().containers.push(self.container);
        self.pod
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_labels() {
        let labels = framework_labels("test-forward-42");

        assert_eq!(
            labels.get("logforward.io/testname"),
            Some(&"test-forward-42".to_string())
        );
        assert_eq!(
            labels.get("logforward.io/testtype"),
            Some(&"functional".to_string())
        );
        assert_eq!(
            labels.get("app.kubernetes.io/managed-by"),
            Some(&"logforward-harness".to_string())
        );
    }

    #[test]
    fn test_config_map_builder_accumulates_keys() {
        let cm = ConfigMapBuilder::new("ns", "conf")
            .add("forwarder.conf", "<source></source>")
            .add("run.sh", "#!/bin/bash")
            .build();

        assert_eq!(cm.metadata.name, Some("conf".to_string()));
        assert_eq!(cm.metadata.namespace, Some("ns".to_string()));
        let data = cm.data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.get("run.sh"), Some(&"#!/bin/bash".to_string()));
    }

    #[test]
    fn test_service_builder() {
        let labels = framework_labels("t");
        let service = ServiceBuilder::new("ns", "svc")
            .add_service_port(24231, 24231)
            .with_selector(labels.clone())
            .build();

        let spec = service.spec.unwrap();
        assert_eq!(spec.type_, Some("ClusterIP".to_string()));
        assert_eq!(spec.selector, Some(labels));
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 24231);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(24231)));
    }

    #[test]
    fn test_pod_builder_chains_containers_and_volumes() {
        let pod = PodBuilder::new("ns", "pod")
            .with_labels(framework_labels("t"))
            .add_config_map_volume("config", "pod")
            .add_config_map_volume("certs", "certs-pod")
            .add_container("forwarder", "registry.example/forwarder:latest")
            .add_env_var("LOG_LEVEL", "debug")
            .add_env_var_from_field_ref("POD_IP", "status.podIP")
            .add_volume_mount("config", "/etc/forwarder", "", true)
            .add_volume_mount("entrypoint", "/opt/app-root/src/run.sh", "run.sh", true)
            .end()
            .build();

        let spec = pod.spec.unwrap();
        assert_eq!(spec.containers.len(), 1);
        let c = &spec.containers[0];
        assert_eq!(c.name, "forwarder");
        let mounts = c.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[1].sub_path, Some("run.sh".to_string()));
        assert_eq!(mounts[0].sub_path, None);

        let volumes = spec.volumes.unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(
            volumes[1].config_map.as_ref().unwrap().name,
            Some("certs-pod".to_string())
        );
    }

    #[test]
    fn test_push_container_keeps_primary_first() {
        let sidecar = Container {
            name: "syslog".to_string(),
            ..Default::default()
        };
        let pod = PodBuilder::new("ns", "pod")
            .add_container("forwarder", "img")
            .end()
            .push_container(sidecar)
            .build();

        let containers = pod.spec.unwrap().containers;
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "forwarder");
        assert_eq!(containers[1].name, "syslog");
    }
}
