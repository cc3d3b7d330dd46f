//! Syslog output adapter: an rsyslog sidecar that accepts the forwarded
//! stream over TCP and appends every received message to the capture file.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, SecurityContext, Volume, VolumeMount,
};

use super::{AdapterContext, OutputAttachment};
use crate::error::Result;
use crate::k8s::ConfigMapBuilder;
use crate::models::OutputSpec;

pub const IMAGE_REMOTE_SYSLOG: &str = "quay.io/openshift/origin-logging-rsyslog:latest";

/// Fixed path inside the sidecar where received data accumulates.
pub const CAPTURE_FILE: &str = "/tmp/app-logs";

const SYSLOG_TCP_PORT: u16 = 24224;

#[derive(Debug, Clone, Copy)]
pub enum SyslogInput {
    Tcp,
}

#[derive(Debug, Clone, Copy)]
pub enum SyslogFormat {
    Rfc5424,
}

/// Build the sidecar, its config map and the volume wiring for one syslog
/// output. The config map is named after the lowercased output name so
/// several syslog outputs could coexist in one pod.
pub(super) fn attach(ctx: &AdapterContext<'_>, output: &OutputSpec) -> Result<OutputAttachment> {
    let name = output.name.to_lowercase();
    // unsecured rsyslog conf; TLS verification is the pipeline's concern
    let conf = rsyslog_conf(SyslogInput::Tcp, SyslogFormat::Rfc5424);

    let config_map = ConfigMapBuilder::new(ctx.namespace, &name)
        .add("rsyslog.conf", conf)
        .build();

    let container = Container {
        name: name.clone(),
        image: Some(IMAGE_REMOTE_SYSLOG.to_string()),
        args: Some(vec![
            "rsyslogd".to_string(),
            "-n".to_string(),
            "-f".to_string(),
            "/rsyslog/etc/rsyslog.conf".to_string(),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: name.clone(),
            mount_path: "/rsyslog/etc".to_string(),
            read_only: Some(false),
            ..Default::default()
        }]),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let volume = Volume {
        name: name.clone(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(name),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(OutputAttachment {
        container,
        config_maps: vec![config_map],
        volumes: vec![volume],
    })
}

/// Render the rsyslog configuration for the requested input and format.
fn rsyslog_conf(input: SyslogInput, format: SyslogFormat) -> String {
    let input_block = match input {
        SyslogInput::Tcp => format!(
            "$ModLoad imtcp\n$InputTCPServerRun {}\n",
            SYSLOG_TCP_PORT
        ),
    };
    let template_block = match format {
        SyslogFormat::Rfc5424 => "$template capture,\"%rawmsg%\\n\"\n",
    };
    format!(
        "{input_block}{template_block}*.* {CAPTURE_FILE};capture\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsyslog_conf_listens_on_tcp_and_captures_raw_messages() {
        let conf = rsyslog_conf(SyslogInput::Tcp, SyslogFormat::Rfc5424);
        assert!(conf.contains("imtcp"));
        assert!(conf.contains("$InputTCPServerRun 24224"));
        assert!(conf.contains(CAPTURE_FILE));
        assert!(conf.contains("%rawmsg%"));
    }
}
