//! Tests for the forwarding spec model
//!
//! These tests verify the forwarding spec's serialized shape, since the YAML form is the
//! contract with the external configuration generator.

use logforward_harness::models::{
    ForwardingSpec, OutputSpec, OutputType, PipelineBuilder, SyslogSpec, INPUT_APPLICATION,
};
use serde_json::json;

#[test]
fn test_syslog_output_serialization() {
    let output = OutputSpec {
        name: "syslog".to_string(),
        output_type: OutputType::Syslog,
        url: None,
        syslog: Some(SyslogSpec {
            facility: "user".to_string(),
            severity: "debug".to_string(),
            app_name: "myapp".to_string(),
            proc_id: "myproc".to_string(),
            msg_id: "mymsg".to_string(),
            rfc: "RFC5424".to_string(),
        }),
    };

    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(
        value,
        json!({
            "name": "syslog",
            "type": "syslog",
            "syslog": {
                "facility": "user",
                "severity": "debug",
                "appName": "myapp",
                "procId": "myproc",
                "msgId": "mymsg",
                "rfc": "RFC5424"
            }
        })
    );
}

#[test]
fn test_spec_round_trips_through_yaml() {
    let mut spec = ForwardingSpec::default();
    PipelineBuilder::new(&mut spec)
        .from_input(INPUT_APPLICATION)
        .to_syslog_output_with(|s| {
            s.app_name = "$.message.appname_key".to_string();
            s.proc_id = "$.message.procid_key".to_string();
            s.msg_id = "$.message.msgid_key".to_string();
        });

    let yaml = serde_yaml::to_string(&spec).unwrap();
    let parsed: ForwardingSpec = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(parsed.inputs.len(), 1);
    assert_eq!(parsed.inputs[0].name, INPUT_APPLICATION);
    assert_eq!(parsed.outputs.len(), 1);
    assert_eq!(parsed.outputs[0].output_type, OutputType::Syslog);
    let syslog = parsed.outputs[0].syslog.as_ref().unwrap();
    assert_eq!(syslog.app_name, "$.message.appname_key");

    assert_eq!(parsed.pipelines.len(), 1);
    assert_eq!(parsed.pipelines[0].input_refs, vec![INPUT_APPLICATION]);
    assert_eq!(parsed.pipelines[0].output_refs, vec!["syslog"]);
}

#[test]
fn test_pipeline_shape() {
    let pipeline = json!({
        "name": "application-to-syslog",
        "inputRefs": ["application"],
        "outputRefs": ["syslog"]
    });

    let parsed: logforward_harness::models::PipelineSpec =
        serde_json::from_value(pipeline).unwrap();
    assert_eq!(parsed.name, "application-to-syslog");
    assert_eq!(parsed.input_refs, vec!["application"]);
    assert_eq!(parsed.output_refs, vec!["syslog"]);
}

#[test]
fn test_tag_bound_app_name_is_representable() {
    let mut spec = ForwardingSpec::default();
    PipelineBuilder::new(&mut spec)
        .from_input(INPUT_APPLICATION)
        .to_syslog_output_with(|s| s.app_name = "tag".to_string());

    let yaml = serde_yaml::to_string(&spec).unwrap();
    assert!(yaml.contains("appName: tag"));
}
