//! Declarative forwarding spec: which log inputs feed which outputs.
//!
//! The forwarding spec is owned by the test author, serialized to YAML and handed to the
//! external configuration generator at deploy time. It must not change once
//! deployment starts.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Name of the built-in input that selects application container logs.
pub const INPUT_APPLICATION: &str = "application";

/// Declarative description of the pipeline under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardingSpec {
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub pipelines: Vec<PipelineSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(rename = "inputRefs")]
    pub input_refs: Vec<String>,
    #[serde(rename = "outputRefs")]
    pub output_refs: Vec<String>,
}

/// A single forwarding destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub output_type: OutputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog: Option<SyslogSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputType {
    Syslog,
    FluentdForward,
}

/// Syslog-specific settings.
///
/// `app_name`, `proc_id` and `msg_id` accept a literal value, a record-field
/// reference (`$.message.appname_key`) or the literal `tag`; resolution
/// happens in the pipeline engine, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyslogSpec {
    pub facility: String,
    pub severity: String,
    pub app_name: String,
    pub proc_id: String,
    pub msg_id: String,
    pub rfc: String,
}

impl Default for SyslogSpec {
    fn default() -> Self {
        Self {
            facility: "user".to_string(),
            severity: "debug".to_string(),
            app_name: "myapp".to_string(),
            proc_id: "myproc".to_string(),
            msg_id: "mymsg".to_string(),
            rfc: "RFC5424".to_string(),
        }
    }
}

/// Fluent helper for wiring a spec in tests:
///
/// ```
/// use logforward_harness::models::{ForwardingSpec, PipelineBuilder, INPUT_APPLICATION};
///
/// let mut spec = ForwardingSpec::default();
/// PipelineBuilder::new(&mut spec)
///     .from_input(INPUT_APPLICATION)
///     .to_syslog_output_with(|s| s.app_name = "myapp".to_string());
/// assert_eq!(spec.outputs.len(), 1);
/// ```
pub struct PipelineBuilder<'a> {
    spec: &'a mut ForwardingSpec,
}

pub struct PipelineFrom<'a> {
    spec: &'a mut ForwardingSpec,
    input: String,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(spec: &'a mut ForwardingSpec) -> Self {
        Self { spec }
    }

    pub fn from_input(self, input: &str) -> PipelineFrom<'a> {
        PipelineFrom {
            spec: self.spec,
            input: input.to_string(),
        }
    }
}

impl PipelineFrom<'_> {
    /// Adds a syslog output with default settings and a pipeline connecting
    /// the selected input to it.
    pub fn to_syslog_output(self) -> OutputSpec {
        self.to_syslog_output_with(|_| {})
    }

    /// Same as [`Self::to_syslog_output`], applying `visit` to the syslog
    /// settings before the output is recorded.
    pub fn to_syslog_output_with<V>(self, visit: V) -> OutputSpec
    where
        V: FnOnce(&mut SyslogSpec),
    {
        let mut syslog = SyslogSpec::default();
        visit(&mut syslog);

        let output = OutputSpec {
            name: OutputType::Syslog.to_string(),
            output_type: OutputType::Syslog,
            url: None,
            syslog: Some(syslog),
        };

        self.spec.inputs.push(InputSpec {
            name: self.input.clone(),
        });
        self.spec.outputs.push(output.clone());
        self.spec.pipelines.push(PipelineSpec {
            name: format!("{}-to-{}", self.input, output.name),
            input_refs: vec![self.input],
            output_refs: vec![output.name.clone()],
        });

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_type_round_trip() {
        assert_eq!(OutputType::Syslog.to_string(), "syslog");
        assert_eq!("syslog".parse::<OutputType>().unwrap(), OutputType::Syslog);
        assert_eq!(
            "fluentdforward".parse::<OutputType>().unwrap(),
            OutputType::FluentdForward
        );
        assert!("nonesuch".parse::<OutputType>().is_err());
    }

    #[test]
    fn test_builder_wires_pipeline() {
        let mut spec = ForwardingSpec::default();
        PipelineBuilder::new(&mut spec)
            .from_input(INPUT_APPLICATION)
            .to_syslog_output_with(|s| {
                s.app_name = "$.message.appname_key".to_string();
            });

        assert_eq!(spec.inputs.len(), 1);
        assert_eq!(spec.outputs.len(), 1);
        assert_eq!(spec.pipelines.len(), 1);
        assert_eq!(spec.pipelines[0].input_refs, vec![INPUT_APPLICATION]);
        assert_eq!(spec.pipelines[0].output_refs, vec!["syslog"]);

        let syslog = spec.outputs[0].syslog.as_ref().unwrap();
        assert_eq!(syslog.app_name, "$.message.appname_key");
        assert_eq!(syslog.facility, "user");
    }

    #[test]
    fn test_spec_serializes_to_yaml() {
        let mut spec = ForwardingSpec::default();
        PipelineBuilder::new(&mut spec)
            .from_input(INPUT_APPLICATION)
            .to_syslog_output();

        let yaml = serde_yaml::to_string(&spec).unwrap();
        assert!(yaml.contains("type: syslog"));
        assert!(yaml.contains("appName: myapp"));
        assert!(yaml.contains("procId: myproc"));
        assert!(yaml.contains("msgId: mymsg"));
    }
}
