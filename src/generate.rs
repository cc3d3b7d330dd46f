//! External generator collaborators.
//!
//! Pipeline configuration and TLS material are produced outside this crate;
//! the harness consumes them through these two narrow traits so tests can
//! substitute mocks.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Produces the pipeline's runtime configuration from the YAML-serialized
/// forwarding spec.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigGenerator {
    /// `debug_output` asks the generator for a config that also copies
    /// records to stdout.
    fn generate(&self, spec_yaml: &str, debug_output: bool) -> Result<String>;
}

/// Produces TLS material on disk for the pipeline's metrics endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait CertificateGenerator {
    fn generate(
        &self,
        namespace: &str,
        scripts_dir: &Path,
        service_name: &str,
        working_dir: &Path,
    ) -> Result<()>;
}

/// Certificate generator that shells out to the cluster-tooling script.
#[derive(Debug, Clone, Default)]
pub struct ScriptCertificateGenerator;

impl CertificateGenerator for ScriptCertificateGenerator {
    fn generate(
        &self,
        namespace: &str,
        scripts_dir: &Path,
        service_name: &str,
        working_dir: &Path,
    ) -> Result<()> {
        let script = scripts_dir.join("cert_generation.sh");
        info!(script = %script.display(), namespace, service_name, "Generating certificates");

        let output = Command::new("bash")
            .arg(&script)
            .arg(working_dir)
            .arg(namespace)
            .arg(service_name)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::CertificateGeneration(format!("{}: {}", script.display(), e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            warn!("cert generation stderr: {}", stderr);
        }

        if !output.status.success() {
            return Err(Error::CertificateGeneration(stderr.trim().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_config_generator_substitutes() {
        let mut generator = MockConfigGenerator::new();
        generator
            .expect_generate()
            .withf(|yaml, debug| yaml.contains("syslog") && !debug)
            .returning(|_, _| Ok("<system></system>".to_string()));

        let boxed: Box<dyn ConfigGenerator> = Box::new(generator);
        let conf = boxed.generate("outputs:\n- type: syslog\n", false).unwrap();
        assert_eq!(conf, "<system></system>");
    }

    #[test]
    fn test_script_generator_surfaces_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let gen = ScriptCertificateGenerator;
        let err = gen
            .generate("test-ns", dir.path(), "svc", dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::CertificateGeneration(_)));
    }

    #[test]
    fn test_script_generator_runs_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cert_generation.sh"),
            "#!/bin/bash\necho key > \"$1/forwarder.key\"\n",
        )
        .unwrap();

        let gen = ScriptCertificateGenerator;
        gen.generate("test-ns", dir.path(), "svc", dir.path())
            .unwrap();
        assert!(dir.path().join("forwarder.key").exists());
    }
}
