//! Error types for the harness.

use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the harness.
///
/// The three readiness stages fail with distinct variants so a caller can
/// tell which stage timed out without parsing message text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cluster rejected a resource operation.
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// Pod never reported the Ready condition within the stage deadline.
    #[error("pod {pod} did not become ready within {timeout:?}")]
    PodNotReady { pod: String, timeout: Duration },

    /// The service's endpoint list stayed empty for the whole stage deadline.
    #[error("service could not be started")]
    ServiceNotStarted,

    /// The startup marker never appeared in the primary container's logs.
    #[error("forwarder did not start in the container")]
    ForwarderNotStarted,

    /// Pipeline configuration could not be generated from the forwarding spec.
    #[error("config generation failed: {0}")]
    ConfigGeneration(String),

    /// TLS material could not be generated.
    #[error("certificate generation failed: {0}")]
    CertificateGeneration(String),

    /// An operation that needs a running deployment was called before
    /// `deploy()` completed.
    #[error("deploy() has not completed")]
    NotDeployed,

    /// A command run inside a container failed or the container was unreachable.
    #[error("exec in container {container} failed: {message}")]
    Exec { container: String, message: String },

    /// The output capture file never became readable within the deadline.
    #[error("no output captured from {output} within {timeout:?}")]
    ReadTimeout { output: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_are_distinguishable() {
        let a = Error::PodNotReady {
            pod: "p".into(),
            timeout: Duration::from_secs(120),
        };
        let b = Error::ServiceNotStarted;
        let c = Error::ForwarderNotStarted;

        assert!(matches!(a, Error::PodNotReady { .. }));
        assert!(matches!(b, Error::ServiceNotStarted));
        assert!(matches!(c, Error::ForwarderNotStarted));
    }

    #[test]
    fn stage_errors_carry_descriptive_messages() {
        assert_eq!(
            Error::ServiceNotStarted.to_string(),
            "service could not be started"
        );
        assert_eq!(
            Error::ForwarderNotStarted.to_string(),
            "forwarder did not start in the container"
        );
        let e = Error::PodNotReady {
            pod: "test-forward-abc".into(),
            timeout: Duration::from_secs(120),
        };
        assert!(e.to_string().contains("test-forward-abc"));
    }
}
