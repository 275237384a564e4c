//! Error types

use thiserror::Error;

/// Boxed error returned by the AWS SDK and other external collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed connection configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The credential service (token signing, secret retrieval) failed
    #[error("credential service error: {0}")]
    CredentialService(#[source] BoxError),

    /// Downloaded CA bundle does not match its published digest
    #[error("bundle integrity check failed: expected {expected}, got {actual}")]
    Integrity {
        /// Expected hex digest
        expected: String,
        /// Digest of the downloaded bytes
        actual: String,
    },

    /// CA bundle could not be downloaded
    #[error("bundle download failed: {0}")]
    BundleFetch(String),

    /// Filesystem error while provisioning the bundle
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised by the Postgres driver while connecting
    #[error(transparent)]
    Connection(#[from] tokio_postgres::Error),
}

impl Error {
    /// Stable label for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::CredentialService(_) => "credential_service",
            Error::Integrity { .. } => "integrity",
            Error::BundleFetch(_) => "bundle_fetch",
            Error::Io(_) => "io",
            Error::Connection(_) => "connection",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("host missing".into());
        assert_eq!(err.to_string(), "configuration error: host missing");

        let err = Error::Integrity {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(
            err.to_string(),
            "bundle integrity check failed: expected aa, got bb"
        );
    }

    #[test]
    fn test_credential_service_keeps_source() {
        let source: BoxError = "access denied".into();
        let err = Error::CredentialService(source);
        assert_eq!(err.to_string(), "credential service error: access denied");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_category() {
        assert_eq!(Error::Config(String::new()).category(), "config");
        assert_eq!(Error::BundleFetch(String::new()).category(), "bundle_fetch");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).category(), "io");
    }
}
