//! TLS configuration for secure connections to Postgres.
//!
//! The driver negotiates TLS itself; this module decides how the server
//! certificate is checked and whether a client certificate is presented.
//! Checks follow libpq: `allow`, `prefer` and `require` encrypt without
//! verifying (unless a root certificate file exists), `verify-ca` checks
//! the chain only and `verify-full` also checks the hostname.

use crate::client::ConnectionParams;
use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// SSL/TLS connection mode matching PostgreSQL `sslmode` parameter.
///
/// Controls whether and how TLS is negotiated with the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// No TLS (plaintext connection)
    Disable,
    /// Plaintext first, TLS if the server insists
    Allow,
    /// TLS if the server supports it, plaintext otherwise (driver default)
    #[default]
    Prefer,
    /// TLS required
    Require,
    /// TLS required, server certificate must be signed by a trusted CA
    VerifyCa,
    /// TLS required, server certificate must be signed by a trusted CA and hostname must match
    VerifyFull,
}

impl SslMode {
    /// Whether this mode requires certificate verification (CA or full)
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyFull)
    }

    /// The closest mode the driver understands.
    ///
    /// The driver has no `allow` or verify modes: `allow` negotiates like
    /// `prefer` and both verify modes require TLS, with verification done by
    /// the connector this crate builds.
    pub fn driver_mode(&self) -> tokio_postgres::config::SslMode {
        use tokio_postgres::config::SslMode as Driver;

        match self {
            Self::Disable => Driver::Disable,
            Self::Allow | Self::Prefer => Driver::Prefer,
            Self::Require | Self::VerifyCa | Self::VerifyFull => Driver::Require,
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disable => write!(f, "disable"),
            Self::Allow => write!(f, "allow"),
            Self::Prefer => write!(f, "prefer"),
            Self::Require => write!(f, "require"),
            Self::VerifyCa => write!(f, "verify-ca"),
            Self::VerifyFull => write!(f, "verify-full"),
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            _ => Err(Error::Config(format!(
                "invalid sslmode '{}': expected disable, allow, prefer, require, verify-ca, or verify-full",
                s
            ))),
        }
    }
}

/// TLS configuration for secure Postgres connections.
///
/// By default the server certificate chain and hostname are verified against
/// the CA file given by `sslrootcert`, or the system roots when unset.
///
/// # Examples
///
/// ```ignore
/// use fraiseql_iam::connection::TlsConfig;
///
/// // With system root certificates
/// let tls = TlsConfig::builder().build()?;
///
/// // With the RDS bundle and a client certificate
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/tmp/rds-bundle.crt")
///     .client_cert("/path/to/client.crt", "/path/to/client.key")
///     .build()?;
///
/// // Encrypt only, as `sslmode=require` does without a root certificate
/// let tls = TlsConfig::builder()
///     .danger_accept_invalid_certs(true)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA certificate file (None = use system roots)
    ca_cert_path: Option<String>,
    /// Client certificate and key paths for mTLS
    client_cert: Option<(String, String)>,
    /// Whether the hostname must match the certificate
    verify_hostname: bool,
    /// Whether certificate validation is skipped entirely
    danger_accept_invalid_certs: bool,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Build the TLS configuration described by `sslmode`, `sslrootcert`,
    /// `sslcert` and `sslkey`.
    ///
    /// | sslmode | server certificate check |
    /// |---|---|
    /// | `disable` | none, and no files are read |
    /// | `allow`, `prefer`, `require` | chain only if `sslrootcert` names an existing file, none otherwise |
    /// | `verify-ca` | chain |
    /// | `verify-full` | chain and hostname |
    pub fn from_params(params: &ConnectionParams) -> Result<Self> {
        let mode = params.sslmode()?;
        let root_cert = params.get("sslrootcert").filter(|p| !p.is_empty());

        let mut builder = match mode {
            // TLS is never negotiated, so nothing is loaded
            SslMode::Disable => return Self::builder().danger_accept_invalid_certs(true).build(),
            SslMode::Allow | SslMode::Prefer | SslMode::Require => {
                match root_cert.filter(|p| Path::new(p).is_file()) {
                    Some(ca_path) => Self::builder().ca_cert_path(ca_path).verify_hostname(false),
                    None => Self::builder().danger_accept_invalid_certs(true),
                }
            }
            SslMode::VerifyCa | SslMode::VerifyFull => {
                let builder = Self::builder().verify_hostname(mode == SslMode::VerifyFull);
                match root_cert {
                    Some(ca_path) => builder.ca_cert_path(ca_path),
                    None => builder,
                }
            }
        };

        match (params.get("sslcert"), params.get("sslkey")) {
            (Some(cert), Some(key)) => builder = builder.client_cert(cert, key),
            (None, None) => {}
            _ => {
                return Err(Error::Config(
                    "sslcert and sslkey must be provided together".into(),
                ))
            }
        }

        builder.build()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Path of the CA file in use, if any.
    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert_path.as_deref()
    }

    /// Whether a client certificate is presented.
    pub fn has_client_cert(&self) -> bool {
        self.client_cert.is_some()
    }

    /// Whether the server hostname is checked against the certificate.
    pub fn verify_hostname(&self) -> bool {
        self.verify_hostname && !self.danger_accept_invalid_certs
    }

    /// Whether any server certificate is accepted.
    pub fn danger_accept_invalid_certs(&self) -> bool {
        self.danger_accept_invalid_certs
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("client_cert", &self.client_cert.as_ref().map(|(c, _)| c))
            .field("verify_hostname", &self.verify_hostname)
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    ca_cert_path: Option<String>,
    client_cert: Option<(String, String)>,
    verify_hostname: bool,
    danger_accept_invalid_certs: bool,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            ca_cert_path: None,
            client_cert: None,
            verify_hostname: true,
            danger_accept_invalid_certs: false,
        }
    }
}

impl TlsConfigBuilder {
    /// Set the path to a custom CA certificate file (PEM format).
    ///
    /// If not set, system root certificates will be used.
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Present a client certificate (PEM chain and PEM private key).
    pub fn client_cert(mut self, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.client_cert = Some((cert_path.into(), key_path.into()));
        self
    }

    /// Enable or disable hostname verification (default: enabled).
    ///
    /// When disabled the chain is still verified against the roots, as
    /// `sslmode=verify-ca` does.
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    /// Accept any server certificate (default: disabled).
    ///
    /// The connection is encrypted but the server is not authenticated,
    /// which is what `sslmode=require` means without a root certificate.
    /// Handshake signatures are still checked. No roots are loaded.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - CA certificate file cannot be read or holds no certificates
    /// - the client certificate or key cannot be loaded
    pub fn build(self) -> Result<TlsConfig> {
        // Pin the provider so builds that enable several rustls backends
        // do not need a process-wide default installed.
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let algorithms = provider.signature_verification_algorithms;

        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Config(format!("unsupported TLS configuration: {}", e)))?;

        let builder = if self.danger_accept_invalid_certs {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(RelaxedVerifier {
                    roots: None,
                    algorithms,
                }))
        } else {
            let root_store = match &self.ca_cert_path {
                Some(ca_path) => load_custom_ca(ca_path)?,
                None => load_system_roots(),
            };

            if self.verify_hostname {
                builder.with_root_certificates(root_store)
            } else {
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(RelaxedVerifier {
                        roots: Some(Arc::new(root_store)),
                        algorithms,
                    }))
            }
        };

        let client_config = match &self.client_cert {
            Some((cert_path, key_path)) => {
                let certs = load_cert_chain(cert_path)?;
                let key = load_private_key(key_path)?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| Error::Config(format!("invalid client certificate: {}", e)))?
            }
            None => builder.with_no_client_auth(),
        };

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            client_cert: self.client_cert,
            verify_hostname: self.verify_hostname,
            danger_accept_invalid_certs: self.danger_accept_invalid_certs,
            client_config: Arc::new(client_config),
        })
    }
}

/// Server certificate check that never looks at the hostname.
///
/// With `roots` the chain must lead to one of them; without, any certificate
/// is accepted. Handshake signatures are verified either way.
#[derive(Debug)]
struct RelaxedVerifier {
    roots: Option<Arc<RootCertStore>>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for RelaxedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if let Some(roots) = &self.roots {
            let cert = ParsedCertificate::try_from(end_entity)?;
            rustls::client::verify_server_cert_signed_by_trust_anchor(
                &cert,
                roots,
                intermediates,
                now,
                self.algorithms.all,
            )?;
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// System roots, falling back to the bundled Mozilla roots when the
/// platform store is empty or unreadable.
fn load_system_roots() -> RootCertStore {
    let result = rustls_native_certs::load_native_certs();

    let mut store = RootCertStore::empty();
    let (added, _ignored) = store.add_parsable_certificates(result.certs);

    if added == 0 {
        tracing::debug!(
            errors = result.errors.len(),
            "no usable system root certificates, using webpki roots"
        );
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    store
}

/// Load a custom CA certificate bundle from a PEM file.
fn load_custom_ca(ca_path: &str) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read CA certificate file '{}': {}",
            ca_path, e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += 1;
            }
            Ok(Some(_)) => {
                // Skip non-certificate items (private keys, etc.)
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Config(format!(
                    "Failed to parse CA certificate from '{}'",
                    ca_path
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Config(format!(
            "No valid certificates found in '{}'",
            ca_path
        )));
    }

    Ok(root_store)
}

fn load_cert_chain(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let data = fs::read(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read client certificate '{}': {}",
            path, e
        ))
    })?;

    let certs = rustls_pemfile::certs(&mut std::io::Cursor::new(&data))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| {
            Error::Config(format!("Failed to parse client certificate '{}'", path))
        })?;

    if certs.is_empty() {
        return Err(Error::Config(format!(
            "No valid certificates found in '{}'",
            path
        )));
    }

    Ok(certs)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let data = fs::read(path)
        .map_err(|e| Error::Config(format!("Failed to read client key '{}': {}", path, e)))?;

    rustls_pemfile::private_key(&mut std::io::Cursor::new(&data))
        .map_err(|_| Error::Config(format!("Failed to parse client key '{}'", path)))?
        .ok_or_else(|| Error::Config(format!("No private key found in '{}'", path)))
}
