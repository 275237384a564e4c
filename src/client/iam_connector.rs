//! IamConnector implementation

use super::connection_string::ConnectionParams;
use super::secret::RdsSecret;
use crate::auth::{self, RdsTokenIssuer, TokenIssuer};
use crate::connection::{MakeRustlsConnect, TlsConfig};
use crate::trust::{default_bundle_path, BundleProvisioner, TrustStoreProvider};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_postgres::Client;

/// Connects to Postgres with IAM auth tokens instead of static passwords
///
/// Each connection attempt resolves its parameters, issues a fresh token
/// when no password was given, makes sure the CA bundle is on disk and then
/// hands the result to `tokio_postgres`.
#[derive(Clone)]
pub struct IamConnector {
    issuer: Arc<dyn TokenIssuer>,
    trust_store: Arc<dyn TrustStoreProvider>,
    bundle_path: PathBuf,
}

impl IamConnector {
    /// Create a builder around a token issuer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> fraiseql_iam::Result<()> {
    /// use fraiseql_iam::{IamConnector, RdsTokenIssuer};
    ///
    /// let connector = IamConnector::builder(RdsTokenIssuer::from_env().await)
    ///     .bundle_path("/var/lib/app/rds-bundle.crt")
    ///     .build();
    /// let client = connector
    ///     .connect("host=mydb.abc123.us-east-1.rds.amazonaws.com port=5432 user=app dbname=app")
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(issuer: impl TokenIssuer + 'static) -> IamConnectorBuilder {
        IamConnectorBuilder {
            issuer: Arc::new(issuer),
            trust_store: None,
            bundle_path: None,
        }
    }

    /// Connector using the default AWS configuration chain, the combined RDS
    /// bundle and the shared bundle path in the temp directory
    pub async fn from_env() -> Self {
        Self::builder(RdsTokenIssuer::from_env().await).build()
    }

    /// Where the CA bundle is provisioned when `sslrootcert` is not given
    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    /// Install a token into already resolved parameters
    pub async fn authorize(&self, params: ConnectionParams) -> Result<ConnectionParams> {
        auth::authorize(
            params,
            self.issuer.as_ref(),
            self.trust_store.as_ref(),
            &self.bundle_path,
        )
        .await
    }

    /// Resolve a connection string into the parameters handed to the driver
    pub async fn resolve(&self, dsn: &str) -> Result<ConnectionParams> {
        self.authorize(ConnectionParams::parse(dsn)?).await
    }

    /// Resolve an RDS secret into the parameters handed to the driver
    pub async fn resolve_secret(&self, secret: &RdsSecret) -> Result<ConnectionParams> {
        self.authorize(secret.to_params()).await
    }

    /// Connect using a connection string
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> fraiseql_iam::Result<()> {
    /// use fraiseql_iam::IamConnector;
    ///
    /// let connector = IamConnector::from_env().await;
    /// let client = connector
    ///     .connect("postgres://app@mydb.abc123.us-east-1.rds.amazonaws.com:5432/app")
    ///     .await?;
    /// let rows = client.query("SELECT 1", &[]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(&self, dsn: &str) -> Result<Client> {
        let params = self.resolve(dsn).await?;
        establish(&params).await
    }

    /// Connect using an RDS secret
    pub async fn connect_secret(&self, secret: &RdsSecret) -> Result<Client> {
        let params = self.resolve_secret(secret).await?;
        establish(&params).await
    }
}

impl std::fmt::Debug for IamConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamConnector")
            .field("bundle_path", &self.bundle_path)
            .finish_non_exhaustive()
    }
}

/// Builder for `IamConnector`
pub struct IamConnectorBuilder {
    issuer: Arc<dyn TokenIssuer>,
    trust_store: Option<Arc<dyn TrustStoreProvider>>,
    bundle_path: Option<PathBuf>,
}

impl IamConnectorBuilder {
    /// Set the trust store provisioning the CA bundle
    ///
    /// Default: `BundleProvisioner` downloading the combined RDS bundle
    pub fn trust_store(mut self, trust_store: impl TrustStoreProvider + 'static) -> Self {
        self.trust_store = Some(Arc::new(trust_store));
        self
    }

    /// Set the CA bundle location
    ///
    /// Default: `<temp dir>/rds-bundle.crt`
    pub fn bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundle_path = Some(path.into());
        self
    }

    /// Build the connector
    pub fn build(self) -> IamConnector {
        IamConnector {
            issuer: self.issuer,
            trust_store: self
                .trust_store
                .unwrap_or_else(|| Arc::new(BundleProvisioner::new())),
            bundle_path: self.bundle_path.unwrap_or_else(default_bundle_path),
        }
    }
}

/// Hand resolved parameters to the driver.
///
/// TLS keys configure the rustls connector (see `TlsConfig::from_params`
/// for how each sslmode checks the server); everything else is rendered as
/// a key/value string and parsed by `tokio_postgres` itself. The connection
/// task is spawned on the current runtime.
pub async fn establish(params: &ConnectionParams) -> Result<Client> {
    let sslmode = params.sslmode()?;
    let tls = MakeRustlsConnect::new(&TlsConfig::from_params(params)?);

    let mut config: tokio_postgres::Config = params.to_driver_dsn().parse()?;
    config.ssl_mode(sslmode.driver_mode());

    let (client, connection) = config.connect(tls).await?;
    tracing::debug!(sslmode = %sslmode, "connection established");

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("connection error: {}", e);
        }
    });

    Ok(client)
}

/// Connect using the default AWS configuration chain
pub async fn connect(dsn: &str) -> Result<Client> {
    IamConnector::from_env().await.connect(dsn).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::StaticTrustStore;
    use crate::Error;
    use async_trait::async_trait;

    struct FixedIssuer;

    #[async_trait]
    impl TokenIssuer for FixedIssuer {
        async fn issue_token(&self, _host: &str, _port: u16, _user: &str) -> Result<String> {
            Ok("T123".to_string())
        }
    }

    fn connector() -> IamConnector {
        IamConnector::builder(FixedIssuer)
            .trust_store(StaticTrustStore)
            .bundle_path("/tmp/test-rds-bundle.crt")
            .build()
    }

    #[test]
    fn test_builder_defaults_bundle_path() {
        let connector = IamConnector::builder(FixedIssuer).build();
        assert_eq!(connector.bundle_path(), default_bundle_path());
    }

    #[tokio::test]
    async fn test_resolve_connection_string() {
        let params = connector()
            .resolve("postgres://app@db.example:5432/app")
            .await
            .unwrap();

        assert_eq!(
            params.to_dsn(),
            "host=db.example port=5432 dbname=app user=app password=T123 \
             sslmode=verify-full sslrootcert=/tmp/test-rds-bundle.crt"
        );
    }

    #[tokio::test]
    async fn test_resolve_secret() {
        let secret =
            RdsSecret::from_json(r#"{"host":"h","port":5432,"dbname":"d","username":"u"}"#)
                .unwrap();

        let params = connector().resolve_secret(&secret).await.unwrap();

        assert_eq!(params.get("user"), Some("u"));
        assert_eq!(params.get("password"), Some("T123"));
        assert_eq!(params.get("sslmode"), Some("verify-full"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_malformed_dsn() {
        let result = connector().resolve("host=h port").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_incomplete_target_fails_before_driver() {
        let result = connector().connect("host=127.0.0.1 dbname=app").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_with_password_reaches_driver() {
        let result = connector()
            .connect("host=127.0.0.1 port=1 user=app password=secret sslmode=disable")
            .await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_establish_missing_root_cert() {
        let params = ConnectionParams::parse(
            "host=127.0.0.1 port=1 user=app password=T123 sslmode=verify-full \
             sslrootcert=/nonexistent/rds-bundle.crt",
        )
        .unwrap();

        let result = establish(&params).await;

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_establish_disable_ignores_stale_root_cert() {
        let params = ConnectionParams::parse(
            "host=127.0.0.1 port=1 user=app password=secret sslmode=disable \
             sslrootcert=/nonexistent/rds-bundle.crt",
        )
        .unwrap();

        let result = establish(&params).await;

        // Refused by the socket, not rejected while building TLS
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_establish_rejects_unknown_driver_option() {
        let params = ConnectionParams::parse("host=127.0.0.1 user=app bogus_option=1").unwrap();
        let result = establish(&params).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
