//! IAM token authentication for Postgres on Amazon RDS
//!
//! `fraiseql-iam` replaces the static database password with a short-lived
//! auth token signed by AWS IAM, makes sure the RDS CA bundle is available
//! for `verify-full` TLS, and hands the resulting parameters to
//! `tokio_postgres`.
//!
//! # Flow
//!
//! 1. The connection string (or RDS secret) is resolved into
//!    [`ConnectionParams`].
//! 2. If no password was given, a token is issued for `host`, `port` and
//!    `user`, and `sslmode` is forced to `verify-full`.
//! 3. Unless `sslrootcert` was given, the CA bundle is provisioned at
//!    `<temp dir>/rds-bundle.crt`.
//! 4. The parameters are handed to the driver.
//!
//! A password in the connection string disables all of the above.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> fraiseql_iam::Result<()> {
//! let client = fraiseql_iam::connect(
//!     "host=mydb.abc123.us-east-1.rds.amazonaws.com port=5432 user=app dbname=app",
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod trust;

pub use auth::{authorize, RdsTokenIssuer, TokenIssuer};
pub use client::{
    connect, dsn_from_rds_secret, fetch_rds_secret, ConnectionParams, IamConnector, RdsSecret,
};
pub use error::{Error, Result};
pub use trust::{BundleProvisioner, StaticTrustStore, TrustStoreProvider};
