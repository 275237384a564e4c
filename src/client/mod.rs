//! Connection resolution and the IAM connector
//!
//! This module handles:
//! * Connection string parsing (key/value and URI forms)
//! * RDS secrets from AWS Secrets Manager
//! * Handing authorized parameters to the Postgres driver

mod connection_string;
mod iam_connector;
mod secret;

pub use connection_string::ConnectionParams;
pub use iam_connector::{connect, establish, IamConnector, IamConnectorBuilder};
pub use secret::{dsn_from_rds_secret, fetch_rds_secret, RdsSecret};
