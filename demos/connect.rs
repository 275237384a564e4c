//! Connect to an RDS Postgres instance with an IAM auth token
//!
//! Run with:
//! ```bash
//! export RDS_DSN="host=mydb.abc123.us-east-1.rds.amazonaws.com port=5432 user=app dbname=app"
//! RUST_LOG=fraiseql_iam=debug cargo run --example connect
//! ```
//!
//! Alternatively set `RDS_SECRET_ID` to read the target from AWS Secrets Manager.

use fraiseql_iam::{fetch_rds_secret, IamConnector};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let connector = IamConnector::from_env().await;

    let client = if let Ok(secret_id) = env::var("RDS_SECRET_ID") {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let secrets = aws_sdk_secretsmanager::Client::new(&sdk_config);
        let secret = fetch_rds_secret(&secrets, &secret_id).await?;
        connector.connect_secret(&secret).await?
    } else {
        let dsn = env::var("RDS_DSN").map_err(|_| "set RDS_DSN or RDS_SECRET_ID")?;
        connector.connect(&dsn).await?
    };

    let row = client.query_one("SELECT current_user, version()", &[]).await?;
    let user: String = row.get(0);
    let version: String = row.get(1);
    println!("connected as {} to {}", user, version);

    Ok(())
}
