//! Auth token issuance
//!
//! An RDS auth token is a presigned request valid for a short time. It is
//! sent in place of the password and the server checks it against IAM.

use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_rds::auth_token::{AuthTokenGenerator, Config as AuthTokenConfig};

/// Issues short-lived database credentials
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issue a token for `user` on the endpoint `host:port`
    async fn issue_token(&self, host: &str, port: u16, user: &str) -> Result<String>;
}

/// Token issuer backed by the AWS SDK
///
/// Region and credentials come from the SDK configuration, usually loaded
/// from the standard environment / profile / instance metadata chain.
#[derive(Debug, Clone)]
pub struct RdsTokenIssuer {
    sdk_config: SdkConfig,
}

impl RdsTokenIssuer {
    /// Issuer using an existing SDK configuration
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }

    /// Issuer using the default AWS configuration chain
    pub async fn from_env() -> Self {
        Self::new(aws_config::load_defaults(BehaviorVersion::latest()).await)
    }

    /// SDK configuration in use
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }
}

#[async_trait]
impl TokenIssuer for RdsTokenIssuer {
    async fn issue_token(&self, host: &str, port: u16, user: &str) -> Result<String> {
        let config = AuthTokenConfig::builder()
            .hostname(host)
            .port(u64::from(port))
            .username(user)
            .build()
            .map_err(Error::CredentialService)?;

        let token = AuthTokenGenerator::new(config)
            .auth_token(&self.sdk_config)
            .await
            .map_err(Error::CredentialService)?;

        Ok(token.as_str().to_string())
    }
}
