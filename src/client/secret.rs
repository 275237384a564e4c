//! RDS secrets
//!
//! AWS Secrets Manager stores RDS credentials as a JSON document with
//! `host`, `port`, `dbname`, `username` and optionally `password`.

use super::connection_string::ConnectionParams;
use crate::{Error, Result};
use serde::Deserialize;

/// Connection target stored in an RDS secret
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RdsSecret {
    /// Endpoint hostname
    pub host: Option<String>,
    /// Endpoint port (stored as either a number or a string)
    #[serde(default, deserialize_with = "port::deserialize")]
    pub port: Option<String>,
    /// Database name
    pub dbname: Option<String>,
    /// Database user
    pub username: Option<String>,
    /// Static password, if the secret carries one
    pub password: Option<String>,
}

impl RdsSecret {
    /// Parse the JSON secret string
    pub fn from_json(secret: &str) -> Result<Self> {
        serde_json::from_str(secret)
            .map_err(|e| Error::Config(format!("invalid RDS secret: {}", e)))
    }

    /// Project the secret onto connection parameters.
    ///
    /// `username` becomes `user`; absent fields are left out.
    pub fn to_params(&self) -> ConnectionParams {
        let mut params = ConnectionParams::new();
        let fields = [
            ("host", &self.host),
            ("port", &self.port),
            ("dbname", &self.dbname),
            ("user", &self.username),
            ("password", &self.password),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                params.insert(key, value.as_str());
            }
        }
        params
    }
}

impl std::fmt::Debug for RdsSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdsSecret")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Build a key/value connection string from an RDS secret
pub fn dsn_from_rds_secret(secret: &RdsSecret) -> String {
    secret.to_params().to_dsn()
}

/// Read an RDS secret from AWS Secrets Manager
pub async fn fetch_rds_secret(
    client: &aws_sdk_secretsmanager::Client,
    secret_id: &str,
) -> Result<RdsSecret> {
    let response = client
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .map_err(|e| Error::CredentialService(Box::new(e)))?;

    match response.secret_string() {
        Some(secret) => RdsSecret::from_json(secret),
        None => Err(Error::Config(format!(
            "secret {} has no string value",
            secret_id
        ))),
    }
}

mod port {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Port>::deserialize(deserializer)?.map(|port| match port {
            Port::Number(n) => n.to_string(),
            Port::Text(s) => s,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn_without_password() {
        let secret =
            RdsSecret::from_json(r#"{"host":"h","port":5432,"dbname":"d","username":"u"}"#)
                .unwrap();
        let dsn = dsn_from_rds_secret(&secret);
        assert_eq!(dsn, "host=h port=5432 dbname=d user=u");
        assert!(!dsn.contains("password"));
    }

    #[test]
    fn test_dsn_with_password() {
        let secret = RdsSecret::from_json(
            r#"{"host":"h","port":5432,"dbname":"d","username":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(
            dsn_from_rds_secret(&secret),
            "host=h port=5432 dbname=d user=u password=p"
        );
    }

    #[test]
    fn test_port_as_string() {
        let secret = RdsSecret::from_json(r#"{"host":"h","port":"5433"}"#).unwrap();
        assert_eq!(secret.port.as_deref(), Some("5433"));
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let secret = RdsSecret::from_json(r#"{"username":"u","port":null}"#).unwrap();
        assert_eq!(dsn_from_rds_secret(&secret), "user=u");
    }

    #[test]
    fn test_extra_secret_keys_ignored() {
        let secret = RdsSecret::from_json(
            r#"{"engine":"postgres","host":"h","dbInstanceIdentifier":"db-1","username":"u"}"#,
        )
        .unwrap();
        assert_eq!(secret.host.as_deref(), Some("h"));
        assert_eq!(secret.username.as_deref(), Some("u"));
    }

    #[test]
    fn test_invalid_secret_json() {
        assert!(matches!(
            RdsSecret::from_json("not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_password_with_spaces_is_quoted() {
        let secret = RdsSecret {
            username: Some("u".into()),
            password: Some("p w".into()),
            ..Default::default()
        };
        assert_eq!(dsn_from_rds_secret(&secret), "user=u password='p w'");
    }

    #[test]
    fn test_debug_redacts_password() {
        let secret = RdsSecret {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }
}
