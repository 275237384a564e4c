//! Token installation into connection parameters

use super::token::TokenIssuer;
use crate::client::ConnectionParams;
use crate::connection::SslMode;
use crate::metrics::counters;
use crate::trust::TrustStoreProvider;
use crate::{Error, Result};
use std::path::Path;

/// Replace the missing password with a freshly issued token.
///
/// Parameters that already carry a password are returned unchanged, with a
/// warning. Otherwise `host`, `port` and `user` must be set; a token is
/// issued for them, `sslmode` becomes `verify-full`, and `sslrootcert`
/// defaults to the bundle the trust store provisions at `bundle_path`.
///
/// Every call issues a new token.
pub async fn authorize(
    mut params: ConnectionParams,
    issuer: &dyn TokenIssuer,
    trust_store: &dyn TrustStoreProvider,
    bundle_path: &Path,
) -> Result<ConnectionParams> {
    if params.contains("password") {
        tracing::warn!(
            "connection parameters contain a password, IAM authentication will be disabled"
        );
        counters::password_bypass();
        return Ok(params);
    }

    let (host, port, user) = required_target(&params)?;

    tracing::debug!(host = %host, port, user = %user, "issuing IAM auth token");
    let token = match issuer.issue_token(&host, port, &user).await {
        Ok(token) => token,
        Err(e) => {
            counters::token_failed(e.category());
            return Err(e);
        }
    };
    counters::token_issued();

    params.insert("password", token);
    params.insert("sslmode", SslMode::VerifyFull.to_string());

    if !params.contains("sslrootcert") {
        let bundle = trust_store.ensure(bundle_path).await?;
        params.insert("sslrootcert", bundle.to_string_lossy());
    }

    Ok(params)
}

fn required_target(params: &ConnectionParams) -> Result<(String, u16, String)> {
    let field = |key: &str| params.get(key).filter(|v| !v.is_empty());

    let (Some(host), Some(port), Some(user)) = (field("host"), field("port"), field("user")) else {
        return Err(Error::Config(
            "IAM authentication requires host, port and user to be provided".into(),
        ));
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| Error::Config(format!("invalid port '{}'", port)))?;

    Ok((host.to_string(), port, user.to_string()))
}
