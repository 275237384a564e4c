//! Trust bundle provisioning
//!
//! Verified connections to RDS need the Amazon RDS root CAs on disk. The
//! bundle lives at a fixed path in the temp directory and is shared by every
//! connection attempt on the host.

mod bundle;
mod fetch;

pub use bundle::{default_bundle_path, BundleDigest, BundleProvisioner, BundleSource};
pub use fetch::{BundleFetcher, HttpBundleFetcher};

use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File name of the shared RDS bundle in the temp directory
pub const BUNDLE_FILE_NAME: &str = "rds-bundle.crt";

/// Makes a CA bundle available on the local filesystem
#[async_trait]
pub trait TrustStoreProvider: Send + Sync {
    /// Ensure a usable bundle exists at `path` and return the path to hand
    /// to the TLS client as `sslrootcert`.
    async fn ensure(&self, path: &Path) -> Result<PathBuf>;
}

/// Trust store for bundles provisioned out of band
///
/// Returns the requested path without touching the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTrustStore;

#[async_trait]
impl TrustStoreProvider for StaticTrustStore {
    async fn ensure(&self, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_trust_store_returns_path() {
        let path = Path::new("/etc/ssl/rds.pem");
        let resolved = StaticTrustStore.ensure(path).await.unwrap();
        assert_eq!(resolved, path);
        assert!(!resolved.exists());
    }
}
