//! RDS CA bundle provisioning
//!
//! The bundle is downloaded only when the target file is missing. Existing
//! files are trusted as-is and never re-verified.

use super::fetch::{BundleFetcher, HttpBundleFetcher};
use super::{TrustStoreProvider, BUNDLE_FILE_NAME};
use crate::metrics::counters;
use crate::{Error, Result};
use async_trait::async_trait;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Published location of the combined RDS CA bundle
pub const RDS_COMBINED_BUNDLE_URL: &str =
    "https://s3.amazonaws.com/rds-downloads/rds-combined-ca-bundle.pem";

/// MD5 of the combined RDS CA bundle
pub const RDS_COMBINED_BUNDLE_MD5: &str = "0507597169bd025f95803b0d1713f943";

/// Shared bundle location: `<temp dir>/rds-bundle.crt`
pub fn default_bundle_path() -> PathBuf {
    std::env::temp_dir().join(BUNDLE_FILE_NAME)
}

/// Expected digest of a downloaded bundle (lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleDigest {
    /// MD5, as published for the legacy combined bundle
    Md5(String),
    /// SHA-256
    Sha256(String),
}

impl BundleDigest {
    /// Expect an MD5 digest
    pub fn md5(hex: impl AsRef<str>) -> Self {
        Self::Md5(hex.as_ref().to_ascii_lowercase())
    }

    /// Expect a SHA-256 digest
    pub fn sha256(hex: impl AsRef<str>) -> Self {
        Self::Sha256(hex.as_ref().to_ascii_lowercase())
    }

    fn expected(&self) -> &str {
        match self {
            Self::Md5(hex) | Self::Sha256(hex) => hex,
        }
    }

    fn compute(&self, data: &[u8]) -> String {
        match self {
            Self::Md5(_) => hex::encode(Md5::digest(data)),
            Self::Sha256(_) => hex::encode(Sha256::digest(data)),
        }
    }

    /// Check `data` against the expected digest
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let actual = self.compute(data);
        if actual == self.expected() {
            Ok(())
        } else {
            Err(Error::Integrity {
                expected: self.expected().to_string(),
                actual,
            })
        }
    }
}

/// Where a bundle is downloaded from and how it is verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSource {
    /// HTTPS location of the PEM bundle
    pub url: String,
    /// Digest the downloaded bytes must match
    pub digest: BundleDigest,
}

impl BundleSource {
    /// Custom bundle source
    pub fn new(url: impl Into<String>, digest: BundleDigest) -> Self {
        Self {
            url: url.into(),
            digest,
        }
    }

    /// The combined RDS CA bundle
    pub fn rds_combined() -> Self {
        Self::new(
            RDS_COMBINED_BUNDLE_URL,
            BundleDigest::md5(RDS_COMBINED_BUNDLE_MD5),
        )
    }
}

impl Default for BundleSource {
    fn default() -> Self {
        Self::rds_combined()
    }
}

/// Downloads, verifies and stores the CA bundle when it is missing
#[derive(Debug, Clone)]
pub struct BundleProvisioner<F = HttpBundleFetcher> {
    fetcher: F,
    source: BundleSource,
}

impl BundleProvisioner<HttpBundleFetcher> {
    /// Provisioner for the combined RDS bundle over HTTPS
    pub fn new() -> Self {
        Self::with_fetcher(HttpBundleFetcher::new(), BundleSource::rds_combined())
    }
}

impl Default for BundleProvisioner<HttpBundleFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: BundleFetcher> BundleProvisioner<F> {
    /// Provisioner with a custom fetcher and source
    pub fn with_fetcher(fetcher: F, source: BundleSource) -> Self {
        Self { fetcher, source }
    }

    /// Bundle source in use
    pub fn source(&self) -> &BundleSource {
        &self.source
    }

    async fn download(&self, path: &Path) -> Result<()> {
        tracing::debug!(url = %self.source.url, "downloading CA bundle");

        let bundle = self.fetcher.fetch(&self.source.url).await?;
        self.source.digest.verify(&bundle)?;
        write_atomically(path, &bundle)?;

        tracing::info!(
            path = %path.display(),
            bytes = bundle.len(),
            "CA bundle written"
        );
        Ok(())
    }
}

#[async_trait]
impl<F: BundleFetcher> TrustStoreProvider for BundleProvisioner<F> {
    async fn ensure(&self, path: &Path) -> Result<PathBuf> {
        if tokio::fs::try_exists(path).await? {
            tracing::debug!(path = %path.display(), "using existing CA bundle");
            return Ok(path.to_path_buf());
        }

        match self.download(path).await {
            Ok(()) => {
                counters::bundle_downloaded();
                Ok(path.to_path_buf())
            }
            Err(e) => {
                counters::bundle_failed(e.category());
                Err(e)
            }
        }
    }
}

/// Write through a temp file in the target directory, then rename over the
/// target so no reader sees a partial bundle.
fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;

    // Shared with other users on the host, like any file in the temp dir
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
