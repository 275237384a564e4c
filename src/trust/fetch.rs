//! Bundle download

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Downloads a CA bundle
#[async_trait]
pub trait BundleFetcher: Send + Sync {
    /// Fetch the raw bundle bytes from `url`
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// HTTPS fetcher backed by reqwest
#[derive(Debug, Clone, Default)]
pub struct HttpBundleFetcher {
    client: reqwest::Client,
}

impl HttpBundleFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher reusing an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BundleFetcher for HttpBundleFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::BundleFetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::BundleFetch(format!("{}: HTTP {}", url, status)));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::BundleFetch(format!("{}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let fetcher = HttpBundleFetcher::new();
        let result = fetcher.fetch("http://127.0.0.1:9/bundle.pem").await;
        assert!(matches!(result, Err(Error::BundleFetch(msg)) if msg.contains("127.0.0.1:9")));
    }
}
