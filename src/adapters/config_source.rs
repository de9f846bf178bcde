//! Config source adapter.
//!
//! Serves `source_url` fetches: a URL naming a git repository yields the
//! repository's committed `toolforge.yaml`, anything else is fetched as a
//! plain document over HTTP.

use async_trait::async_trait;

use crate::ports::{ConfigFetchError, ConfigFetcher};

use super::runtime::{GitFileFetcher, GIT_CONFIG_FILENAME};

/// Production config fetcher: HTTP for documents, git for repositories.
pub struct UrlConfigFetcher {
    http: reqwest::Client,
    git: GitFileFetcher,
}

impl UrlConfigFetcher {
    /// `http` should carry the configured user agent.
    pub fn new(http: reqwest::Client, git: GitFileFetcher) -> Self {
        Self { http, git }
    }
}

#[async_trait]
impl ConfigFetcher for UrlConfigFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ConfigFetchError> {
        if url.ends_with(".git") {
            return self
                .git
                .fetch_file(url, GIT_CONFIG_FILENAME, None)
                .await
                .map_err(|error| ConfigFetchError(error.to_string()));
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| ConfigFetchError(error.to_string()))?;
        if !response.status().is_success() {
            return Err(ConfigFetchError(format!(
                "got status {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|error| ConfigFetchError(error.to_string()))
    }
}
