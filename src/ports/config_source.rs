//! Config source port.
//!
//! A tool config can point at an external authoritative source via
//! `source_url`; this port fetches the raw document behind such a URL.

use async_trait::async_trait;
use thiserror::Error;

/// Why a source URL could not be turned into a document.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConfigFetchError(pub String);

/// Fetches the raw config document behind a source URL.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ConfigFetchError>;
}
