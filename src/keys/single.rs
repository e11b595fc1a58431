//! One endpoint serving the whole dictionary.

use super::{KeyProvider, parse_key_dictionary};
use crate::error::Result;
use crate::fetch::SourceFetcher;
use crate::types::KeyDictionary;
use async_trait::async_trait;
use tracing::info;

/// Fetches the dictionary from a single URL, failing on any error
pub struct SingleEndpointProvider {
    fetcher: SourceFetcher,
    url: String,
}

impl SingleEndpointProvider {
    /// Provider for `url`
    pub fn new(fetcher: SourceFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait]
impl KeyProvider for SingleEndpointProvider {
    fn name(&self) -> &'static str {
        "single_endpoint"
    }

    async fn download(&self) -> Result<KeyDictionary> {
        info!(url = %self.url, "fetching key dictionary");
        let body = self.fetcher.fetch_text(&self.url, None).await?;
        let keys = parse_key_dictionary(&self.url, &body)?;
        info!(count = keys.len(), "fetched key dictionary");
        Ok(keys)
    }
}
