//! Ordered mirror list with failover.

use super::{KeyProvider, parse_key_dictionary};
use crate::config::KeySource;
use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::types::KeyDictionary;
use async_trait::async_trait;
use tracing::{info, warn};

/// Tries each mirror in order until one yields a non-empty dictionary
///
/// Per-source failures are logged and skipped. The bearer token, when set, is
/// only ever sent to sources marked authoritative.
pub struct MirrorListProvider {
    fetcher: SourceFetcher,
    sources: Vec<KeySource>,
    access_token: Option<String>,
}

impl MirrorListProvider {
    /// Provider over `sources`, in priority order
    pub fn new(
        fetcher: SourceFetcher,
        sources: Vec<KeySource>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            sources,
            access_token,
        }
    }

    async fn try_source(&self, source: &KeySource) -> Result<KeyDictionary> {
        let bearer = if source.authoritative {
            match self.access_token.as_deref() {
                Some(token) => {
                    info!(url = %source.url, "using access token for authoritative source");
                    Some(token)
                }
                None => {
                    warn!(
                        url = %source.url,
                        "no access token configured, requesting authoritative source anonymously (may be rate limited)"
                    );
                    None
                }
            }
        } else {
            None
        };

        let body = self.fetcher.fetch_text(&source.url, bearer).await?;
        parse_key_dictionary(&source.url, &body)
    }
}

#[async_trait]
impl KeyProvider for MirrorListProvider {
    fn name(&self) -> &'static str {
        "mirror_list"
    }

    async fn download(&self) -> Result<KeyDictionary> {
        let mut last_error = None;

        for source in &self.sources {
            info!(url = %source.url, "trying key source");
            match self.try_source(source).await {
                Ok(keys) => {
                    info!(url = %source.url, count = keys.len(), "key source succeeded");
                    return Ok(keys);
                }
                Err(e) => {
                    warn!(url = %source.url, error = %e, "key source failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(last) => Error::SourcesExhausted {
                attempted: self.sources.len(),
                last: Box::new(last),
            },
            None => Error::config("sources.mirrors", "no key sources configured"),
        })
    }
}
