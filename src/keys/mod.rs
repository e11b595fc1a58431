//! Key dictionary resolution.
//!
//! A [`KeyResolver`] answers `resolve(force_redownload)` with the full
//! id → key dictionary. It consults the local [`KeyCache`] first (unless a
//! redownload is forced) and otherwise asks its [`KeyProvider`]:
//! - [`MirrorListProvider`] walks an ordered mirror list and stops at the
//!   first source yielding a usable dictionary
//! - [`SingleEndpointProvider`] fetches one URL
//!
//! Whichever provider wins, the result is written back to the cache on a
//! best-effort basis.

mod cache;
mod mirror;
mod single;


pub use cache::KeyCache;
pub use mirror::MirrorListProvider;
pub use single::SingleEndpointProvider;

use crate::config::{Config, KeyProviderChoice};
use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::types::KeyDictionary;
use async_trait::async_trait;
use tracing::{info, warn};

/// Longest body excerpt quoted in error messages
const MAX_EXCERPT: usize = 200;

/// A remote backend serving the key dictionary
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch a fresh, non-empty dictionary from the network
    async fn download(&self) -> Result<KeyDictionary>;
}

/// Cache-first key dictionary resolution over one provider
pub struct KeyResolver {
    provider: Box<dyn KeyProvider>,
    cache: KeyCache,
}

impl KeyResolver {
    /// Resolver over an explicit provider and cache
    pub fn new(provider: Box<dyn KeyProvider>, cache: KeyCache) -> Self {
        Self { provider, cache }
    }

    /// Resolver for the provider selected in `config`
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the selected provider has no endpoint.
    pub fn from_config(config: &Config, fetcher: SourceFetcher) -> Result<Self> {
        let provider: Box<dyn KeyProvider> = match config.key_provider {
            KeyProviderChoice::MirrorList => {
                if config.sources.mirrors.is_empty() {
                    return Err(Error::config(
                        "sources.mirrors",
                        "mirror_list provider selected but no mirrors configured",
                    ));
                }
                Box::new(MirrorListProvider::new(
                    fetcher,
                    config.sources.mirrors.clone(),
                    config.access_token().map(str::to_string),
                ))
            }
            KeyProviderChoice::SingleEndpoint => {
                let url = config
                    .sources
                    .single_endpoint
                    .clone()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        Error::config("sources.single_endpoint", "sources.single_endpoint is not set")
                    })?;
                Box::new(SingleEndpointProvider::new(fetcher, url))
            }
        };
        Ok(Self::new(provider, KeyCache::new(config.key_cache_path())))
    }

    /// Resolve the key dictionary
    ///
    /// Without `force_redownload` a non-empty cache answers immediately and no
    /// request is made.
    pub async fn resolve(&self, force_redownload: bool) -> Result<KeyDictionary> {
        if !force_redownload {
            if let Some(keys) = self.cache.load().await {
                return Ok(keys);
            }
            info!(
                provider = self.provider.name(),
                "no usable key cache, downloading"
            );
        }

        let keys = self.provider.download().await?;

        match self.cache.store(&keys).await {
            Ok(()) => info!(path = %self.cache.path().display(), count = keys.len(), "key cache updated"),
            Err(e) => warn!(error = %e, "failed to write key cache"),
        }

        Ok(keys)
    }
}

/// Turn a response body into a non-empty dictionary
///
/// Empty bodies, bodies that do not start with `{` or `[`, undecodable JSON
/// and empty objects are all rejected.
pub(crate) fn parse_key_dictionary(url: &str, body: &str) -> Result<KeyDictionary> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyResult {
            message: format!("{url} returned an empty body"),
        });
    }
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return Err(Error::Protocol {
            message: format!("{url} returned non-JSON content [{}]", excerpt(trimmed)),
        });
    }

    let keys: KeyDictionary = serde_json::from_str(trimmed).map_err(|e| Error::Protocol {
        message: format!("failed to parse JSON from {url}: {e}"),
    })?;
    if keys.is_empty() {
        return Err(Error::EmptyResult {
            message: format!("{url} returned an empty key dictionary"),
        });
    }
    Ok(keys)
}

fn excerpt(s: &str) -> String {
    match s.char_indices().nth(MAX_EXCERPT) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
