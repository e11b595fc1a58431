//! Single-request HTTP access shared by all resolvers.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Performs one GET against one URL and hands back the body
///
/// Cheap to clone: the inner `reqwest::Client` is reference counted, so every
/// resolver (and every concurrent dependency lookup) shares one connection pool.
#[derive(Clone, Debug)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    /// Create a fetcher with the configured per-attempt timeout and User-Agent
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(http.timeout)
            .user_agent(http.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: Some("http".to_string()),
            })?;
        Ok(Self { client })
    }

    /// GET `url` and return the body as text
    ///
    /// `bearer` attaches an `Authorization: Bearer` header to this request only.
    /// Non-success HTTP statuses are reported as [`Error::Transport`].
    pub async fn fetch_text(&self, url: &str, bearer: Option<&str>) -> Result<String> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        response.text().await.map_err(|e| Error::Transport {
            url: url.to_string(),
            message: format!("failed to read response body: {e}"),
        })
    }

    /// GET `url` and decode the body as JSON
    ///
    /// A body that does not decode into `T` is an [`Error::Protocol`].
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.fetch_text(url, None).await?;
        serde_json::from_str(&body).map_err(|e| Error::Protocol {
            message: format!("invalid JSON from {url}: {e}"),
        })
    }
}

fn transport(url: &str, e: &reqwest::Error) -> Error {
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("request failed: {e}")
    };
    Error::Transport {
        url: url.to_string(),
        message,
    }
}

/// Join `<base>/v1/info/<title_id>`
///
/// Trailing slashes on `base` are ignored.
pub fn info_url(base: &str, title_id: &str) -> Result<String> {
    let base = format!("{}/", base.trim_end_matches('/'));
    let url = url::Url::parse(&base)
        .and_then(|b| b.join("v1/info/")?.join(title_id))
        .map_err(|e| Error::Config {
            message: format!("invalid index URL '{base}': {e}"),
            key: None,
        })?;
    Ok(url.to_string())
}
