//! Manifest index lookups: which depots a title has and their public manifest.

use crate::error::{Error, Result};
use crate::fetch::{SourceFetcher, info_url};
use crate::types::ManifestMap;
use crate::utils::is_all_digits;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Status value the index reports on success
const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<HashMap<String, TitleInfo>>,
}

#[derive(Debug, Deserialize)]
struct TitleInfo {
    #[serde(default)]
    depots: Option<serde_json::Value>,
}

/// Resolves a title's depot → manifest id map from the manifest index
#[derive(Clone, Debug)]
pub struct ManifestResolver {
    fetcher: SourceFetcher,
    base_url: String,
}

impl ManifestResolver {
    /// Resolver against the index at `base_url`
    pub fn new(fetcher: SourceFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Fetch the public manifest id of every content depot of `title_id`
    ///
    /// Depot keys that are not all digits (`branches`, `baselanguages`, ...)
    /// are metadata and skipped, as are depots without a public manifest.
    /// An empty map is a valid answer.
    ///
    /// # Errors
    /// - [`Error::Transport`] if the request fails
    /// - [`Error::Protocol`] on invalid JSON, a non-success status, or a
    ///   missing `data`/`depots` section
    /// - [`Error::NotFound`] if the index has no entry for `title_id`
    pub async fn resolve(&self, title_id: &str) -> Result<ManifestMap> {
        let url = info_url(&self.base_url, title_id)?;
        debug!(url = %url, "querying manifest index");

        let response: InfoResponse = self.fetcher.fetch_json(&url).await?;
        let manifests = extract_manifests(response, title_id)?;

        info!(title_id, count = manifests.len(), "resolved depot manifests");
        Ok(manifests)
    }
}

fn extract_manifests(response: InfoResponse, title_id: &str) -> Result<ManifestMap> {
    match response.status.as_deref() {
        Some(STATUS_SUCCESS) => {}
        other => {
            return Err(Error::Protocol {
                message: format!(
                    "manifest index returned status {:?} for title {title_id}",
                    other.unwrap_or("<missing>")
                ),
            });
        }
    }

    let mut data = response.data.ok_or_else(|| Error::Protocol {
        message: "manifest index response has no data section".to_string(),
    })?;

    let title = data.remove(title_id).ok_or_else(|| Error::NotFound {
        what: format!("title {title_id} in manifest index"),
    })?;

    let depots = match title.depots {
        Some(serde_json::Value::Object(depots)) => depots,
        _ => {
            return Err(Error::Protocol {
                message: format!("manifest index has no depots for title {title_id}"),
            });
        }
    };

    let manifests = depots
        .iter()
        .filter(|(depot_id, _)| is_all_digits(depot_id))
        .filter_map(|(depot_id, depot)| {
            depot
                .pointer("/manifests/public/gid")
                .and_then(serde_json::Value::as_str)
                .filter(|gid| !gid.is_empty())
                .map(|gid| (depot_id.clone(), gid.to_string()))
        })
        .collect();

    Ok(manifests)
}
