//! Dependent-item discovery.
//!
//! A title declares its dependent items (expansions) in up to four places of
//! its metadata entry. Some of those items ship their own depots, others are
//! pure entitlements; only the latter need a bare `addappid` line, so
//! [`DependencyDiscoverer`] looks every candidate up concurrently and keeps
//! the ones without own content.

pub mod model;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use crate::fetch::{SourceFetcher, info_url};
use crate::utils::sort_numeric;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use model::{MetadataResponse, NestedDlc, TitleMetadata, shape_name};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Default number of in-flight dependent-item lookups
pub const DEFAULT_CONCURRENCY: usize = 8;

#[allow(clippy::expect_used)]
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// What the metadata index says about one title
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyReport {
    /// Declared dependent-item ids, deduplicated, in numeric order
    pub ids: Vec<String>,
    /// Whether the title ships distributable content of its own
    pub has_own_content: bool,
}

/// Source of dependent items lacking own content
///
/// The artifact merger only needs this one question answered, which lets it be
/// exercised without a metadata index.
#[async_trait]
pub trait DependencySource: Send + Sync {
    /// Dependent items of `title_id` that own no content, excluding `exclude`
    ///
    /// The result is sorted by numeric id.
    async fn collect_unowned(
        &self,
        title_id: &str,
        exclude: &HashSet<String>,
    ) -> Result<Vec<String>>;
}

/// Queries the metadata index for dependent items
#[derive(Clone, Debug)]
pub struct DependencyDiscoverer {
    fetcher: SourceFetcher,
    base_url: String,
    concurrency: usize,
}

impl DependencyDiscoverer {
    /// Discoverer against the index at `base_url`
    ///
    /// `concurrency` bounds in-flight lookups in [`DependencySource::collect_unowned`];
    /// zero is treated as one.
    pub fn new(fetcher: SourceFetcher, base_url: impl Into<String>, concurrency: usize) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Look up `title_id` and report its dependent items and content ownership
    ///
    /// # Errors
    /// - [`Error::Transport`] if the request fails
    /// - [`Error::Protocol`] if the body is not valid JSON
    /// - [`Error::NotFound`] if the index has no entry for `title_id`
    pub async fn discover(&self, title_id: &str) -> Result<DependencyReport> {
        let url = info_url(&self.base_url, title_id)?;
        debug!(url = %url, "querying metadata index");

        let mut response: MetadataResponse = self.fetcher.fetch_json(&url).await?;
        let title = response.data.remove(title_id).ok_or_else(|| Error::NotFound {
            what: format!("title {title_id} in metadata index"),
        })?;

        Ok(report_for(title_id, &title))
    }
}

#[async_trait]
impl DependencySource for DependencyDiscoverer {
    async fn collect_unowned(
        &self,
        title_id: &str,
        exclude: &HashSet<String>,
    ) -> Result<Vec<String>> {
        let report = self.discover(title_id).await?;
        let candidates: Vec<String> = report
            .ids
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .collect();
        debug!(
            title_id,
            candidates = candidates.len(),
            "checking dependent items for own content"
        );

        let mut unowned: Vec<String> = stream::iter(candidates)
            .map(|id| async move {
                let result = self.discover(&id).await;
                (id, result)
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(report) if !report.has_own_content => Some(id),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(dependency_id = %id, error = %e, "dependent item lookup failed, skipping");
                        None
                    }
                }
            })
            .collect()
            .await;

        sort_numeric(&mut unowned);
        info!(title_id, count = unowned.len(), "found dependent items without own content");
        Ok(unowned)
    }
}

/// Build the report for one title entry
pub(crate) fn report_for(title_id: &str, title: &TitleMetadata) -> DependencyReport {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut add = |id: &str| {
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    };

    for section in [&title.common, &title.extended] {
        if let Some(list) = section.get("listofdlc").and_then(|v| v.as_str()) {
            DIGITS.find_iter(list).for_each(|m| add(m.as_str()));
        }
    }

    match title.depots.nested_dlc() {
        NestedDlc::Absent => {}
        NestedDlc::Map(dlc) => dlc.keys().for_each(|id| add(id.as_str())),
        NestedDlc::Text(s) => {
            warn!(title_id, value = s, "depots.dlc is a string, ignoring");
        }
        NestedDlc::Unknown(v) => {
            warn!(title_id, shape = shape_name(v), "depots.dlc has unexpected shape, ignoring");
        }
    }
    if let model::DepotsField::Unknown(v) = &title.depots {
        warn!(title_id, shape = shape_name(v), "depots has unexpected shape");
    }

    title.dlc.keys().for_each(|id| add(id.as_str()));

    sort_numeric(&mut ids);
    DependencyReport {
        ids,
        has_own_content: title.depots.owns_content(),
    }
}
