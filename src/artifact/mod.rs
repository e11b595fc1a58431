//! Artifact merging.
//!
//! [`ArtifactMerger::merge`] folds resolved keys, manifests and dependent
//! items into the artifact file for one title. Lines of a previous artifact
//! that the run does not touch survive verbatim and in their original order,
//! after the freshly generated lines.

pub mod directive;

use crate::dependencies::DependencySource;
use crate::error::{Error, Result};
use crate::types::{KeyDictionary, ManifestMap};
use crate::utils::{sort_numeric, write_atomic};
use directive::{Directive, referenced_app_id};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inputs of one merge
#[derive(Clone, Copy, Debug)]
pub struct MergeRequest<'a> {
    /// Title the artifact is for
    pub title_id: &'a str,
    /// Artifact file to update
    pub output_path: &'a Path,
    /// Resolved key dictionary
    pub keys: &'a KeyDictionary,
    /// Resolved depot → manifest map
    pub manifests: &'a ManifestMap,
    /// Add dependent items without own content
    pub include_dependencies: bool,
    /// Append `setManifestid` pins
    pub pin_versions: bool,
}

/// What a merge wrote
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Keyed `addappid` lines generated (title included)
    pub keyed: usize,
    /// Bare `addappid` lines generated for the title and its depots
    pub bare: usize,
    /// Bare lines generated for dependent items
    pub dependencies_added: usize,
    /// Lines carried over from the previous artifact
    pub preserved: usize,
    /// `setManifestid` lines appended
    pub pins: usize,
    /// Degraded steps that did not abort the merge
    pub warnings: Vec<String>,
}

impl MergeReport {
    /// Total number of lines written
    pub fn lines_written(&self) -> usize {
        self.keyed + self.bare + self.dependencies_added + self.preserved + self.pins
    }
}

/// Builds and rewrites artifact files
#[derive(Clone, Default)]
pub struct ArtifactMerger {
    dependencies: Option<Arc<dyn DependencySource>>,
}

impl ArtifactMerger {
    /// Merger without dependency discovery
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `source` to find dependent items when a request asks for them
    pub fn with_dependencies(mut self, source: Arc<dyn DependencySource>) -> Self {
        self.dependencies = Some(source);
        self
    }

    /// Merge one run's data into the artifact at `request.output_path`
    ///
    /// The whole file is rebuilt in memory and then written atomically.
    /// Dependency discovery failures only add a warning to the report.
    ///
    /// Prior `setManifestid` lines are carried over like any other line that
    /// is not an `addappid` for a generated id, so pinning the same depot on
    /// every run adds one more copy of its pin.
    ///
    /// # Errors
    /// [`Error::LocalIo`] if the previous artifact cannot be read or the new
    /// one cannot be written.
    pub async fn merge(&self, request: MergeRequest<'_>) -> Result<MergeReport> {
        let previous = read_previous(request.output_path).await?;
        let present: HashSet<String> = previous
            .iter()
            .filter_map(|line| referenced_app_id(line))
            .map(str::to_string)
            .collect();
        debug!(
            path = %request.output_path.display(),
            lines = previous.len(),
            directives = previous
                .iter()
                .filter(|line| Directive::parse(line).is_some())
                .count(),
            ids = present.len(),
            "read previous artifact"
        );

        let mut report = MergeReport::default();
        let mut lines = Vec::new();
        let mut added = HashSet::new();

        let mut emit = |directive: Directive, report: &mut MergeReport| {
            match directive {
                Directive::AddAppWithKey { .. } => report.keyed += 1,
                _ => report.bare += 1,
            }
            added.insert(directive.id().to_string());
            lines.push(directive.to_string());
        };

        let title_key = request.keys.get(request.title_id).map(String::as_str);
        emit(Directive::add_app(request.title_id, title_key), &mut report);

        let mut depot_ids: Vec<String> = request.manifests.keys().cloned().collect();
        sort_numeric(&mut depot_ids);
        for id in &depot_ids {
            if present.contains(id) || id == request.title_id {
                continue;
            }
            let key = request.keys.get(id).map(String::as_str);
            emit(Directive::add_app(id, key), &mut report);
        }

        if request.include_dependencies {
            let exclude: HashSet<String> = present.union(&added).cloned().collect();
            match self.collect_dependencies(request.title_id, &exclude).await {
                Ok(ids) => {
                    for id in ids {
                        if added.contains(&id) {
                            continue;
                        }
                        lines.push(Directive::add_app(&id, None).to_string());
                        added.insert(id);
                        report.dependencies_added += 1;
                    }
                }
                Err(message) => {
                    warn!(title_id = request.title_id, error = %message, "dependency discovery failed, continuing without");
                    report.warnings.push(message);
                }
            }
        }

        for line in previous {
            let touched = referenced_app_id(&line).is_some_and(|id| added.contains(id));
            if !touched {
                lines.push(line);
                report.preserved += 1;
            }
        }

        if request.pin_versions {
            for id in &depot_ids {
                if let Some(manifest_id) = request.manifests.get(id).filter(|m| !m.is_empty()) {
                    lines.push(Directive::set_manifest(id, manifest_id).to_string());
                    report.pins += 1;
                }
            }
        }

        let mut contents = lines.join("\n");
        contents.push('\n');
        write_atomic(request.output_path, contents.as_bytes()).await?;

        info!(
            title_id = request.title_id,
            path = %request.output_path.display(),
            lines = report.lines_written(),
            dependencies = report.dependencies_added,
            preserved = report.preserved,
            "artifact written"
        );
        Ok(report)
    }

    async fn collect_dependencies(
        &self,
        title_id: &str,
        exclude: &HashSet<String>,
    ) -> std::result::Result<Vec<String>, String> {
        let Some(source) = &self.dependencies else {
            return Err("dependency discovery requested but no metadata index is configured".into());
        };
        source
            .collect_unowned(title_id, exclude)
            .await
            .map_err(|e| format!("dependency discovery failed: {e}"))
    }
}

/// Non-blank, trimmed lines of the artifact at `path`; empty if it does not exist
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
async fn read_previous(path: &Path) -> Result<Vec<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::local_io(path, e)),
    }
}
