//! The generation pipeline and its single entry point.
//!
//! [`Generator::resolve_and_generate`] runs one title end to end:
//!
//! 1. resolve the key dictionary and the manifest map concurrently
//!    (either failing aborts the run before anything is written)
//! 2. redownload the key dictionary once if the title or one of its depots
//!    has no key
//! 3. merge everything into the artifact file
//!
//! Progress is broadcast as [`Event`]s to every subscriber.

use crate::artifact::{ArtifactMerger, MergeRequest};
use crate::config::Config;
use crate::dependencies::DependencyDiscoverer;
use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::install_dir::{InstallDirLocator, SteamInstallLocator};
use crate::keys::KeyResolver;
use crate::manifest::ManifestResolver;
use crate::types::{Event, GenerateOptions, GenerateSummary, KeyDictionary, ManifestMap, Stage};
use crate::utils::is_all_digits;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Capacity of the event channel; slow subscribers lag beyond this
const EVENT_CAPACITY: usize = 256;

/// Owner of the resolvers and the merger for one configuration
pub struct Generator {
    config: Arc<Config>,
    keys: Arc<KeyResolver>,
    manifests: ManifestResolver,
    merger: ArtifactMerger,
    locator: Arc<dyn InstallDirLocator>,
    event_tx: broadcast::Sender<Event>,
}

impl Generator {
    /// Build every component from `config`
    ///
    /// # Errors
    /// [`Error::Config`] if a required endpoint is missing or the HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = SourceFetcher::new(&config.http)?;

        let keys = KeyResolver::from_config(&config, fetcher.clone())?;
        let manifests = ManifestResolver::new(fetcher.clone(), config.manifest_index()?);

        let mut merger = ArtifactMerger::new();
        if let Ok(base_url) = config.metadata_index() {
            merger = merger.with_dependencies(Arc::new(DependencyDiscoverer::new(
                fetcher,
                base_url,
                config.dependency_concurrency,
            )));
        }

        let (event_tx, _rx) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            keys: Arc::new(keys),
            manifests,
            merger,
            locator: Arc::new(SteamInstallLocator::new()),
            event_tx,
        })
    }

    /// Replace the install-directory lookup used by [`Generator::output_path_for`]
    pub fn with_locator(mut self, locator: Arc<dyn InstallDirLocator>) -> Self {
        self.locator = locator;
        self
    }

    /// Subscribe to progress events
    ///
    /// Events emitted before the call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The key resolver, for refreshing the cache outside a run
    pub fn key_resolver(&self) -> Arc<KeyResolver> {
        Arc::clone(&self.keys)
    }

    /// Where the artifact for `title_id` goes by default
    ///
    /// The plug-in directory of the local installation when
    /// `read_install_path` is set and the lookup succeeds, otherwise
    /// `download_path`.
    pub fn output_path_for(&self, title_id: &str) -> PathBuf {
        let file_name = format!("{title_id}.lua");
        if self.config.read_install_path {
            match self.locator.plugin_dir() {
                Ok(dir) => return dir.join(file_name),
                Err(e) => {
                    warn!(error = %e, "install directory lookup failed, using download path");
                }
            }
        }
        self.config.download_path.join(file_name)
    }

    /// Generate the artifact for `title_id` at its default location with the
    /// configured options
    pub async fn generate(&self, title_id: &str) -> Result<GenerateSummary> {
        let output_path = self.output_path_for(title_id);
        let options = GenerateOptions::from(self.config.as_ref());
        self.resolve_and_generate(title_id, &output_path, &options)
            .await
    }

    /// Resolve everything for `title_id` and merge it into `output_path`
    ///
    /// # Errors
    /// - [`Error::InvalidTitleId`] if `title_id` is not all digits
    /// - any key or manifest resolution failure (nothing is written)
    /// - [`Error::LocalIo`] if the artifact cannot be read or written
    pub async fn resolve_and_generate(
        &self,
        title_id: &str,
        output_path: &Path,
        options: &GenerateOptions,
    ) -> Result<GenerateSummary> {
        let result = self.run(title_id, output_path, options).await;
        match &result {
            Ok(summary) => {
                info!(title_id, path = %summary.output_path.display(), missing_keys = summary.missing_keys, "generation complete");
                self.emit_event(Event::Completed {
                    title_id: title_id.to_string(),
                    output_path: summary.output_path.clone(),
                    missing_keys: summary.missing_keys,
                });
            }
            Err(e) => {
                warn!(title_id, error = %e, "generation failed");
                self.emit_event(Event::Failed {
                    title_id: title_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        title_id: &str,
        output_path: &Path,
        options: &GenerateOptions,
    ) -> Result<GenerateSummary> {
        if !is_all_digits(title_id) {
            return Err(Error::InvalidTitleId {
                title_id: title_id.to_string(),
            });
        }
        self.progress(title_id, Stage::Started);

        let (keys, manifests) =
            tokio::try_join!(self.keys.resolve(false), self.manifests.resolve(title_id))?;
        info!(
            title_id,
            keys = keys.len(),
            manifests = manifests.len(),
            "keys and manifests resolved"
        );
        self.progress(title_id, Stage::Resolved);

        self.progress(title_id, Stage::CheckingKeys);
        let (keys, missing_keys) = self.ensure_keys(title_id, keys, &manifests).await;
        self.progress(title_id, Stage::KeysChecked);

        self.progress(title_id, Stage::OutputSelected);
        let report = self
            .merger
            .merge(MergeRequest {
                title_id,
                output_path,
                keys: &keys,
                manifests: &manifests,
                include_dependencies: options.include_dependencies,
                pin_versions: options.pin_versions,
            })
            .await?;
        self.progress(title_id, Stage::Written);

        let mut message = if missing_keys {
            format!("Title {title_id} added, but some depot keys are missing (content may be empty)")
        } else {
            format!("Title {title_id} added")
        };
        for warning in &report.warnings {
            message.push_str("\nwarning: ");
            message.push_str(warning);
        }

        Ok(GenerateSummary {
            title_id: title_id.to_string(),
            output_path: output_path.to_path_buf(),
            missing_keys,
            warnings: report.warnings,
            message,
        })
    }

    /// Redownload once if the title or a depot has no key
    ///
    /// Returns the dictionary to use and whether ids are still missing.
    async fn ensure_keys(
        &self,
        title_id: &str,
        keys: KeyDictionary,
        manifests: &ManifestMap,
    ) -> (KeyDictionary, bool) {
        let missing = missing_ids(title_id, &keys, manifests);
        if missing.is_empty() {
            return (keys, false);
        }

        info!(title_id, missing = ?missing, "depot keys missing, redownloading");
        let keys = match self.keys.resolve(true).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(title_id, error = %e, "key redownload failed, keeping previous dictionary");
                keys
            }
        };

        let still_missing = missing_ids(title_id, &keys, manifests);
        if still_missing.is_empty() {
            info!(title_id, "missing depot keys recovered by redownload");
            (keys, false)
        } else {
            warn!(title_id, missing = ?still_missing, "depot keys still missing after redownload");
            (keys, true)
        }
    }

    fn progress(&self, title_id: &str, stage: Stage) {
        self.emit_event(Event::Progress {
            title_id: title_id.to_string(),
            stage,
            percent: stage.percent(),
        });
    }

    /// Send `event` to all subscribers; dropped when there are none
    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Title and depot ids absent from `keys`, title first then ascending
fn missing_ids(title_id: &str, keys: &KeyDictionary, manifests: &ManifestMap) -> Vec<String> {
    let mut depots: Vec<String> = manifests
        .keys()
        .filter(|id| id.as_str() != title_id && !keys.contains_key(*id))
        .cloned()
        .collect();
    crate::utils::sort_numeric(&mut depots);

    let mut missing = Vec::with_capacity(depots.len() + 1);
    if !keys.contains_key(title_id) {
        missing.push(title_id.to_string());
    }
    missing.extend(depots);
    missing
}
