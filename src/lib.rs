//! # depot-resolver
//!
//! Resolves, per title, the depot decryption keys and current manifest ids a
//! local unlock tool needs, and merges them into that tool's per-title
//! directive file.
//!
//! ## Design Philosophy
//!
//! depot-resolver is designed to be:
//! - **Failure tolerant** - Redundant key mirrors are tried in order, a
//!   dependent item that fails to resolve is skipped
//! - **Deterministic** - The same inputs always produce the same artifact,
//!   and re-running a title leaves it unchanged
//! - **Non-destructive** - Lines of an existing artifact the run does not
//!   touch are preserved verbatim
//! - **Event-driven** - Consumers subscribe to progress events
//!
//! ## Quick Start
//!
//! ```no_run
//! use depot_resolver::{Config, Generator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.sources.single_endpoint = Some("https://keys.example.com/keys.json".into());
//!     config.sources.manifest_index = Some("https://index.example.com".into());
//!     config.sources.metadata_index = Some("https://metadata.example.com".into());
//!
//!     let generator = Generator::new(config)?;
//!
//!     let mut events = generator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = generator.generate("480").await?;
//!     println!("{}", summary.message);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Artifact merging and the directive grammar
pub mod artifact;
/// Configuration types and the settings file
pub mod config;
/// Dependent-item discovery
pub mod dependencies;
/// Error types
pub mod error;
/// HTTP access to remote sources
pub mod fetch;
/// The generation pipeline
pub mod generator;
/// Install-directory lookup
pub mod install_dir;
/// Key dictionary resolution
pub mod keys;
/// Manifest index resolution
pub mod manifest;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use artifact::{ArtifactMerger, MergeReport, MergeRequest};
pub use config::{Config, ConfigStore, KeyProviderChoice, KeySource};
pub use dependencies::{DependencyDiscoverer, DependencyReport, DependencySource};
pub use error::{Error, ErrorKind, Result};
pub use fetch::SourceFetcher;
pub use generator::Generator;
pub use install_dir::{InstallDirLocator, SteamInstallLocator};
pub use keys::{KeyCache, KeyProvider, KeyResolver, MirrorListProvider, SingleEndpointProvider};
pub use manifest::ManifestResolver;
pub use types::{Event, GenerateOptions, GenerateSummary, KeyDictionary, ManifestMap, Stage};
