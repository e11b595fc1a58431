//! Core types for depot-resolver

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Item id → decryption key, as served by the key providers
pub type KeyDictionary = HashMap<String, String>;

/// Depot id → current public manifest id
pub type ManifestMap = HashMap<String, String>;

/// Per-run switches for artifact generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Look up dependent items and add the ones without own content
    pub include_dependencies: bool,
    /// Append `setManifestid` pins for every manifest
    pub pin_versions: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            include_dependencies: true,
            pin_versions: false,
        }
    }
}

impl From<&Config> for GenerateOptions {
    fn from(config: &Config) -> Self {
        Self {
            include_dependencies: config.add_dependencies,
            pin_versions: config.pin_versions,
        }
    }
}

/// Outcome of one successful generation run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSummary {
    /// Title the artifact was generated for
    pub title_id: String,
    /// Where the artifact was written
    pub output_path: PathBuf,
    /// Some required ids still had no key after the redownload attempt
    pub missing_keys: bool,
    /// Degraded steps that did not abort the run
    pub warnings: Vec<String>,
    /// Human-readable summary for display
    pub message: String,
}

/// Pipeline stage reported with progress events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Run accepted
    Started,
    /// Keys and manifests resolved
    Resolved,
    /// Checking for ids without keys
    CheckingKeys,
    /// Key check (and redownload, if needed) finished
    KeysChecked,
    /// Output path chosen
    OutputSelected,
    /// Artifact written
    Written,
}

impl Stage {
    /// Progress percentage reported for this stage
    pub fn percent(self) -> u8 {
        match self {
            Stage::Started => 10,
            Stage::Resolved => 20,
            Stage::CheckingKeys => 40,
            Stage::KeysChecked => 50,
            Stage::OutputSelected => 70,
            Stage::Written => 100,
        }
    }
}

/// Events emitted by the generator
///
/// Consumers subscribe via [`crate::Generator::subscribe`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run reached a new stage
    Progress {
        /// Title being processed
        title_id: String,
        /// Stage reached
        stage: Stage,
        /// Percentage complete (0-100)
        percent: u8,
    },

    /// A run finished and the artifact was written
    Completed {
        /// Title that was processed
        title_id: String,
        /// Where the artifact was written
        output_path: PathBuf,
        /// Some keys were missing
        missing_keys: bool,
    },

    /// A run failed
    Failed {
        /// Title that was processed
        title_id: String,
        /// Error message
        error: String,
    },
}
