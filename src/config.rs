//! Configuration types for depot-resolver
//!
//! [`Config`] is an immutable value built once (usually by [`ConfigStore`]) and
//! shared as `Arc<Config>` by every resolver. The pipeline itself never reads
//! or writes the settings file.

use crate::error::{Error, Result};
use crate::utils::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which key provider backend to use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyProviderChoice {
    /// Ordered mirror list with failover
    MirrorList,
    /// One endpoint serving the whole dictionary
    #[default]
    SingleEndpoint,
}

/// One key dictionary mirror
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySource {
    /// Raw-content URL returning a flat `{id: key}` JSON object
    pub url: String,

    /// Whether this is the authoritative origin (gets bearer auth when a token is set)
    #[serde(default)]
    pub authoritative: bool,
}

impl KeySource {
    /// Non-authoritative mirror
    pub fn mirror(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authoritative: false,
        }
    }

    /// Authoritative origin
    pub fn authoritative(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authoritative: true,
        }
    }
}

/// Remote endpoints consulted by the resolvers
///
/// Nothing is built in; each run validates that the endpoints it needs are set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Ordered key dictionary mirrors (used by [`KeyProviderChoice::MirrorList`])
    #[serde(default)]
    pub mirrors: Vec<KeySource>,

    /// Single key dictionary URL (used by [`KeyProviderChoice::SingleEndpoint`])
    #[serde(default)]
    pub single_endpoint: Option<String>,

    /// Base URL of the manifest index (`<base>/v1/info/<title>`)
    #[serde(default)]
    pub manifest_index: Option<String>,

    /// Base URL of the metadata index (`<base>/v1/info/<title>`)
    #[serde(default)]
    pub metadata_index: Option<String>,
}

/// HTTP client settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Absolute timeout for one HTTP attempt (default: 60 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Write the artifact into the unlock tool's plug-in directory (default: true)
    #[serde(default = "default_true")]
    pub read_install_path: bool,

    /// Fallback output directory (default: "./Download")
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// Add dependent items that ship no content of their own (default: true)
    #[serde(default = "default_true")]
    pub add_dependencies: bool,

    /// Append manifest pin directives (default: false)
    #[serde(default)]
    pub pin_versions: bool,

    /// Bearer token for the authoritative key source
    #[serde(default)]
    pub access_token: Option<String>,

    /// Key provider backend
    #[serde(default)]
    pub key_provider: KeyProviderChoice,

    /// Remote endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Directory for local state such as the key cache (default: "./data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum in-flight dependent-item lookups (default: 8)
    #[serde(default = "default_dependency_concurrency")]
    pub dependency_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_install_path: true,
            download_path: default_download_path(),
            add_dependencies: true,
            pin_versions: false,
            access_token: None,
            key_provider: KeyProviderChoice::default(),
            sources: SourcesConfig::default(),
            http: HttpConfig::default(),
            data_dir: default_data_dir(),
            dependency_concurrency: default_dependency_concurrency(),
        }
    }
}

impl Config {
    /// Location of the key dictionary cache file
    pub fn key_cache_path(&self) -> PathBuf {
        self.data_dir.join("cache").join("keys.json")
    }

    /// Access token, if one is configured and non-blank
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Manifest index base URL or a configuration error
    pub fn manifest_index(&self) -> Result<&str> {
        required(&self.sources.manifest_index, "sources.manifest_index")
    }

    /// Metadata index base URL or a configuration error
    pub fn metadata_index(&self) -> Result<&str> {
        required(&self.sources.metadata_index, "sources.metadata_index")
    }

    /// Apply command-line overrides of the per-run defaults
    ///
    /// Turning dependencies off also drops the metadata index from what
    /// [`Config::validate`] requires.
    pub fn apply_overrides(&mut self, no_dependencies: bool, pin_versions: bool) {
        if no_dependencies {
            self.add_dependencies = false;
        }
        self.pin_versions |= pin_versions;
    }

    /// Validate the settings a generation run depends on
    pub fn validate(&self) -> Result<()> {
        match self.key_provider {
            KeyProviderChoice::MirrorList if self.sources.mirrors.is_empty() => {
                return Err(Error::config(
                    "sources.mirrors",
                    "mirror_list provider selected but no mirrors configured",
                ));
            }
            KeyProviderChoice::SingleEndpoint => {
                required(&self.sources.single_endpoint, "sources.single_endpoint")?;
            }
            _ => {}
        }
        self.manifest_index()?;
        if self.add_dependencies {
            self.metadata_index()?;
        }
        if self.dependency_concurrency == 0 {
            return Err(Error::config(
                "dependency_concurrency",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::config(key, format!("{key} is not set")))
}

/// Top-level keys every settings file is expected to carry
pub const REQUIRED_KEYS: &[&str] = &[
    "read_install_path",
    "download_path",
    "add_dependencies",
    "pin_versions",
    "access_token",
    "key_provider",
];

/// JSON settings file backing a [`Config`]
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings file, creating it with defaults when absent
    ///
    /// A file missing any of [`REQUIRED_KEYS`] is rewritten with the missing
    /// settings filled in from the defaults; present settings are kept.
    pub async fn load_or_create(&self) -> Result<Config> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| Error::local_io(&self.path, e))?
        {
            tracing::info!(path = %self.path.display(), "config file not found, writing defaults");
            let config = Config::default();
            self.save(&config).await?;
            return Ok(config);
        }

        let value = self.read_value().await?;
        let config: Config = serde_json::from_value(value.clone())?;

        let missing = missing_keys(&value);
        if missing.is_empty() {
            tracing::info!(path = %self.path.display(), "config loaded");
        } else {
            tracing::warn!(
                path = %self.path.display(),
                missing = ?missing,
                "config file incomplete, filling in defaults"
            );
            self.save(&config).await?;
        }
        Ok(config)
    }

    /// Required keys absent from the file on disk
    pub async fn check_integrity(&self) -> Result<Vec<String>> {
        let value = self.read_value().await?;
        Ok(missing_keys(&value))
    }

    /// Overwrite the file with default settings
    pub async fn reset(&self) -> Result<Config> {
        let config = Config::default();
        self.save(&config).await?;
        tracing::info!(path = %self.path.display(), "config reset to defaults");
        Ok(config)
    }

    /// Change one setting and save
    ///
    /// `key` is a dotted path (`pin_versions`, `http.timeout`,
    /// `sources.manifest_index`). The edited document must still deserialize
    /// into a [`Config`], otherwise nothing is written.
    pub async fn set(&self, key: &str, value: serde_json::Value) -> Result<Config> {
        let current = self.load_or_create().await?;
        let mut doc = serde_json::to_value(&current)?;

        let mut parts = key.split('.').peekable();
        let mut node = &mut doc;
        while let Some(part) = parts.next() {
            let object = node
                .as_object_mut()
                .ok_or_else(|| Error::config(key, format!("'{part}' is not inside an object")))?;
            if parts.peek().is_none() {
                if !object.contains_key(part) {
                    return Err(Error::config(key, "unknown setting"));
                }
                object.insert(part.to_string(), value.clone());
                break;
            }
            node = object
                .get_mut(part)
                .ok_or_else(|| Error::config(key, "unknown setting"))?;
        }

        let config: Config = serde_json::from_value(doc)
            .map_err(|e| Error::config(key, format!("invalid value: {e}")))?;
        self.save(&config).await?;
        tracing::info!(key, value = %value, "setting changed");
        Ok(config)
    }

    /// Write `config` to the file
    pub async fn save(&self, config: &Config) -> Result<()> {
        let data = serde_json::to_vec_pretty(config)?;
        write_atomic(&self.path, &data).await
    }

    async fn read_value(&self) -> Result<serde_json::Value> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::local_io(&self.path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }
}

fn missing_keys(value: &serde_json::Value) -> Vec<String> {
    REQUIRED_KEYS
        .iter()
        .filter(|key| value.get(**key).is_none())
        .map(|key| key.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_download_path() -> PathBuf {
    PathBuf::from("./Download")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_dependency_concurrency() -> usize {
    crate::dependencies::DEFAULT_CONCURRENCY
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
