//! Test configuration helpers for mock and live endpoints

use depot_resolver::{Config, KeyProviderChoice, KeySource};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

use super::fixtures::KEYS_PATH;

/// Mock servers standing in for every remote source
pub struct MockSources {
    /// Key dictionary mirrors, in failover order
    pub mirrors: Vec<MockServer>,
    /// Manifest index
    pub manifests: MockServer,
    /// Metadata index
    pub metadata: MockServer,
}

impl MockSources {
    /// Start `mirror_count` key mirrors plus both indexes
    pub async fn start(mirror_count: usize) -> Self {
        let mut mirrors = Vec::with_capacity(mirror_count);
        for _ in 0..mirror_count {
            mirrors.push(MockServer::start().await);
        }
        Self {
            mirrors,
            manifests: MockServer::start().await,
            metadata: MockServer::start().await,
        }
    }
}

/// Config pointing at `sources`, writing everything below `dir`
///
/// Uses the mirror list provider, never looks for a local installation and
/// leaves dependencies and pinning off.
pub fn mock_config(dir: &TempDir, sources: &MockSources) -> Config {
    let mut config = Config::default();
    config.read_install_path = false;
    config.download_path = dir.path().join("Download");
    config.data_dir = dir.path().join("data");
    config.add_dependencies = false;
    config.pin_versions = false;
    config.key_provider = KeyProviderChoice::MirrorList;
    config.sources.mirrors = sources
        .mirrors
        .iter()
        .map(|server| KeySource::mirror(format!("{}{KEYS_PATH}", server.uri())))
        .collect();
    config.sources.manifest_index = Some(sources.manifests.uri());
    config.sources.metadata_index = Some(sources.metadata.uri());
    config.http.timeout = Duration::from_secs(5);
    config
}

/// Endpoints for live tests, read from the environment (or `.env`)
///
/// Required:
/// - `DEPOT_RESOLVER_KEY_ENDPOINT` - URL serving the key dictionary
/// - `DEPOT_RESOLVER_MANIFEST_INDEX` - manifest index base URL
/// - `DEPOT_RESOLVER_METADATA_INDEX` - metadata index base URL
///
/// Optional:
/// - `DEPOT_RESOLVER_TITLE_ID` - title to resolve (default: 480)
pub fn load_live_config(dir: &TempDir) -> Option<(Config, String)> {
    dotenvy::dotenv().ok();

    let key_endpoint = std::env::var("DEPOT_RESOLVER_KEY_ENDPOINT").ok()?;
    let manifest_index = std::env::var("DEPOT_RESOLVER_MANIFEST_INDEX").ok()?;
    let metadata_index = std::env::var("DEPOT_RESOLVER_METADATA_INDEX").ok()?;
    let title_id = std::env::var("DEPOT_RESOLVER_TITLE_ID").unwrap_or_else(|_| "480".into());

    let mut config = Config::default();
    config.read_install_path = false;
    config.download_path = dir.path().join("Download");
    config.data_dir = dir.path().join("data");
    config.key_provider = KeyProviderChoice::SingleEndpoint;
    config.sources.single_endpoint = Some(key_endpoint);
    config.sources.manifest_index = Some(manifest_index);
    config.sources.metadata_index = Some(metadata_index);
    Some((config, title_id))
}

/// Skip the current test if live endpoints are not configured
#[macro_export]
macro_rules! skip_if_no_endpoints {
    ($dir:expr) => {
        match $crate::common::load_live_config($dir) {
            Some(found) => found,
            None => {
                eprintln!("Skipping test: live endpoints not configured in .env");
                return;
            }
        }
    };
}
