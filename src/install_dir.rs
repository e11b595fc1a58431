//! Locating the downstream tool's plug-in directory.
//!
//! When `read_install_path` is enabled, artifacts go straight into
//! `<install>/config/stplug-in`. The install directory comes from the Windows
//! registry, or from the usual per-user locations elsewhere.

use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Sub-path of the plug-in directory under the install root
const PLUGIN_SUBDIR: [&str; 2] = ["config", "stplug-in"];

/// Finds the directory artifacts are written to
pub trait InstallDirLocator: Send + Sync {
    /// Plug-in directory of the local installation
    ///
    /// # Errors
    /// [`Error::NotFound`] if no installation can be located.
    fn plugin_dir(&self) -> Result<PathBuf>;
}

/// Locator for a Steam client installation
#[derive(Clone, Debug)]
pub struct SteamInstallLocator {
    candidates: Vec<PathBuf>,
}

impl SteamInstallLocator {
    /// Locator probing the registry (on Windows) and the default install paths
    pub fn new() -> Self {
        Self {
            candidates: default_candidates(),
        }
    }

    /// Locator probing only `candidates`, in order, after the registry
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    fn install_root(&self) -> Result<PathBuf> {
        #[cfg(windows)]
        {
            if let Some(root) = registry_install_path() {
                return Ok(root);
            }
        }

        self.candidates
            .iter()
            .find(|path| path.is_dir())
            .cloned()
            .ok_or_else(|| Error::NotFound {
                what: "Steam installation directory".to_string(),
            })
    }
}

impl Default for SteamInstallLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallDirLocator for SteamInstallLocator {
    fn plugin_dir(&self) -> Result<PathBuf> {
        let root = self.install_root()?;
        debug!(root = %root.display(), "found install directory");
        Ok(PLUGIN_SUBDIR.iter().fold(root, |path, part| path.join(part)))
    }
}

fn default_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(windows)]
    {
        if let Ok(program_files) = std::env::var("PROGRAMFILES(X86)") {
            paths.push(PathBuf::from(program_files).join("Steam"));
        }
        if let Ok(program_files) = std::env::var("PROGRAMFILES") {
            paths.push(PathBuf::from(program_files).join("Steam"));
        }
    }

    #[cfg(unix)]
    {
        if let Ok(home) = std::env::var("HOME") {
            paths.push(PathBuf::from(&home).join(".steam").join("steam"));
            paths.push(PathBuf::from(home).join(".local").join("share").join("Steam"));
        }
    }

    paths
}

/// `InstallPath` from the 64-bit, then the 32-bit registry view
#[cfg(windows)]
fn registry_install_path() -> Option<PathBuf> {
    use winreg::RegKey;
    use winreg::enums::*;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    for registry_path in [r"SOFTWARE\WOW6432Node\Valve\Steam", r"SOFTWARE\Valve\Steam"] {
        if let Ok(key) = hklm.open_subkey(registry_path) {
            if let Ok(install_path) = key.get_value::<String, _>("InstallPath") {
                if !install_path.is_empty() {
                    return Some(PathBuf::from(install_path));
                }
            }
        }
    }
    None
}
