//! The directive grammar of the artifact file.
//!
//! ```text
//! addappid(<digits>)
//! addappid(<digits>, 1, "<key>")
//! setManifestid(<digits>, "<versionId>")
//! ```
//!
//! Everything that formats or recognises a directive goes through this module.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:addappid\((\d+)(?:\s*,\s*1\s*,\s*"([^"]*)")?\)|setManifestid\((\d+)\s*,\s*"([^"]*)"\))$"#,
    )
    .expect("directive pattern is valid")
});

#[allow(clippy::expect_used)]
static APP_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"addappid\((\d+)").expect("addappid pattern is valid"));

/// One line of the artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `addappid(<id>)`
    AddApp {
        /// Item id
        id: String,
    },
    /// `addappid(<id>, 1, "<key>")`
    AddAppWithKey {
        /// Item id
        id: String,
        /// Decryption key
        key: String,
    },
    /// `setManifestid(<id>, "<manifest>")`
    SetManifest {
        /// Depot id
        id: String,
        /// Manifest id to pin
        manifest_id: String,
    },
}

impl Directive {
    /// `addappid` line for `id`, keyed when `key` is present and non-empty
    pub fn add_app(id: &str, key: Option<&str>) -> Self {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => Directive::AddAppWithKey {
                id: id.to_string(),
                key: key.to_string(),
            },
            None => Directive::AddApp { id: id.to_string() },
        }
    }

    /// Pin `id` to `manifest_id`
    pub fn set_manifest(id: &str, manifest_id: &str) -> Self {
        Directive::SetManifest {
            id: id.to_string(),
            manifest_id: manifest_id.to_string(),
        }
    }

    /// Parse a whole (trimmed) line; `None` if it is not a directive
    pub fn parse(line: &str) -> Option<Self> {
        let caps = DIRECTIVE.captures(line.trim())?;
        if let Some(id) = caps.get(1) {
            let id = id.as_str().to_string();
            return Some(match caps.get(2) {
                Some(key) => Directive::AddAppWithKey {
                    id,
                    key: key.as_str().to_string(),
                },
                None => Directive::AddApp { id },
            });
        }
        Some(Directive::SetManifest {
            id: caps.get(3)?.as_str().to_string(),
            manifest_id: caps.get(4)?.as_str().to_string(),
        })
    }

    /// Id this directive refers to
    pub fn id(&self) -> &str {
        match self {
            Directive::AddApp { id }
            | Directive::AddAppWithKey { id, .. }
            | Directive::SetManifest { id, .. } => id,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::AddApp { id } => write!(f, "addappid({id})"),
            Directive::AddAppWithKey { id, key } => write!(f, "addappid({id}, 1, \"{key}\")"),
            Directive::SetManifest { id, manifest_id } => {
                write!(f, "setManifestid({id}, \"{manifest_id}\")")
            }
        }
    }
}

/// Id of the first `addappid(<digits>` occurrence anywhere in `line`
///
/// Looser than [`Directive::parse`]: hand-edited lines with trailing comments
/// or unusual spacing after the id still count as referring to that id.
pub fn referenced_app_id(line: &str) -> Option<&str> {
    APP_REFERENCE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
