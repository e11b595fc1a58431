//! Utility functions for id handling and file output

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::path::Path;

/// Whether `s` is a non-empty run of ASCII digits
///
/// # Examples
///
/// ```
/// use depot_resolver::utils::is_all_digits;
///
/// assert!(is_all_digits("228988"));
/// assert!(!is_all_digits("branches"));
/// assert!(!is_all_digits(""));
/// ```
#[must_use]
pub fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two ids by numeric value
///
/// Digit strings are compared by significant length and then lexically, so
/// ids of any length order correctly. Ids that are not all digits compare as
/// zero; equal values compare equal, so a stable sort keeps their encounter
/// order.
pub fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let (a, b) = (significant_digits(a), significant_digits(b));
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Stable sort of ids by numeric value
pub fn sort_numeric(ids: &mut [String]) {
    ids.sort_by(|a, b| cmp_numeric(a, b));
}

fn significant_digits(id: &str) -> &str {
    if is_all_digits(id) {
        id.trim_start_matches('0')
    } else {
        ""
    }
}

/// Write `contents` to `path` in one step
///
/// Parent directories are created as needed. The data goes to a sibling
/// `.tmp` file first which is then renamed over `path`, so readers never see
/// a partially written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::local_io(parent, e))?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| {
            Error::local_io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Error::local_io(&tmp_path, e))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        tokio::fs::remove_file(&tmp_path).await.ok();
        return Err(Error::local_io(path, e));
    }
    Ok(())
}
