//! Small helpers for logging and file system checks.

use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::ArchiveError;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (backing off to a char boundary) with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| ArchiveError::io(path.display().to_string(), e))?;

    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Archive directory is writable");
            Ok(())
        }
        Err(e) => Err(ArchiveError::io(probe_path.display().to_string(), e)),
    }
}
