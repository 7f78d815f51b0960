//! Plain-text page archives.
//!
//! During the initial load every fetched page is dumped, unfiltered, to
//! `{archive_dir}/NewsPage{n}.txt`. Each item becomes one ruled block listing
//! its number, title, site, URL, author, score and age. Re-running the load
//! overwrites the file for the same page.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::ArchiveError;
use crate::models::Item;

const RULE: &str = "--------------------------------------------------------------------";

/// File name used for page `page`.
pub fn page_file_name(page: u32) -> String {
    format!("NewsPage{page}.txt")
}

/// Render the archive text for one page.
pub fn render_page(items: &[Item]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = write!(
            out,
            "{RULE}\n\
             Article Number: {}\n\
             Article Title: {}\n\
             Source Website: {}\n\
             Source URL: {}\n\
             Article Author: {}\n\
             Article Score: {}\n\
             Posted: {}\n\
             {RULE}\n",
            item.rank, item.title, item.site, item.link, item.author, item.score, item.posted_relative,
        );
    }
    out
}

/// Write page `page` to `archive_dir`, creating the directory if needed.
///
/// # Arguments
///
/// * `archive_dir` - Directory receiving the `NewsPage{n}.txt` files
/// * `page` - Listing page number, used in the file name
/// * `items` - Every item on the page, unfiltered
///
/// # Returns
///
/// The path of the written file. An existing file for the same page is
/// overwritten.
#[instrument(level = "info", skip_all, fields(archive_dir = %archive_dir.display(), page = page))]
pub async fn write_page(
    archive_dir: &Path,
    page: u32,
    items: &[Item],
) -> Result<PathBuf, ArchiveError> {
    if let Err(e) = fs::create_dir_all(archive_dir).await {
        error!(error = %e, "Failed to create archive dir");
        return Err(ArchiveError::io(archive_dir.display().to_string(), e));
    }

    let path = archive_dir.join(page_file_name(page));
    fs::write(&path, render_page(items))
        .await
        .map_err(|e| ArchiveError::io(path.display().to_string(), e))?;

    info!(path = %path.display(), count = items.len(), "Page saved");
    Ok(path)
}
