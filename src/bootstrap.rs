//! Initial batch load run before the poll loop starts.
//!
//! Clears the store, then walks pages `1..=pages` in order, one fetch at a
//! time. Each page is archived in full and then persisted (the store applies
//! its freshness window). Any failure aborts the load; startup treats it as
//! fatal.

use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::error::BootstrapError;
use crate::outputs::archive;
use crate::scrapers::ListingSource;
use crate::scrapers::hackernews::{MAX_PAGE, MIN_PAGE};
use crate::store::ArticleStore;

/// Validate an operator-supplied page count.
pub fn check_page_count(pages: u32) -> Result<u32, BootstrapError> {
    if (MIN_PAGE..=MAX_PAGE).contains(&pages) {
        Ok(pages)
    } else {
        Err(BootstrapError::InvalidPageCount(pages))
    }
}

/// Reset the store and load the first `pages` pages.
///
/// # Arguments
///
/// * `pages` - Number of pages to load, `1..=20`
/// * `source` - Listing to fetch from
/// * `store` - Cleared first, then fed each page through its freshness filter
/// * `archive_dir` - Where the unfiltered page archives go
///
/// # Returns
///
/// The archive files written, in page order. Any error aborts the load.
#[instrument(level = "info", skip(source, store, archive_dir))]
pub async fn initial_load(
    pages: u32,
    source: &dyn ListingSource,
    store: &ArticleStore,
    archive_dir: &Path,
) -> Result<Vec<PathBuf>, BootstrapError> {
    check_page_count(pages)?;
    store.reset().await?;

    let mut archives = Vec::with_capacity(pages as usize);
    for page in MIN_PAGE..=pages {
        info!(page, "Fetching page");
        let items = source.fetch(page).await?;
        archives.push(archive::write_page(archive_dir, page, &items).await?);
        store.persist(&items).await?;
    }

    info!(pages, "Initial scraping task completed");
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::{StaticSource, item};

    async fn store() -> ArticleStore {
        ArticleStore::connect("sqlite::memory:", 5).await.unwrap()
    }

    #[test]
    fn test_check_page_count() {
        assert_eq!(check_page_count(1).unwrap(), 1);
        assert_eq!(check_page_count(20).unwrap(), 20);
        assert!(matches!(check_page_count(0), Err(BootstrapError::InvalidPageCount(0))));
        assert!(matches!(check_page_count(21), Err(BootstrapError::InvalidPageCount(21))));
    }

    #[tokio::test]
    async fn test_two_pages_yield_two_archives() {
        let tmp = tempfile::tempdir().unwrap();
        let source = StaticSource::new(vec![
            item(1, "fresh", "3 minutes ago"),
            item(2, "stale", "2 hours ago"),
        ]);
        let store = store().await;

        let archives = initial_load(2, &source, &store, tmp.path()).await.unwrap();

        assert_eq!(
            archives,
            vec![tmp.path().join("NewsPage1.txt"), tmp.path().join("NewsPage2.txt")]
        );
        for path in &archives {
            let text = std::fs::read_to_string(path).unwrap();
            // Archives keep the whole page, stale items included.
            assert!(text.contains("Article Title: stale"));
        }
        assert_eq!(source.pages(), vec![1, 2]);
        assert_eq!(store.articles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_clears_previous_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store().await;
        store.persist(&[item(9, "leftover", "1 minute ago")]).await.unwrap();

        let source = StaticSource::new(vec![]);
        initial_load(1, &source, &store, tmp.path()).await.unwrap();

        assert!(store.articles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_load() {
        let tmp = tempfile::tempdir().unwrap();
        let source = StaticSource::failing();

        let err = initial_load(3, &source, &store().await, tmp.path())
            .await
            .unwrap_err();

        assert!(matches!(err, BootstrapError::Fetch(_)));
        assert_eq!(source.calls(), 1);
        assert!(!tmp.path().join("NewsPage1.txt").exists());
    }

    #[tokio::test]
    async fn test_invalid_count_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = StaticSource::new(vec![]);

        let err = initial_load(0, &source, &store().await, tmp.path())
            .await
            .unwrap_err();

        assert!(matches!(err, BootstrapError::InvalidPageCount(0)));
        assert_eq!(source.calls(), 0);
    }
}
