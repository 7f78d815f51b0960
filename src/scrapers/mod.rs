//! Listing scrapers.
//!
//! A scraper turns one numbered page of a listing into [`Item`]s. The poll
//! loop and the initial load only see the [`ListingSource`] trait, so a
//! canned page can stand in for the network in tests.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Hacker News newest | [`hackernews`] | HTML scraping | Pages 1-20 via `?p=` |

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::Item;

pub mod hackernews;

/// Something that can produce the items on a numbered listing page.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch page `page` and return its items in on-page order.
    async fn fetch(&self, page: u32) -> Result<Vec<Item>, FetchError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::Rank;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned listing that records which pages were requested.
    #[derive(Debug, Default)]
    pub struct StaticSource {
        items: Vec<Item>,
        fail: bool,
        calls: AtomicUsize,
        pages: Mutex<Vec<u32>>,
    }

    impl StaticSource {
        pub fn new(items: Vec<Item>) -> Self {
            Self {
                items,
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn pages(&self) -> Vec<u32> {
            self.pages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingSource for StaticSource {
        async fn fetch(&self, page: u32) -> Result<Vec<Item>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.lock().unwrap().push(page);
            if self.fail {
                return Err(FetchError::MissingMarkup(page));
            }
            Ok(self.items.clone())
        }
    }

    pub fn item(rank: u32, title: &str, posted: &str) -> Item {
        Item {
            rank: Rank::Position(rank),
            title: title.to_string(),
            link: format!("https://example.com/{rank}"),
            site: "example.com".to_string(),
            score: "1 point".to_string(),
            author: "erin".to_string(),
            posted_relative: posted.to_string(),
        }
    }
}
