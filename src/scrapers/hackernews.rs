//! Hacker News "newest" listing scraper.
//!
//! Scrapes `https://news.ycombinator.com/newest?p=N`. Each story is a
//! `tr.athing` row (rank, title link, site) followed by a row whose
//! `td.subtext` cell carries score, author and age. The two are paired by
//! position, so the n-th subtext belongs to the n-th story.
//!
//! Missing sub-fields fall back to the sentinels in [`crate::models`]; only a
//! page with no listing table at all is treated as an error.

use async_trait::async_trait;
use itertools::{EitherOrBoth, Itertools};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::ListingSource;
use crate::error::FetchError;
use crate::models::{
    Item, NOT_SCORED, NO_SITE, NO_TITLE, NO_URL, Rank, UNKNOWN_AUTHOR, UNKNOWN_TIME,
};

pub const MIN_PAGE: u32 = 1;
pub const MAX_PAGE: u32 = 20;

pub const DEFAULT_BASE_URL: &str = "https://news.ycombinator.com";

static LISTING_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("#hnmain").unwrap());
static ITEM_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr.athing").unwrap());
static SUBTEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("td.subtext").unwrap());
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".titleline > a").unwrap());
static RANK: Lazy<Selector> = Lazy::new(|| Selector::parse(".rank").unwrap());
static SITE: Lazy<Selector> = Lazy::new(|| Selector::parse(".sitestr").unwrap());
static SCORE: Lazy<Selector> = Lazy::new(|| Selector::parse(".score").unwrap());
static AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse(".hnuser").unwrap());
static AGE: Lazy<Selector> = Lazy::new(|| Selector::parse(".age").unwrap());

/// Reject page numbers the listing does not serve.
pub fn check_page(page: u32) -> Result<(), FetchError> {
    if (MIN_PAGE..=MAX_PAGE).contains(&page) {
        Ok(())
    } else {
        Err(FetchError::InvalidPage(page))
    }
}

/// HTTP-backed [`ListingSource`] for the newest listing.
#[derive(Debug, Clone)]
pub struct HackerNews {
    client: Client,
    base_url: Url,
}

impl HackerNews {
    /// Build a scraper rooted at `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// URL of listing page `page`.
    pub fn page_url(&self, page: u32) -> Result<Url, FetchError> {
        let mut url = self.base_url.join("newest")?;
        url.query_pairs_mut().append_pair("p", &page.to_string());
        Ok(url)
    }
}

#[async_trait]
impl ListingSource for HackerNews {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, page: u32) -> Result<Vec<Item>, FetchError> {
        check_page(page)?;
        let url = self.page_url(page)?;

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(%url, %status, "Listing returned non-OK status");
            return Err(FetchError::Status { page, status });
        }

        let html = response.text().await?;
        let items = parse_listing(&html, &self.base_url, page)?;
        info!(page, count = items.len(), "Fetched listing page");
        Ok(items)
    }
}

/// Extract items from the markup of listing page `page`.
///
/// # Arguments
///
/// * `html` - Raw body of the listing page
/// * `base_url` - Root used to resolve relative story links
/// * `page` - Page number, for errors and logs
///
/// # Returns
///
/// The items in on-page order, or [`FetchError::MissingMarkup`] when the
/// body has no `#hnmain` table.
pub fn parse_listing(html: &str, base_url: &Url, page: u32) -> Result<Vec<Item>, FetchError> {
    let document = Html::parse_document(html);
    if document.select(&LISTING_TABLE).next().is_none() {
        return Err(FetchError::MissingMarkup(page));
    }

    let items: Vec<Item> = document
        .select(&ITEM_ROW)
        .zip_longest(document.select(&SUBTEXT))
        .filter_map(|pair| match pair {
            EitherOrBoth::Both(row, subtext) => Some(build_item(row, Some(subtext), base_url)),
            EitherOrBoth::Left(row) => Some(build_item(row, None, base_url)),
            EitherOrBoth::Right(_) => None,
        })
        .collect();

    debug!(page, count = items.len(), "Parsed listing rows");
    Ok(items)
}

fn build_item(row: ElementRef<'_>, subtext: Option<ElementRef<'_>>, base_url: &Url) -> Item {
    let title_link = row.select(&TITLE_LINK).next();

    let title = title_link
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());
    let link = title_link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok())
        .map(String::from)
        .unwrap_or_else(|| NO_URL.to_string());
    let rank = first_text(row, &RANK)
        .map(|t| Rank::parse(&t))
        .unwrap_or(Rank::Unknown);
    let site = first_text(row, &SITE).unwrap_or_else(|| NO_SITE.to_string());

    let field = |selector: &Selector, fallback: &str| {
        subtext
            .and_then(|cell| first_text(cell, selector))
            .unwrap_or_else(|| fallback.to_string())
    };

    Item {
        rank,
        title,
        link,
        site,
        score: field(&SCORE, NOT_SCORED),
        author: field(&AUTHOR, UNKNOWN_AUTHOR),
        posted_relative: field(&AGE, UNKNOWN_TIME),
    }
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
