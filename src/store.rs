//! Article table writer.
//!
//! Items are stored one row per rank in an `articles` table. Re-seeing a rank
//! only refreshes its score and age; title, site, link and author keep the
//! values from the first insert. Only items inside the freshness window are
//! written at all.
//!
//! The store runs on a single SQLite connection, so writes are strictly
//! sequential and there are no multi-row transactions.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::models::{Item, Rank};
use crate::recency::is_fresh;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS articles (
        rankk  TEXT PRIMARY KEY,
        title  TEXT NOT NULL,
        site   TEXT NOT NULL,
        link   TEXT NOT NULL,
        author TEXT NOT NULL,
        score  TEXT NOT NULL,
        posted TEXT NOT NULL
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO articles (rankk, title, site, link, author, score, posted)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(rankk) DO UPDATE SET
        score = excluded.score,
        posted = excluded.posted
"#;

/// A row of the `articles` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub rank: Rank,
    pub title: String,
    pub site: String,
    pub link: String,
    pub author: String,
    pub score: String,
    /// Raw relative age as scraped, not a normalized timestamp.
    pub posted: String,
}

type ArticleTuple = (String, String, String, String, String, String, String);

fn row_to_article(row: ArticleTuple) -> StoredArticle {
    let (rankk, title, site, link, author, score, posted) = row;
    StoredArticle {
        rank: Rank::parse(&rankk),
        title,
        site,
        link,
        author,
        score,
        posted,
    }
}

/// Handle on the article table.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
    window_minutes: i64,
}

impl ArticleStore {
    /// Open `database_url` on a single connection and make sure the table exists.
    #[instrument(level = "info", skip_all, fields(%database_url, window_minutes = window_minutes))]
    pub async fn connect(database_url: &str, window_minutes: i64) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        info!("Connected to article store");

        Ok(Self {
            pool,
            window_minutes,
        })
    }

    /// Delete every stored article.
    #[instrument(level = "info", skip_all)]
    pub async fn reset(&self) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM articles").execute(&self.pool).await?;
        info!(removed = result.rows_affected(), "Cleared the articles table");
        Ok(())
    }

    /// Upsert the items that are fresh as of now.
    pub async fn persist(&self, items: &[Item]) -> Result<usize, StoreError> {
        self.persist_at(items, Utc::now()).await
    }

    /// Upsert the items that are fresh as of `now`.
    ///
    /// # Arguments
    ///
    /// * `items` - Items as scraped, stale ones included
    /// * `now` - Reference time for the freshness window
    ///
    /// # Returns
    ///
    /// How many rows were written. The first failing row aborts the rest of
    /// the batch with [`StoreError::Database`].
    #[instrument(level = "info", skip_all, fields(candidates = items.len()))]
    pub async fn persist_at(&self, items: &[Item], now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut written = 0;
        for item in items
            .iter()
            .filter(|item| is_fresh(&item.posted_relative, now, self.window_minutes))
        {
            sqlx::query(UPSERT)
                .bind(item.rank.to_string())
                .bind(&item.title)
                .bind(&item.site)
                .bind(&item.link)
                .bind(&item.author)
                .bind(&item.score)
                .bind(&item.posted_relative)
                .execute(&self.pool)
                .await?;
            debug!(rank = %item.rank, title = %item.title, "Upserted article");
            written += 1;
        }

        info!(written, "Articles saved to the store");
        Ok(written)
    }

    /// All stored articles, known ranks first in ascending order.
    pub async fn articles(&self) -> Result<Vec<StoredArticle>, StoreError> {
        let rows = sqlx::query_as::<_, ArticleTuple>(
            r#"
            SELECT rankk, title, site, link, author, score, posted
            FROM articles
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut articles: Vec<StoredArticle> = rows.into_iter().map(row_to_article).collect();
        articles.sort_by_key(|a| match a.rank {
            Rank::Position(n) => (0, n),
            Rank::Unknown => (1, 0),
        });
        Ok(articles)
    }

    /// Close the underlying connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Article store closed");
    }
}
