//! Data models for scraped listing items and the messages pushed to subscribers.
//!
//! - [`Item`]: one entry from the listing page, with sentinel values standing
//!   in for any markup the page did not carry
//! - [`Rank`]: the on-page position, or [`Rank::Unknown`] when absent
//! - [`FeedMessage`]: the JSON envelope broadcast to websocket clients
//!
//! Field names on the wire follow the persisted column names (`rankk`,
//! `time`) so clients see the same shape as the table.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const NO_TITLE: &str = "No Title";
pub const NO_URL: &str = "No URL";
pub const NO_SITE: &str = "N/A";
pub const NOT_SCORED: &str = "Not Scored";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_TIME: &str = "Unknown Time";
pub const UNKNOWN_RANK: &str = "unknown";

/// Display position of an item on the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Rank {
    Position(u32),
    Unknown,
}

impl Rank {
    /// Parse the text of a rank cell such as `"31."`.
    ///
    /// Anything that is not a positive integer becomes [`Rank::Unknown`].
    pub fn parse(text: &str) -> Self {
        match text.trim().trim_end_matches('.').parse::<u32>() {
            Ok(n) if n > 0 => Rank::Position(n),
            _ => Rank::Unknown,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Position(n) => write!(f, "{n}"),
            Rank::Unknown => f.write_str(UNKNOWN_RANK),
        }
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.to_string()
    }
}

impl From<String> for Rank {
    fn from(text: String) -> Self {
        Rank::parse(&text)
    }
}

/// One scraped listing entry.
///
/// Built only by the page parser, which substitutes the `NO_*`/`UNKNOWN_*`
/// sentinels for missing sub-fields, so every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Position on the page, serialized as `rankk`.
    #[serde(rename = "rankk")]
    pub rank: Rank,
    pub title: String,
    /// Absolute URL of the linked story.
    pub link: String,
    /// Domain label shown next to the title.
    pub site: String,
    /// Point text such as `"12 points"`.
    pub score: String,
    pub author: String,
    /// Raw relative age, e.g. `"5 minutes ago"`, serialized as `time`.
    #[serde(rename = "time")]
    pub posted_relative: String,
}

/// Envelope pushed to every live subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedMessage {
    #[serde(rename = "newArticles")]
    NewArticles(Vec<Item>),
}

impl FeedMessage {
    /// Titles carried by the message, in order.
    pub fn titles(&self) -> Vec<&str> {
        match self {
            FeedMessage::NewArticles(items) => items.iter().map(|i| i.title.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        Item {
            rank: Rank::Position(1),
            title: "Show HN: A thing".to_string(),
            link: "https://example.com/thing".to_string(),
            site: "example.com".to_string(),
            score: "3 points".to_string(),
            author: "alice".to_string(),
            posted_relative: "2 minutes ago".to_string(),
        }
    }

    #[test]
    fn test_rank_parse() {
        assert_eq!(Rank::parse("31."), Rank::Position(31));
        assert_eq!(Rank::parse(" 7 "), Rank::Position(7));
        assert_eq!(Rank::parse(""), Rank::Unknown);
        assert_eq!(Rank::parse("0."), Rank::Unknown);
        assert_eq!(Rank::parse("abc"), Rank::Unknown);
    }

    #[test]
    fn test_rank_display() {
        assert_eq!(Rank::Position(12).to_string(), "12");
        assert_eq!(Rank::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_item_wire_field_names() {
        let value = serde_json::to_value(sample_item()).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["author", "link", "rankk", "score", "site", "time", "title"]
        );
        assert_eq!(obj["rankk"], "1");
        assert_eq!(obj["time"], "2 minutes ago");
    }

    #[test]
    fn test_feed_message_envelope() {
        let msg = FeedMessage::NewArticles(vec![sample_item()]);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "newArticles");
        assert_eq!(value["data"].as_array().unwrap().len(), 1);
        assert_eq!(value["data"][0]["title"], "Show HN: A thing");
    }

    #[test]
    fn test_feed_message_from_client_side_json() {
        let json = r#"{
            "type": "newArticles",
            "data": [{
                "rankk": "unknown",
                "title": "t",
                "link": "https://x.test/",
                "site": "N/A",
                "score": "Not Scored",
                "author": "Unknown Author",
                "time": "1 hour ago"
            }]
        }"#;

        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.titles(), vec!["t"]);
        let FeedMessage::NewArticles(items) = msg;
        assert_eq!(items[0].rank, Rank::Unknown);
        assert_eq!(items[0].posted_relative, "1 hour ago");
    }
}
