//! Newest Feed library.
//!
//! Scrapes the Hacker News "newest" listing, keeps fresh items in SQLite and
//! fans each scraped page out to websocket subscribers. The binary in
//! `main.rs` wires these modules to the operator prompts.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod models;
pub mod outputs;
pub mod poll;
pub mod recency;
pub mod scrapers;
pub mod store;
pub mod utils;
