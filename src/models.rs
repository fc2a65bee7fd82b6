//! Data models for outage announcements.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsItem`]: An announcement as parsed from a detail page
//! - [`NewsLinks`]: Identifier to relative URL mapping parsed from the index page
//! - [`NewsRecord`]: An announcement as persisted in the `news` table
//! - [`RunSummary`]: Counters reported at the end of a run

use std::collections::BTreeMap;
use std::fmt;

/// Mapping from a site-assigned news identifier to the relative URL of its
/// detail page.
///
/// Keys are unique; re-inserting an identifier overwrites the previous URL, so
/// the last anchor seen on the index page wins. Iteration is ascending by
/// identifier, which is the order the pipeline processes links in.
pub type NewsLinks = BTreeMap<String, String>;

/// A single announcement parsed from a detail page.
///
/// Fields the page did not carry stay `None` rather than failing the parse; a
/// changed page layout and a genuinely missing date look the same here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsItem {
    /// Text of the `h3.pagetitle` heading.
    pub title: Option<String>,
    /// Free-form date string as the site formats it.
    pub date: Option<String>,
    /// Body paragraphs joined with `\n`, in page order.
    pub details: String,
}

/// A row of the `news` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsRecord {
    pub news_id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    /// Set by SQLite on insert; empty for records not yet stored.
    pub created_at: String,
    pub updated_at: String,
    pub details: String,
    /// Absolute URL of the detail page.
    pub news_url: String,
    pub sent: bool,
}

impl NewsRecord {
    /// Build an unsent record for a freshly parsed item.
    pub fn new(news_id: &str, item: &NewsItem, news_url: &str) -> Self {
        Self {
            news_id: news_id.to_string(),
            title: item.title.clone(),
            date: item.date.clone(),
            created_at: String::new(),
            updated_at: String::new(),
            details: item.details.clone(),
            news_url: news_url.to_string(),
            sent: false,
        }
    }
}

/// Outcome counters for one pass over the index page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Links found on the index page.
    pub links: usize,
    /// Links skipped because they were already delivered.
    pub skipped: usize,
    /// Records created during this run.
    pub inserted: usize,
    /// Messages delivered and marked sent.
    pub delivered: usize,
    /// Deliveries that failed and stay pending.
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "links={} skipped={} inserted={} delivered={} failed={}",
            self.links, self.skipped, self.inserted, self.delivered, self.failed
        )
    }
}
