//! Scraping for the water utility's operational-monitoring news feed.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Indexing**: Fetch the news list page and collect detail-page links
//!    ([`kvs::parse_index`])
//! 2. **Fetching**: Download each detail page and reduce it to a
//!    [`NewsItem`](crate::models::NewsItem) ([`kvs::parse_detail`])
//!
//! Network access lives behind the [`fetch::PageSource`] trait so that the
//! pipeline can be exercised against canned pages.
//!
//! # Markup contract
//!
//! | Page | Marker | Extracted |
//! |------|--------|-----------|
//! | Index | `a.main_btn[href]` | news id and relative URL |
//! | Detail | `h3.pagetitle` | title |
//! | Detail | `div.news-detail` | body paragraphs |
//! | Detail | `div.news-detail span.news-date-time` | date |
//!
//! Class attributes must equal the marker exactly; `class="main_btn big"` does
//! not match. The site changes its layout regularly, and a change shows up as
//! empty results rather than errors; `--check` is the way to notice it.

pub mod fetch;
pub mod kvs;
