//! Parsers for the kvs-saratov.ru operational-monitoring pages.
//!
//! # URL Pattern
//!
//! Detail pages are linked from the index with relative URLs like
//! `/news/operativnyy-monitoring/<id>/`, where `<id>` is a stable slug made of
//! ASCII letters, digits, `_` and `-`. That slug is the deduplication key.

use crate::models::{NewsItem, NewsLinks};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};
use tracing::{debug, info, instrument};

const NEWS_BUTTON_CLASS: &str = "main_btn";
const TITLE_CLASS: &str = "pagetitle";
const DETAIL_CLASS: &str = "news-detail";
const DATE_CLASS: &str = "news-date-time";

// Anchored at the start only; anything may follow the trailing slash.
static NEWS_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/news/operativnyy-monitoring/(?P<id>[0-9a-zA-Z_-]+)/")
        .expect("news href pattern is valid")
});

/// Extract the news identifier from a detail-page href.
pub fn news_id(href: &str) -> Option<&str> {
    NEWS_HREF
        .captures(href)
        .and_then(|caps| caps.name("id"))
        .map(|m| m.as_str())
}

/// Collect detail-page links from the index page in page order.
///
/// Only `<a>` elements whose `class` is exactly `main_btn` and whose `href`
/// matches the news URL pattern are taken; everything else is ignored. Each
/// identifier appears once, at the position of its first anchor, carrying the
/// href of its last anchor.
///
/// # Arguments
///
/// * `html` - Markup of the index page
///
/// # Returns
///
/// `(news_id, relative_url)` pairs ordered by first appearance on the page.
pub fn index_links(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut links: Vec<(String, String)> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let el = element.value();
        if el.name() != "a" || el.attr("class") != Some(NEWS_BUTTON_CLASS) {
            continue;
        }
        let Some(href) = el.attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let Some(id) = news_id(href) else {
            continue;
        };
        match links.iter_mut().find(|(seen, _)| seen == id) {
            Some(entry) => entry.1 = href.to_string(),
            None => links.push((id.to_string(), href.to_string())),
        }
    }

    links
}

/// Collect detail-page links from the index page, keyed by news identifier.
///
/// Same filtering as [`index_links`]. When an identifier appears more than
/// once the last anchor wins.
///
/// An empty result is not an error here; callers decide what it means.
#[instrument(level = "info", skip_all)]
pub fn parse_index(html: &str) -> NewsLinks {
    let links: NewsLinks = index_links(html).into_iter().collect();

    info!(count = links.len(), "Indexed news links");
    debug!(links = ?links, "News links");
    links
}

/// How detail-page flags are cleared when an element closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlagReset {
    /// Any closing `h3`/`div`/`span` clears the title/detail/date flag,
    /// whichever element opened it. A nested `<div>` inside the detail
    /// container therefore ends the body early.
    #[default]
    TagName,
    /// A flag is cleared only when the element that set it closes.
    Scoped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Title,
    Detail,
    Date,
}

impl Marker {
    fn of(el: &Element) -> Option<Self> {
        match (el.name(), el.attr("class")) {
            ("h3", Some(TITLE_CLASS)) => Some(Marker::Title),
            ("div", Some(DETAIL_CLASS)) => Some(Marker::Detail),
            ("span", Some(DATE_CLASS)) => Some(Marker::Date),
            _ => None,
        }
    }

    fn closed_by(name: &str) -> Option<Self> {
        match name {
            "h3" => Some(Marker::Title),
            "div" => Some(Marker::Detail),
            "span" => Some(Marker::Date),
            _ => None,
        }
    }
}

/// Accumulates a [`NewsItem`] from enter/text/exit events.
#[derive(Debug, Default)]
struct DetailReducer {
    reset: FlagReset,
    in_title: bool,
    in_detail: bool,
    in_date: bool,
    title: Option<String>,
    date: Option<String>,
    paragraphs: Vec<String>,
}

impl DetailReducer {
    fn new(reset: FlagReset) -> Self {
        Self {
            reset,
            ..Self::default()
        }
    }

    fn flag(&mut self, marker: Marker) -> &mut bool {
        match marker {
            Marker::Title => &mut self.in_title,
            Marker::Detail => &mut self.in_detail,
            Marker::Date => &mut self.in_date,
        }
    }

    /// Returns the marker this element switched on, if any.
    fn enter(&mut self, el: &Element) -> Option<Marker> {
        let marker = Marker::of(el)?;
        let flag = self.flag(marker);
        let owned = !*flag;
        *flag = true;
        owned.then_some(marker)
    }

    fn exit(&mut self, el: &Element, opened: Option<Marker>) {
        let cleared = match self.reset {
            FlagReset::TagName => Marker::closed_by(el.name()),
            FlagReset::Scoped => opened,
        };
        if let Some(marker) = cleared {
            *self.flag(marker) = false;
        }
    }

    fn text(&mut self, data: &str) {
        let data = data.trim();
        if self.in_title {
            // Last chunk wins, even a blank one.
            self.title = Some(data.to_string());
        } else if self.in_detail {
            if self.in_date {
                self.date = Some(data.to_string());
            } else if !data.is_empty() {
                self.paragraphs.push(data.to_string());
            }
        }
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        let opened = self.enter(element.value());
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.walk(child);
                    }
                }
                _ => {}
            }
        }
        self.exit(element.value(), opened);
    }

    fn finish(self) -> NewsItem {
        NewsItem {
            title: self.title,
            date: self.date,
            details: self.paragraphs.join("\n"),
        }
    }
}

/// Reduce a detail page to a [`NewsItem`].
///
/// Missing markers never fail the parse: the title and date come back as
/// `None` and the details as an empty string.
#[instrument(level = "info", skip(html))]
pub fn parse_detail(html: &str, reset: FlagReset) -> NewsItem {
    let document = Html::parse_document(html);
    let mut reducer = DetailReducer::new(reset);
    reducer.walk(document.root_element());
    let item = reducer.finish();

    debug!(
        title = ?item.title,
        date = ?item.date,
        bytes = item.details.len(),
        "Parsed news detail"
    );
    item
}
