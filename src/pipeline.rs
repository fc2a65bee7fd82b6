//! The single-pass scrape → persist → notify run.
//!
//! ```text
//! FETCH_INDEX → PARSE_INDEX → for each link, ascending by id:
//!     CHECK_STATUS → (skip if sent) → FETCH_DETAIL → PARSE_DETAIL
//!     → PERSIST_IF_NEW → NOTIFY → MARK_SENT_ON_SUCCESS
//! ```
//!
//! Fetch and database errors abort the run with whatever was already
//! committed kept. Delivery errors are logged and leave the record unsent;
//! the next run fetches and parses the page again and retries with the fresh
//! content, never with the stored copy.

use crate::models::{NewsItem, NewsRecord, RunSummary};
use crate::notify::{Notifier, format_message};
use crate::scrapers::fetch::PageSource;
use crate::scrapers::kvs::{FlagReset, index_links, parse_detail, parse_index};
use crate::store::Store;
use crate::utils::truncate_for_log;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};

/// One scrape-persist-notify pass over the index page.
///
/// The pipeline borrows the [`Store`] so that the caller can inspect it after
/// the run; the page source and notifier are owned.
pub struct Pipeline<'a, S, N> {
    source: S,
    notifier: N,
    store: &'a Store,
    reset: FlagReset,
}

impl<'a, S, N> Pipeline<'a, S, N>
where
    S: PageSource,
    N: Notifier,
{
    /// Assemble a pipeline from its collaborators.
    ///
    /// # Arguments
    ///
    /// * `source` - Where the index and detail pages come from
    /// * `notifier` - Delivers formatted announcements
    /// * `store` - Records which announcements exist and which were sent
    /// * `reset` - How the detail parser clears its flags
    ///
    /// # Returns
    ///
    /// A pipeline ready for [`Pipeline::run`].
    pub fn new(source: S, notifier: N, store: &'a Store, reset: FlagReset) -> Self {
        Self {
            source,
            notifier,
            store,
            reset,
        }
    }

    /// Process every link on the index page once.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<RunSummary, Box<dyn Error>> {
        let html = self.source.fetch_index().await?;
        let links = parse_index(&html);
        if links.is_empty() {
            warn!("No news links found on the index page; has the layout changed?");
        }

        let mut summary = RunSummary {
            links: links.len(),
            ..RunSummary::default()
        };

        for (news_id, href) in &links {
            let status = self.store.status(news_id)?;
            if status == Some(true) {
                debug!(%news_id, "Already sent");
                summary.skipped += 1;
                continue;
            }

            let page = self.source.fetch_detail(href).await?;
            let item = parse_detail(&page, self.reset);
            if item.title.is_none() {
                warn!(%news_id, %href, "Detail page has no title");
            }
            let news_url = self.source.absolute_url(href);

            match status {
                None => {
                    if self.store.insert(&NewsRecord::new(news_id, &item, &news_url))? {
                        info!(%news_id, title = ?item.title, "New announcement");
                        summary.inserted += 1;
                    }
                }
                Some(_) => {
                    if let Some(record) = self.store.get(news_id)? {
                        info!(
                            %news_id,
                            first_seen = %record.created_at,
                            last_update = %record.updated_at,
                            "Retrying delivery"
                        );
                    }
                }
            }

            let message = format_message(&item, self.source.base_url(), href);
            match self.notifier.deliver(&message).await {
                Ok(()) => {
                    self.store.mark_sent(news_id)?;
                    summary.delivered += 1;
                }
                Err(e) => {
                    error!(
                        %news_id,
                        error = %e,
                        preview = %truncate_for_log(&message, 300),
                        "Failed to send message; will retry next run"
                    );
                    summary.failed += 1;
                }
            }
        }

        let pending = self.store.pending()?;
        info!(%summary, pending = pending.len(), "Run finished");
        if !pending.is_empty() {
            debug!(?pending, "Undelivered announcements");
        }
        Ok(summary)
    }
}

/// Parser compatibility check against the live site.
///
/// Fetches the index, requires at least one link, then fetches and parses the
/// detail page of the last link in page order and requires a title. Neither
/// the database nor the notifier is touched.
#[instrument(level = "info", skip_all)]
pub async fn check<S: PageSource>(source: &S, reset: FlagReset) -> Result<NewsItem, Box<dyn Error>> {
    let links = index_links(&source.fetch_index().await?);
    let Some((news_id, href)) = links.last() else {
        return Err("index page yielded no news links".into());
    };
    info!(links = links.len(), %news_id, "Index parses");

    let item = parse_detail(&source.fetch_detail(href).await?, reset);
    if item.title.is_none() {
        return Err(format!("detail page {} yielded no title", href).into());
    }
    info!(title = ?item.title, date = ?item.date, bytes = item.details.len(), "Detail parses");
    Ok(item)
}
