//! Page fetching.

use crate::config::SourceConfig;
use reqwest::Client;
use std::error::Error;
use tracing::{debug, info, instrument};
use url::Url;

/// Source of index and detail page markup.
pub trait PageSource {
    /// Base URL that relative news links are appended to, without a trailing slash.
    fn base_url(&self) -> &str;

    /// Fetch the news index page.
    async fn fetch_index(&self) -> Result<String, Box<dyn Error>>;

    /// Fetch a detail page by its site-relative URL.
    async fn fetch_detail(&self, relative_url: &str) -> Result<String, Box<dyn Error>>;

    /// Absolute URL of a detail page, as stored and announced.
    fn absolute_url(&self, relative_url: &str) -> String {
        format!("{}{}", self.base_url(), relative_url)
    }
}

/// [`PageSource`] backed by plain HTTP GET requests.
///
/// There are no retries and no timeout: any failure aborts the run, and the
/// next scheduled run starts over.
#[derive(Debug)]
pub struct HttpPageSource {
    client: Client,
    base_url: String,
    index_url: Url,
}

impl HttpPageSource {
    pub fn new(source: &SourceConfig) -> Result<Self, Box<dyn Error>> {
        let base = Url::parse(&source.base_url)?;
        let index_url = base.join(&source.index_path)?;
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: source.base_url.trim_end_matches('/').to_string(),
            index_url,
        })
    }

    /// GET `url` and decode the body as strict UTF-8.
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let text = String::from_utf8(bytes.to_vec())?;
        debug!(%url, bytes = text.len(), "Fetched page");
        Ok(text)
    }
}

impl PageSource for HttpPageSource {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(level = "info", skip_all, fields(url = %self.index_url))]
    async fn fetch_index(&self) -> Result<String, Box<dyn Error>> {
        let html = self.get_text(self.index_url.as_str()).await?;
        info!(bytes = html.len(), "Fetched news index");
        Ok(html)
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_detail(&self, relative_url: &str) -> Result<String, Box<dyn Error>> {
        self.get_text(&self.absolute_url(relative_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_from_default_source() {
        let source = HttpPageSource::new(&SourceConfig::default()).unwrap();

        assert_eq!(source.base_url(), "http://kvs-saratov.ru");
        assert_eq!(
            source.index_url.as_str(),
            "http://kvs-saratov.ru/news/operativnyy-monitoring/"
        );
        assert_eq!(
            source.absolute_url("/news/operativnyy-monitoring/abc-123/"),
            "http://kvs-saratov.ru/news/operativnyy-monitoring/abc-123/"
        );
    }

    #[test]
    fn test_trailing_slash_on_base() {
        let config = SourceConfig {
            base_url: "http://mirror.test/".to_string(),
            ..SourceConfig::default()
        };
        let source = HttpPageSource::new(&config).unwrap();

        assert_eq!(source.absolute_url("/news/x/"), "http://mirror.test/news/x/");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = SourceConfig {
            base_url: "not a url".to_string(),
            ..SourceConfig::default()
        };
        assert!(HttpPageSource::new(&config).is_err());
    }
}
