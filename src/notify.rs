//! Delivery of announcements to a Telegram channel.
//!
//! # Architecture
//!
//! - [`Notifier`]: trait for anything that can deliver a formatted message
//! - [`TelegramNotifier`]: Bot API `sendMessage` client built on `reqwest`
//! - [`format_message`]: renders a [`NewsItem`] in Telegram's legacy Markdown
//!
//! Delivery failures are returned to the caller, which logs them and leaves
//! the announcement unsent so that the next run tries again.

use crate::config::TelegramConfig;
use crate::models::NewsItem;
use crate::utils::truncate_for_log;
use reqwest::{Client, Proxy};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::fmt;
use tracing::{debug, info, instrument};

const TELEGRAM_API: &str = "https://api.telegram.org";
const PARSE_MODE: &str = "Markdown";

/// Something that can deliver a message to the announcement channel.
pub trait Notifier {
    async fn deliver(&self, text: &str) -> Result<(), Box<dyn Error>>;
}

/// Render an announcement as a Markdown message.
///
/// Layout, one part per line: bold title, body, absolute link. Underscores in
/// the link path are escaped so Telegram does not read them as italics. A
/// missing or empty title drops the title line instead of sending `**`.
pub fn format_message(item: &NewsItem, base_url: &str, relative_url: &str) -> String {
    let mut lines = Vec::with_capacity(3);
    if let Some(title) = item.title.as_deref().filter(|t| !t.is_empty()) {
        lines.push(format!("*{}*", title));
    }
    lines.push(item.details.clone());
    lines.push(format!("{}{}", base_url, relative_url.replace('_', "\\_")));
    lines.join("\n")
}

/// Error reported by the Bot API itself.
#[derive(Debug)]
pub struct TelegramError {
    pub status: u16,
    pub description: String,
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Telegram API error {}: {}", self.status, self.description)
    }
}

impl Error for TelegramError {}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Posts messages to one channel through the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    channel: String,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("channel", &self.channel)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, Box<dyn Error>> {
        Self::with_api_base(config, TELEGRAM_API)
    }

    /// Same as [`TelegramNotifier::new`] against a different Bot API server.
    pub fn with_api_base(config: &TelegramConfig, api_base: &str) -> Result<Self, Box<dyn Error>> {
        let mut builder = Client::builder();
        if let Some(proxy) = &config.bot_proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
            debug!(%proxy, "Using Telegram proxy");
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                config.bot_token
            ),
            channel: config.channel.clone(),
        })
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(level = "info", skip_all, fields(channel = %self.channel))]
    async fn deliver(&self, text: &str) -> Result<(), Box<dyn Error>> {
        let payload = json!({
            "chat_id": self.channel,
            "text": text,
            "parse_mode": PARSE_MODE,
        });

        // The endpoint carries the bot token, so transport errors drop the URL.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;

        // Telegram answers errors with a JSON body too; fall back to the raw
        // text when it is something else (a proxy error page, for instance).
        let parsed = serde_json::from_str::<ApiResponse>(&body).ok();
        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                info!(bytes = text.len(), "Telegram message sent");
                Ok(())
            }
            Some(ApiResponse { description, .. }) => Err(TelegramError {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "no description".to_string()),
            }
            .into()),
            None => Err(TelegramError {
                status: status.as_u16(),
                description: truncate_for_log(&body, 200),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(proxy: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            bot_proxy: proxy.map(str::to_string),
            channel: "@water".to_string(),
        }
    }

    #[test]
    fn test_format_message() {
        let item = NewsItem {
            title: Some("Outage".to_string()),
            date: Some("2024-01-01".to_string()),
            details: "Water will be off.\nStreets: Lenina".to_string(),
        };

        let msg = format_message(
            &item,
            "http://kvs-saratov.ru",
            "/news/operativnyy-monitoring/abc_123/",
        );

        assert_eq!(
            msg,
            "*Outage*\nWater will be off.\nStreets: Lenina\nhttp://kvs-saratov.ru/news/operativnyy-monitoring/abc\\_123/"
        );
    }

    #[test]
    fn test_format_message_without_title() {
        let item = NewsItem {
            title: None,
            date: None,
            details: "Body".to_string(),
        };

        let msg = format_message(&item, "http://x", "/a/");

        assert_eq!(msg, "Body\nhttp://x/a/");
    }

    #[test]
    fn test_endpoint() {
        let notifier = TelegramNotifier::with_api_base(&config(None), "http://localhost:8081/").unwrap();
        assert_eq!(notifier.endpoint, "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn test_debug_hides_token() {
        let notifier = TelegramNotifier::new(&config(Some("socks5://127.0.0.1:9050"))).unwrap();
        assert!(!format!("{:?}", notifier).contains("123:abc"));
    }

    /// Serve one canned HTTP response and return the server's base URL.
    async fn canned_api(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the whole request before answering.
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_deliver_unreachable_is_error() {
        // Nothing listens on the discard port.
        let notifier = TelegramNotifier::with_api_base(&config(None), "http://127.0.0.1:9").unwrap();
        assert!(notifier.deliver("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        let mut cfg = config(None);
        cfg.bot_token = "123:SECRETTOKEN".to_string();
        let notifier = TelegramNotifier::with_api_base(&cfg, "http://127.0.0.1:9").unwrap();

        let err = notifier.deliver("hello").await.unwrap_err();

        assert!(!err.to_string().contains("SECRETTOKEN"));
        assert!(!format!("{:?}", err).contains("SECRETTOKEN"));
    }

    #[tokio::test]
    async fn test_deliver_ok() {
        let base = canned_api("200 OK", r#"{"ok":true,"result":{"message_id":1}}"#).await;
        let notifier = TelegramNotifier::with_api_base(&config(None), &base).unwrap();

        assert!(notifier.deliver("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_api_rejection() {
        let base = canned_api(
            "400 Bad Request",
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        )
        .await;
        let notifier = TelegramNotifier::with_api_base(&config(None), &base).unwrap();

        let err = notifier.deliver("hello").await.unwrap_err();

        assert!(err.to_string().contains("chat not found"));
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_deliver_not_ok_with_success_status() {
        let base = canned_api("200 OK", r#"{"ok":false,"description":"Flood control"}"#).await;
        let notifier = TelegramNotifier::with_api_base(&config(None), &base).unwrap();

        let err = notifier.deliver("hello").await.unwrap_err();

        assert!(err.to_string().contains("Flood control"));
    }

    #[tokio::test]
    async fn test_deliver_non_json_error_page() {
        let base = canned_api("502 Bad Gateway", "<html><body>Bad Gateway</body></html>").await;
        let notifier = TelegramNotifier::with_api_base(&config(None), &base).unwrap();

        let err = notifier.deliver("hello").await.unwrap_err();

        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("Bad Gateway"));
    }
}
