//! YAML configuration loading.
//!
//! ```yaml
//! general:
//!   db_path: /var/lib/vodokanal/news.db
//! telegram:
//!   bot_token: "123456:ABC"
//!   bot_proxy: socks5://127.0.0.1:9050   # optional
//!   channel: "@saratov_water"
//! source:                                # optional
//!   base_url: http://kvs-saratov.ru
//!   index_path: /news/operativnyy-monitoring/
//!   scoped_flags: false
//! ```
//!
//! The file is deserialized into loose `Raw*` structs first so that a missing
//! entry is reported by its dotted name instead of as a YAML error.

use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://kvs-saratov.ru";
pub const DEFAULT_INDEX_PATH: &str = "/news/operativnyy-monitoring/";

/// Fully validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub telegram: TelegramConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    /// Location of the SQLite database.
    pub db_path: PathBuf,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Outbound proxy for Bot API calls (`http://`, `https://` or `socks5://`).
    pub bot_proxy: Option<String>,
    /// Destination chat: `@channelname` or a numeric chat id.
    pub channel: String,
}

// Keeps the bot token out of debug logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("bot_proxy", &self.bot_proxy)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Where and how to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
    pub index_path: String,
    /// Clear detail-page flags only when the marking element closes, instead of
    /// on any closing tag with the same name.
    pub scoped_flags: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_path: DEFAULT_INDEX_PATH.to_string(),
            scoped_flags: false,
        }
    }
}

/// Reasons a configuration file cannot be used.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Read(PathBuf, std::io::Error),
    /// The file is not valid YAML for this schema.
    Parse(serde_yaml::Error),
    /// A required entry is absent or empty, named as `section.key`.
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, e) => {
                write!(f, "Error reading config file {}: {}", path.display(), e)
            }
            ConfigError::Parse(e) => write!(f, "Error reading config file: {}", e),
            ConfigError::Missing(key) => write!(f, "Missing required config file entry: {}", key),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Read(_, e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Missing(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    general: Option<RawGeneral>,
    telegram: Option<RawTelegram>,
    source: Option<RawSource>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGeneral {
    db_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTelegram {
    bot_token: Option<String>,
    bot_proxy: Option<String>,
    channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSource {
    base_url: Option<String>,
    index_path: Option<String>,
    scoped_flags: Option<bool>,
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

impl Config {
    /// Read and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config = Self::from_yaml(&text)?;
        debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not a mapping.
        let raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(text).map_err(ConfigError::Parse)?
        };

        let general = raw.general.ok_or(ConfigError::Missing("general"))?;
        let db_path = general
            .db_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("general.db_path"))?;

        let telegram = raw.telegram.ok_or(ConfigError::Missing("telegram"))?;
        let bot_token = required(telegram.bot_token, "telegram.bot_token")?;
        let channel = required(telegram.channel, "telegram.channel")?;
        let bot_proxy = telegram.bot_proxy.filter(|p| !p.trim().is_empty());

        let source = raw.source.unwrap_or_default();
        let defaults = SourceConfig::default();
        let source = SourceConfig {
            base_url: source
                .base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            index_path: source.index_path.unwrap_or(defaults.index_path),
            scoped_flags: source.scoped_flags.unwrap_or(defaults.scoped_flags),
        };

        Ok(Config {
            general: GeneralConfig { db_path },
            telegram: TelegramConfig {
                bot_token,
                bot_proxy,
                channel,
            },
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
general:
  db_path: /tmp/news.db
telegram:
  bot_token: "123:abc"
  bot_proxy: socks5://127.0.0.1:9050
  channel: "@water"
source:
  base_url: http://mirror.test/
  index_path: /news/
  scoped_flags: true
"#;

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(FULL).unwrap();

        assert_eq!(config.general.db_path, PathBuf::from("/tmp/news.db"));
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(
            config.telegram.bot_proxy.as_deref(),
            Some("socks5://127.0.0.1:9050")
        );
        assert_eq!(config.telegram.channel, "@water");
        assert_eq!(config.source.base_url, "http://mirror.test");
        assert_eq!(config.source.index_path, "/news/");
        assert!(config.source.scoped_flags);
    }

    #[test]
    fn test_source_defaults() {
        let config = Config::from_yaml(
            "general:\n  db_path: news.db\ntelegram:\n  bot_token: t\n  channel: c\n",
        )
        .unwrap();

        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.telegram.bot_proxy, None);
    }

    #[test]
    fn test_missing_channel() {
        let err = Config::from_yaml("general:\n  db_path: news.db\ntelegram:\n  bot_token: t\n")
            .unwrap_err();

        assert!(matches!(err, ConfigError::Missing("telegram.channel")));
        assert_eq!(
            err.to_string(),
            "Missing required config file entry: telegram.channel"
        );
    }

    #[test]
    fn test_missing_general_section() {
        let err = Config::from_yaml("telegram:\n  bot_token: t\n  channel: c\n").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("general")));
    }

    #[test]
    fn test_empty_file() {
        let err = Config::from_yaml("").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("general")));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Config::from_yaml("general: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.telegram.channel, "@water");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/vodokanal.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_, _)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::from_yaml(FULL).unwrap();
        let dbg = format!("{:?}", config.telegram);
        assert!(!dbg.contains("123:abc"));
    }
}
