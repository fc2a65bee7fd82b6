//! # vodokanal_news
//!
//! Watches the Saratov water utility's operational-monitoring news page for
//! outage announcements and forwards each new one to a Telegram channel,
//! exactly once.
//!
//! ## Usage
//!
//! ```sh
//! vodokanal_news -c /etc/vodokanal/config.yaml
//! ```
//!
//! Meant to be run from cron. Each invocation is a single sequential pass; a
//! SQLite database remembers which announcements were already delivered.
//!
//! ## Architecture
//!
//! 1. **Indexing**: Fetch the news list and collect detail-page links
//! 2. **Fetching**: Download and parse each not-yet-delivered announcement
//! 3. **Persisting**: Record first sightings in the `news` table
//! 4. **Notifying**: Post to Telegram and mark delivered on success
//!
//! Exit status: `0` on success, `1` when the run aborts (network or database
//! failure, failed `--check`), `2` for usage and configuration errors.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use config::Config;
use notify::TelegramNotifier;
use pipeline::Pipeline;
use scrapers::fetch::HttpPageSource;
use scrapers::kvs::FlagReset;
use store::Store;
use utils::elapsed_ms;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    // Usage errors exit with status 2 from inside clap.
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let result = if args.check {
        check(&args.config, &config).await
    } else {
        run(&args.config, &config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

fn flag_reset(config: &Config) -> FlagReset {
    if config.source.scoped_flags {
        FlagReset::Scoped
    } else {
        FlagReset::TagName
    }
}

#[instrument(level = "info", skip(config))]
async fn run(config_path: &str, config: &Config) -> Result<(), Box<dyn Error>> {
    let started = chrono::Utc::now();
    info!(version = env!("CARGO_PKG_VERSION"), "vodokanal_news starting up");

    let store = Store::open(&config.general.db_path)?;
    let source = HttpPageSource::new(&config.source)?;
    let notifier = TelegramNotifier::new(&config.telegram)?;

    let summary = Pipeline::new(source, notifier, &store, flag_reset(config))
        .run()
        .await?;

    info!(
        %summary,
        elapsed_ms = elapsed_ms(started),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip(config))]
async fn check(config_path: &str, config: &Config) -> Result<(), Box<dyn Error>> {
    let source = HttpPageSource::new(&config.source)?;
    let item = pipeline::check(&source, flag_reset(config)).await?;
    info!(title = ?item.title, "Parser compatibility check passed");
    Ok(())
}
