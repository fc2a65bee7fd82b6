//! Command-line interface definitions for vodokanal_news.
//!
//! This module defines the CLI arguments using the `clap` crate. Usage errors
//! (for instance a missing `-c`) make clap print usage and exit with status 2.

use clap::Parser;

/// Command-line arguments for the vodokanal_news application.
///
/// # Examples
///
/// ```sh
/// # Regular run, typically from cron
/// vodokanal_news -c /etc/vodokanal/config.yaml
///
/// # Check that the scraper still understands the site
/// vodokanal_news -c /etc/vodokanal/config.yaml --check
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: String,

    /// Only verify that the index and detail pages still parse; touches
    /// neither the database nor Telegram
    #[arg(long)]
    pub check: bool,
}
