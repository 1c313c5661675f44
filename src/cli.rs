//! Command-line interface definitions.
//!
//! Two subcommands mirror the two pipelines: `links` walks a date range of
//! index pages and writes the links sink; `content` reads a links sink back
//! and writes the content sink. Browser and batching options are shared.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Parse a `YYYYMMDD` date argument.
fn parse_compact_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {e}"))
}

/// Crawl Naver breaking news: collect article links per date, then article
/// content per link, into append-only CSV sinks.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect article links for a date range of index pages
    Links(LinksArgs),
    /// Fetch and extract article content for previously collected links
    Content(ContentArgs),
}

#[derive(Args, Debug)]
pub struct LinksArgs {
    /// First date to crawl, inclusive (YYYYMMDD)
    #[arg(long, value_parser = parse_compact_date)]
    pub start_date: NaiveDate,

    /// Last date to crawl, inclusive (YYYYMMDD)
    #[arg(long, value_parser = parse_compact_date)]
    pub end_date: NaiveDate,

    /// Output CSV for (date, url) rows
    #[arg(short, long, default_value = "news_links.csv")]
    pub out: String,

    /// Concurrent index workers (each holds a real browser session)
    #[arg(long, default_value_t = 3)]
    pub workers: usize,

    /// Breaking-news section path under /breakingnews/section/
    #[arg(long, default_value = "101/262")]
    pub section: String,

    /// Drop duplicate links within a date before persisting
    #[arg(long, default_value_t = false)]
    pub dedup: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct ContentArgs {
    /// Input CSV of (date, url) rows from a links run
    #[arg(short, long, default_value = "news_links.csv")]
    pub links: String,

    /// Output CSV for (date, url, title, content) rows
    #[arg(short, long, default_value = "news_articles.csv")]
    pub out: String,

    /// Concurrent article workers
    #[arg(long, default_value_t = 5)]
    pub workers: usize,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Options shared by both pipelines.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Rows buffered before a flush to the sink
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// Run Chrome with a visible window (debugging)
    #[arg(long, default_value_t = false)]
    pub headed: bool,

    /// Chrome/Chromium binary to launch
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_subcommand_parsing() {
        let cli = Cli::parse_from(&[
            "naver_news_crawler",
            "links",
            "--start-date",
            "20240101",
            "--end-date",
            "20240103",
            "--out",
            "/tmp/links.csv",
        ]);

        let Command::Links(args) = cli.command else {
            panic!("expected links subcommand");
        };
        assert_eq!(args.start_date.format("%Y%m%d").to_string(), "20240101");
        assert_eq!(args.end_date.format("%Y%m%d").to_string(), "20240103");
        assert_eq!(args.out, "/tmp/links.csv");
        assert_eq!(args.workers, 3);
        assert_eq!(args.section, "101/262");
        assert!(!args.dedup);
        assert_eq!(args.common.batch_size, 10);
    }

    #[test]
    fn test_content_subcommand_defaults() {
        let cli = Cli::parse_from(&["naver_news_crawler", "content"]);

        let Command::Content(args) = cli.command else {
            panic!("expected content subcommand");
        };
        assert_eq!(args.links, "news_links.csv");
        assert_eq!(args.out, "news_articles.csv");
        assert_eq!(args.workers, 5);
        assert!(!args.common.headed);
    }

    #[test]
    fn test_rejects_malformed_date() {
        let parsed = Cli::try_parse_from(&[
            "naver_news_crawler",
            "links",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "20240103",
        ]);
        assert!(parsed.is_err());
    }
}
