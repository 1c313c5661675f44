//! Data models for crawl inputs and persisted rows.
//!
//! Two row shapes flow through the pipelines:
//! - [`LinkRecord`]: one `(date, url)` pair discovered on an index page,
//!   written to the links sink and read back as the content pipeline's input
//! - [`ArticleRecord`]: one extracted article, written to the content sink
//!
//! Both derive serde traits so the `csv` crate derives the header schema
//! from the field names. An `ArticleRecord` with empty `title` and `content`
//! marks an extraction miss; it is persisted anyway so failures stay
//! auditable in the sink.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single discovered article link, tagged with the index date it came from.
///
/// Duplicate `(date, url)` pairs are possible across overlapping scroll
/// passes and are tolerated downstream; de-duplication is an opt-in toggle
/// applied before persisting, never assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Index date partition, formatted `YYYYMMDD`.
    pub date: String,
    /// Absolute article URL.
    pub url: String,
}

/// An extracted article row for the content sink.
///
/// `content` may embed newlines; CSV quoting handles that at the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Index date partition the URL was discovered under.
    pub date: String,
    /// Article URL.
    pub url: String,
    /// Headline text; empty on extraction miss.
    pub title: String,
    /// Cleaned body text; empty on extraction miss.
    pub content: String,
}

impl ArticleRecord {
    /// Build the row persisted for a URL whose extraction failed.
    pub fn miss(date: String, url: String) -> Self {
        Self {
            date,
            url,
            title: String::new(),
            content: String::new(),
        }
    }
}

/// Format a calendar date as the 8-digit partition key Naver's index expects.
pub fn partition_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Expand an inclusive date range into daily partition keys.
pub fn date_partitions(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut partitions = Vec::new();
    let mut day = start;
    while day <= end {
        partitions.push(partition_key(day));
        day = day.succ_opt().expect("date overflow");
    }
    partitions
}
