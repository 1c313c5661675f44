//! Error taxonomy for the crawl pipeline.
//!
//! Failures fall into three families with different blast radii:
//! - [`RenderError`]: the underlying browser session failed. Contained at the
//!   worker boundary; the unit is logged and treated as an empty result.
//! - [`PersistError`]: the CSV sink could not be written. Reported to the
//!   caller; buffered rows are retained for retry, never dropped.
//! - [`CrawlError`]: top-level wrapper for anything that must surface to
//!   `main` (e.g. failing to read the input links file).
//!
//! An extraction miss (expected DOM elements absent) is NOT an error: it is
//! signalled by `None` from the extractor and persisted as an empty record.

use thiserror::Error;

/// Browser/session failure. Non-fatal to the pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },

    #[error("script evaluation failed: {0}")]
    Evaluation(#[from] chromiumoxide::error::CdpError),

    #[error("unexpected evaluation result: {0}")]
    BadValue(#[from] serde_json::Error),
}

/// Sink write failure. Buffered rows survive it.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),
}

/// Anything fatal enough to reach `main`.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("failed to read links file {path}: {source}")]
    LinksInput {
        path: String,
        #[source]
        source: csv::Error,
    },
}
