//! # Naver News Crawler
//!
//! Collects article links and article content from Naver's breaking-news
//! index, which loads results through infinite scroll plus an occasional
//! "load more" button, and persists everything incrementally to CSV.
//!
//! ## Usage
//!
//! ```sh
//! # Phase 1: discover article links for a date range
//! naver_news_crawler links --start-date 20240101 --end-date 20240107
//!
//! # Phase 2: fetch and extract the discovered articles
//! naver_news_crawler content --links news_links.csv --out news_articles.csv
//! ```
//!
//! ## Architecture
//!
//! Each pipeline runs a bounded pool of workers. A worker owns a rotating
//! session identity with jittered throttling, launches a fresh headless
//! Chrome session per unit of work, and hands its rows to a shared batch
//! persister that appends to the CSV sink every N rows. Ctrl-C stops
//! dispatch, drains in-flight workers, and flushes whatever is buffered.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod errors;
mod extract;
mod models;
mod persist;
mod pipeline;
mod renderer;
mod session;
mod traverse;
mod utils;

use cli::{Cli, Command, CommonArgs};
use models::date_partitions;
use persist::BatchPersister;
use pipeline::{ArticleWorker, CrawlConfig, LinkWorker, PipelineStats, read_links, run_pool};
use renderer::RendererConfig;
use session::SessionConfig;
use utils::ensure_sink_writable;

fn crawl_config(common: &CommonArgs, section: String, dedup: bool) -> CrawlConfig {
    CrawlConfig {
        renderer: RendererConfig {
            headless: !common.headed,
            chrome_path: common.chrome_path.clone(),
        },
        session: SessionConfig::default(),
        section,
        dedup,
    }
}

/// Flip the cancel flag on the first Ctrl-C so pipelines drain and flush.
fn watch_for_interrupt(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            return;
        }
        warn!("interrupt received; draining in-flight work and flushing");
        cancel.store(true, Ordering::SeqCst);
    });
}

fn log_stats(pipeline: &str, stats: &PipelineStats) {
    info!(
        pipeline,
        completed = stats.completed,
        failed = stats.failed,
        skipped = stats.skipped,
        rows = stats.rows,
        "pipeline finished"
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("naver_news_crawler starting up");

    let args = Cli::parse();
    let cancel = Arc::new(AtomicBool::new(false));
    watch_for_interrupt(Arc::clone(&cancel));

    match args.command {
        Command::Links(links) => {
            if links.start_date > links.end_date {
                error!(
                    start = %links.start_date,
                    end = %links.end_date,
                    "start date is after end date"
                );
                return Err("start date is after end date".into());
            }
            if let Err(e) = ensure_sink_writable(&links.out).await {
                error!(path = %links.out, error = %e, "links sink is not writable");
                return Err(e);
            }

            let dates = date_partitions(links.start_date, links.end_date);
            info!(
                partitions = dates.len(),
                workers = links.workers,
                section = %links.section,
                out = %links.out,
                "starting link collection"
            );

            let config = Arc::new(crawl_config(&links.common, links.section, links.dedup));
            let persister = Arc::new(Mutex::new(BatchPersister::new(
                &links.out,
                links.common.batch_size,
            )));
            let worker = LinkWorker {
                config: Arc::clone(&config),
            };
            let stats = run_pool(
                worker,
                dates,
                links.workers,
                config.session.clone(),
                cancel,
                persister,
            )
            .await;
            log_stats("links", &stats);
        }
        Command::Content(content) => {
            if let Err(e) = ensure_sink_writable(&content.out).await {
                error!(path = %content.out, error = %e, "content sink is not writable");
                return Err(e);
            }

            let rows = read_links(&content.links)?;
            info!(
                links = rows.len(),
                workers = content.workers,
                out = %content.out,
                "starting content collection"
            );

            let config = Arc::new(crawl_config(&content.common, String::new(), false));
            let persister = Arc::new(Mutex::new(BatchPersister::new(
                &content.out,
                content.common.batch_size,
            )));
            let worker = ArticleWorker {
                config: Arc::clone(&config),
            };
            let stats = run_pool(
                worker,
                rows,
                content.workers,
                config.session.clone(),
                cancel,
                persister,
            )
            .await;
            log_stats("content", &stats);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "execution complete"
    );

    Ok(())
}
