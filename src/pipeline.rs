//! Concurrent crawl orchestration.
//!
//! Both pipelines share one scheduling shape: a bounded pool of spawned
//! worker tasks pulling units (date partitions, or link rows) off a shared
//! queue. Workers run as independent tasks on the runtime, so slow or
//! CPU-bound units on one worker never stall the others. Each worker owns
//! its own [`SessionPolicy`] for its whole lifetime, so the rotation budget
//! is per worker, and launches a fresh browser session per unit, trading
//! startup overhead for isolation from a single page's failure or detection
//! state.
//!
//! Per-unit failures are logged, counted, and treated as empty results; one
//! failing date or URL never aborts the run. Completed rows go to the shared
//! [`BatchPersister`] under its mutex, and `flush_remaining` always runs
//! after the pool drains, including after cancellation.
//!
//! Cancellation is a shared [`AtomicBool`]: once set, no worker starts a new
//! unit, in-flight units finish normally, and the final flush still happens.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use itertools::Itertools;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::errors::{CrawlError, RenderError};
use crate::extract::extract_article;
use crate::models::{ArticleRecord, LinkRecord};
use crate::persist::BatchPersister;
use crate::renderer::{BrowserSession, PageDriver, RendererConfig};
use crate::session::{SessionConfig, SessionPolicy};
use crate::traverse::{PaginationTraverser, extract_links};
use crate::utils::truncate_for_log;

/// Shared settings for both pipelines.
#[derive(Debug, Clone, Default)]
pub struct CrawlConfig {
    pub renderer: RendererConfig,
    pub session: SessionConfig,
    /// Breaking-news section path, e.g. `101/262` (economy / securities).
    pub section: String,
    /// Drop duplicate links within one date before persisting.
    pub dedup: bool,
}

/// Index URL for one date partition.
pub fn index_url(section: &str, date: &str) -> String {
    format!("https://news.naver.com/breakingnews/section/{section}?date={date}")
}

/// Counters reported at the end of a pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Units that produced a result (possibly empty).
    pub completed: usize,
    /// Units abandoned on a render failure.
    pub failed: usize,
    /// Units never started because of cancellation.
    pub skipped: usize,
    /// Rows handed to the persister.
    pub rows: usize,
}

/// One unit of crawl work: turns an item into rows for the sink.
///
/// `process` is declared with an explicit `Send` future so worker loops can
/// be spawned as runtime tasks; implementations still write plain `async fn`.
pub trait UnitWorker: Send + Sync + 'static {
    type Item: fmt::Debug + Send + 'static;
    type Row: Serialize + Send + 'static;

    fn process(
        &self,
        policy: &mut SessionPolicy,
        item: Self::Item,
    ) -> impl Future<Output = Result<Vec<Self::Row>, CrawlError>> + Send;
}

/// Run `pool_size` spawned worker tasks over `items`, feeding results to
/// `persister`. Returns once every task has exited and the final flush ran.
pub async fn run_pool<W: UnitWorker>(
    worker: W,
    items: Vec<W::Item>,
    pool_size: usize,
    session: SessionConfig,
    cancel: Arc<AtomicBool>,
    persister: Arc<Mutex<BatchPersister<W::Row>>>,
) -> PipelineStats {
    let worker = Arc::new(worker);
    let queue = Arc::new(StdMutex::new(VecDeque::from(items)));
    let stats = Arc::new(StdMutex::new(PipelineStats::default()));

    let handles: Vec<_> = (0..pool_size.max(1))
        .map(|worker_id| {
            let worker = Arc::clone(&worker);
            let queue = Arc::clone(&queue);
            let stats = Arc::clone(&stats);
            let cancel = Arc::clone(&cancel);
            let persister = Arc::clone(&persister);
            let session = session.clone();
            tokio::spawn(async move {
                let mut policy = SessionPolicy::new(session);
                loop {
                    if cancel.load(Ordering::SeqCst) {
                        info!(worker_id, "cancellation observed; no new units");
                        break;
                    }
                    let item = queue.lock().expect("work queue poisoned").pop_front();
                    let Some(item) = item else { break };
                    let label = format!("{item:?}");

                    match worker.process(&mut policy, item).await {
                        Ok(rows) => {
                            {
                                let mut stats = stats.lock().expect("stats poisoned");
                                stats.completed += 1;
                                stats.rows += rows.len();
                            }
                            if let Err(e) = persister.lock().await.append(rows) {
                                // Rows stay buffered inside the persister.
                                error!(worker_id, unit = %label, error = %e, "persist failed; rows retained for retry");
                            }
                        }
                        Err(e) => {
                            warn!(worker_id, unit = %label, error = %e, "unit failed; continuing");
                            stats.lock().expect("stats poisoned").failed += 1;
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "worker task aborted");
        }
    }

    {
        let mut stats = stats.lock().expect("stats poisoned");
        stats.skipped = queue.lock().expect("work queue poisoned").len();
    }

    if let Err(e) = persister.lock().await.flush_remaining() {
        error!(error = %e, "final flush failed; rows remain buffered");
    }

    let stats = stats.lock().expect("stats poisoned");
    *stats
}

/// Worker for the link-collection pipeline: one date partition per unit.
pub struct LinkWorker {
    pub config: Arc<CrawlConfig>,
}

impl UnitWorker for LinkWorker {
    type Item = String;
    type Row = LinkRecord;

    async fn process(
        &self,
        policy: &mut SessionPolicy,
        date: String,
    ) -> Result<Vec<LinkRecord>, CrawlError> {
        info!(date, "starting index traversal");
        let url = index_url(&self.config.section, &date);
        let session = BrowserSession::launch(&self.config.renderer).await?;

        // Session teardown must happen on every path, so run the page work
        // in a block and shut down before propagating its result.
        let outcome = async {
            let page = session.open_page(policy.identity()).await?;
            policy.on_request().await;
            page.navigate(&url).await?;
            let html = PaginationTraverser::new(&page, policy).run().await?;
            page.close().await;
            Ok::<_, RenderError>(html)
        }
        .await;
        session.shutdown().await;

        let html = outcome?;
        let mut links = extract_links(&html, &date, &url);
        if self.config.dedup {
            links = links.into_iter().unique().collect();
        }
        info!(date, count = links.len(), "collected index links");
        Ok(links)
    }
}

/// Worker for the content-collection pipeline: one discovered URL per unit.
pub struct ArticleWorker {
    pub config: Arc<CrawlConfig>,
}

impl UnitWorker for ArticleWorker {
    type Item = LinkRecord;
    type Row = ArticleRecord;

    async fn process(
        &self,
        policy: &mut SessionPolicy,
        link: LinkRecord,
    ) -> Result<Vec<ArticleRecord>, CrawlError> {
        let session = BrowserSession::launch(&self.config.renderer).await?;

        let outcome = async {
            let page = session.open_page(policy.identity()).await?;
            policy.on_request().await;
            page.navigate(&link.url).await?;
            let html = page.html().await?;
            page.close().await;
            Ok::<_, RenderError>(html)
        }
        .await;
        session.shutdown().await;

        let html = outcome?;
        let record = match extract_article(&html) {
            Some(extracted) => {
                debug!(
                    url = %link.url,
                    title = %extracted.title,
                    preview = %truncate_for_log(&extracted.body, 120),
                    "extracted article"
                );
                ArticleRecord {
                    date: link.date,
                    url: link.url,
                    title: extracted.title,
                    content: extracted.body,
                }
            }
            None => {
                // Persisted anyway so the miss is auditable in the sink.
                warn!(url = %link.url, "extraction miss; persisting empty record");
                ArticleRecord::miss(link.date, link.url)
            }
        };
        Ok(vec![record])
    }
}

/// Read `(date, url)` rows back from a links sink.
pub fn read_links(path: &str) -> Result<Vec<LinkRecord>, CrawlError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| CrawlError::LinksInput {
        path: path.to_string(),
        source,
    })?;
    let mut links = Vec::new();
    for row in reader.deserialize() {
        let record: LinkRecord = row.map_err(|source| CrawlError::LinksInput {
            path: path.to_string(),
            source,
        })?;
        links.push(record);
    }
    Ok(links)
}
