//! Infinite-scroll pagination traversal.
//!
//! Naver's breaking-news index loads results as the page is scrolled and,
//! once scroll-triggered loading stalls, sometimes offers a "load more"
//! button for the next chunk. [`PaginationTraverser`] drives that as an
//! explicit state machine over any [`PageDriver`]:
//!
//! ```text
//! Scrolling --(height stalled)--> ProbingLoadMore --(clicked)--> Scrolling
//!                                        |
//!                                  (no button)
//!                                        v
//!                                    Terminated
//! ```
//!
//! At termination the final DOM snapshot is parsed and every
//! `a.sa_text_title` anchor becomes a [`LinkRecord`]. No de-duplication
//! happens here; overlapping scroll passes may repeat links and downstream
//! consumers tolerate that.
//!
//! The `max_rounds` cap is a hardening addition over the site's observed
//! behavior: an index that reports endless apparent growth (broken height
//! probe, A/B layout) terminates instead of scrolling forever.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::RenderError;
use crate::models::LinkRecord;
use crate::renderer::PageDriver;
use crate::session::{SessionPolicy, Sleeper};

/// Anchor pattern for article titles on the index page.
static ARTICLE_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.sa_text_title").expect("valid selector"));

/// The "load more" affordance Naver renders when scroll loading stalls.
pub const LOAD_MORE_SELECTOR: &str = "._CONTENT_LIST_LOAD_MORE_BUTTON";

/// Safety cap on scroll/probe rounds for pages that never stall.
pub const DEFAULT_MAX_ROUNDS: usize = 200;

/// Traversal phases. `Terminated` is the single terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraverseState {
    Scrolling,
    ProbingLoadMore,
    Terminated,
}

/// Drives one index page through scroll/stall/click until exhausted.
pub struct PaginationTraverser<'a, D, S = crate::session::TokioSleeper> {
    driver: &'a D,
    policy: &'a mut SessionPolicy<S>,
    max_rounds: usize,
}

impl<'a, D, S> PaginationTraverser<'a, D, S>
where
    D: PageDriver,
    S: Sleeper,
{
    pub fn new(driver: &'a D, policy: &'a mut SessionPolicy<S>) -> Self {
        Self {
            driver,
            policy,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Override the runaway-scroll safety cap.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Run the state machine to termination and return the final DOM
    /// snapshot. The page must already be navigated to the index URL.
    pub async fn run(&mut self) -> Result<String, RenderError> {
        let mut last_height = self.driver.current_height().await?;
        let mut state = TraverseState::Scrolling;
        let mut rounds = 0usize;
        let mut clicks = 0usize;

        while state != TraverseState::Terminated {
            if rounds >= self.max_rounds {
                warn!(
                    rounds,
                    max = self.max_rounds,
                    "scroll round cap reached; terminating traversal"
                );
                break;
            }
            rounds += 1;

            match state {
                TraverseState::Scrolling => {
                    self.policy.jitter().await;
                    self.driver.scroll_to_bottom().await?;
                    self.policy.jitter().await;

                    let height = self.driver.current_height().await?;
                    if height > last_height {
                        debug!(last_height, height, "page grew; continuing scroll");
                        last_height = height;
                    } else {
                        debug!(height, "height stalled; probing load-more");
                        state = TraverseState::ProbingLoadMore;
                    }
                }
                TraverseState::ProbingLoadMore => {
                    if self.driver.click_if_visible(LOAD_MORE_SELECTOR).await? {
                        // A click triggers a content load: a countable request.
                        self.policy.on_request().await;
                        clicks += 1;
                        debug!(clicks, "clicked load-more; resuming scroll");
                        state = TraverseState::Scrolling;
                    } else {
                        debug!("no load-more control; traversal complete");
                        state = TraverseState::Terminated;
                    }
                }
                TraverseState::Terminated => unreachable!(),
            }
        }

        info!(rounds, clicks, "pagination traversal finished");
        self.driver.html().await
    }
}

/// Extract `(date, url)` pairs from a rendered index snapshot.
///
/// Relative hrefs are resolved against `page_url`; anchors without an href
/// are skipped. Zero matches yields an empty vec, not an error.
pub fn extract_links(html: &str, date: &str, page_url: &str) -> Vec<LinkRecord> {
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    for element in document.select(&ARTICLE_ANCHOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let resolved = match &base {
            Some(base) => base.join(href).map(|u| u.to_string()).ok(),
            None => Some(href.to_string()),
        };
        if let Some(url) = resolved {
            links.push(LinkRecord {
                date: date.to_string(),
                url,
            });
        }
    }

    debug!(date, count = links.len(), "extracted index links");
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct NoopSleeper;

    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn quick_policy() -> SessionPolicy<NoopSleeper> {
        SessionPolicy::with_sleeper(SessionConfig::default(), NoopSleeper)
    }

    /// Scripted page: a queue of heights, a queue of click outcomes, and a
    /// fixed HTML snapshot.
    struct FakePage {
        heights: RefCell<VecDeque<u64>>,
        clicks: RefCell<VecDeque<bool>>,
        html: String,
        scrolls: RefCell<usize>,
    }

    impl FakePage {
        fn new(heights: Vec<u64>, clicks: Vec<bool>, html: &str) -> Self {
            Self {
                heights: RefCell::new(heights.into()),
                clicks: RefCell::new(clicks.into()),
                html: html.to_string(),
                scrolls: RefCell::new(0),
            }
        }
    }

    impl PageDriver for FakePage {
        async fn navigate(&self, _url: &str) -> Result<(), RenderError> {
            Ok(())
        }

        async fn scroll_to_bottom(&self) -> Result<(), RenderError> {
            *self.scrolls.borrow_mut() += 1;
            Ok(())
        }

        async fn current_height(&self) -> Result<u64, RenderError> {
            let mut heights = self.heights.borrow_mut();
            let front = heights.front().copied().unwrap_or(0);
            if heights.len() > 1 {
                heights.pop_front();
            }
            Ok(front)
        }

        async fn click_if_visible(&self, _selector: &str) -> Result<bool, RenderError> {
            Ok(self.clicks.borrow_mut().pop_front().unwrap_or(false))
        }

        async fn html(&self) -> Result<String, RenderError> {
            Ok(self.html.clone())
        }
    }

    const INDEX_HTML: &str = r#"
        <html><body>
          <a class="sa_text_title" href="/mnews/article/001/0001"></a>
          <a class="sa_text_title" href="https://n.news.naver.com/mnews/article/001/0002"></a>
          <a class="other" href="/ignored"></a>
          <a class="sa_text_title"></a>
        </body></html>"#;

    #[tokio::test]
    async fn test_terminates_on_stall_without_load_more() {
        // Initial height 100, one scroll grows to 200, second scroll stalls.
        let page = FakePage::new(vec![100, 200, 200], vec![false], INDEX_HTML);
        let mut policy = quick_policy();
        let html = PaginationTraverser::new(&page, &mut policy)
            .run()
            .await
            .unwrap();

        assert_eq!(*page.scrolls.borrow(), 2);
        assert!(html.contains("sa_text_title"));
    }

    #[tokio::test]
    async fn test_click_resumes_scrolling_and_counts_request() {
        // Stall immediately, click succeeds once, grow, stall again, no button.
        let page = FakePage::new(vec![100, 100, 150, 150], vec![true, false], INDEX_HTML);
        let mut policy = quick_policy();
        PaginationTraverser::new(&page, &mut policy)
            .run()
            .await
            .unwrap();

        // Only the successful click consumed request budget.
        assert_eq!(policy.request_count(), 1);
        assert_eq!(*page.scrolls.borrow(), 3);
    }

    #[tokio::test]
    async fn test_round_cap_bounds_endless_growth() {
        // Height strictly increases forever; the cap must stop the run.
        let heights: Vec<u64> = (0..1000).collect();
        let page = FakePage::new(heights, vec![], INDEX_HTML);
        let mut policy = quick_policy();
        PaginationTraverser::new(&page, &mut policy)
            .with_max_rounds(5)
            .run()
            .await
            .unwrap();

        assert_eq!(*page.scrolls.borrow(), 5);
    }

    #[tokio::test]
    async fn test_idempotent_on_static_snapshot() {
        let run_once = || async {
            let page = FakePage::new(vec![100, 100], vec![false], INDEX_HTML);
            let mut policy = quick_policy();
            let html = PaginationTraverser::new(&page, &mut policy)
                .run()
                .await
                .unwrap();
            extract_links(&html, "20240101", "https://news.naver.com/breakingnews")
        };

        let first = run_once().await;
        let second = run_once().await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_extract_links_resolves_relative_hrefs() {
        let links = extract_links(
            INDEX_HTML,
            "20240101",
            "https://news.naver.com/breakingnews/section/101/262?date=20240101",
        );

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://news.naver.com/mnews/article/001/0001");
        assert_eq!(
            links[1].url,
            "https://n.news.naver.com/mnews/article/001/0002"
        );
        assert!(links.iter().all(|l| l.date == "20240101"));
    }

    #[test]
    fn test_extract_links_empty_page() {
        let links = extract_links(
            "<html><body></body></html>",
            "20240101",
            "https://news.naver.com",
        );
        assert!(links.is_empty());
    }
}
