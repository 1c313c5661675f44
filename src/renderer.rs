//! Headless Chrome wrapper.
//!
//! [`BrowserSession`] owns one Chrome process launched with the hardening
//! flags that suppress the obvious automation signatures
//! (`--disable-blink-features=AutomationControlled`, no first-run UI, no
//! sandbox for container use). [`ChromePage`] is one tab with the session's
//! user-agent override applied before any navigation, exposing exactly the
//! primitives the traversal state machine needs through the [`PageDriver`]
//! trait: navigate, scroll, sample height, click-if-visible, DOM snapshot.
//!
//! The trait exists so the state machine can be driven by a scripted fake in
//! tests; the real implementation speaks CDP via chromiumoxide.
//!
//! Sessions are cheap enough to create per unit of work and are always torn
//! down through [`BrowserSession::shutdown`]; pipeline workers run the
//! acquire/work/shutdown sequence so release happens on every exit path.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::RenderError;

/// Bounded wait for element-visibility conditions.
const ELEMENT_WAIT: Duration = Duration::from_secs(5);

/// Whether a CDP error means the session itself is dead (crashed Chrome,
/// dropped websocket) rather than a lookup that merely found nothing.
/// Session failures must propagate; lookup misses are interpreted by the
/// caller.
fn is_session_failure(error: &CdpError) -> bool {
    matches!(
        error,
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse
    )
}

/// Primitives the pagination state machine needs from a rendered page.
pub trait PageDriver {
    /// Navigate the page to `url` and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), RenderError>;

    /// Smooth-scroll to the bottom of the document.
    async fn scroll_to_bottom(&self) -> Result<(), RenderError>;

    /// Current `document.body.scrollHeight`.
    async fn current_height(&self) -> Result<u64, RenderError>;

    /// Click the first element matching `selector` if it is present and
    /// interactable within a bounded wait. Absence is `Ok(false)`, never an
    /// error; only genuine session failures surface as `Err`.
    async fn click_if_visible(&self, selector: &str) -> Result<bool, RenderError>;

    /// Snapshot of the current DOM as serialized HTML.
    async fn html(&self) -> Result<String, RenderError>;
}

/// Launch options for a [`BrowserSession`].
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Run Chrome headless (disable for local debugging).
    pub headless: bool,
    /// Explicit Chrome binary; falls back to well-known install paths.
    pub chrome_path: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
        }
    }
}

const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

fn find_chrome(configured: Option<&str>) -> Result<String, RenderError> {
    if let Some(path) = configured {
        return Ok(path.to_string());
    }
    for path in CHROME_PATHS {
        if std::path::Path::new(path).exists() {
            debug!(%path, "found Chrome binary");
            return Ok(path.to_string());
        }
    }
    Err(RenderError::Launch(
        "Chrome/Chromium not found; install it or pass --chrome-path".to_string(),
    ))
}

/// One Chrome process plus its CDP event loop task.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chrome with automation-signature suppression flags.
    pub async fn launch(config: &RendererConfig) -> Result<Self, RenderError> {
        let chrome_path = find_chrome(config.chrome_path.as_deref())?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // Drive CDP events until the browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!(headless = config.headless, "browser session launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a fresh tab with `user_agent` applied before any navigation.
    pub async fn open_page(&self, user_agent: &str) -> Result<ChromePage, RenderError> {
        let page = self.browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await?;
        Ok(ChromePage { page })
    }

    /// Tear down the Chrome process. Always called by pipeline workers,
    /// including on failure paths.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        debug!("browser session shut down");
    }
}

/// A single tab speaking CDP.
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    /// Close the tab; errors are logged, not propagated, since the session
    /// teardown that follows releases everything anyway.
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            debug!(error = %e, "page close failed");
        }
    }
}

impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.page
            .goto(url)
            .await
            .map_err(|source| RenderError::Navigation {
                url: url.to_string(),
                source,
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|source| RenderError::Navigation {
                url: url.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), RenderError> {
        self.page
            .evaluate(
                "window.scrollTo({ top: document.body.scrollHeight, behavior: 'smooth' });",
            )
            .await?;
        Ok(())
    }

    async fn current_height(&self) -> Result<u64, RenderError> {
        let height = self
            .page
            .evaluate("document.body.scrollHeight")
            .await?
            .into_value::<u64>()?;
        Ok(height)
    }

    async fn click_if_visible(&self, selector: &str) -> Result<bool, RenderError> {
        let element = match tokio::time::timeout(ELEMENT_WAIT, self.page.find_element(selector))
            .await
        {
            Ok(Ok(element)) => element,
            Ok(Err(e)) if is_session_failure(&e) => return Err(RenderError::Evaluation(e)),
            // Not found within the bounded wait: normal termination signal.
            Ok(Err(e)) => {
                debug!(%selector, error = %e, "element not present");
                return Ok(false);
            }
            Err(_) => {
                debug!(%selector, "element wait timed out");
                return Ok(false);
            }
        };

        match element.click().await {
            Ok(_) => Ok(true),
            Err(e) if is_session_failure(&e) => Err(RenderError::Evaluation(e)),
            // Covered by "not interactable": overlays, zero-size, detached.
            Err(e) => {
                debug!(%selector, error = %e, "element present but not clickable");
                Ok(false)
            }
        }
    }

    async fn html(&self) -> Result<String, RenderError> {
        Ok(self.page.content().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_session_errors_must_propagate() {
        assert!(is_session_failure(&CdpError::NoResponse));
        let io = CdpError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "websocket gone",
        ));
        assert!(is_session_failure(&io));
    }

    #[test]
    fn test_lookup_misses_are_not_session_failures() {
        // A slow or absent element surfaces as a timeout or a protocol-level
        // reply, both of which click_if_visible turns into Ok(false).
        assert!(!is_session_failure(&CdpError::Timeout));
        let serde_err = serde_json::from_str::<u64>("no node").unwrap_err();
        assert!(!is_session_failure(&CdpError::Serde(serde_err)));
    }
}
