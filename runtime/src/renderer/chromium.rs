//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, NetworkRequest, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. LEADLENS_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("LEADLENS_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.leadlens/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".leadlens/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".leadlens/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".leadlens/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".leadlens/chromium/chrome-linux64/chrome"),
                home.join(".leadlens/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Create a new ChromiumRenderer, launching a headless Chromium instance.
    pub async fn new() -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set LEADLENS_CHROMIUM_PATH or install Chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1920, 1080)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            handler_task,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
            requests: Arc::new(Mutex::new(Vec::new())),
            document_status: Arc::new(AtomicU16::new(0)),
            capture_task: None,
            status_task: None,
            closed: false,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.handler_task.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
///
/// Dropping a context without calling `close` (for example when the caller
/// abandons the audit) still closes the page and stops network capture.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<NetworkRequest>>>,
    /// HTTP status of the first document response, 0 until one arrives.
    document_status: Arc<AtomicU16>,
    capture_task: Option<JoinHandle<()>>,
    status_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChromiumContext {
    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for task in [self.capture_task.take(), self.status_task.take()].into_iter().flatten() {
            task.abort();
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn start_network_capture(&mut self) -> Result<()> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("failed to enable network domain")?;

        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to subscribe to network events")?;

        let sink = Arc::clone(&self.requests);
        let started = Instant::now();
        self.capture_task = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let entry = NetworkRequest {
                    url: event.request.url.clone(),
                    timestamp_ms: started.elapsed().as_millis() as u64,
                };
                if let Ok(mut log) = sink.lock() {
                    log.push(entry);
                }
            }
        }));

        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to response events")?;
        let slot = Arc::clone(&self.document_status);
        self.status_task = Some(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                record_document_status(&slot, &event.r#type, event.response.status);
            }
        }));

        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                // data: and about: pages produce no response event.
                let status = match self.document_status.load(Ordering::Acquire) {
                    0 => 200,
                    code => code,
                };
                Ok(NavigationResult {
                    final_url,
                    status,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    fn supports_scripting(&self) -> bool {
        true
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        let value = self
            .execute_js("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn visible_text(&self) -> Result<String> {
        let value = self
            .execute_js("document.body ? document.body.innerText : ''")
            .await
            .context("failed to get visible text")?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn take_network_log(&mut self) -> Vec<NetworkRequest> {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        match self.requests.lock() {
            Ok(mut log) => std::mem::take(&mut *log),
            Err(_) => Vec::new(),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .screenshot(params)
            .await
            .context("failed to capture screenshot")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.release();
        let _ = this.page.clone().close().await;
        Ok(())
    }
}

/// Keep the status of the first `Document` response. Redirect hops never
/// reach `Network.responseReceived`, and iframes load after the main frame.
fn record_document_status(slot: &AtomicU16, kind: &ResourceType, status: i64) {
    if !matches!(kind, ResourceType::Document) {
        return;
    }
    let Ok(code) = u16::try_from(status) else {
        return;
    };
    let _ = slot.compare_exchange(0, code, Ordering::AcqRel, Ordering::Acquire);
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.release();
        let page = self.page.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::snapshot::render_snapshot;
    use crate::renderer::RenderOptions;

    #[test]
    fn test_first_document_response_sets_status() {
        let slot = AtomicU16::new(0);
        record_document_status(&slot, &ResourceType::Stylesheet, 404);
        assert_eq!(slot.load(Ordering::Acquire), 0);
        record_document_status(&slot, &ResourceType::Document, 403);
        record_document_status(&slot, &ResourceType::Document, 200);
        assert_eq!(slot.load(Ordering::Acquire), 403);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_snapshot_marks_hidden_elements() {
        let renderer = ChromiumRenderer::new()
            .await
            .expect("failed to create renderer");

        let options = RenderOptions {
            budget_ms: 15_000,
            settle_ms: 200,
            watched_globals: vec!["leadlensMarker".to_string()],
            capture_screenshot: true,
        };
        let snapshot = render_snapshot(
            &renderer,
            "data:text/html,<script>window.leadlensMarker=1</script>\
             <div class='chat-widget' style='display:none'>chat</div><h1>Hello</h1>",
            &options,
        )
        .await
        .expect("render failed");

        assert!(snapshot.dom_html.contains(r#"data-leadlens-hidden="style""#));
        assert!(snapshot.has_global("leadlensMarker"));
        assert!(snapshot.visible_text.contains("Hello"));
        assert!(snapshot.screenshot.is_some());
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}
