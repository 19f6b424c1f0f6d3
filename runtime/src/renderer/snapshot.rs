//! Drive one render context through a complete capture.
//!
//! Ordering matters here: network capture starts before navigation, or the
//! requests fired during initial load are lost. The DOM is frozen only after
//! the settle wait, because chat widgets and trackers attach after `load`.

use super::{globals_lookup_script, PageSnapshot, RenderContext, RenderOptions, Renderer, MARK_HIDDEN_JS};
use crate::error::RenderError;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

/// Markers of interstitial bot-challenge pages (lowercase).
const CHALLENGE_MARKERS: &[(&str, &str)] = &[
    ("<title>just a moment...</title>", "Cloudflare browser challenge"),
    ("attention required! | cloudflare", "Cloudflare block page"),
    ("checking your browser before accessing", "browser verification interstitial"),
    ("/cdn-cgi/challenge-platform/", "Cloudflare challenge platform"),
    ("captcha-delivery.com", "DataDome captcha"),
    ("px-captcha", "PerimeterX captcha"),
    ("<title>access denied</title>", "access denied page"),
];

/// Prefix `https://` when the input carries no scheme.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let scheme = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").expect("scheme regex is valid");
    let lower = trimmed.to_ascii_lowercase();
    if scheme.is_match(trimmed) || lower.starts_with("data:") || lower.starts_with("about:") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Detect a bot-challenge page. Returns the reason when one is found.
pub fn detect_challenge(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    CHALLENGE_MARKERS
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, reason)| (*reason).to_string())
}

/// Render `url` and freeze the result.
///
/// The whole capture runs under `options.budget_ms`; exceeding it yields
/// [`RenderError::Timeout`], never a partial snapshot. The context is closed
/// on every path. If this future is dropped mid-render, the context's own
/// `Drop` releases the page.
pub async fn render_snapshot(
    renderer: &dyn Renderer,
    url: &str,
    options: &RenderOptions,
) -> Result<PageSnapshot, RenderError> {
    let url = normalize_url(url);
    let mut ctx = renderer
        .new_context()
        .await
        .map_err(|e| RenderError::Unavailable(format!("{e:#}")))?;

    let outcome = tokio::time::timeout(
        Duration::from_millis(options.budget_ms),
        capture(ctx.as_mut(), &url, options),
    )
    .await;

    if let Err(e) = ctx.close().await {
        warn!("failed to close render context for {url}: {e:#}");
    }

    match outcome {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            budget_ms: options.budget_ms,
        }),
    }
}

async fn capture(
    ctx: &mut dyn RenderContext,
    url: &str,
    options: &RenderOptions,
) -> Result<PageSnapshot, RenderError> {
    ctx.start_network_capture()
        .await
        .map_err(|e| RenderError::Unavailable(format!("network capture: {e:#}")))?;

    let nav = ctx
        .navigate(url, options.budget_ms)
        .await
        .map_err(|e| RenderError::Navigation(format!("{e:#}")))?;
    debug!("loaded {} in {}ms (status {})", nav.final_url, nav.load_time_ms, nav.status);

    if matches!(nav.status, 401 | 403 | 429) {
        return Err(RenderError::Blocked(format!("HTTP {}", nav.status)));
    }

    if options.settle_ms > 0 {
        tokio::time::sleep(Duration::from_millis(options.settle_ms)).await;
    }

    let mut window_globals = Vec::new();
    let scripted = ctx.supports_scripting();
    if scripted {
        if let Err(e) = ctx.execute_js(MARK_HIDDEN_JS).await {
            debug!("hidden-element marking failed: {e:#}");
        }
        if !options.watched_globals.is_empty() {
            match ctx
                .execute_js(&globals_lookup_script(&options.watched_globals))
                .await
            {
                Ok(value) => window_globals = serde_json::from_value(value).unwrap_or_default(),
                Err(e) => debug!("global lookup failed: {e:#}"),
            }
        }
    }

    let dom_html = ctx
        .get_html()
        .await
        .map_err(|e| RenderError::Navigation(format!("{e:#}")))?;

    if let Some(reason) = detect_challenge(&dom_html) {
        return Err(RenderError::Blocked(reason));
    }

    let visible_text = ctx.visible_text().await.unwrap_or_default();

    let screenshot = if options.capture_screenshot {
        match ctx.screenshot().await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("screenshot unavailable: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let network_requests = ctx.take_network_log().await;

    Ok(PageSnapshot {
        final_url: nav.final_url,
        dom_html,
        visible_text,
        network_requests,
        window_globals,
        screenshot,
        scripted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{NavigationResult, NetworkRequest};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Context that records the order of calls made against it.
    struct ScriptedContext {
        calls: Arc<Mutex<Vec<String>>>,
        nav_delay_ms: u64,
        html: String,
        status: u16,
        capturing: bool,
        log: Vec<NetworkRequest>,
    }

    struct ScriptedRenderer {
        calls: Arc<Mutex<Vec<String>>>,
        nav_delay_ms: u64,
        html: String,
        status: u16,
        open: Arc<AtomicUsize>,
    }

    impl ScriptedRenderer {
        fn new(html: &str) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                nav_delay_ms: 0,
                html: html.to_string(),
                status: 200,
                open: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Renderer for ScriptedRenderer {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedContext {
                calls: Arc::clone(&self.calls),
                nav_delay_ms: self.nav_delay_ms,
                html: self.html.clone(),
                status: self.status,
                capturing: false,
                log: Vec::new(),
            }))
        }
        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
        fn active_contexts(&self) -> usize {
            self.open.load(Ordering::SeqCst)
        }
    }

    impl ScriptedContext {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl RenderContext for ScriptedContext {
        async fn start_network_capture(&mut self) -> Result<()> {
            self.record("capture");
            self.capturing = true;
            Ok(())
        }
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            self.record("navigate");
            if self.capturing {
                self.log.push(NetworkRequest {
                    url: "https://js.intercom.io/widget.js".to_string(),
                    timestamp_ms: 3,
                });
            }
            tokio::time::sleep(Duration::from_millis(self.nav_delay_ms)).await;
            Ok(NavigationResult {
                final_url: url.to_string(),
                status: self.status,
                load_time_ms: self.nav_delay_ms,
            })
        }
        fn supports_scripting(&self) -> bool {
            true
        }
        async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
            if script.contains("names") {
                self.record("globals");
                return Ok(serde_json::json!(["Intercom"]));
            }
            self.record("mark");
            Ok(serde_json::json!(0))
        }
        async fn get_html(&self) -> Result<String> {
            self.record("html");
            Ok(self.html.clone())
        }
        async fn visible_text(&self) -> Result<String> {
            Ok("Hello".to_string())
        }
        async fn take_network_log(&mut self) -> Vec<NetworkRequest> {
            std::mem::take(&mut self.log)
        }
        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(vec![0x89, 0x50])
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.record("close");
            Ok(())
        }
    }

    fn options() -> RenderOptions {
        RenderOptions {
            budget_ms: 1_000,
            settle_ms: 0,
            watched_globals: vec!["Intercom".to_string()],
            capture_screenshot: false,
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("  acme.io/contact "), "https://acme.io/contact");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://Example.com"), "HTTPS://Example.com");
        assert_eq!(normalize_url("data:text/html,<p>x</p>"), "data:text/html,<p>x</p>");
    }

    #[test]
    fn test_detect_challenge() {
        assert!(detect_challenge("<html><head><title>Just a moment...</title></head></html>").is_some());
        assert!(detect_challenge("<script src='https://geo.captcha-delivery.com/c.js'></script>").is_some());
        assert!(detect_challenge("<html><title>Acme Plumbing</title></html>").is_none());
    }

    #[tokio::test]
    async fn test_capture_starts_before_navigation() {
        let renderer = ScriptedRenderer::new("<html><body>Hi</body></html>");
        let snapshot = render_snapshot(&renderer, "acme.test", &options()).await.unwrap();

        let calls = renderer.calls();
        assert_eq!(calls, vec!["capture", "navigate", "mark", "globals", "html", "close"]);
        assert_eq!(snapshot.final_url, "https://acme.test");
        assert_eq!(snapshot.network_requests.len(), 1);
        assert_eq!(snapshot.window_globals, vec!["Intercom".to_string()]);
        assert!(snapshot.scripted);
        assert!(snapshot.screenshot.is_none());
    }

    #[tokio::test]
    async fn test_budget_exceeded_yields_timeout_and_closes_context() {
        let mut renderer = ScriptedRenderer::new("<html></html>");
        renderer.nav_delay_ms = 500;
        let opts = RenderOptions {
            budget_ms: 50,
            ..options()
        };

        let err = render_snapshot(&renderer, "https://slow.test", &opts)
            .await
            .unwrap_err();
        assert_eq!(err, RenderError::Timeout { budget_ms: 50 });
        assert_eq!(renderer.calls().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_forbidden_status_is_blocked() {
        let mut renderer = ScriptedRenderer::new("<html></html>");
        renderer.status = 403;
        let err = render_snapshot(&renderer, "https://guarded.test", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Blocked(_)));
    }

    #[tokio::test]
    async fn test_challenge_page_is_blocked() {
        let renderer =
            ScriptedRenderer::new("<html><head><title>Just a moment...</title></head></html>");
        let err = render_snapshot(&renderer, "https://cf.test", &options())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::Blocked("Cloudflare browser challenge".to_string())
        );
    }

    #[tokio::test]
    async fn test_screenshot_captured_on_request() {
        let renderer = ScriptedRenderer::new("<html></html>");
        let opts = RenderOptions {
            capture_screenshot: true,
            ..options()
        };
        let snapshot = render_snapshot(&renderer, "https://shot.test", &opts).await.unwrap();
        assert_eq!(snapshot.screenshot, Some(vec![0x89, 0x50]));
    }
}
