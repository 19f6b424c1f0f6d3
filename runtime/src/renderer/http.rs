//! HTTP-only renderer.
//!
//! Not a browser, just a GET request. No scripts run, so the snapshot has
//! no network log, no watched globals and no screenshot. Detectors that rely
//! on those channels report a degraded verdict instead of failing.

use super::{NavigationResult, NetworkRequest, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Node};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum body size accepted from the target (10 MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Renderer that fetches raw HTML with reqwest.
pub struct HttpRenderer {
    client: reqwest::Client,
    active_count: Arc<AtomicUsize>,
}

impl HttpRenderer {
    /// Create a renderer with a standard Chrome user-agent.
    pub fn new() -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(8))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        Self {
            client,
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for HttpRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(HttpContext {
            client: self.client.clone(),
            active_count: Arc::clone(&self.active_count),
            html: None,
            released: false,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// One fetched document.
pub struct HttpContext {
    client: reqwest::Client,
    active_count: Arc<AtomicUsize>,
    html: Option<String>,
    released: bool,
}

impl HttpContext {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for HttpContext {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl RenderContext for HttpContext {
    async fn start_network_capture(&mut self) -> Result<()> {
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = read_capped(resp, MAX_BODY_SIZE).await?;

        self.html = Some(body);
        Ok(NavigationResult {
            final_url,
            status,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn supports_scripting(&self) -> bool {
        false
    }

    async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
        bail!("scripting is not available in HTTP-only mode")
    }

    async fn get_html(&self) -> Result<String> {
        self.html.clone().context("no document fetched")
    }

    async fn visible_text(&self) -> Result<String> {
        let html = self.html.as_deref().context("no document fetched")?;
        Ok(text_from_html(html))
    }

    async fn take_network_log(&mut self) -> Vec<NetworkRequest> {
        Vec::new()
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        bail!("screenshots are not available in HTTP-only mode")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.release();
        Ok(())
    }
}

/// Read a response body, giving up as soon as it passes `limit` bytes.
async fn read_capped(mut resp: reqwest::Response, limit: usize) -> Result<String> {
    if resp.content_length().is_some_and(|len| len > limit as u64) {
        bail!("response body exceeds {limit} bytes");
    }
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await.context("failed to read response body")? {
        if body.len() + chunk.len() > limit {
            bail!("response body exceeds {limit} bytes");
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Approximate the rendered text of a static document: body text nodes,
/// skipping `script`, `style`, `noscript` and `template` content.
pub fn text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| match a.value() {
            Node::Element(el) => matches!(
                el.name(),
                "script" | "style" | "noscript" | "template" | "head"
            ),
            _ => false,
        });
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// The server is returned too so it outlives the body read.
    async fn fetch(body: &str) -> (MockServer, reqwest::Response) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        let resp = reqwest::get(server.uri()).await.unwrap();
        (server, resp)
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let (_server, resp) = fetch(&"x".repeat(2048)).await;
        let err = read_capped(resp, 1024).await.unwrap_err();
        assert!(err.to_string().contains("exceeds 1024 bytes"));
    }

    #[tokio::test]
    async fn test_body_within_limit_is_read() {
        let (_server, resp) = fetch("<html><body>ok</body></html>").await;
        assert_eq!(
            read_capped(resp, 1024).await.unwrap(),
            "<html><body>ok</body></html>"
        );
    }

    #[test]
    fn test_text_from_html_skips_scripts_and_head() {
        let html = r#"<html><head><title>Acme</title><style>p{}</style></head>
            <body><h1>Welcome</h1><script>var x = 1;</script><p>Call us</p></body></html>"#;
        let text = text_from_html(html);
        assert_eq!(text, "Welcome\nCall us");
    }

    #[tokio::test]
    async fn test_context_without_navigation_has_no_html() {
        let renderer = HttpRenderer::new();
        let ctx = renderer.new_context().await.unwrap();
        assert_eq!(renderer.active_contexts(), 1);
        assert!(ctx.get_html().await.is_err());
        assert!(!ctx.supports_scripting());
        ctx.close().await.unwrap();
        assert_eq!(renderer.active_contexts(), 0);
    }
}
