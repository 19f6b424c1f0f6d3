//! In-memory renderer serving a fixed page.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use leadlens_runtime::config::AuditConfig;
use leadlens_runtime::renderer::http::text_from_html;
use leadlens_runtime::renderer::{
    NavigationResult, NetworkRequest, PageSnapshot, RenderContext, Renderer, MARK_HIDDEN_JS,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the fixture "site" looks like.
#[derive(Clone, Default)]
pub struct Fixture {
    pub final_url: String,
    pub html: String,
    pub requests: Vec<String>,
    pub globals: Vec<String>,
    pub status: u16,
    pub load_delay_ms: u64,
    pub screenshot: Option<Vec<u8>>,
}

impl Fixture {
    pub fn page(html: &str) -> Self {
        Self {
            final_url: "https://acme.test/".into(),
            html: html.into(),
            status: 200,
            ..Default::default()
        }
    }

    pub fn with_requests(mut self, urls: &[&str]) -> Self {
        self.requests = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn with_globals(mut self, names: &[&str]) -> Self {
        self.globals = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.load_delay_ms = ms;
        self
    }

    pub fn with_screenshot(mut self) -> Self {
        self.screenshot = Some(vec![0x89, b'P', b'N', b'G']);
        self
    }

    pub fn at(mut self, url: &str) -> Self {
        self.final_url = url.into();
        self
    }

    /// The snapshot a scripted render of this fixture would freeze.
    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            final_url: self.final_url.clone(),
            dom_html: self.html.clone(),
            visible_text: text_from_html(&self.html),
            network_requests: self
                .requests
                .iter()
                .enumerate()
                .map(|(i, url)| NetworkRequest {
                    url: url.clone(),
                    timestamp_ms: i as u64 * 10,
                })
                .collect(),
            window_globals: self.globals.clone(),
            screenshot: self.screenshot.clone(),
            scripted: true,
        }
    }
}

pub struct FixtureRenderer {
    fixture: Fixture,
    active: Arc<AtomicUsize>,
}

impl FixtureRenderer {
    pub fn new(fixture: Fixture) -> Arc<Self> {
        Arc::new(Self {
            fixture,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureContext {
            fixture: self.fixture.clone(),
            active: Arc::clone(&self.active),
            capturing: false,
            released: false,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

struct FixtureContext {
    fixture: Fixture,
    active: Arc<AtomicUsize>,
    capturing: bool,
    released: bool,
}

impl FixtureContext {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FixtureContext {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl RenderContext for FixtureContext {
    async fn start_network_capture(&mut self) -> Result<()> {
        self.capturing = true;
        Ok(())
    }

    async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        if self.fixture.load_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.fixture.load_delay_ms)).await;
        }
        Ok(NavigationResult {
            final_url: self.fixture.final_url.clone(),
            status: self.fixture.status,
            load_time_ms: self.fixture.load_delay_ms,
        })
    }

    fn supports_scripting(&self) -> bool {
        true
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        if script == MARK_HIDDEN_JS {
            return Ok(serde_json::json!(0));
        }
        Ok(serde_json::json!(self.fixture.globals))
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.fixture.html.clone())
    }

    async fn visible_text(&self) -> Result<String> {
        Ok(text_from_html(&self.fixture.html))
    }

    async fn take_network_log(&mut self) -> Vec<NetworkRequest> {
        if !self.capturing {
            return Vec::new();
        }
        self.capturing = false;
        self.fixture.snapshot().network_requests
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.fixture
            .screenshot
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no screenshot"))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.release();
        Ok(())
    }
}

/// Defaults with no settle wait, so tests run fast.
pub fn fast_config() -> AuditConfig {
    AuditConfig::from_json(
        r#"{"settle_ms": 0, "render_timeout_ms": 5000, "per_detector_timeout_ms": 2000}"#,
    )
    .expect("test config is valid")
}
