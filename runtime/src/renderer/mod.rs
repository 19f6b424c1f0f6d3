//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide, or a plain HTTP fetch
//! when no browser is available). [`snapshot::render_snapshot`] drives a
//! context through one audit run and freezes the result into a
//! [`PageSnapshot`].

pub mod chromium;
pub mod http;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Attribute stamped on elements the browser reports as not rendered.
///
/// Value `"style"` means hidden by CSS (inherited by descendants), value
/// `"empty"` means the element itself has a zero-size box.
pub const HIDDEN_ATTR: &str = "data-leadlens-hidden";

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code (200 when the engine does not expose it).
    pub status: u16,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// One outgoing request observed while the page loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub url: String,
    /// Milliseconds since network capture started.
    pub timestamp_ms: u64,
}

/// Frozen view of a rendered page. Every detector reads the same snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// URL after redirects.
    pub final_url: String,
    /// Serialized outer HTML taken after the settle wait.
    pub dom_html: String,
    /// Rendered, visibility-filtered text.
    pub visible_text: String,
    /// Requests in the order they were issued.
    pub network_requests: Vec<NetworkRequest>,
    /// Watched `window` properties that were defined on the page.
    pub window_globals: Vec<String>,
    /// PNG screenshot, present only when vision scoring asked for it.
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
    /// Whether the engine executed page scripts (false for HTTP-only fetches).
    pub scripted: bool,
}

impl PageSnapshot {
    /// Whether a watched global was found on the page.
    pub fn has_global(&self, name: &str) -> bool {
        self.window_globals.iter().any(|g| g == name)
    }
}

/// Per-run rendering parameters.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Wall-clock budget for navigation, settle wait and capture together.
    pub budget_ms: u64,
    /// Post-load delay before the DOM is frozen.
    pub settle_ms: u64,
    /// `window` properties to look up after the settle wait.
    pub watched_globals: Vec<String>,
    /// Capture a viewport screenshot.
    pub capture_screenshot: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            budget_ms: 60_000,
            settle_ms: 5_000,
            watched_globals: Vec::new(),
            capture_screenshot: false,
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new, isolated context (tab) for one audit run.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single rendering context, owned by exactly one audit run.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Begin recording outgoing requests. Must be called before `navigate`.
    async fn start_network_capture(&mut self) -> Result<()>;
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Whether `execute_js` is available.
    fn supports_scripting(&self) -> bool;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the rendered text of the body.
    async fn visible_text(&self) -> Result<String>;
    /// Stop recording and hand over the request log.
    async fn take_network_log(&mut self) -> Vec<NetworkRequest>;
    /// Capture a PNG of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Marks elements that are not rendered so static HTML analysis can tell
/// a hidden chat container from a visible one.
///
/// Walks from the end of the document: widgets are appended last, and on
/// huge pages only the trailing 20000 elements are checked.
pub const MARK_HIDDEN_JS: &str = r#"(() => {
  const attr = 'data-leadlens-hidden';
  let marked = 0;
  const elements = document.body ? document.body.querySelectorAll('*') : [];
  const stop = Math.max(0, elements.length - 20000);
  for (let i = elements.length - 1; i >= stop; i--) {
    const el = elements[i];
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
      el.setAttribute(attr, 'style');
      marked++;
      continue;
    }
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) {
      el.setAttribute(attr, 'empty');
      marked++;
    }
  }
  return marked;
})()"#;

/// Build a script returning the subset of `names` defined on `window`.
pub fn globals_lookup_script(names: &[String]) -> String {
    let list = serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string());
    format!(
        "(() => {{ const names = {list}; return names.filter(n => {{ \
         try {{ return typeof window[n] !== 'undefined' && window[n] !== null; }} \
         catch (e) {{ return false; }} }}); }})()"
    )
}
