//! Declarative evidence tables.
//!
//! Every detector that looks for known vendors or technologies is driven by
//! the rules in `signatures.json`, embedded at compile time. A rule is a list
//! of markers plus the label it proves. Detectors first collect every matched
//! [`Evidence`], then fold the list into their typed verdict, so the folding
//! step can be tested with synthetic evidence and no DOM at all.

use super::dom::{url_matches, PageView};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;

const SIGNATURES_JSON: &str = include_str!("signatures.json");

// ── Markers ──────────────────────────────────────────────────────────────────

/// One observable trace a technology or vendor leaves on a page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Marker {
    /// Property defined on `window` (only observable on scripted renders).
    Global(String),
    /// CSS selector matching any element, rendered or not.
    Selector(String),
    /// CSS selector matching at least one rendered element.
    VisibleSelector(String),
    /// Case-insensitive substring of the raw HTML.
    Html(String),
    /// Regular expression over the raw HTML.
    HtmlPattern(String),
    /// `host[/path]` of a captured request or a `<script src>`.
    Network(String),
    /// `host[/path]` or `scheme:` of a rendered anchor's href.
    VisibleLink(String),
}

impl Marker {
    /// Check this marker against a page.
    pub fn matches(&self, view: &PageView<'_>) -> bool {
        match self {
            Marker::Global(name) => view.snapshot.has_global(name),
            Marker::Selector(css) => view.exists(css),
            Marker::VisibleSelector(css) => view.first_visible(css).is_some(),
            Marker::Html(needle) => view.html_lower().contains(&needle.to_ascii_lowercase()),
            Marker::HtmlPattern(pattern) => match Regex::new(pattern) {
                Ok(re) => re.is_match(&view.snapshot.dom_html),
                Err(e) => {
                    debug!("skipping invalid pattern {pattern:?}: {e}");
                    false
                }
            },
            Marker::Network(pattern) => {
                view.requests().any(|u| url_matches(&u, pattern))
                    || view.script_sources().iter().any(|u| url_matches(u, pattern))
            }
            Marker::VisibleLink(pattern) => view
                .visible_hrefs()
                .iter()
                .any(|href| link_matches(href, pattern)),
        }
    }

    /// Evidence channel name used in verdict evidence strings.
    pub fn channel(&self) -> &'static str {
        match self {
            Marker::Global(_) => "global",
            Marker::Selector(_) | Marker::VisibleSelector(_) => "dom",
            Marker::Html(_) | Marker::HtmlPattern(_) => "html",
            Marker::Network(_) => "network",
            Marker::VisibleLink(_) => "link",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Marker::Global(v)
            | Marker::Selector(v)
            | Marker::VisibleSelector(v)
            | Marker::Html(v)
            | Marker::HtmlPattern(v)
            | Marker::Network(v)
            | Marker::VisibleLink(v) => v,
        }
    }
}

fn link_matches(href: &str, pattern: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    if let Some(scheme) = pattern.strip_suffix(':') {
        return lower.starts_with(&format!("{scheme}:"));
    }
    match url::Url::parse(&lower) {
        Ok(u) => url_matches(&u, pattern),
        Err(_) => false,
    }
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Category a tech-stack signature reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechCategory {
    Framework,
    Cms,
    CssFramework,
}

/// A technology and the markers proving it.
#[derive(Debug, Clone, Deserialize)]
pub struct TechSignature {
    pub name: String,
    pub category: TechCategory,
    pub markers: Vec<Marker>,
}

/// A vendor (or unattributed widget when `vendor` is `None`).
#[derive(Debug, Clone, Deserialize)]
pub struct VendorSignature {
    #[serde(default)]
    pub vendor: Option<String>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignatureTables {
    pub tech_stack: Vec<TechSignature>,
    pub chatbot: Vec<VendorSignature>,
    pub social_bot: Vec<VendorSignature>,
    pub voice: Vec<VendorSignature>,
}

/// Parse and cache the embedded signature tables.
pub fn signatures() -> &'static SignatureTables {
    static TABLES: OnceLock<SignatureTables> = OnceLock::new();
    TABLES.get_or_init(|| serde_json::from_str(SIGNATURES_JSON).unwrap_or_default())
}

/// Every `window` property any signature checks for, in table order.
pub fn watched_globals() -> Vec<String> {
    let tables = signatures();
    let tech = tables.tech_stack.iter().flat_map(|s| s.markers.iter());
    let vendors = tables
        .chatbot
        .iter()
        .chain(&tables.social_bot)
        .chain(&tables.voice)
        .flat_map(|s| s.markers.iter());

    let mut names: Vec<String> = Vec::new();
    for marker in tech.chain(vendors) {
        if let Marker::Global(name) = marker {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

// ── Evidence ─────────────────────────────────────────────────────────────────

/// A marker that matched, with the label it proves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub channel: &'static str,
    pub marker: String,
    pub label: Option<String>,
}

impl Evidence {
    pub fn new(marker: &Marker, label: Option<&str>) -> Self {
        Self {
            channel: marker.channel(),
            marker: marker.value().to_string(),
            label: label.map(String::from),
        }
    }

    /// Display form stored on the verdict, e.g. `network:intercom.io => Intercom`.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{}:{} => {label}", self.channel, self.marker),
            None => format!("{}:{}", self.channel, self.marker),
        }
    }
}

/// Evaluate vendor rules, recording every matched marker.
pub fn collect_vendor_evidence(view: &PageView<'_>, rules: &[VendorSignature]) -> Vec<Evidence> {
    let mut found = Vec::new();
    for rule in rules {
        for marker in &rule.markers {
            if marker.matches(view) {
                found.push(Evidence::new(marker, rule.vendor.as_deref()));
            }
        }
    }
    found
}

/// Labels in first-seen order, without exact duplicates.
pub fn labels_in_order(evidence: &[Evidence]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in evidence.iter().filter_map(|e| e.label.as_ref()) {
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }
    labels
}
