//! Parsed view of a snapshot shared by the checks of one detector.
//!
//! `scraper::Html` is `!Send`, so a `PageView` lives entirely inside one
//! blocking task. Each detector builds its own.

use crate::renderer::{PageSnapshot, HIDDEN_ATTR};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

pub struct PageView<'a> {
    pub snapshot: &'a PageSnapshot,
    pub document: Html,
    html_lower: String,
}

impl<'a> PageView<'a> {
    pub fn new(snapshot: &'a PageSnapshot) -> Self {
        Self {
            snapshot,
            document: Html::parse_document(&snapshot.dom_html),
            html_lower: snapshot.dom_html.to_ascii_lowercase(),
        }
    }

    /// Lowercased raw HTML, for substring evidence.
    pub fn html_lower(&self) -> &str {
        &self.html_lower
    }

    /// Elements matching `css`. An unparsable selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(sel) => self.document.select(&sel).collect(),
            Err(e) => {
                debug!("skipping invalid selector {css:?}: {e:?}");
                Vec::new()
            }
        }
    }

    pub fn exists(&self, css: &str) -> bool {
        !self.select(css).is_empty()
    }

    /// First element matching `css` that is rendered.
    pub fn first_visible(&self, css: &str) -> Option<ElementRef<'_>> {
        self.select(css).into_iter().find(|el| is_visible(*el))
    }

    /// `content` of the first `<meta name=..>` with a non-blank value.
    pub fn meta_name(&self, name: &str) -> Option<String> {
        self.attr_of(&format!(r#"meta[name="{name}" i]"#), "content")
    }

    /// `content` of the first `<meta property=..>` with a non-blank value.
    pub fn meta_property(&self, property: &str) -> Option<String> {
        self.attr_of(&format!(r#"meta[property="{property}" i]"#), "content")
    }

    fn attr_of(&self, css: &str, attr: &str) -> Option<String> {
        self.select(css)
            .into_iter()
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(String::from)
    }

    /// Trimmed text of `<title>`, when non-empty.
    pub fn title(&self) -> Option<String> {
        self.select("title")
            .into_iter()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
    }

    /// Parsed URLs of the captured network log, skipping unparsable entries.
    pub fn requests(&self) -> impl Iterator<Item = Url> + '_ {
        self.snapshot
            .network_requests
            .iter()
            .filter_map(|r| Url::parse(&r.url).ok())
    }

    /// Absolute URLs of `<script src>` elements.
    pub fn script_sources(&self) -> Vec<Url> {
        let base = Url::parse(&self.snapshot.final_url).ok();
        self.select("script[src]")
            .into_iter()
            .filter_map(|el| el.value().attr("src"))
            .filter_map(|src| match &base {
                Some(b) => b.join(src).ok(),
                None => Url::parse(src).ok(),
            })
            .collect()
    }

    /// Hrefs of anchors that are rendered.
    pub fn visible_hrefs(&self) -> Vec<String> {
        self.select("a[href]")
            .into_iter()
            .filter(|el| is_visible(*el))
            .filter_map(|el| el.value().attr("href"))
            .map(|h| h.trim().to_string())
            .collect()
    }
}

/// Whether an element is rendered with a non-zero box.
///
/// An element counts as hidden when it or any ancestor was marked hidden by
/// the browser, carries the `hidden` attribute, or is hidden by an inline
/// style. A zero-size mark only applies to the element itself, since fixed
/// or absolutely positioned children can overflow an empty container.
pub fn is_visible(el: ElementRef<'_>) -> bool {
    if hidden_by_attributes(el, true) {
        return false;
    }
    !el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| hidden_by_attributes(ancestor, false))
}

fn hidden_by_attributes(el: ElementRef<'_>, is_target: bool) -> bool {
    let value = el.value();
    match value.attr(HIDDEN_ATTR) {
        Some("style") => return true,
        Some("empty") if is_target => return true,
        _ => {}
    }
    if value.attr("hidden").is_some() {
        return true;
    }
    if value.name() == "input" && value.attr("type") == Some("hidden") {
        return true;
    }
    value.attr("style").is_some_and(inline_style_hides)
}

/// Parse an inline `style` attribute for the declarations that hide an element.
fn inline_style_hides(style: &str) -> bool {
    style.split(';').any(|decl| {
        let Some((prop, val)) = decl.split_once(':') else {
            return false;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let val = val
            .trim()
            .trim_end_matches("!important")
            .trim()
            .to_ascii_lowercase();
        match prop.as_str() {
            "display" => val == "none",
            "visibility" => val == "hidden" || val == "collapse",
            "opacity" => val.parse::<f32>().map(|o| o <= 0.0).unwrap_or(false),
            _ => false,
        }
    })
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `url` matches a `host[/path-prefix]` pattern. The host matches
/// itself and any subdomain.
pub fn url_matches(url: &Url, pattern: &str) -> bool {
    let (domain, path) = match pattern.split_once('/') {
        Some((d, p)) => (d, Some(p)),
        None => (pattern, None),
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    let host_ok = host == domain || host.ends_with(&format!(".{domain}"));
    match path {
        Some(p) => host_ok && url.path().trim_start_matches('/').starts_with(p),
        None => host_ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_of(html: &str) -> PageSnapshot {
        PageSnapshot {
            final_url: "https://acme.test/".to_string(),
            dom_html: html.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_inline_hidden_element_is_not_visible() {
        let snap = view_of(
            r#"<body><div id="chat-widget" style="display: none">x</div>
               <div id="visible-chat">y</div></body>"#,
        );
        let view = PageView::new(&snap);
        assert!(view.first_visible("#chat-widget").is_none());
        assert!(view.first_visible("#visible-chat").is_some());
    }

    #[test]
    fn test_marked_ancestor_hides_descendants() {
        let snap = view_of(&format!(
            r#"<body><section {HIDDEN_ATTR}="style"><a href="https://wa.me/1">wa</a></section></body>"#
        ));
        let view = PageView::new(&snap);
        assert!(view.visible_hrefs().is_empty());
    }

    #[test]
    fn test_zero_size_mark_applies_only_to_the_element() {
        let snap = view_of(&format!(
            r#"<body><div id="launcher" {HIDDEN_ATTR}="empty"><button id="bubble">Chat</button></div></body>"#
        ));
        let view = PageView::new(&snap);
        assert!(view.first_visible("#launcher").is_none());
        assert!(view.first_visible("#bubble").is_some());
    }

    #[test]
    fn test_inline_style_parsing() {
        assert!(inline_style_hides("color:red; display:none"));
        assert!(inline_style_hides("visibility: hidden !important"));
        assert!(inline_style_hides("opacity:0"));
        assert!(!inline_style_hides("opacity:0.5"));
        assert!(!inline_style_hides("display:flex"));
    }

    #[test]
    fn test_url_matches_subdomains_and_paths() {
        let url = Url::parse("https://js.intercom.io/shim.latest.js").unwrap();
        assert!(url_matches(&url, "intercom.io"));
        assert!(!url_matches(&url, "com.io"));
        assert!(!url_matches(&url, "notintercom.io"));

        let hubspot = Url::parse("https://app.hubspot.com/conversations-visitor/123").unwrap();
        assert!(url_matches(&hubspot, "hubspot.com/conversations"));
        assert!(!url_matches(&hubspot, "hubspot.com/forms"));
    }

    #[test]
    fn test_script_sources_resolve_relative() {
        let snap = view_of(r#"<script src="/_next/static/app.js"></script>"#);
        let view = PageView::new(&snap);
        let sources = view.script_sources();
        assert_eq!(sources[0].as_str(), "https://acme.test/_next/static/app.js");
    }
}
