//! Layout and design-modernity signals.
//!
//! Responsiveness is only partly decided here: viewport meta and media
//! queries are direct evidence, while a detected CSS framework is indirect
//! evidence folded in by the aggregator once the tech-stack verdict is known.

use super::dom::{is_visible, PageView};
use super::{runtime_gap, Absence, DetectorKind, DetectorVerdict};
use crate::renderer::PageSnapshot;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Animation libraries exposed on `window`.
pub const ANIMATION_GLOBALS: &[&str] = &["gsap", "anime", "AOS"];

const CTA_PHRASES: &[&str] = &[
    "get started",
    "sign up",
    "try free",
    "contact",
    "buy now",
    "learn more",
    "book now",
    "get a quote",
    "free quote",
    "call now",
    "schedule",
];

const FONT_HOSTS: &[&str] = &[
    "fonts.googleapis.com",
    "fonts.adobe.com",
    "use.typekit.net",
    "typekit.com",
    "fonts.bunny.net",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignQuality {
    #[default]
    Poor,
    Average,
    Good,
    Excellent,
}

impl DesignQuality {
    /// Bucket by how many of the four modernity signals are present.
    fn from_signal_count(count: usize) -> Self {
        match count {
            0 | 1 => DesignQuality::Poor,
            2 => DesignQuality::Average,
            3 => DesignQuality::Good,
            _ => DesignQuality::Excellent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignFinding {
    pub has_viewport: bool,
    pub has_media_queries: bool,
    /// Flexbox or grid layout.
    pub has_modern_layout: bool,
    pub has_custom_fonts: bool,
    pub has_animations: bool,
    pub has_lazy_loading: bool,
    pub has_favicon: bool,
    pub has_call_to_action: bool,
    pub has_navigation: bool,
    /// Web app manifest linked.
    pub has_manifest: bool,
    pub quality: DesignQuality,
}

impl Absence for DesignFinding {
    fn absent() -> Self {
        Self::default()
    }
}

pub fn detect(snapshot: &PageSnapshot) -> DetectorVerdict<DesignFinding> {
    let view = PageView::new(snapshot);
    let html = view.html_lower();

    let layout_re = Regex::new(r#"display\s*:\s*(inline-)?(flex|grid)\b|class="[^"]*\b(d-flex|flex|grid|flex-row|flex-col)\b"#)
        .expect("layout regex is valid");
    let motion_re =
        Regex::new(r"@keyframes|\b(animation|transition)\s*:").expect("motion regex is valid");

    let mut finding = DesignFinding {
        has_viewport: view.meta_name("viewport").is_some(),
        has_media_queries: html.contains("@media")
            || view.exists(r#"link[rel~="stylesheet" i][media*="width"]"#),
        has_modern_layout: layout_re.is_match(html),
        has_custom_fonts: html.contains("@font-face")
            || view
                .select("link[href]")
                .iter()
                .filter_map(|el| el.value().attr("href"))
                .any(|href| FONT_HOSTS.iter().any(|h| href.contains(h))),
        has_animations: motion_re.is_match(html)
            || view.exists(r#"[class*="animate"]"#)
            || ANIMATION_GLOBALS.iter().any(|g| snapshot.has_global(g)),
        has_lazy_loading: view.exists(r#"[loading="lazy"], img[data-src], [class*="lazyload"]"#),
        has_favicon: view.exists(r#"link[rel~="icon" i], link[rel="apple-touch-icon"]"#),
        has_call_to_action: has_call_to_action(&view),
        has_navigation: view.exists(r#"nav, [role="navigation"], ul.menu, .navbar"#),
        has_manifest: view.exists(r#"link[rel="manifest"]"#),
        quality: DesignQuality::Poor,
    };
    let signals = [
        finding.has_modern_layout,
        finding.has_custom_fonts,
        finding.has_animations,
        finding.has_viewport,
    ];
    finding.quality = DesignQuality::from_signal_count(signals.iter().filter(|s| **s).count());

    let evidence = vec![format!("quality:{:?}", finding.quality)];
    DetectorVerdict::new(
        DetectorKind::Design,
        finding,
        evidence,
        runtime_gap(snapshot, false),
    )
}

/// A rendered button or link whose text reads like a call to action.
fn has_call_to_action(view: &PageView<'_>) -> bool {
    view.select(r#"button, a, input[type="submit"]"#)
        .into_iter()
        .filter(|el| is_visible(*el))
        .any(|el| {
            let text = el.text().collect::<String>().to_lowercase();
            let value = el.value().attr("value").unwrap_or_default().to_lowercase();
            CTA_PHRASES
                .iter()
                .any(|p| text.contains(p) || value.contains(p))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> PageSnapshot {
        PageSnapshot {
            final_url: "https://acme.test/".into(),
            dom_html: html.into(),
            scripted: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_modern_page_is_excellent() {
        let verdict = detect(&page(
            r#"<html><head><meta name="viewport" content="width=device-width">
               <link href="https://fonts.googleapis.com/css2?family=Inter" rel="stylesheet">
               <style>.hero { display: grid; transition: opacity .2s } @media (max-width: 600px) {}</style>
               <link rel="icon" href="/favicon.ico"><link rel="manifest" href="/site.webmanifest">
               </head><body><nav><a href="/">Home</a></nav>
               <a class="btn" href="/quote">Get a Quote</a>
               <img loading="lazy" src="/van.webp"></body></html>"#,
        ));
        let f = verdict.payload;
        assert!(f.has_viewport && f.has_media_queries && f.has_modern_layout);
        assert!(f.has_custom_fonts && f.has_animations && f.has_lazy_loading);
        assert!(f.has_favicon && f.has_manifest && f.has_navigation && f.has_call_to_action);
        assert_eq!(f.quality, DesignQuality::Excellent);
    }

    #[test]
    fn test_table_layout_page_is_poor() {
        let verdict = detect(&page(
            r#"<html><body><table width="100%"><tr><td>Welcome to our site</td></tr></table></body></html>"#,
        ));
        assert_eq!(verdict.payload, DesignFinding::default());
    }

    #[test]
    fn test_hidden_cta_does_not_count() {
        let verdict = detect(&page(
            r#"<body><div style="display:none"><button>Contact us</button></div></body>"#,
        ));
        assert!(!verdict.payload.has_call_to_action);
    }

    #[test]
    fn test_animation_library_global() {
        let snap = PageSnapshot {
            window_globals: vec!["gsap".into()],
            ..page("<html></html>")
        };
        assert!(detect(&snap).payload.has_animations);
    }

    #[test]
    fn test_quality_buckets() {
        assert_eq!(DesignQuality::from_signal_count(0), DesignQuality::Poor);
        assert_eq!(DesignQuality::from_signal_count(1), DesignQuality::Poor);
        assert_eq!(DesignQuality::from_signal_count(2), DesignQuality::Average);
        assert_eq!(DesignQuality::from_signal_count(3), DesignQuality::Good);
        assert_eq!(DesignQuality::from_signal_count(4), DesignQuality::Excellent);
    }
}
