//! Business name and contact email.

use crate::detectors::dom::{collapse_whitespace, PageView};
use regex::Regex;

const MAX_NAME_LEN: usize = 100;

/// Separators that split a site name from a page name in `<title>`.
const TITLE_SEPARATORS: &[&str] = &[" | ", "|", " - ", " – ", " — ", " · ", " :: "];

/// Local parts that signal a monitored inbox.
const PREFERRED_MARKERS: &[&str] = &["contact", "info", "hello", "support", "sales"];

/// Platform, placeholder and tracking domains that never belong to the business.
const BLOCKED_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "test.com",
    "domain.com",
    "email.com",
    "yourdomain.com",
    "sentry.io",
    "wixpress.com",
    "sentry-next.wixpress.com",
];

const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// Business name: `og:site_name`, then the first `<title>` segment, then
/// the first `<h1>`.
pub fn business_name(view: &PageView<'_>) -> Option<String> {
    let from_og = view.meta_property("og:site_name");
    let from_title = view.title().and_then(|t| first_title_segment(&t));
    let from_h1 = view
        .select("h1")
        .into_iter()
        .map(|h| collapse_whitespace(&h.text().collect::<String>()))
        .find(|t| !t.is_empty());

    from_og
        .or(from_title)
        .or(from_h1)
        .map(|n| truncate_chars(&collapse_whitespace(&n), MAX_NAME_LEN))
        .filter(|n| !n.is_empty())
}

fn first_title_segment(title: &str) -> Option<String> {
    let cut = TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .unwrap_or(title.len());
    let segment = title[..cut].trim();
    (!segment.is_empty()).then(|| segment.to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Contact email from visible text, falling back to `mailto:` links.
///
/// An address mentioning a monitored inbox (contact, info, ...) beats the
/// first address found.
pub fn contact_email(view: &PageView<'_>) -> Option<String> {
    let re = Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")
        .expect("email regex is valid");

    let mut candidates: Vec<String> = re
        .find_iter(&view.snapshot.visible_text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .collect();

    for href in view
        .select(r#"a[href^="mailto:" i]"#)
        .into_iter()
        .filter_map(|el| el.value().attr("href"))
    {
        let address = href[7..].split('?').next().unwrap_or_default();
        if let Some(m) = re.find(address) {
            candidates.push(m.as_str().to_string());
        }
    }

    let usable: Vec<String> = candidates.into_iter().filter(|c| is_usable(c)).collect();
    usable
        .iter()
        .find(|c| {
            let lower = c.to_ascii_lowercase();
            PREFERRED_MARKERS.iter().any(|m| lower.contains(m))
        })
        .or_else(|| usable.first())
        .cloned()
}

fn is_usable(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    let Some((_, domain)) = lower.rsplit_once('@') else {
        return false;
    };
    if ASSET_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return false;
    }
    !BLOCKED_DOMAINS
        .iter()
        .any(|b| domain == *b || domain.ends_with(&format!(".{b}")))
}
