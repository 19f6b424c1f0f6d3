//! Frameworks, CMS and CSS frameworks.
//!
//! Every signature is evaluated; several technologies routinely coexist (a
//! React app on Next.js styled with Tailwind). `<meta name="generator">`
//! contributes its product token. When nothing matches at all, frameworks
//! report [`UNMANAGED_SENTINEL`] so later stages never see an empty stack.

use super::dom::PageView;
use super::evidence::{signatures, Evidence, TechCategory, TechSignature};
use super::{runtime_gap, Absence, DetectorKind, DetectorVerdict};
use crate::renderer::PageSnapshot;
use serde::{Deserialize, Serialize};

/// Reported when no framework, CMS or CSS framework was recognised.
pub const UNMANAGED_SENTINEL: &str = "Unmanaged/Custom";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStack {
    pub frameworks: Vec<String>,
    pub cms: Vec<String>,
    pub css_frameworks: Vec<String>,
}

impl TechStack {
    /// Whether this is the "nothing recognised" stack.
    pub fn is_unmanaged(&self) -> bool {
        self.cms.is_empty()
            && self.css_frameworks.is_empty()
            && self.frameworks.iter().all(|f| f == UNMANAGED_SENTINEL)
    }

    /// CSS frameworks other than the sentinel.
    pub fn has_css_framework(&self) -> bool {
        self.css_frameworks.iter().any(|c| c != UNMANAGED_SENTINEL)
    }
}

impl Absence for TechStack {
    fn absent() -> Self {
        Self {
            frameworks: vec![UNMANAGED_SENTINEL.to_string()],
            cms: Vec::new(),
            css_frameworks: Vec::new(),
        }
    }
}

/// A matched technology: which bucket it lands in and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechEvidence {
    pub category: TechCategory,
    pub evidence: Evidence,
}

pub fn detect(snapshot: &PageSnapshot) -> DetectorVerdict<TechStack> {
    let view = PageView::new(snapshot);
    let found = collect(&view, &signatures().tech_stack);
    let described = found.iter().map(|t| t.evidence.describe()).collect();
    DetectorVerdict::new(
        DetectorKind::TechStack,
        fold(&found),
        described,
        runtime_gap(snapshot, false),
    )
}

fn collect(view: &PageView<'_>, rules: &[TechSignature]) -> Vec<TechEvidence> {
    let mut found = Vec::new();
    for rule in rules {
        // One marker is enough to prove a technology.
        if let Some(marker) = rule.markers.iter().find(|m| m.matches(view)) {
            found.push(TechEvidence {
                category: rule.category,
                evidence: Evidence::new(marker, Some(rule.name.as_str())),
            });
        }
    }

    if let Some(generator) = view.meta_name("generator") {
        // Plugins announce themselves here too; only known products count.
        let known = generator_product(&generator).and_then(|product| {
            rules
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(&product))
                .map(|r| (product, r.category))
        });
        if let Some((product, category)) = known {
            found.push(TechEvidence {
                category,
                evidence: Evidence {
                    channel: "meta",
                    marker: format!("generator={generator}"),
                    label: Some(product),
                },
            });
        }
    }
    found
}

/// Fold matched evidence into the three buckets.
///
/// Exact duplicates are dropped here; case variants ("wordpress" from a
/// generator tag next to "WordPress" from a signature) are left for the
/// aggregator's case-insensitive merge.
pub fn fold(found: &[TechEvidence]) -> TechStack {
    let mut stack = TechStack::default();
    for item in found {
        let Some(label) = &item.evidence.label else {
            continue;
        };
        let bucket = match item.category {
            TechCategory::Framework => &mut stack.frameworks,
            TechCategory::Cms => &mut stack.cms,
            TechCategory::CssFramework => &mut stack.css_frameworks,
        };
        if !bucket.contains(label) {
            bucket.push(label.clone());
        }
    }
    if stack.frameworks.is_empty() && stack.cms.is_empty() && stack.css_frameworks.is_empty() {
        return TechStack::absent();
    }
    stack
}

/// First token of a generator string, without version or `.com` suffix:
/// `"WordPress 6.4.2"` gives `WordPress`, `"Wix.com Website Builder"` gives `Wix`.
fn generator_product(generator: &str) -> Option<String> {
    let token = generator.split_whitespace().next()?;
    let token = token.trim_end_matches(".com").trim_end_matches(|c: char| c == ',' || c == ';');
    if token.is_empty() || token.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some(token.to_string())
}
