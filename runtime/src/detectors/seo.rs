//! Weighted SEO presence checklist.
//!
//! The score is the sum of the weights of the checks that pass. This is a
//! tag-presence table; content quality (title length, keyword use) is not
//! judged.

use super::dom::PageView;
use super::{Absence, DetectorKind, DetectorVerdict};
use crate::renderer::PageSnapshot;
use serde::{Deserialize, Serialize};

/// One scored check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeoCheck {
    Title,
    MetaDescription,
    OpenGraph,
    Viewport,
    Canonical,
}

impl SeoCheck {
    pub const ALL: [SeoCheck; 5] = [
        SeoCheck::Title,
        SeoCheck::MetaDescription,
        SeoCheck::OpenGraph,
        SeoCheck::Viewport,
        SeoCheck::Canonical,
    ];

    /// Points awarded when the check passes. The table sums to 100.
    pub const fn weight(self) -> u8 {
        match self {
            SeoCheck::Title => 25,
            SeoCheck::MetaDescription => 25,
            SeoCheck::OpenGraph => 15,
            SeoCheck::Viewport => 15,
            SeoCheck::Canonical => 20,
        }
    }

    fn passes(self, finding: &SeoFinding) -> bool {
        match self {
            SeoCheck::Title => finding.has_title,
            SeoCheck::MetaDescription => finding.has_meta_description,
            SeoCheck::OpenGraph => finding.has_open_graph,
            SeoCheck::Viewport => finding.has_viewport,
            SeoCheck::Canonical => finding.has_canonical,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoFinding {
    /// Weighted checklist score, `0..=100`.
    pub score: u8,
    pub has_title: bool,
    pub has_meta_description: bool,
    /// Both `og:title` and `og:description`.
    pub has_open_graph: bool,
    pub has_viewport: bool,
    pub has_canonical: bool,
    /// JSON-LD block present (reported, not scored).
    pub has_structured_data: bool,
    /// At least one `<h1>` (reported, not scored).
    pub has_h1: bool,
}

impl SeoFinding {
    /// Recompute `score` from the check flags.
    pub fn scored(mut self) -> Self {
        self.score = SeoCheck::ALL
            .iter()
            .filter(|c| c.passes(&self))
            .map(|c| c.weight())
            .sum();
        self
    }
}

impl Absence for SeoFinding {
    fn absent() -> Self {
        Self::default()
    }
}

pub fn detect(snapshot: &PageSnapshot) -> DetectorVerdict<SeoFinding> {
    let view = PageView::new(snapshot);

    let finding = SeoFinding {
        score: 0,
        has_title: view.title().is_some(),
        has_meta_description: view.meta_name("description").is_some(),
        has_open_graph: view.meta_property("og:title").is_some()
            && view.meta_property("og:description").is_some(),
        has_viewport: view.meta_name("viewport").is_some(),
        has_canonical: view
            .select(r#"link[rel~="canonical" i][href]"#)
            .iter()
            .any(|el| el.value().attr("href").is_some_and(|h| !h.trim().is_empty())),
        has_structured_data: view.exists(r#"script[type="application/ld+json" i]"#),
        has_h1: view.exists("h1"),
    }
    .scored();

    let evidence = SeoCheck::ALL
        .iter()
        .map(|c| {
            let mark = if c.passes(&finding) { "pass" } else { "fail" };
            format!("{c:?}:{mark}")
        })
        .collect();

    DetectorVerdict::new(DetectorKind::Seo, finding, evidence, None)
}
