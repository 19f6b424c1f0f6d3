//! Chat widget detection over three channels.
//!
//! * rendered DOM elements matching known widget markup (no vendor)
//! * captured requests to known chat-vendor domains
//! * `window` globals exposed by chat SDKs
//!
//! Any channel proves a chatbot. Only the network and global channels name
//! a provider; a visual-only match is a chatbot of unknown make.

use super::dom::PageView;
use super::evidence::{collect_vendor_evidence, labels_in_order, signatures, Evidence};
use super::{runtime_gap, BotFinding, DetectorKind, DetectorVerdict};
use crate::renderer::PageSnapshot;

pub fn detect(snapshot: &PageSnapshot) -> DetectorVerdict<BotFinding> {
    let view = PageView::new(snapshot);
    let evidence = collect_vendor_evidence(&view, &signatures().chatbot);
    DetectorVerdict::new(
        DetectorKind::Chatbot,
        fold(&evidence),
        evidence.iter().map(Evidence::describe).collect(),
        runtime_gap(snapshot, true),
    )
}

pub fn fold(evidence: &[Evidence]) -> BotFinding {
    let attributed: Vec<Evidence> = evidence
        .iter()
        .filter(|e| matches!(e.channel, "network" | "global"))
        .cloned()
        .collect();
    BotFinding {
        detected: !evidence.is_empty(),
        providers: labels_in_order(&attributed),
    }
}
