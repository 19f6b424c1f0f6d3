//! Messaging-channel presence: WhatsApp, Telegram, Messenger, ManyChat.
//!
//! Links and widget containers only count when rendered.

use super::dom::PageView;
use super::evidence::{collect_vendor_evidence, labels_in_order, signatures, Evidence};
use super::{runtime_gap, BotFinding, DetectorKind, DetectorVerdict};
use crate::renderer::PageSnapshot;

pub fn detect(snapshot: &PageSnapshot) -> DetectorVerdict<BotFinding> {
    let view = PageView::new(snapshot);
    let evidence = collect_vendor_evidence(&view, &signatures().social_bot);
    let providers = labels_in_order(&evidence);
    DetectorVerdict::new(
        DetectorKind::SocialBot,
        BotFinding {
            detected: !providers.is_empty(),
            providers,
        },
        evidence.iter().map(Evidence::describe).collect(),
        runtime_gap(snapshot, true),
    )
}
