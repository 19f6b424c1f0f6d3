//! Voice assistant features: Web Speech API use, voice buttons, voice SDKs.

use super::dom::PageView;
use super::evidence::{collect_vendor_evidence, labels_in_order, signatures, Evidence};
use super::{runtime_gap, BotFinding, DetectorKind, DetectorVerdict};
use crate::renderer::PageSnapshot;

pub fn detect(snapshot: &PageSnapshot) -> DetectorVerdict<BotFinding> {
    let view = PageView::new(snapshot);
    let evidence = collect_vendor_evidence(&view, &signatures().voice);
    let providers = labels_in_order(&evidence);
    DetectorVerdict::new(
        DetectorKind::VoiceAssistant,
        BotFinding {
            detected: !providers.is_empty(),
            providers,
        },
        evidence.iter().map(Evidence::describe).collect(),
        runtime_gap(snapshot, true),
    )
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
    fn test_speech_recognition_needs_start_call() {
        let declared_only = page(
            "<script>const SR = window.SpeechRecognition || window.webkitSpeechRecognition;</script>",
        );
        assert!(!detect(&declared_only).payload.detected);

        let started = page(
            "<script>const r = new webkitSpeechRecognition();\nbtn.onclick = () => r.start();</script>",
        );
        assert_eq!(detect(&started).payload.providers, vec!["Web Speech API"]);
    }

    #[test]
    fn test_visible_voice_button() {
        let verdict = detect(&page(r#"<button aria-label="Search by voice">mic</button>"#));
        assert_eq!(verdict.payload.providers, vec!["Voice Search"]);
    }

    #[test]
    fn test_plain_page_has_no_voice() {
        let verdict = detect(&page("<p>We fix pipes.</p>"));
        assert_eq!(verdict.payload, BotFinding::default());
    }
}
