//! The detector set.
//!
//! Each detector is a pure function from a frozen [`PageSnapshot`] to one
//! typed [`DetectorVerdict`]. [`DetectorKind`] is the tagged variant the
//! orchestrator fans out over; [`Verdict`] carries the typed result back.
//!
//! All detectors are **synchronous** because `scraper` types are `!Send`.
//! The orchestrator runs each one inside `tokio::task::spawn_blocking`.

pub mod chatbot;
pub mod design;
pub mod dom;
pub mod evidence;
pub mod seo;
pub mod social_bot;
pub mod tech_stack;
pub mod voice;

use crate::renderer::PageSnapshot;
use serde::{Deserialize, Serialize};

pub use design::DesignFinding;
pub use seo::SeoFinding;
pub use tech_stack::TechStack;

// ── Verdicts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Every evidence channel the detector reads was available.
    Ok,
    /// Some channel was unavailable (e.g. empty network log) but the rest ran.
    Degraded,
    /// The detector raised or timed out and contributed no evidence.
    Failed,
}

/// The zero value a detector reports when it has nothing to say.
pub trait Absence {
    fn absent() -> Self;
}

/// One detector's result for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorVerdict<T> {
    pub detector_name: String,
    pub status: VerdictStatus,
    pub payload: T,
    /// Matched evidence, in the order it was collected.
    pub evidence: Vec<String>,
    /// Why the verdict is degraded or failed.
    pub note: Option<String>,
}

impl<T: Absence> DetectorVerdict<T> {
    pub fn new(kind: DetectorKind, payload: T, evidence: Vec<String>, gap: Option<String>) -> Self {
        Self {
            detector_name: kind.name().to_string(),
            status: if gap.is_some() {
                VerdictStatus::Degraded
            } else {
                VerdictStatus::Ok
            },
            payload,
            evidence,
            note: gap,
        }
    }

    /// A failed verdict carrying the detector's absence value.
    pub fn failed(kind: DetectorKind, reason: impl Into<String>) -> Self {
        Self {
            detector_name: kind.name().to_string(),
            status: VerdictStatus::Failed,
            payload: T::absent(),
            evidence: Vec::new(),
            note: Some(reason.into()),
        }
    }
}

/// Presence verdict shared by the chatbot, social-bot and voice detectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotFinding {
    pub detected: bool,
    /// Identified vendors or platforms, first-seen order.
    pub providers: Vec<String>,
}

impl Absence for BotFinding {
    fn absent() -> Self {
        Self::default()
    }
}

/// A typed verdict from any detector.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    TechStack(DetectorVerdict<TechStack>),
    Chatbot(DetectorVerdict<BotFinding>),
    SocialBot(DetectorVerdict<BotFinding>),
    VoiceAssistant(DetectorVerdict<BotFinding>),
    Seo(DetectorVerdict<SeoFinding>),
    Design(DetectorVerdict<DesignFinding>),
}

impl Verdict {
    pub fn kind(&self) -> DetectorKind {
        match self {
            Verdict::TechStack(_) => DetectorKind::TechStack,
            Verdict::Chatbot(_) => DetectorKind::Chatbot,
            Verdict::SocialBot(_) => DetectorKind::SocialBot,
            Verdict::VoiceAssistant(_) => DetectorKind::VoiceAssistant,
            Verdict::Seo(_) => DetectorKind::Seo,
            Verdict::Design(_) => DetectorKind::Design,
        }
    }

    pub fn status(&self) -> VerdictStatus {
        match self {
            Verdict::TechStack(v) => v.status,
            Verdict::Chatbot(v) | Verdict::SocialBot(v) | Verdict::VoiceAssistant(v) => v.status,
            Verdict::Seo(v) => v.status,
            Verdict::Design(v) => v.status,
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Verdict::TechStack(v) => v.note.as_deref(),
            Verdict::Chatbot(v) | Verdict::SocialBot(v) | Verdict::VoiceAssistant(v) => {
                v.note.as_deref()
            }
            Verdict::Seo(v) => v.note.as_deref(),
            Verdict::Design(v) => v.note.as_deref(),
        }
    }

    pub fn evidence(&self) -> &[String] {
        match self {
            Verdict::TechStack(v) => &v.evidence,
            Verdict::Chatbot(v) | Verdict::SocialBot(v) | Verdict::VoiceAssistant(v) => {
                &v.evidence
            }
            Verdict::Seo(v) => &v.evidence,
            Verdict::Design(v) => &v.evidence,
        }
    }
}

// ── Detector set ─────────────────────────────────────────────────────────────

/// One member of the detector set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    TechStack,
    Chatbot,
    SocialBot,
    VoiceAssistant,
    Seo,
    Design,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 6] = [
        DetectorKind::TechStack,
        DetectorKind::Chatbot,
        DetectorKind::SocialBot,
        DetectorKind::VoiceAssistant,
        DetectorKind::Seo,
        DetectorKind::Design,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::TechStack => "tech_stack",
            DetectorKind::Chatbot => "chatbot",
            DetectorKind::SocialBot => "social_bot",
            DetectorKind::VoiceAssistant => "voice_assistant",
            DetectorKind::Seo => "seo",
            DetectorKind::Design => "design",
        }
    }

    /// Run this detector against a snapshot.
    pub fn run(&self, snapshot: &PageSnapshot) -> Verdict {
        match self {
            DetectorKind::TechStack => Verdict::TechStack(tech_stack::detect(snapshot)),
            DetectorKind::Chatbot => Verdict::Chatbot(chatbot::detect(snapshot)),
            DetectorKind::SocialBot => Verdict::SocialBot(social_bot::detect(snapshot)),
            DetectorKind::VoiceAssistant => Verdict::VoiceAssistant(voice::detect(snapshot)),
            DetectorKind::Seo => Verdict::Seo(seo::detect(snapshot)),
            DetectorKind::Design => Verdict::Design(design::detect(snapshot)),
        }
    }

    /// A failed verdict for this detector, carrying its absence value.
    pub fn failed(&self, reason: impl Into<String>) -> Verdict {
        match self {
            DetectorKind::TechStack => Verdict::TechStack(DetectorVerdict::failed(*self, reason)),
            DetectorKind::Chatbot => Verdict::Chatbot(DetectorVerdict::failed(*self, reason)),
            DetectorKind::SocialBot => Verdict::SocialBot(DetectorVerdict::failed(*self, reason)),
            DetectorKind::VoiceAssistant => {
                Verdict::VoiceAssistant(DetectorVerdict::failed(*self, reason))
            }
            DetectorKind::Seo => Verdict::Seo(DetectorVerdict::failed(*self, reason)),
            DetectorKind::Design => Verdict::Design(DetectorVerdict::failed(*self, reason)),
        }
    }
}

/// Every `window` property some detector reads; the renderer looks these up
/// after the settle wait.
pub fn watched_globals() -> Vec<String> {
    let mut names = evidence::watched_globals();
    for name in design::ANIMATION_GLOBALS {
        if !names.iter().any(|n| n == name) {
            names.push((*name).to_string());
        }
    }
    names
}

/// Describe which runtime evidence channels a snapshot lacks.
pub(crate) fn runtime_gap(snapshot: &PageSnapshot, reads_network: bool) -> Option<String> {
    if !snapshot.scripted {
        Some("page scripts were not executed; window globals unavailable".to_string())
    } else if reads_network && snapshot.network_requests.is_empty() {
        Some("network log is empty".to_string())
    } else {
        None
    }
}
