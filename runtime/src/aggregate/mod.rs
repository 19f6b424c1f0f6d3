//! Evidence aggregator.
//!
//! A reduction over an unordered set of verdicts. Every detector that is
//! missing or failed is replaced by its absence value, so the result is
//! always fully shaped. Overlapping evidence is resolved here: string sets
//! are deduplicated case-insensitively, `is_ai_powered` is derived from the
//! configured vendor whitelist, and responsiveness picks up the tech-stack
//! detector's CSS frameworks.

pub mod dedup;
pub mod identity;

use crate::config::AuditConfig;
use crate::detectors::dom::PageView;
use crate::detectors::{
    Absence, BotFinding, DesignFinding, DetectorKind, DetectorVerdict, SeoFinding, TechStack,
    Verdict, VerdictStatus,
};
use crate::error::AuditError;
use crate::renderer::PageSnapshot;
use crate::side_channel::SideChannels;
use dedup::dedup_case_insensitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatbotSummary {
    pub detected: bool,
    pub providers: Vec<String>,
    /// Derived from the AI-vendor whitelist; never read from page text.
    pub is_ai_powered: bool,
}

/// Which externally sourced scores were actually measured this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measured {
    pub performance: bool,
    pub accessibility: bool,
    pub best_practices: bool,
    pub design: bool,
}

/// Everything observed about one site, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFindings {
    pub url: String,
    pub final_url: String,
    pub business_name: Option<String>,
    pub contact_email: Option<String>,
    pub tech_stack: TechStack,
    pub chatbot: ChatbotSummary,
    pub social_bot: BotFinding,
    pub voice_assistant: BotFinding,
    pub seo: SeoFinding,
    /// `0..=100`, the weighted checklist score.
    pub seo_score: u8,
    pub performance_score: u8,
    pub accessibility_score: u8,
    pub best_practices_score: u8,
    /// `0..=10`; the configured fallback when the vision scorer is off or failed.
    pub design_score: u8,
    pub measured: Measured,
    pub has_responsive_design: bool,
    pub uses_https: bool,
    pub design: DesignFinding,
    pub detector_status: BTreeMap<String, VerdictStatus>,
    /// What was defaulted and why.
    pub degradations: Vec<String>,
}

impl AuditFindings {
    /// All-default findings for a run that never reached the detectors.
    pub fn degraded(url: &str, reason: &str, config: &AuditConfig) -> Self {
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            business_name: None,
            contact_email: None,
            tech_stack: TechStack::absent(),
            chatbot: ChatbotSummary::default(),
            social_bot: BotFinding::absent(),
            voice_assistant: BotFinding::absent(),
            seo: SeoFinding::absent(),
            seo_score: 0,
            performance_score: 0,
            accessibility_score: 0,
            best_practices_score: 0,
            design_score: config.fallback_design_score,
            measured: Measured::default(),
            has_responsive_design: false,
            uses_https: false,
            design: DesignFinding::absent(),
            detector_status: DetectorKind::ALL
                .iter()
                .map(|k| (k.name().to_string(), VerdictStatus::Failed))
                .collect(),
            degradations: vec![reason.to_string()],
        }
    }
}

// ── Verdict collection ───────────────────────────────────────────────────────

/// At most one verdict per detector.
#[derive(Default)]
struct VerdictSet {
    tech_stack: Option<DetectorVerdict<TechStack>>,
    chatbot: Option<DetectorVerdict<BotFinding>>,
    social_bot: Option<DetectorVerdict<BotFinding>>,
    voice: Option<DetectorVerdict<BotFinding>>,
    seo: Option<DetectorVerdict<SeoFinding>>,
    design: Option<DetectorVerdict<DesignFinding>>,
}

fn place<T>(
    slot: &mut Option<DetectorVerdict<T>>,
    kind: DetectorKind,
    verdict: DetectorVerdict<T>,
) -> Result<(), AuditError> {
    if verdict.detector_name != kind.name() {
        return Err(AuditError::AggregationDefect(format!(
            "verdict named {:?} delivered as {}",
            verdict.detector_name,
            kind.name()
        )));
    }
    if slot.is_some() {
        return Err(AuditError::AggregationDefect(format!(
            "two verdicts for detector {}",
            kind.name()
        )));
    }
    *slot = Some(verdict);
    Ok(())
}

impl VerdictSet {
    fn collect(verdicts: Vec<Verdict>) -> Result<Self, AuditError> {
        let mut set = Self::default();
        for verdict in verdicts {
            let kind = verdict.kind();
            match verdict {
                Verdict::TechStack(v) => place(&mut set.tech_stack, kind, v)?,
                Verdict::Chatbot(v) => place(&mut set.chatbot, kind, v)?,
                Verdict::SocialBot(v) => place(&mut set.social_bot, kind, v)?,
                Verdict::VoiceAssistant(v) => place(&mut set.voice, kind, v)?,
                Verdict::Seo(v) => place(&mut set.seo, kind, v)?,
                Verdict::Design(v) => place(&mut set.design, kind, v)?,
            }
        }
        Ok(set)
    }
}

/// Bookkeeping for detector status and degradation notes.
struct Ledger {
    status: BTreeMap<String, VerdictStatus>,
    notes: Vec<String>,
}

impl Ledger {
    /// The payload to use for `kind`: the verdict's own unless it is
    /// missing or failed, in which case the absence value.
    fn settle<T: Absence>(&mut self, kind: DetectorKind, verdict: Option<DetectorVerdict<T>>) -> T {
        let name = kind.name();
        match verdict {
            None => {
                self.status.insert(name.to_string(), VerdictStatus::Failed);
                self.notes.push(format!("{name}: no verdict; defaulted"));
                T::absent()
            }
            Some(v) => {
                self.status.insert(name.to_string(), v.status);
                match v.status {
                    VerdictStatus::Ok => v.payload,
                    VerdictStatus::Degraded => {
                        let why = v.note.as_deref().unwrap_or("partial evidence");
                        self.notes.push(format!("{name}: {why}"));
                        v.payload
                    }
                    VerdictStatus::Failed => {
                        let why = v.note.as_deref().unwrap_or("failed");
                        self.notes.push(format!("{name}: {why}; defaulted"));
                        T::absent()
                    }
                }
            }
        }
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────────

/// Merge detector verdicts and side-channel scores into one finding set.
///
/// Returns [`AuditError::AggregationDefect`] when the verdict set itself is
/// malformed (a detector reported twice, or under the wrong name).
pub fn aggregate(
    url: &str,
    snapshot: &PageSnapshot,
    verdicts: Vec<Verdict>,
    side: &SideChannels,
    config: &AuditConfig,
) -> Result<AuditFindings, AuditError> {
    let set = VerdictSet::collect(verdicts)?;
    let mut ledger = Ledger {
        status: BTreeMap::new(),
        notes: Vec::new(),
    };

    let raw_stack = ledger.settle(DetectorKind::TechStack, set.tech_stack);
    let raw_chat = ledger.settle(DetectorKind::Chatbot, set.chatbot);
    let raw_social = ledger.settle(DetectorKind::SocialBot, set.social_bot);
    let raw_voice = ledger.settle(DetectorKind::VoiceAssistant, set.voice);
    let seo = ledger.settle(DetectorKind::Seo, set.seo);
    let design = ledger.settle(DetectorKind::Design, set.design);
    ledger.notes.extend(side.notes.iter().cloned());

    let tech_stack = merge_stack(raw_stack);
    let chat_providers = dedup_case_insensitive(raw_chat.providers);
    let chatbot = ChatbotSummary {
        detected: raw_chat.detected || !chat_providers.is_empty(),
        is_ai_powered: chat_providers.iter().any(|p| config.is_ai_vendor(p)),
        providers: chat_providers,
    };

    let view = PageView::new(snapshot);
    let business_name = identity::business_name(&view);
    let contact_email = identity::contact_email(&view);
    drop(view);

    let has_responsive_design =
        design.has_viewport || design.has_media_queries || tech_stack.has_css_framework();

    let pagespeed = side.pagespeed.unwrap_or_default();
    let measured = Measured {
        performance: side.pagespeed.is_some(),
        accessibility: side.pagespeed.is_some(),
        best_practices: side.pagespeed.is_some(),
        design: side.design.is_some(),
    };
    let design_score = side
        .design
        .map(|d| d.overall())
        .unwrap_or(config.fallback_design_score);

    debug!(
        "aggregated {} with {} degradation note(s)",
        snapshot.final_url,
        ledger.notes.len()
    );

    Ok(AuditFindings {
        url: url.to_string(),
        final_url: snapshot.final_url.clone(),
        business_name,
        contact_email,
        tech_stack,
        chatbot,
        social_bot: merge_bot(raw_social),
        voice_assistant: merge_bot(raw_voice),
        seo_score: seo.score,
        seo,
        performance_score: pagespeed.performance,
        accessibility_score: pagespeed.accessibility,
        best_practices_score: pagespeed.best_practices,
        design_score,
        measured,
        has_responsive_design,
        uses_https: uses_https(&snapshot.final_url),
        design,
        detector_status: ledger.status,
        degradations: ledger.notes,
    })
}

fn merge_stack(raw: TechStack) -> TechStack {
    let merged = TechStack {
        frameworks: dedup_case_insensitive(raw.frameworks),
        cms: dedup_case_insensitive(raw.cms),
        css_frameworks: dedup_case_insensitive(raw.css_frameworks),
    };
    if merged.frameworks.is_empty() && merged.cms.is_empty() && merged.css_frameworks.is_empty() {
        TechStack::absent()
    } else {
        merged
    }
}

fn merge_bot(raw: BotFinding) -> BotFinding {
    let providers = dedup_case_insensitive(raw.providers);
    BotFinding {
        detected: raw.detected || !providers.is_empty(),
        providers,
    }
}

fn uses_https(final_url: &str) -> bool {
    url::Url::parse(final_url).is_ok_and(|u| u.scheme() == "https")
}
