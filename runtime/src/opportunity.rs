//! Opportunity engine: problem triage and priced upsell opportunities.
//!
//! Both stages are fixed decision tables evaluated in order over
//! [`AuditFindings`]. Each problem message belongs to exactly one severity.
//! Opportunity labels have set semantics: a label fires once however many
//! of its rules match, and is priced from the [`PriceCatalog`] alone.
//!
//! Rules over externally sourced scores (performance, accessibility,
//! design) only fire when that score was actually measured.

use crate::aggregate::AuditFindings;
use crate::config::PriceCatalog;
use crate::error::AuditError;
use serde::{Deserialize, Serialize};

// ── Tables ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Important,
    Minor,
}

struct ProblemRule {
    severity: Severity,
    message: &'static str,
    applies: fn(&AuditFindings) -> bool,
}

const PROBLEM_RULES: &[ProblemRule] = &[
    ProblemRule {
        severity: Severity::Critical,
        message: "Missing Title Tag",
        applies: |f| !f.seo.has_title,
    },
    ProblemRule {
        severity: Severity::Critical,
        message: "Missing Meta Description",
        applies: |f| !f.seo.has_meta_description,
    },
    ProblemRule {
        severity: Severity::Critical,
        message: "Not Using HTTPS",
        applies: |f| !f.uses_https,
    },
    ProblemRule {
        severity: Severity::Critical,
        message: "Not Mobile Responsive",
        applies: |f| !f.has_responsive_design,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Missing Open Graph Tags",
        applies: |f| !f.seo.has_open_graph,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Poor SEO Optimization",
        applies: |f| f.seo_score < 50,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "No Call-to-Action",
        applies: |f| !f.design.has_call_to_action,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Missing Canonical Link",
        applies: |f| !f.seo.has_canonical,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Slow Page Performance",
        applies: |f| f.measured.performance && f.performance_score < 50,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Accessibility Issues",
        applies: |f| f.measured.accessibility && f.accessibility_score < 70,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Outdated Visual Design",
        applies: |f| f.measured.design && f.design_score < 5,
    },
    ProblemRule {
        severity: Severity::Important,
        message: "Legacy Technology Stack",
        applies: |f| f.tech_stack.is_unmanaged(),
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "No Chatbot Implementation",
        applies: |f| !f.chatbot.detected,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "Chatbot Lacks AI",
        applies: |f| f.chatbot.detected && !f.chatbot.is_ai_powered,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "No Social Messaging Channel",
        applies: |f| !f.social_bot.detected,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "No Voice Assistant",
        applies: |f| !f.voice_assistant.detected,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "Missing Structured Data",
        applies: |f| !f.seo.has_structured_data,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "No Animations/Transitions",
        applies: |f| !f.design.has_animations,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "No Lazy Loading",
        applies: |f| !f.design.has_lazy_loading,
    },
    ProblemRule {
        severity: Severity::Minor,
        message: "Missing Favicon",
        applies: |f| !f.design.has_favicon,
    },
];

struct OpportunityRule {
    label: &'static str,
    applies: fn(&AuditFindings) -> bool,
}

const OPPORTUNITY_RULES: &[OpportunityRule] = &[
    OpportunityRule {
        label: "SEO Optimization",
        applies: |f| f.seo_score < 70,
    },
    OpportunityRule {
        label: "SEO Optimization",
        applies: |f| !f.seo.has_title || !f.seo.has_meta_description,
    },
    OpportunityRule {
        label: "Mobile Optimization",
        applies: |f| !f.has_responsive_design,
    },
    OpportunityRule {
        label: "SSL/HTTPS Setup",
        applies: |f| !f.uses_https,
    },
    OpportunityRule {
        label: "Modern Design Upgrade",
        applies: |f| (f.measured.design && f.design_score < 7) || !f.design.has_modern_layout,
    },
    OpportunityRule {
        label: "UI/UX Enhancement",
        applies: |f| !f.design.has_animations || !f.design.has_call_to_action,
    },
    OpportunityRule {
        label: "Progressive Web App Conversion",
        applies: |f| !f.design.has_manifest,
    },
    OpportunityRule {
        label: "Modern Framework Migration",
        applies: |f| f.tech_stack.is_unmanaged(),
    },
    OpportunityRule {
        label: "Performance Optimization",
        applies: |f| f.measured.performance && f.performance_score < 50,
    },
    OpportunityRule {
        label: "Accessibility Remediation",
        applies: |f| f.measured.accessibility && f.accessibility_score < 70,
    },
    OpportunityRule {
        label: "AI Chatbot Integration",
        applies: |f| !f.chatbot.detected,
    },
    OpportunityRule {
        label: "AI-Powered Chat Upgrade",
        applies: |f| f.chatbot.detected && !f.chatbot.is_ai_powered,
    },
    OpportunityRule {
        label: "Social Media Bot Automation",
        applies: |f| !f.social_bot.detected,
    },
    OpportunityRule {
        label: "Voice Assistant Integration",
        applies: |f| !f.voice_assistant.detected,
    },
];

/// Every label the opportunity table can emit, first-rule order, no repeats.
pub fn opportunity_labels() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = Vec::new();
    for rule in OPPORTUNITY_RULES {
        if !labels.contains(&rule.label) {
            labels.push(rule.label);
        }
    }
    labels
}

// ── Output ───────────────────────────────────────────────────────────────────

/// Problem messages partitioned by severity, table order within a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problems {
    pub critical: Vec<String>,
    pub important: Vec<String>,
    pub minor: Vec<String>,
}

impl Problems {
    /// Critical, then important, then minor.
    pub fn ordered(&self) -> Vec<&str> {
        self.critical
            .iter()
            .chain(&self.important)
            .chain(&self.minor)
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.critical.len() + self.important.len() + self.minor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket_mut(&mut self, severity: Severity) -> &mut Vec<String> {
        match severity {
            Severity::Critical => &mut self.critical,
            Severity::Important => &mut self.important,
            Severity::Minor => &mut self.minor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub label: String,
    pub estimated_price_usd: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadQuality {
    High,
    Medium,
    #[default]
    Low,
}

impl LeadQuality {
    /// HIGH at four or more opportunities, MEDIUM at two or more.
    pub fn from_opportunity_count(count: usize) -> Self {
        match count {
            n if n >= 4 => LeadQuality::High,
            n if n >= 2 => LeadQuality::Medium,
            _ => LeadQuality::Low,
        }
    }
}

/// Result of scoring one set of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoring {
    pub problems: Problems,
    pub opportunities: Vec<Opportunity>,
    /// Sum of the opportunity prices.
    pub estimated_value: u64,
    pub lead_quality: LeadQuality,
}

// ── Scoring ──────────────────────────────────────────────────────────────────

/// Evaluate both tables against `findings`. Pure; no I/O.
///
/// A label with no catalog price is a [`AuditError::ScoringDefect`]; a
/// validated [`AuditConfig`](crate::config::AuditConfig) never has one.
pub fn score(findings: &AuditFindings, catalog: &PriceCatalog) -> Result<Scoring, AuditError> {
    let mut problems = Problems::default();
    for rule in PROBLEM_RULES.iter().filter(|r| (r.applies)(findings)) {
        if problems.ordered().contains(&rule.message) {
            return Err(AuditError::ScoringDefect(format!(
                "problem {:?} classified twice",
                rule.message
            )));
        }
        problems.bucket_mut(rule.severity).push(rule.message.to_string());
    }

    let mut opportunities: Vec<Opportunity> = Vec::new();
    for rule in OPPORTUNITY_RULES.iter().filter(|r| (r.applies)(findings)) {
        if opportunities.iter().any(|o| o.label == rule.label) {
            continue;
        }
        let price = catalog.price(rule.label).ok_or_else(|| {
            AuditError::ScoringDefect(format!("no catalog price for {:?}", rule.label))
        })?;
        opportunities.push(Opportunity {
            label: rule.label.to_string(),
            estimated_price_usd: price,
        });
    }

    let estimated_value = opportunities
        .iter()
        .map(|o| u64::from(o.estimated_price_usd))
        .sum();
    Ok(Scoring {
        lead_quality: LeadQuality::from_opportunity_count(opportunities.len()),
        problems,
        opportunities,
        estimated_value,
    })
}
