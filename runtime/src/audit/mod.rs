//! The finished audit record and where it goes.

pub mod sink;

use crate::aggregate::AuditFindings;
use crate::config::AuditConfig;
use crate::opportunity::Scoring;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use sink::{AuditSink, JsonlSink};

/// Orchestrator state. `Complete` and `Degraded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditState {
    Created,
    Rendering,
    Detecting,
    Aggregating,
    Scoring,
    Complete,
    Degraded,
}

impl AuditState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuditState::Complete | AuditState::Degraded)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: AuditState) -> bool {
        use AuditState::*;
        matches!(
            (self, next),
            (Created, Rendering)
                | (Rendering, Detecting)
                | (Rendering, Degraded)
                | (Detecting, Aggregating)
                | (Detecting, Degraded)
                | (Aggregating, Scoring)
                | (Scoring, Complete)
        )
    }
}

/// One finished audit. Immutable once built; every run gets a fresh `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteAudit {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: AuditState,
    #[serde(flatten)]
    pub findings: AuditFindings,
    #[serde(flatten)]
    pub scoring: Scoring,
}

impl WebsiteAudit {
    /// A completed audit.
    pub fn complete(id: Uuid, findings: AuditFindings, scoring: Scoring) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: AuditState::Complete,
            findings,
            scoring,
        }
    }

    /// A structurally valid audit with default fields and no problems or
    /// opportunities, for runs that observed nothing usable.
    pub fn degraded(id: Uuid, findings: AuditFindings) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: AuditState::Degraded,
            findings,
            scoring: Scoring::default(),
        }
    }

    /// Shorthand for a degraded audit that never reached the detectors.
    pub fn unreachable(url: &str, reason: &str, config: &AuditConfig) -> Self {
        Self::degraded(Uuid::new_v4(), AuditFindings::degraded(url, reason, config))
    }

    pub fn is_degraded(&self) -> bool {
        self.state == AuditState::Degraded
    }
}
