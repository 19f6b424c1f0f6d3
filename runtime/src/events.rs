// Copyright 2026 Leadlens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit event bus.
//!
//! The EventBus is a `tokio::sync::broadcast` channel that carries
//! [`AuditEvent`] values. The CLI subscribes to print progress; an
//! embedding service can forward them anywhere. When no subscribers exist,
//! events are silently dropped.

use crate::audit::AuditState;
use crate::detectors::VerdictStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Everything an audit run reports while it progresses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// The orchestrator entered a new state.
    StageEntered {
        audit_id: Uuid,
        url: String,
        state: AuditState,
        elapsed_ms: u64,
    },
    /// One detector produced its verdict.
    DetectorFinished {
        audit_id: Uuid,
        detector: String,
        status: VerdictStatus,
        elapsed_ms: u64,
    },
    /// An optional scorer produced nothing.
    SideChannelFailed {
        audit_id: Uuid,
        channel: String,
        error: String,
    },
    /// The run reached a terminal state.
    AuditFinished {
        audit_id: Uuid,
        url: String,
        state: AuditState,
        opportunities: usize,
        estimated_value: u64,
        total_ms: u64,
    },
}

impl AuditEvent {
    pub fn audit_id(&self) -> Uuid {
        match self {
            AuditEvent::StageEntered { audit_id, .. }
            | AuditEvent::DetectorFinished { audit_id, .. }
            | AuditEvent::SideChannelFailed { audit_id, .. }
            | AuditEvent::AuditFinished { audit_id, .. } => *audit_id,
        }
    }
}

/// Broadcast bus shared by every run of one [`Auditor`](crate::orchestrator::Auditor).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AuditEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: AuditEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let id = Uuid::new_v4();
        let event = AuditEvent::StageEntered {
            audit_id: id,
            url: "https://acme.test".to_string(),
            state: AuditState::Rendering,
            elapsed_ms: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"StageEntered""#));
        assert!(json.contains(r#""state":"rendering""#));

        let parsed: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.audit_id(), id);
    }

    #[test]
    fn test_event_bus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(AuditEvent::SideChannelFailed {
            audit_id: Uuid::nil(),
            channel: "vision".to_string(),
            error: "GEMINI_API_KEY is not set".to_string(),
        });
    }

    #[test]
    fn test_event_bus_subscribe_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AuditEvent::DetectorFinished {
            audit_id: Uuid::nil(),
            detector: "chatbot".to_string(),
            status: VerdictStatus::Degraded,
            elapsed_ms: 3,
        });

        match rx.try_recv().unwrap() {
            AuditEvent::DetectorFinished { detector, status, .. } => {
                assert_eq!(detector, "chatbot");
                assert_eq!(status, VerdictStatus::Degraded);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }
}
