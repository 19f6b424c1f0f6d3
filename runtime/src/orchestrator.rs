// Copyright 2026 Leadlens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit orchestrator.
//!
//! ```text
//! Created → Rendering → Detecting → Aggregating → Scoring → Complete
//!              │            │
//!              └────────────┴──→ Degraded
//! ```
//!
//! Render failures and an all-failed detector set end in `Degraded`, which
//! is still a fully shaped audit. Individual detector failures become
//! `Failed` verdicts. Side channels run beside the detectors under their own
//! timeout and only ever leave a score unmeasured. Aggregation and scoring
//! errors are defects and propagate.

use crate::aggregate::{self, AuditFindings};
use crate::audit::{AuditState, WebsiteAudit};
use crate::config::{AuditConfig, AuditOptions};
use crate::detectors::{self, DetectorKind, Verdict, VerdictStatus};
use crate::error::{AuditError, DetectorError, VisionError};
use crate::events::{AuditEvent, EventBus};
use crate::opportunity;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::http::HttpRenderer;
use crate::renderer::snapshot::{normalize_url, render_snapshot};
use crate::renderer::{PageSnapshot, RenderOptions, Renderer};
use crate::side_channel::{
    GeminiVisionScorer, PageSpeedClient, PageSpeedScorer, SideChannels, VisionScorer,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs one detector over a frozen snapshot.
pub type DetectorFn = Arc<dyn Fn(DetectorKind, &PageSnapshot) -> Verdict + Send + Sync>;

/// Runs audits against one renderer with one configuration.
///
/// Cheap to share: every run owns its own snapshot and verdicts, nothing
/// mutable crosses runs.
pub struct Auditor {
    renderer: Arc<dyn Renderer>,
    detector: DetectorFn,
    vision: Option<Arc<dyn VisionScorer>>,
    pagespeed: Option<Arc<dyn PageSpeedScorer>>,
    config: Arc<AuditConfig>,
    events: EventBus,
}

impl Auditor {
    pub fn new(renderer: Arc<dyn Renderer>, config: AuditConfig) -> Self {
        Self {
            renderer,
            detector: Arc::new(builtin_detector),
            vision: None,
            pagespeed: None,
            config: Arc::new(config),
            events: EventBus::default(),
        }
    }

    /// Wire up the external scorers named in `config`, skipping any whose
    /// API key is missing.
    pub fn from_config(renderer: Arc<dyn Renderer>, config: AuditConfig) -> Self {
        let timeout = config.side_channel_timeout_ms;
        let vision = config.vision.as_ref().and_then(|settings| {
            match GeminiVisionScorer::from_settings(settings, timeout) {
                Ok(scorer) => Some(Arc::new(scorer) as Arc<dyn VisionScorer>),
                Err(e) => {
                    debug!("vision scorer not configured: {e}");
                    None
                }
            }
        });
        let pagespeed = config
            .pagespeed
            .as_ref()
            .map(|s| Arc::new(PageSpeedClient::from_settings(s, timeout)) as Arc<dyn PageSpeedScorer>);

        let mut auditor = Self::new(renderer, config);
        auditor.vision = vision;
        auditor.pagespeed = pagespeed;
        auditor
    }

    pub fn with_vision(mut self, scorer: Arc<dyn VisionScorer>) -> Self {
        self.vision = Some(scorer);
        self
    }

    pub fn with_pagespeed(mut self, scorer: Arc<dyn PageSpeedScorer>) -> Self {
        self.pagespeed = Some(scorer);
        self
    }

    /// Replace the detector implementation, e.g. to wrap the built-in set
    /// with extra instrumentation.
    pub fn with_detector(mut self, detector: DetectorFn) -> Self {
        self.detector = detector;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Audit one URL.
    ///
    /// Returns `Err` only for invalid options or an internal defect; an
    /// unreachable, hostile or broken site yields a `Degraded` audit.
    pub async fn run_audit(&self, url: &str, options: &AuditOptions) -> Result<WebsiteAudit, AuditError> {
        let config = Arc::new(self.config.with_options(options)?);
        let mut run = Run::new(normalize_url(url), &self.events);

        // ── Rendering ──
        run.enter(AuditState::Rendering);
        let render_options = RenderOptions {
            budget_ms: config.render_timeout_ms,
            settle_ms: config.settle_ms,
            watched_globals: detectors::watched_globals(),
            capture_screenshot: config.enable_vision_scoring && self.vision.is_some(),
        };
        let snapshot = match render_snapshot(self.renderer.as_ref(), &run.url, &render_options).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!("render of {} failed: {e}", run.url);
                let findings = AuditFindings::degraded(&run.url, &e.to_string(), &config);
                return Ok(run.degrade(findings));
            }
        };

        // ── Detecting ──
        run.enter(AuditState::Detecting);
        let (verdicts, side) = tokio::join!(
            self.run_detectors(&run, &snapshot, config.per_detector_timeout_ms),
            self.run_side_channels(&run, &snapshot, &config),
        );

        if verdicts.iter().all(|v| v.status() == VerdictStatus::Failed) {
            warn!("every detector failed for {}", run.url);
            let mut findings = AuditFindings::degraded(&run.url, "all detectors failed", &config);
            findings.final_url = snapshot.final_url.clone();
            findings
                .degradations
                .extend(verdicts.iter().filter_map(|v| {
                    v.note().map(|n| format!("{}: {n}", v.kind().name()))
                }));
            return Ok(run.degrade(findings));
        }

        // ── Aggregating ──
        run.enter(AuditState::Aggregating);
        let findings = {
            let url = run.url.clone();
            let snapshot = Arc::clone(&snapshot);
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || {
                aggregate::aggregate(&url, &snapshot, verdicts, &side, &config)
            })
            .await
            .map_err(|e| AuditError::AggregationDefect(format!("aggregator panicked: {e}")))??
        };
        drop(snapshot);

        // ── Scoring ──
        run.enter(AuditState::Scoring);
        let scoring = opportunity::score(&findings, &config.price_catalog)?;

        run.enter(AuditState::Complete);
        let audit = WebsiteAudit::complete(run.id, findings, scoring);
        run.finish(&audit);
        Ok(audit)
    }

    /// Run every detector on the blocking pool, each under its own budget.
    async fn run_detectors(
        &self,
        run: &Run<'_>,
        snapshot: &Arc<PageSnapshot>,
        budget_ms: u64,
    ) -> Vec<Verdict> {
        let tasks = DetectorKind::ALL.into_iter().map(|kind| {
            let snapshot = Arc::clone(snapshot);
            let detector = Arc::clone(&self.detector);
            async move {
                let started = Instant::now();
                let verdict = run_bounded(kind, budget_ms, move || detector(kind, &snapshot)).await;
                (verdict, started.elapsed())
            }
        });

        let mut verdicts = Vec::with_capacity(DetectorKind::ALL.len());
        for (verdict, elapsed) in futures::future::join_all(tasks).await {
            debug!(
                "{} -> {:?} evidence={:?}",
                verdict.kind().name(),
                verdict.status(),
                verdict.evidence()
            );
            self.events.emit(AuditEvent::DetectorFinished {
                audit_id: run.id,
                detector: verdict.kind().name().to_string(),
                status: verdict.status(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
            verdicts.push(verdict);
        }
        verdicts
    }

    /// Query the optional scorers. Never fails; gaps become notes.
    async fn run_side_channels(
        &self,
        run: &Run<'_>,
        snapshot: &PageSnapshot,
        config: &AuditConfig,
    ) -> SideChannels {
        let budget = config.side_channel_timeout_ms;

        let design = async {
            if !config.enable_vision_scoring {
                return None;
            }
            let Some(scorer) = &self.vision else {
                return Some(Err(VisionError::Unavailable("no vision scorer configured".into())));
            };
            let Some(png) = snapshot.screenshot.as_deref() else {
                return Some(Err(VisionError::Unavailable("no screenshot captured".into())));
            };
            Some(bounded(budget, scorer.score_design(png)).await)
        };

        let pagespeed = async {
            if !config.enable_pagespeed {
                return None;
            }
            let Some(scorer) = &self.pagespeed else {
                return Some(Err(VisionError::Unavailable("no pagespeed client configured".into())));
            };
            Some(bounded(budget, scorer.score(&snapshot.final_url)).await)
        };

        let (design, pagespeed) = tokio::join!(design, pagespeed);

        let mut side = SideChannels::default();
        side.design = self.settle_channel(run, "vision", design, &mut side.notes);
        side.pagespeed = self.settle_channel(run, "pagespeed", pagespeed, &mut side.notes);
        side
    }

    fn settle_channel<T>(
        &self,
        run: &Run<'_>,
        channel: &str,
        outcome: Option<Result<T, VisionError>>,
        notes: &mut Vec<String>,
    ) -> Option<T> {
        match outcome? {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{channel} side channel failed: {e}");
                notes.push(format!("{channel}: {e}"));
                self.events.emit(AuditEvent::SideChannelFailed {
                    audit_id: run.id,
                    channel: channel.to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    }
}

fn builtin_detector(kind: DetectorKind, snapshot: &PageSnapshot) -> Verdict {
    kind.run(snapshot)
}

/// Run one detector on the blocking pool under `budget_ms`. A panic or an
/// overrun becomes a `Failed` verdict; an overrunning task is left to finish
/// and its result dropped.
async fn run_bounded<F>(kind: DetectorKind, budget_ms: u64, detect: F) -> Verdict
where
    F: FnOnce() -> Verdict + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(detect);
    match tokio::time::timeout(Duration::from_millis(budget_ms), handle).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(join)) => {
            let err = DetectorError::Panicked(kind.name().to_string());
            warn!("{err}: {join}");
            kind.failed(err.to_string())
        }
        Err(_) => {
            let err = DetectorError::TimedOut {
                name: kind.name().to_string(),
                budget_ms,
            };
            warn!("{err}");
            kind.failed(err.to_string())
        }
    }
}

async fn bounded<T>(
    budget_ms: u64,
    call: impl Future<Output = Result<T, VisionError>>,
) -> Result<T, VisionError> {
    match tokio::time::timeout(Duration::from_millis(budget_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(VisionError::Unavailable(format!(
            "no response within {budget_ms}ms"
        ))),
    }
}

/// Per-run state tracking and event emission.
struct Run<'a> {
    id: Uuid,
    url: String,
    state: AuditState,
    started: Instant,
    events: &'a EventBus,
}

impl<'a> Run<'a> {
    fn new(url: String, events: &'a EventBus) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            state: AuditState::Created,
            started: Instant::now(),
            events,
        }
    }

    fn enter(&mut self, next: AuditState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        info!("audit {} {:?} -> {:?}", self.url, self.state, next);
        self.state = next;
        self.events.emit(AuditEvent::StageEntered {
            audit_id: self.id,
            url: self.url.clone(),
            state: next,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });
    }

    fn degrade(&mut self, findings: AuditFindings) -> WebsiteAudit {
        self.enter(AuditState::Degraded);
        let audit = WebsiteAudit::degraded(self.id, findings);
        self.finish(&audit);
        audit
    }

    fn finish(&self, audit: &WebsiteAudit) {
        self.events.emit(AuditEvent::AuditFinished {
            audit_id: self.id,
            url: self.url.clone(),
            state: audit.state,
            opportunities: audit.scoring.opportunities.len(),
            estimated_value: audit.scoring.estimated_value,
            total_ms: self.started.elapsed().as_millis() as u64,
        });
    }
}

/// Audit `url` with the resolved configuration and the best renderer
/// available: headless Chromium, or a plain HTTP fetch when none is found.
pub async fn run_audit(url: &str, options: &AuditOptions) -> Result<WebsiteAudit, AuditError> {
    let config = AuditConfig::load(None)?;
    let renderer: Arc<dyn Renderer> = match ChromiumRenderer::new().await {
        Ok(chromium) => Arc::new(chromium),
        Err(e) => {
            warn!("falling back to HTTP-only rendering: {e:#}");
            Arc::new(HttpRenderer::new())
        }
    };
    let auditor = Auditor::from_config(Arc::clone(&renderer), config);
    let result = auditor.run_audit(url, options).await;
    if let Err(e) = renderer.shutdown().await {
        debug!("renderer shutdown: {e:#}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_tracks_transitions_and_emits() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut run = Run::new("https://acme.test".into(), &bus);
        run.enter(AuditState::Rendering);
        let audit = run.degrade(AuditFindings::degraded(
            "https://acme.test",
            "blocked",
            &AuditConfig::default(),
        ));
        assert_eq!(audit.id, run.id);
        assert_eq!(run.state, AuditState::Degraded);

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AuditEvent::StageEntered { state, .. } = event {
                states.push(state);
            }
        }
        assert_eq!(states, vec![AuditState::Rendering, AuditState::Degraded]);
    }

    #[tokio::test]
    async fn test_bounded_times_out_as_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, VisionError>(())
        };
        let err = bounded(10, slow).await.unwrap_err();
        assert!(matches!(err, VisionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_overrunning_detector_is_failed() {
        let verdict = run_bounded(DetectorKind::Seo, 20, || {
            std::thread::sleep(Duration::from_millis(300));
            DetectorKind::Seo.run(&PageSnapshot::default())
        })
        .await;
        assert_eq!(verdict.kind(), DetectorKind::Seo);
        assert_eq!(verdict.status(), VerdictStatus::Failed);
        assert_eq!(verdict.note(), Some("detector seo exceeded its 20ms budget"));
    }

    #[tokio::test]
    async fn test_panicking_detector_is_failed() {
        let verdict = run_bounded(DetectorKind::Chatbot, 1_000, || -> Verdict {
            panic!("selector table corrupt")
        })
        .await;
        assert_eq!(verdict.kind(), DetectorKind::Chatbot);
        assert_eq!(verdict.status(), VerdictStatus::Failed);
        assert_eq!(verdict.note(), Some("detector chatbot panicked"));
    }

    #[tokio::test]
    async fn test_detector_within_budget_passes_through() {
        let verdict = run_bounded(DetectorKind::Seo, 1_000, || {
            DetectorKind::Seo.run(&PageSnapshot::default())
        })
        .await;
        assert_ne!(verdict.status(), VerdictStatus::Failed);
    }

    #[allow(dead_code)]
    fn assert_send<T: Send>(_: T) {}

    #[allow(dead_code)]
    fn run_audit_future_is_send(auditor: &Auditor) {
        assert_send(auditor.run_audit("acme.test", &AuditOptions::default()));
    }
}
