//! Error taxonomy for the audit engine.
//!
//! Environmental failures (render, detector, side channel) are absorbed by the
//! orchestrator and end up as notes on a degraded audit. Only contract
//! violations ([`AuditError`]) ever reach the caller.

use std::path::PathBuf;

/// Failure to produce a frozen [`PageSnapshot`](crate::renderer::PageSnapshot).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("render exceeded its {budget_ms}ms budget")]
    Timeout { budget_ms: u64 },

    #[error("target blocked automated browsing: {0}")]
    Blocked(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single detector. Never fatal to the run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("detector {0} panicked")]
    Panicked(String),

    #[error("detector {name} exceeded its {budget_ms}ms budget")]
    TimedOut { name: String, budget_ms: u64 },
}

/// Failure of an optional external scorer (vision model, PageSpeed).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VisionError {
    #[error("scorer unavailable: {0}")]
    Unavailable(String),

    #[error("scorer returned a malformed response: {0}")]
    Malformed(String),

    #[error("scorer request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for VisionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            VisionError::Unavailable(e.to_string())
        } else {
            VisionError::Http(e.to_string())
        }
    }
}

/// Configuration loading or validation failure.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that escape [`run_audit`](crate::orchestrator::run_audit).
///
/// These indicate a broken contract inside the engine, not a hostile or
/// unreachable target site.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("aggregation defect: {0}")]
    AggregationDefect(String),

    #[error("scoring defect: {0}")]
    ScoringDefect(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
