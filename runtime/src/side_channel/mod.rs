//! Optional external scorers.
//!
//! These run beside the detector set with their own timeout. A failure only
//! leaves the matching score unmeasured; it never fails the audit.

pub mod pagespeed;
pub mod vision;

use crate::error::VisionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use pagespeed::PageSpeedClient;
pub use vision::GeminiVisionScorer;

/// Five design sub-scores from a vision model, each `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignScores {
    pub layout: u8,
    pub color: u8,
    pub typography: u8,
    pub hierarchy: u8,
    pub modernity: u8,
}

impl DesignScores {
    /// Reject sub-scores outside `1..=10`.
    pub fn validated(self) -> Result<Self, VisionError> {
        let all = [
            ("layout", self.layout),
            ("color", self.color),
            ("typography", self.typography),
            ("hierarchy", self.hierarchy),
            ("modernity", self.modernity),
        ];
        for (name, value) in all {
            if !(1..=10).contains(&value) {
                return Err(VisionError::Malformed(format!(
                    "{name} score {value} outside 1..=10"
                )));
            }
        }
        Ok(self)
    }

    /// Rounded mean of the five sub-scores.
    pub fn overall(&self) -> u8 {
        let sum = self.layout as u32
            + self.color as u32
            + self.typography as u32
            + self.hierarchy as u32
            + self.modernity as u32;
        // Half-up rounding of sum / 5.
        ((sum * 2 + 5) / 10) as u8
    }
}

/// Lighthouse category scores, each `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpeedScores {
    pub performance: u8,
    pub accessibility: u8,
    pub best_practices: u8,
}

/// Whatever the side channels managed to measure for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideChannels {
    pub design: Option<DesignScores>,
    pub pagespeed: Option<PageSpeedScores>,
    /// Why a requested channel produced nothing.
    pub notes: Vec<String>,
}

/// Scores a page screenshot.
#[async_trait]
pub trait VisionScorer: Send + Sync {
    async fn score_design(&self, png: &[u8]) -> Result<DesignScores, VisionError>;
}

/// Scores a URL with Lighthouse-style categories.
#[async_trait]
pub trait PageSpeedScorer: Send + Sync {
    async fn score(&self, url: &str) -> Result<PageSpeedScores, VisionError>;
}

/// Read an API key from the named environment variable.
pub(crate) fn api_key_from_env(var: &str) -> Result<String, VisionError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(VisionError::Unavailable(format!("{var} is not set"))),
    }
}
