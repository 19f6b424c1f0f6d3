//! Engine configuration.
//!
//! Defaults are embedded at compile time from `default_config.json`. A user
//! file is merged over them key by key, so it only needs the fields it
//! changes. Resolution order: explicit path, `LEADLENS_CONFIG`,
//! `~/.leadlens/config.json`, embedded defaults.

use crate::error::ConfigError;
use crate::opportunity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw JSON content of the default configuration.
pub const DEFAULT_CONFIG_JSON: &str = include_str!("default_config.json");

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LEADLENS_CONFIG";

// ── Types ────────────────────────────────────────────────────────────────────

/// Static label → USD price table. The single source of opportunity prices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceCatalog(BTreeMap<String, u32>);

impl PriceCatalog {
    pub fn price(&self, label: &str) -> Option<u32> {
        self.0.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u32)> for PriceCatalog {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Vision-model scorer endpoint. `{model}` in the endpoint is substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionSettings {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

/// PageSpeed Insights endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpeedSettings {
    pub endpoint: String,
    pub api_key_env: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

fn default_strategy() -> String {
    "mobile".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Budget for navigation, settle wait and capture.
    pub render_timeout_ms: u64,
    /// Budget for each detector; must be shorter than the render budget.
    pub per_detector_timeout_ms: u64,
    /// Post-load wait before the DOM is frozen.
    pub settle_ms: u64,
    pub enable_vision_scoring: bool,
    pub enable_pagespeed: bool,
    /// Budget for each external scorer call.
    pub side_channel_timeout_ms: u64,
    /// Design score reported when the vision scorer is off or fails.
    pub fallback_design_score: u8,
    /// Chat vendors whose product is AI-driven.
    pub ai_chat_vendors: Vec<String>,
    pub price_catalog: PriceCatalog,
    #[serde(default)]
    pub vision: Option<VisionSettings>,
    #[serde(default)]
    pub pagespeed: Option<PageSpeedSettings>,
}

/// Per-call overrides. Unset fields inherit from [`AuditConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOptions {
    pub render_timeout_ms: Option<u64>,
    pub per_detector_timeout_ms: Option<u64>,
    pub enable_vision_scoring: Option<bool>,
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl Default for AuditConfig {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_CONFIG_JSON).expect("embedded default config is valid")
    }
}

impl AuditConfig {
    /// Parse a (possibly partial) JSON document merged over the defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut base: Value = serde_json::from_str(DEFAULT_CONFIG_JSON)?;
        let overlay: Value = serde_json::from_str(text)?;
        if !overlay.is_object() {
            return Err(ConfigError::Invalid("config root must be an object".into()));
        }
        merge(&mut base, overlay);
        let config: AuditConfig = serde_json::from_value(base)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Resolve and load the active configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("loading config from {}", path.display());
            return Self::from_file(path);
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            if !p.is_empty() {
                debug!("loading config from ${CONFIG_ENV} = {p}");
                return Self::from_file(Path::new(&p));
            }
        }
        if let Some(path) = user_config_path().filter(|p| p.exists()) {
            debug!("loading config from {}", path.display());
            return Self::from_file(&path);
        }
        Ok(Self::default())
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_timeout_ms == 0 {
            return Err(ConfigError::Invalid("render_timeout_ms must be positive".into()));
        }
        if self.per_detector_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "per_detector_timeout_ms must be positive".into(),
            ));
        }
        if self.per_detector_timeout_ms >= self.render_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "per_detector_timeout_ms ({}) must be shorter than render_timeout_ms ({})",
                self.per_detector_timeout_ms, self.render_timeout_ms
            )));
        }
        if self.settle_ms >= self.render_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "settle_ms ({}) must be shorter than render_timeout_ms ({})",
                self.settle_ms, self.render_timeout_ms
            )));
        }
        if self.side_channel_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "side_channel_timeout_ms must be positive".into(),
            ));
        }
        if self.fallback_design_score > 10 {
            return Err(ConfigError::Invalid(
                "fallback_design_score must be within 0..=10".into(),
            ));
        }
        let missing: Vec<&str> = opportunity::opportunity_labels()
            .into_iter()
            .filter(|label| self.price_catalog.price(label).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "price_catalog has no price for: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// This configuration with per-call overrides applied.
    pub fn with_options(&self, options: &AuditOptions) -> Result<Self, ConfigError> {
        let mut merged = self.clone();
        if let Some(ms) = options.render_timeout_ms {
            merged.render_timeout_ms = ms;
        }
        if let Some(ms) = options.per_detector_timeout_ms {
            merged.per_detector_timeout_ms = ms;
        }
        if let Some(on) = options.enable_vision_scoring {
            merged.enable_vision_scoring = on;
        }
        merged.validate()?;
        Ok(merged)
    }

    /// Whether a provider is on the AI-vendor whitelist (case-insensitive).
    pub fn is_ai_vendor(&self, provider: &str) -> bool {
        self.ai_chat_vendors
            .iter()
            .any(|v| v.eq_ignore_ascii_case(provider))
    }
}

/// `~/.leadlens/config.json`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".leadlens").join("config.json"))
}

/// Merge `overlay` into `base`: objects recursively, everything else replaced.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_object() && base_map.get(&key).is_some_and(Value::is_object);
                match base_map.get_mut(&key) {
                    Some(existing) if nested => merge(existing, value),
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
