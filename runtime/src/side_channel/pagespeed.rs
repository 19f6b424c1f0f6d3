//! PageSpeed Insights client.
//!
//! Only the performance, accessibility and best-practices categories are
//! read. The service's own SEO category is ignored in favour of the
//! checklist score.

use super::{api_key_from_env, PageSpeedScorer, PageSpeedScores};
use crate::config::PageSpeedSettings;
use crate::error::VisionError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub struct PageSpeedClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    strategy: String,
}

impl PageSpeedClient {
    pub fn new(endpoint: &str, api_key: Option<String>, strategy: &str, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
            strategy: strategy.to_string(),
        }
    }

    /// Build from settings. The API works keyless at a low quota, so a
    /// missing key is not an error.
    pub fn from_settings(settings: &PageSpeedSettings, timeout_ms: u64) -> Self {
        Self::new(
            &settings.endpoint,
            api_key_from_env(&settings.api_key_env).ok(),
            &settings.strategy,
            timeout_ms,
        )
    }
}

#[async_trait]
impl PageSpeedScorer for PageSpeedClient {
    async fn score(&self, url: &str) -> Result<PageSpeedScores, VisionError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("url", url),
            ("strategy", self.strategy.as_str()),
            ("category", "performance"),
            ("category", "accessibility"),
            ("category", "best-practices"),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let resp = self.client.get(&self.endpoint).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(VisionError::Http(format!("pagespeed returned {status}")));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| VisionError::Malformed(e.to_string()))?;
        parse_report(&body)
    }
}

/// Extract category scores from a Lighthouse report.
pub fn parse_report(body: &Value) -> Result<PageSpeedScores, VisionError> {
    let categories = body
        .pointer("/lighthouseResult/categories")
        .ok_or_else(|| VisionError::Malformed("report has no lighthouseResult.categories".into()))?;
    Ok(PageSpeedScores {
        performance: category_score(categories, "performance")?,
        accessibility: category_score(categories, "accessibility")?,
        best_practices: category_score(categories, "best-practices")?,
    })
}

/// Lighthouse reports `0.0..=1.0`; scale to `0..=100`.
fn category_score(categories: &Value, name: &str) -> Result<u8, VisionError> {
    let raw = categories
        .get(name)
        .and_then(|c| c.get("score"))
        .and_then(Value::as_f64)
        .ok_or_else(|| VisionError::Malformed(format!("category {name} has no score")))?;
    if !(0.0..=1.0).contains(&raw) {
        return Err(VisionError::Malformed(format!("category {name} score {raw} out of range")));
    }
    Ok((raw * 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_report_scales_scores() {
        let body = json!({
            "lighthouseResult": { "categories": {
                "performance": { "score": 0.43 },
                "accessibility": { "score": 0.915 },
                "best-practices": { "score": 1.0 },
                "seo": { "score": 0.2 }
            }}
        });
        let scores = parse_report(&body).unwrap();
        assert_eq!(scores.performance, 43);
        assert_eq!(scores.accessibility, 92);
        assert_eq!(scores.best_practices, 100);
    }

    #[test]
    fn test_null_score_is_malformed() {
        let body = json!({
            "lighthouseResult": { "categories": {
                "performance": { "score": null },
                "accessibility": { "score": 0.9 },
                "best-practices": { "score": 0.9 }
            }}
        });
        assert!(matches!(parse_report(&body), Err(VisionError::Malformed(_))));
        assert!(parse_report(&json!({})).is_err());
    }
}
