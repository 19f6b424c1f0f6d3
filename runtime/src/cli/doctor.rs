//! Environment readiness check.

use super::output;
use crate::config::{user_config_path, AuditConfig, CONFIG_ENV};
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::path::Path;

/// Check Chromium, configuration and scorer credentials.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let chromium = find_chromium();
    let config = AuditConfig::load(config_path);
    let config_source = match (config_path, std::env::var(CONFIG_ENV).ok()) {
        (Some(p), _) => p.display().to_string(),
        (None, Some(p)) if !p.is_empty() => format!("${CONFIG_ENV} = {p}"),
        _ => match user_config_path().filter(|p| p.exists()) {
            Some(p) => p.display().to_string(),
            None => "embedded defaults".to_string(),
        },
    };

    if output::is_json() {
        let scorers = config.as_ref().ok().map(scorer_keys).unwrap_or_default();
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "config": config_source,
            "config_error": config.as_ref().err().map(|e| e.to_string()),
            "scorer_keys": scorers,
        }));
        return Ok(());
    }

    println!("Leadlens Doctor");
    println!("===============");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Set LEADLENS_CHROMIUM_PATH; audits will use HTTP-only rendering."
        ),
    }

    match &config {
        Ok(c) => {
            println!("[OK] Config valid ({config_source})");
            println!(
                "     render {}ms, detector {}ms, settle {}ms, {} priced labels",
                c.render_timeout_ms,
                c.per_detector_timeout_ms,
                c.settle_ms,
                c.price_catalog.len()
            );
            for (var, present) in scorer_keys(c) {
                if present {
                    println!("[OK] {var} is set");
                } else {
                    println!("[!!] {var} is not set; that score will be reported as unmeasured");
                }
            }
        }
        Err(e) => println!("[!!] Config invalid ({config_source}): {e}"),
    }

    println!();
    if config.is_ok() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

/// API-key variables the configured scorers read, and whether each is set.
fn scorer_keys(config: &AuditConfig) -> Vec<(String, bool)> {
    config
        .vision
        .iter()
        .map(|v| v.api_key_env.clone())
        .chain(config.pagespeed.iter().map(|p| p.api_key_env.clone()))
        .map(|var| {
            let present = std::env::var(&var).is_ok_and(|v| !v.trim().is_empty());
            (var, present)
        })
        .collect()
}
