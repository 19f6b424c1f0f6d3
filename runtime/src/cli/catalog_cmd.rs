//! `leadlens catalog`: show the active price catalog.

use super::output;
use crate::config::AuditConfig;
use crate::opportunity;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = AuditConfig::load(config_path).context("failed to load configuration")?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "price_catalog": config.price_catalog,
            "ai_chat_vendors": config.ai_chat_vendors,
        }));
        return Ok(());
    }

    let used = opportunity::opportunity_labels();
    println!("Price catalog");
    println!("=============");
    for (label, price) in config.price_catalog.iter() {
        let marker = if used.iter().any(|u| *u == label) { " " } else { "*" };
        println!("  {marker} {label:<34} ${price:>6}");
    }
    if config.price_catalog.iter().any(|(l, _)| !used.iter().any(|u| *u == l)) {
        println!();
        println!("  * not emitted by any opportunity rule");
    }
    println!();
    println!("AI chat vendors: {}", config.ai_chat_vendors.join(", "));
    Ok(())
}
