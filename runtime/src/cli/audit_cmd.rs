//! `leadlens audit <url>`: audit one site and print the result.

use super::output;
use crate::audit::{AuditSink, JsonlSink, WebsiteAudit};
use crate::config::{AuditConfig, AuditOptions};
use crate::events::AuditEvent;
use crate::orchestrator::Auditor;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::http::HttpRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Flags of the `audit` subcommand.
#[derive(Debug, Clone, Default)]
pub struct AuditArgs {
    pub render_timeout_ms: Option<u64>,
    pub detector_timeout_ms: Option<u64>,
    pub vision: bool,
    pub http_only: bool,
    pub save: bool,
}

pub async fn run(url: &str, args: &AuditArgs, config_path: Option<&Path>) -> Result<()> {
    let config = AuditConfig::load(config_path).context("failed to load configuration")?;

    let renderer: Arc<dyn Renderer> = if args.http_only {
        Arc::new(HttpRenderer::new())
    } else {
        match ChromiumRenderer::new().await {
            Ok(chromium) => Arc::new(chromium),
            Err(e) => {
                warn!("Chromium unavailable, using HTTP-only rendering: {e:#}");
                if !output::is_json() {
                    eprintln!("  Chromium unavailable; falling back to HTTP-only rendering.");
                }
                Arc::new(HttpRenderer::new())
            }
        }
    };

    let auditor = Auditor::from_config(Arc::clone(&renderer), config);
    let progress = output::is_verbose().then(|| {
        let mut rx = auditor.events().subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let Some(line) = progress_line(&event) {
                    eprintln!("  {line}");
                }
            }
        })
    });

    let options = AuditOptions {
        render_timeout_ms: args.render_timeout_ms,
        per_detector_timeout_ms: args.detector_timeout_ms,
        enable_vision_scoring: args.vision.then_some(true),
    };
    let result = auditor.run_audit(url, &options).await;

    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e:#}");
    }
    if let Some(task) = progress {
        task.abort();
    }
    let audit = result?;

    if args.save {
        let path = JsonlSink::default_path();
        JsonlSink::open(&path)?.save(&audit)?;
        if !output::is_json() {
            eprintln!("  Saved to {}", path.display());
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::to_value(&audit)?);
    } else {
        print!("{}", summary(&audit));
    }
    Ok(())
}

fn progress_line(event: &AuditEvent) -> Option<String> {
    match event {
        AuditEvent::StageEntered { state, elapsed_ms, .. } => {
            Some(format!("[{elapsed_ms:>6}ms] {state:?}"))
        }
        AuditEvent::DetectorFinished {
            detector,
            status,
            elapsed_ms,
            ..
        } => Some(format!("    {detector:<16} {status:?} ({elapsed_ms}ms)")),
        AuditEvent::SideChannelFailed { channel, error, .. } => {
            Some(format!("    {channel} unavailable: {error}"))
        }
        AuditEvent::AuditFinished { .. } => None,
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Human-readable report.
pub fn summary(audit: &WebsiteAudit) -> String {
    let f = &audit.findings;
    let s = &audit.scoring;
    let mut out = String::new();

    let _ = writeln!(out, "Audit of {}", f.final_url);
    let _ = writeln!(out, "  State:          {:?}", audit.state);
    if let Some(name) = &f.business_name {
        let _ = writeln!(out, "  Business:       {name}");
    }
    if let Some(email) = &f.contact_email {
        let _ = writeln!(out, "  Contact:        {email}");
    }
    let _ = writeln!(out);

    let stack = f
        .tech_stack
        .frameworks
        .iter()
        .chain(&f.tech_stack.cms)
        .chain(&f.tech_stack.css_frameworks)
        .cloned()
        .collect::<Vec<_>>();
    let _ = writeln!(out, "  Tech stack:     {}", list_or_none(&stack));
    let chat = if f.chatbot.detected {
        let ai = if f.chatbot.is_ai_powered { " (AI)" } else { "" };
        format!("yes [{}]{ai}", list_or_none(&f.chatbot.providers))
    } else {
        "no".to_string()
    };
    let _ = writeln!(out, "  Chatbot:        {chat}");
    let _ = writeln!(out, "  Social bots:    {}", list_or_none(&f.social_bot.providers));
    let _ = writeln!(out, "  Voice:          {}", list_or_none(&f.voice_assistant.providers));
    let _ = writeln!(out, "  SEO score:      {}/100", f.seo_score);
    if f.measured.performance {
        let _ = writeln!(
            out,
            "  PageSpeed:      performance {} / accessibility {} / best practices {}",
            f.performance_score, f.accessibility_score, f.best_practices_score
        );
    }
    if f.measured.design {
        let _ = writeln!(out, "  Design score:   {}/10", f.design_score);
    }
    let _ = writeln!(out, "  Responsive:     {}", if f.has_responsive_design { "yes" } else { "no" });
    let _ = writeln!(out, "  HTTPS:          {}", if f.uses_https { "yes" } else { "no" });

    for (heading, items) in [
        ("Critical", &s.problems.critical),
        ("Important", &s.problems.important),
        ("Minor", &s.problems.minor),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "  {heading}:");
        for item in items {
            let _ = writeln!(out, "    - {item}");
        }
    }

    if !s.opportunities.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Opportunities:");
        for o in &s.opportunities {
            let _ = writeln!(out, "    {:<34} ${:>6}", o.label, o.estimated_price_usd);
        }
        let _ = writeln!(out, "    {:<34} ${:>6}", "Total", s.estimated_value);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  Lead quality:   {:?}", s.lead_quality);

    if !f.degradations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Notes:");
        for note in &f.degradations {
            let _ = writeln!(out, "    [!!] {note}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_degraded_audit() {
        let audit = WebsiteAudit::unreachable(
            "https://acme.test",
            "target blocked automated browsing: HTTP 403",
            &AuditConfig::default(),
        );
        let text = summary(&audit);
        assert!(text.contains("State:          Degraded"));
        assert!(text.contains("Tech stack:     Unmanaged/Custom"));
        assert!(text.contains("[!!] target blocked automated browsing: HTTP 403"));
        assert!(!text.contains("Opportunities:"));
    }
}
