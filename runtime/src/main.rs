// Copyright 2026 Leadlens Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use leadlens_runtime::cli;
use leadlens_runtime::cli::audit_cmd::AuditArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "leadlens",
    about = "Leadlens: audit a website and price the sales opportunities",
    version,
    after_help = "Run 'leadlens <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging and progress output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (overrides $LEADLENS_CONFIG and ~/.leadlens/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one website
    Audit {
        /// URL or bare domain (https:// is assumed)
        url: String,
        /// Render budget in milliseconds
        #[arg(long = "render-timeout")]
        render_timeout: Option<u64>,
        /// Per-detector budget in milliseconds
        #[arg(long = "detector-timeout")]
        detector_timeout: Option<u64>,
        /// Score the design from a screenshot with the vision model
        #[arg(long)]
        vision: bool,
        /// Skip Chromium and fetch raw HTML only
        #[arg(long)]
        http_only: bool,
        /// Append the audit to ~/.leadlens/audits.jsonl
        #[arg(long)]
        save: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Show the opportunity price catalog
    Catalog,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, log_json: bool) {
    let filter = if verbose {
        EnvFilter::new("leadlens_runtime=debug,leadlens=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all commands can check them
    if cli.json {
        std::env::set_var(cli::output::JSON_ENV, "1");
    }
    if cli.verbose {
        std::env::set_var(cli::output::VERBOSE_ENV, "1");
    }
    init_tracing(cli.verbose, cli.log_json);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Audit {
            url,
            render_timeout,
            detector_timeout,
            vision,
            http_only,
            save,
        } => {
            let args = AuditArgs {
                render_timeout_ms: render_timeout,
                detector_timeout_ms: detector_timeout,
                vision,
                http_only,
                save,
            };
            cli::audit_cmd::run(&url, &args, config).await
        }
        Commands::Doctor => cli::doctor::run(config).await,
        Commands::Catalog => cli::catalog_cmd::run(config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "leadlens", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
