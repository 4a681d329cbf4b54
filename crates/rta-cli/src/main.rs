//! CLI entry point for RTA.
//!
//! This binary provides the `rta` command with subcommands for running the
//! HTTP service, answering one question, watching a stream in the
//! foreground, and checking configuration.

mod cli;
mod config;
mod helpers;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use rta_intent::{Condition, SessionEnd};
use rta_kernel::{ConditionTranslator, Source};
use rta_web::WebServer;

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::helpers::{build_assistant, build_dispatcher, build_monitor, build_workflow, init_tracing};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to load .env");
        }
    }
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind, port } => cmd_serve(config, bind, port).await,
        Commands::Ask {
            question,
            source,
            verbose,
        } => cmd_ask(&config, &question, source, verbose).await,
        Commands::Monitor {
            instruction,
            source,
        } => cmd_monitor(&config, &instruction, source).await,
        Commands::Status => cmd_status(&config, cli.config.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(mut config: AppConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    init_tracing("info");

    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let dispatcher = Arc::new(build_dispatcher(&config)?);
    info!(
        model = %config.llm.model,
        stream = %config.stream.base_url,
        "services initialized"
    );

    let server = WebServer::new(config.web_config(), dispatcher);
    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await
        .map_err(|e| anyhow::anyhow!("web server failed: {e}"))
}

// ---------------------------------------------------------------------------
// Subcommand: ask
// ---------------------------------------------------------------------------

async fn cmd_ask(config: &AppConfig, question: &str, source: Source, verbose: bool) -> Result<()> {
    init_tracing("warn");

    let assistant = build_assistant(config)?;
    let workflow = build_workflow(config, &assistant)?;

    let outcome = workflow
        .run(question, source)
        .await
        .context("failed to answer the question")?;

    println!("{}", outcome.reply());

    if verbose {
        let path: Vec<String> = outcome.path.iter().map(ToString::to_string).collect();
        println!();
        println!("  Stages: {}", path.join(" -> "));
        if let Some(query) = &outcome.state.query {
            println!("  Query:  {query}");
        }
        if let Some(rows) = &outcome.state.query_result {
            let rows = serde_json::to_string_pretty(rows).context("failed to format rows")?;
            println!("  Rows:\n{rows}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: monitor
// ---------------------------------------------------------------------------

async fn cmd_monitor(config: &AppConfig, instruction: &str, source: Source) -> Result<()> {
    init_tracing("info");

    let assistant = build_assistant(config)?;
    let monitor = build_monitor(config)?;

    let vocabulary = source.schema();
    let text = assistant
        .translate(instruction, vocabulary)
        .await
        .context("failed to translate the instruction")?;
    let condition = Condition::compile(&text, vocabulary)
        .with_context(|| format!("`{text}` is not a usable condition for {source}"))?;

    println!("Monitoring the {source} stream for: {condition}");
    println!("Notifications go to {}. Press Ctrl-C to stop.", config.notify.recipient);

    let handle = monitor.spawn(condition, source);
    let report = handle
        .join_or_stop(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    println!();
    println!("  Records:        {}", report.records_seen);
    println!("  Malformed:      {}", report.malformed);
    println!("  Matches:        {}", report.matches);
    println!("  Notifications:  {}", report.notifications_sent);
    println!("  Failed sends:   {}", report.delivery_failures);

    match report.end {
        SessionEnd::StreamClosed | SessionEnd::Stopped => Ok(()),
        SessionEnd::TransportFailure => {
            anyhow::bail!("the {source} stream failed; see the log for details")
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

fn cmd_status(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    init_tracing("warn");

    let set = |value: &str| if value.trim().is_empty() { "NOT SET" } else { "CONFIGURED" };

    println!();
    println!("  RTA Status");
    println!("  ==========");
    println!();

    let file = match file {
        Some(path) => path.display().to_string(),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => DEFAULT_CONFIG_PATH.to_owned(),
        None => "none (defaults + environment)".to_owned(),
    };
    println!("  Config file:      {file}");

    println!("  LLM API key:      {} ({})", set(&config.llm.api_key), config.llm.base_url);
    println!("  LLM model:        {}", config.llm.model);
    println!("  Supabase URL:     {}", set(&config.database.url));
    println!("  Supabase key:     {}", set(&config.database.key));
    println!("  Stream server:    {}", config.stream.base_url);
    println!("  SMTP host:        {}", set(&config.notify.smtp_host));
    println!("  SMTP account:     {}", set(&config.notify.username));
    println!("  Alert recipient:  {}", set(&config.notify.recipient));
    println!(
        "  HTTP listener:    {}:{}",
        config.server.bind, config.server.port
    );
    println!();

    Ok(())
}
