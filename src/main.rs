//! KOC Support Chat
//!
//! Entry point: serves the chat widget, or runs a one-off exchange or
//! diagnostics from the terminal.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use futures::StreamExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use koc_support_chat::api::CompletionClient;
use koc_support_chat::config::{AppConfig, Cli, Command};
use koc_support_chat::controller::elapsed_label;
use koc_support_chat::diagnostics::{self, Diagnostic};
use koc_support_chat::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli).context("Configuration error")?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => server::start_server(Arc::new(config)).await,
        Command::Ask { message, no_stream } => ask(&config, &message, !no_stream).await,
        Command::Diagnose => diagnose(&config).await,
    }
}

fn client(config: &AppConfig) -> anyhow::Result<CompletionClient> {
    Ok(CompletionClient::new(
        &config.completion.base_url,
        &config.completion.model,
    )?)
}

/// Send one message and print the raw reply.
async fn ask(config: &AppConfig, message: &str, stream: bool) -> anyhow::Result<()> {
    let message = message.trim();
    anyhow::ensure!(!message.is_empty(), "message is empty");

    let client = client(config)?;
    let started = Instant::now();
    let mut out = std::io::stdout().lock();

    if stream {
        let mut fragments = client.stream(message).await?;
        while let Some(fragment) = fragments.next().await {
            write!(out, "{}", fragment?)?;
            out.flush()?;
        }
        writeln!(out)?;
    } else {
        writeln!(out, "{}", client.complete(message).await?)?;
    }

    writeln!(out, "({})", elapsed_label(started.elapsed()))?;
    Ok(())
}

/// Run every diagnostic and print one line each.
async fn diagnose(config: &AppConfig) -> anyhow::Result<()> {
    let client = client(config)?;
    let mut failures = 0;

    for diagnostic in Diagnostic::ALL {
        match diagnostics::check(diagnostic, &client).await {
            Ok(outcome) => println!("{diagnostic}: {}", outcome.summary()),
            Err(e) => {
                failures += 1;
                println!("{diagnostic}: ❌ {e}");
            }
        }
    }

    anyhow::ensure!(failures == 0, "{failures} diagnostic(s) failed");
    Ok(())
}
