mod cli;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use runpad::commands;
use runpad::config;
use tokio::sync::mpsc;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();

    let interactive = matches!(cli.command, Command::Run { .. }) && std::io::stdout().is_terminal();
    init_tracing(cli.opts.log_file.as_deref(), interactive)?;

    let mut settings = config::load(cli.opts.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok());
    if let Some(endpoint) = cli.opts.endpoint {
        settings.endpoint = endpoint;
    }
    if cli.opts.no_suggestions {
        settings.suggestions.enabled = false;
    }

    match cli.command {
        Command::Run { file, language } => {
            commands::run::run(
                commands::run::RunConfig {
                    file,
                    language,
                    config: settings,
                    raw_mode: interactive,
                },
                spawn_terminal_events(),
                std::io::stdout(),
            )
            .await?;
        }
        Command::Generate { language, output } => {
            let service = settings.suggestion_service();
            commands::generate::generate(
                service.as_ref(),
                &language,
                output.as_deref(),
                &mut std::io::stdout(),
            )
            .await?;
        }
        Command::Languages => commands::languages::languages(&mut std::io::stdout())?,
    }

    Ok(())
}

/// Install a panic hook that restores terminal state before printing the panic.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        crossterm::terminal::disable_raw_mode().ok();
        default_hook(info);
    }));
}

/// Level from `RUST_LOG`, else `RUNPAD_LOG`, else `default`.
fn log_filter(default: &str) -> tracing_subscriber::EnvFilter {
    let level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("RUNPAD_LOG"))
        .unwrap_or_else(|_| default.to_string());
    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
}

/// Logs go to `log_file` when given, else stderr. An interactive session owns
/// the terminal, so it logs to stderr only when a level is set explicitly.
fn init_tracing(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let default = if interactive && log_file.is_none() {
        "off"
    } else {
        "warn"
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(default))
        .with_target(false);
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Forward crossterm events to a channel from a background task.
fn spawn_terminal_events() -> mpsc::UnboundedReceiver<Event> {
    let (term_tx, term_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut stream = EventStream::new();
        while let Some(Ok(event)) = stream.next().await {
            if term_tx.send(event).is_err() {
                return;
            }
        }
    });
    term_rx
}
