//! `mailwarm` - email warm-up service
//!
//! Sends a planned, human-looking trickle of mail between each managed inbox
//! and its peers, and engages with what the peers send back. Exposes a small
//! admin API and an optional in-process scheduler.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod handlers;
mod router;
mod scheduler;
mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mailwarm_core::{ImapTransport, Orchestrator, SmtpTransport, SqliteStore};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Cli, Command, Config};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwarm=info,mailwarm_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (command, config) = Config::from_cli(Cli::parse());

    match command {
        Command::Serve => serve(config).await,
        Command::RunOnce => run_once(config).await,
        Command::Migrate => migrate(config).await,
    }
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    ensure_parent_dir(&config.database)?;
    SqliteStore::open(&config.database)
        .await
        .with_context(|| format!("opening {}", config.database.display()))
}

async fn build_state(config: &Config) -> anyhow::Result<SharedState> {
    let store = Arc::new(open_store(config).await?);
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(SmtpTransport::new(config.io_timeout)),
        Arc::new(ImapTransport::new(config.io_timeout)),
        config.warmup.clone(),
    );
    Ok(Arc::new(AppState::new(
        store,
        orchestrator,
        config.admin_token.clone(),
    )))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(database = %config.database.display(), "Starting mailwarm");
    if config.uses_default_token() {
        warn!("APP_ADMIN_TOKEN is not set; the admin API accepts the default token");
    }

    let state = build_state(&config).await?;
    let scheduler = config
        .self_scheduler
        .then(|| scheduler::spawn(state.clone(), config.schedule_interval));

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, "admin API listening");

    axum::serve(listener, router::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving admin API")?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    info!("mailwarm stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let report = state.tick().await.context("running tick")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn migrate(config: Config) -> anyhow::Result<()> {
    ensure_parent_dir(&config.database)?;
    let store = SqliteStore::connect(&config.database)
        .await
        .with_context(|| format!("opening {}", config.database.display()))?;
    let applied = store.migrate().await.context("applying migrations")?;
    info!(applied, database = %config.database.display(), "schema up to date");
    Ok(())
}
