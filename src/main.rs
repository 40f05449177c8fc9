//! Watcher binary entrypoint.
//!
//! Designed to be fired by an external scheduler (cron or a CI workflow)
//! at short intervals: one invocation does one full probe cycle and exits.
//! All cross-run memory lives in the state store.

use anyhow::Result;
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tablewatch::config::WatchConfig;
use tablewatch::notify::NotifierMux;
use tablewatch::probe::WiselyClient;
use tablewatch::sink::{JsonlSink, NullSink, ObservationSink};
use tablewatch::state::{FileStore, GistStore, StateStore};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tablewatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op where the scheduler injects everything.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatchConfig::from_env()?;
    tracing::info!(
        watcher = cfg.kind.as_str(),
        venue = %cfg.venue_name,
        merchant = %cfg.merchant_id,
        "starting run"
    );

    // Gist-backed state when configured, otherwise a local state directory.
    let store: Box<dyn StateStore> = match GistStore::from_env() {
        Some(g) => Box::new(g),
        None => Box::new(FileStore::new(
            std::env::var("STATE_DIR").unwrap_or_else(|_| "state".to_string()),
        )),
    };

    let sink: Box<dyn ObservationSink> = match std::env::var("OBSERVATION_LOG") {
        Ok(path) if !path.is_empty() => Box::new(JsonlSink::new(path)),
        _ => Box::new(NullSink),
    };

    let client = WiselyClient::from_env();
    let mux = NotifierMux::from_env();

    tablewatch::engine::run_once(
        &cfg,
        &client,
        store.as_ref(),
        sink.as_ref(),
        &mux,
        Utc::now(),
    )
    .await?;

    Ok(())
}
