//! academy-spaces: headless host for the space registry.
//!
//! Runs the sync loop against the configured record store and serves the
//! JSON-lines command channel on stdin/stdout. Logs go to stderr.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use academy_spaces::commands;
use academy_spaces::config::Config;
use academy_spaces::storage;
use academy_spaces::{RegistryEvent, SpaceRegistry, SpaceStore, SyncLoop};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("academy_spaces=info".parse()?),
        )
        .init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to load config: {:#}, using defaults", e);
            Config::default()
        }
    };

    let backend = storage::open_backend(&config.store)?;
    let registry = SpaceRegistry::new(SpaceStore::new(backend), config.sync.request_timeout());
    let sync = SyncLoop::spawn(
        registry.clone(),
        config.sync.interval(),
        config.sync.request_timeout(),
    );

    let mut events = registry.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RegistryEvent::SpaceUpdated { id } => tracing::debug!("Space {} updated locally", id),
                RegistryEvent::Synced { collabs, balconies } => {
                    tracing::debug!("Registry now holds {} collabs, {} balconies", collabs, balconies)
                }
                RegistryEvent::SyncFailed { error } => tracing::debug!("Sync failed: {}", error),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };

        let line = match line {
            Ok(Some(l)) if l.trim().is_empty() => continue,
            Ok(Some(l)) => l,
            Ok(None) => {
                tracing::info!("stdin closed; syncing until interrupted");
                let _ = tokio::signal::ctrl_c().await;
                break;
            }
            Err(e) => {
                tracing::warn!("stdin read failed: {}", e);
                break;
            }
        };

        let resp = commands::handle_line(&registry, &sync, &line).await;
        let mut out = serde_json::to_vec(&resp)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    sync.shutdown().await;
    registry.flush().await;
    Ok(())
}
