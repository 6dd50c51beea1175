//! Fixed-interval convergence with the remote store.
//!
//! One cycle = fetch every space, then [`SpaceRegistry::reconcile`]. The
//! loop runs a cycle right away, then once per interval or on request.
//! Cycles run inside the loop task one after another, so two fetches never
//! race to overwrite the registry; ticks missed while a cycle is slow are
//! skipped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::{ReconcileOutcome, RegistryEvent, SpaceRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Cycles that reached the store
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

type SyncReply = oneshot::Sender<Result<ReconcileOutcome>>;

pub struct SyncLoop {
    shutdown_tx: watch::Sender<bool>,
    trigger_tx: mpsc::Sender<SyncReply>,
    stats: Arc<Mutex<SyncStats>>,
    handle: JoinHandle<()>,
}

/// One fetch-and-reconcile pass. A fetch error or timeout leaves the
/// registry untouched and does not seed. A seed where no write landed is
/// reported as an error.
pub async fn run_cycle(registry: &SpaceRegistry, timeout: Duration) -> Result<ReconcileOutcome> {
    let fetched = match tokio::time::timeout(timeout, registry.store().fetch_all()).await {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("fetch timed out after {}ms", timeout.as_millis()),
    };
    let outcome = registry.reconcile(fetched).await;
    if let ReconcileOutcome::Seeded(report) = &outcome {
        if report.written == 0 && report.failed > 0 {
            anyhow::bail!("seeding failed: none of {} writes landed", report.failed);
        }
    }
    Ok(outcome)
}

impl SyncLoop {
    pub fn spawn(registry: Arc<SpaceRegistry>, interval: Duration, timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel(4);
        let stats = Arc::new(Mutex::new(SyncStats::default()));

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            backend = registry.store().backend_name(),
            "Starting sync loop"
        );

        let handle = tokio::spawn(run_loop(
            registry,
            interval,
            timeout,
            Arc::clone(&stats),
            shutdown_rx,
            trigger_rx,
        ));

        Self {
            shutdown_tx,
            trigger_tx,
            stats,
            handle,
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Run a cycle now, in line with the periodic ones.
    pub async fn sync_now(&self) -> Result<ReconcileOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.trigger_tx
            .send(reply_tx)
            .await
            .map_err(|_| anyhow::anyhow!("sync loop has stopped"))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("sync loop stopped before the cycle finished"))?
    }

    /// Stop polling and wait for the loop task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("Sync loop task ended abnormally: {}", e);
        }
        tracing::info!("Sync loop stopped");
    }
}

async fn run_loop(
    registry: Arc<SpaceRegistry>,
    interval: Duration,
    timeout: Duration,
    stats: Arc<Mutex<SyncStats>>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut trigger_rx: mpsc::Receiver<SyncReply>,
) {
    // The first cycle runs right away; ticks start one interval later
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reply: Option<SyncReply> = None;

    loop {
        let result = tokio::select! {
            result = run_cycle(&registry, timeout) => result,
            _ = shutdown_rx.changed() => break,
        };
        record_cycle(&registry, &stats, &result);

        if let Some(reply) = reply.take() {
            let _ = reply.send(result);
        }

        reply = tokio::select! {
            _ = ticker.tick() => None,
            Some(reply) = trigger_rx.recv() => Some(reply),
            _ = shutdown_rx.changed() => break,
        };
    }
}

fn record_cycle(
    registry: &SpaceRegistry,
    stats: &Mutex<SyncStats>,
    result: &Result<ReconcileOutcome>,
) {
    let mut stats = stats.lock().unwrap_or_else(PoisonError::into_inner);
    match result {
        Ok(outcome) => {
            stats.cycles += 1;
            stats.consecutive_failures = 0;
            stats.last_success = Some(Utc::now());
            stats.last_error = None;
            match outcome {
                ReconcileOutcome::Replaced { collabs, balconies } => {
                    tracing::debug!("Synced {} collabs, {} balconies", collabs, balconies)
                }
                ReconcileOutcome::Seeded(report) => tracing::info!(
                    "Remote store was empty; seeded {} spaces ({} failed)",
                    report.written,
                    report.failed
                ),
            }
        }
        Err(e) => {
            stats.consecutive_failures += 1;
            stats.last_error = Some(e.to_string());
            tracing::warn!(
                failures = stats.consecutive_failures,
                "Sync cycle failed: {:#}",
                e
            );
            registry.publish(RegistryEvent::SyncFailed {
                error: e.to_string(),
            });
        }
    }
}
