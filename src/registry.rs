//! In-memory source of truth for spaces and their activity tags.
//!
//! All mutations go through one `RwLock`, so a local `update_space` and a
//! sync overwrite are applied in the order they take the lock (last write
//! wins). Remote saves are queued to a single background worker and never
//! awaited by the caller; whether they landed only shows up on the next
//! sync cycle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot};

use crate::activity::{ActivityCategory, ActivityTags};
use crate::seed;
use crate::space::{Space, SpaceKind, SpaceStatus};
use crate::store::{SeedReport, SpaceStore, UpdateOutcome};

/// Change notifications for whoever renders the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A local update touched this id (tags, and status/note if the space exists).
    SpaceUpdated { id: String },
    /// Both lists were replaced from a remote snapshot.
    Synced { collabs: usize, balconies: usize },
    /// A sync cycle could not reach the store.
    SyncFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The fetched snapshot replaced both lists.
    Replaced { collabs: usize, balconies: usize },
    /// The store was empty; defaults were written to it and local state kept.
    Seeded(SeedReport),
}

/// Everything the presentation side reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub collabs: Vec<Space>,
    pub balconies: Vec<Space>,
    pub tags: ActivityTags,
}

impl RegistrySnapshot {
    pub fn defaults() -> Self {
        Self {
            collabs: seed::default_collabs(),
            balconies: seed::default_balconies(),
            tags: seed::default_tags(),
        }
    }
}

enum PersistJob {
    Save(Space),
    Flush(oneshot::Sender<()>),
}

pub struct SpaceRegistry {
    state: RwLock<RegistrySnapshot>,
    store: SpaceStore,
    /// Written to the store when a fetch comes back empty.
    defaults: Vec<Space>,
    persist_tx: mpsc::UnboundedSender<PersistJob>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RegistryEvent>>>,
}

impl SpaceRegistry {
    /// Registry holding the compiled-in defaults. Must be called inside a
    /// tokio runtime: it spawns the persistence worker.
    pub fn new(store: SpaceStore, request_timeout: Duration) -> Arc<Self> {
        Self::with_state(store, RegistrySnapshot::defaults(), request_timeout)
    }

    pub fn with_state(
        store: SpaceStore,
        initial: RegistrySnapshot,
        request_timeout: Duration,
    ) -> Arc<Self> {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persist_worker(store.clone(), persist_rx, request_timeout));

        Arc::new(Self {
            state: RwLock::new(initial),
            store,
            defaults: seed::default_spaces(),
            persist_tx,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn store(&self) -> &SpaceStore {
        &self.store
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistrySnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistrySnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.read().clone()
    }

    pub fn collabs(&self) -> Vec<Space> {
        self.read().collabs.clone()
    }

    pub fn balconies(&self) -> Vec<Space> {
        self.read().balconies.clone()
    }

    pub fn space(&self, id: &str) -> Option<Space> {
        let state = self.read();
        state
            .collabs
            .iter()
            .chain(state.balconies.iter())
            .find(|s| s.id == id)
            .cloned()
    }

    /// Tags for `id`, empty when none were ever set.
    pub fn tags(&self, id: &str) -> Vec<String> {
        self.read().tags.get(id).to_vec()
    }

    /// Both lists in a fresh random order on every call.
    pub fn suggestions(&self) -> Vec<Space> {
        let mut all = {
            let state = self.read();
            let mut all = state.collabs.clone();
            all.extend(state.balconies.iter().cloned());
            all
        };
        all.shuffle(&mut rand::thread_rng());
        all
    }

    /// Spaces matching a browse category, collabs first.
    pub fn spaces_for_activity(&self, category: ActivityCategory) -> Vec<Space> {
        let state = self.read();
        state
            .collabs
            .iter()
            .chain(state.balconies.iter())
            .filter(|s| category.matches(s, &state.tags))
            .cloned()
            .collect()
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Optimistically set occupancy, note and tags for `id`.
    ///
    /// Tags are replaced even when no space has this id. Returns whether a
    /// space was found; only then is a remote save queued. Tags are never
    /// sent to the store.
    pub fn update_space(&self, id: &str, is_occupied: bool, tags: Vec<String>, note: &str) -> bool {
        let status = SpaceStatus::from_occupied(is_occupied);
        // Queue and publish under the write lock: saves must reach the
        // worker in the order the edits were applied.
        let mut guard = self.write();
        let state = &mut *guard;
        state.tags.set(id, tags);
        let updated = state
            .collabs
            .iter_mut()
            .chain(state.balconies.iter_mut())
            .find(|s| s.id == id)
            .map(|space| {
                *space = space.with_occupancy(status, note);
                space.clone()
            });

        let found = match updated {
            Some(space) => {
                if self.persist_tx.send(PersistJob::Save(space)).is_err() {
                    tracing::warn!("Persistence worker gone; {} stays local", id);
                }
                true
            }
            None => {
                tracing::debug!("update_space: no space with id {}", id);
                false
            }
        };
        self.publish(RegistryEvent::SpaceUpdated { id: id.to_string() });
        found
    }

    /// Fold one fetched snapshot into the registry.
    ///
    /// Empty: seed the store with the defaults and leave local lists alone.
    /// Non-empty: replace both lists wholesale, partitioned by kind. Local
    /// edits the store has not seen are lost here.
    pub async fn reconcile(&self, fetched: Vec<Space>) -> ReconcileOutcome {
        if fetched.is_empty() {
            let report = self.store.seed_if_empty(&self.defaults).await;
            return ReconcileOutcome::Seeded(report);
        }
        let (collabs, balconies) = self.replace_lists(fetched);
        ReconcileOutcome::Replaced { collabs, balconies }
    }

    fn replace_lists(&self, fetched: Vec<Space>) -> (usize, usize) {
        let mut seen = HashSet::new();
        let (collabs, balconies): (Vec<Space>, Vec<Space>) = fetched
            .into_iter()
            .filter(|s| seen.insert(s.id.clone()))
            .partition(|s| s.kind == SpaceKind::Collab);
        let counts = (collabs.len(), balconies.len());

        let mut state = self.write();
        state.collabs = collabs;
        state.balconies = balconies;
        self.publish(RegistryEvent::Synced {
            collabs: counts.0,
            balconies: counts.1,
        });
        counts
    }

    /// Wait until every save queued so far has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.persist_tx.send(PersistJob::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    // ── Subscription ────────────────────────────────────────────────

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: RegistryEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

async fn run_persist_worker(
    store: SpaceStore,
    mut rx: mpsc::UnboundedReceiver<PersistJob>,
    request_timeout: Duration,
) {
    while let Some(job) = rx.recv().await {
        match job {
            PersistJob::Save(space) => {
                match tokio::time::timeout(request_timeout, store.update(&space)).await {
                    Ok(Ok(UpdateOutcome::Updated)) => {
                        tracing::info!("Cloud save success for {}", space.name)
                    }
                    Ok(Ok(UpdateOutcome::NotFound)) => {
                        tracing::debug!("{} has no remote record; kept local", space.id)
                    }
                    Ok(Err(e)) => tracing::warn!("Cloud save failed for {}: {}", space.id, e),
                    Err(_) => tracing::warn!("Cloud save for {} timed out", space.id),
                }
            }
            PersistJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::storage::MemoryStore;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Registry over a memory store already holding the default spaces.
    fn seeded_registry() -> (Arc<MemoryStore>, Arc<SpaceRegistry>) {
        let records = seed::default_spaces().iter().map(Record::from_space).collect();
        let memory = Arc::new(MemoryStore::with_records(records));
        let registry = SpaceRegistry::new(SpaceStore::new(memory.clone()), TIMEOUT);
        (memory, registry)
    }

    fn ids(spaces: &[Space]) -> Vec<&str> {
        spaces.iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_starts_with_defaults() {
        let (_, registry) = seeded_registry();
        assert_eq!(registry.collabs(), seed::default_collabs());
        assert_eq!(registry.balconies(), seed::default_balconies());
        assert_eq!(registry.tags("b-l2-1"), vec!["smoking".to_string()]);
    }

    #[tokio::test]
    async fn test_update_collab_is_immediate_and_persisted() {
        let (memory, registry) = seeded_registry();

        assert!(registry.update_space("1-1", true, vec!["music".into()], "Jam session"));

        let space = registry.space("1-1").unwrap();
        assert_eq!(space.status, SpaceStatus::Occupied);
        assert_eq!(space.note, "Jam session");
        assert_eq!(space.name, "Collab 01-01");
        assert_eq!(space.image_ref, "Collab 01-01");
        assert_eq!(registry.tags("1-1"), vec!["music".to_string()]);

        registry.flush().await;
        let remote = registry.store().fetch_all().await.unwrap();
        let remote_1_1 = remote.iter().find(|s| s.id == "1-1").unwrap();
        assert_eq!(remote_1_1.status, SpaceStatus::Occupied);
        assert_eq!(remote_1_1.note, "Jam session");
        assert_eq!(memory.save_count(), 1);
    }

    #[tokio::test]
    async fn test_update_balcony() {
        let (_, registry) = seeded_registry();
        assert!(registry.update_space("b-l2-1", false, vec![], ""));

        let balcony = registry.balconies().into_iter().find(|s| s.id == "b-l2-1").unwrap();
        assert_eq!(balcony.status, SpaceStatus::Free);
        assert_eq!(balcony.note, "");
        assert!(registry.tags("b-l2-1").is_empty());
        assert_eq!(registry.collabs(), seed::default_collabs());
    }

    #[tokio::test]
    async fn test_update_unknown_id_sets_tags_only() {
        let (memory, registry) = seeded_registry();
        let before = registry.snapshot();

        assert!(!registry.update_space("ghost", true, vec!["crowded".into()], "boo"));
        registry.flush().await;

        let after = registry.snapshot();
        assert_eq!(after.collabs, before.collabs);
        assert_eq!(after.balconies, before.balconies);
        assert_eq!(registry.tags("ghost"), vec!["crowded".to_string()]);
        assert_eq!(memory.save_count(), 0);
    }

    #[tokio::test]
    async fn test_tag_isolation() {
        let (_, registry) = seeded_registry();
        let before = registry.snapshot();
        let y = registry.space("2-2").unwrap();

        registry.update_space("2-2", y.status.is_occupied(), vec!["crowded".into()], &y.note);

        assert_eq!(registry.space("2-2").unwrap(), y);
        assert_eq!(registry.tags("2-2"), vec!["crowded".to_string()]);
        for id in before.tags.ids().filter(|id| *id != "2-2") {
            assert_eq!(registry.tags(id), before.tags.get(id));
        }
    }

    #[tokio::test]
    async fn test_missing_tags_are_empty() {
        let (_, registry) = seeded_registry();
        assert!(registry.tags("1-1").is_empty());
        assert!(registry.tags("unknown").is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_are_a_permutation() {
        let (_, registry) = seeded_registry();
        let mut expected: Vec<String> = seed::default_spaces().into_iter().map(|s| s.id).collect();
        let mut got: Vec<String> = registry.suggestions().into_iter().map(|s| s.id).collect();
        expected.sort();
        got.sort();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn test_reconcile_partitions_by_kind() {
        let (_, registry) = seeded_registry();
        let fetched = vec![
            Space::new("1-1", "A", SpaceKind::Collab, SpaceStatus::Free, "", "a"),
            Space::new("b-l1", "B", SpaceKind::Balcony, SpaceStatus::Occupied, "", "b"),
            Space::new("1-2", "C", SpaceKind::Collab, SpaceStatus::Occupied, "x", "c"),
        ];

        let outcome = registry.reconcile(fetched).await;
        assert_eq!(outcome, ReconcileOutcome::Replaced { collabs: 2, balconies: 1 });
        assert_eq!(ids(&registry.collabs()), ["1-1", "1-2"]);
        assert_eq!(ids(&registry.balconies()), ["b-l1"]);
    }

    #[tokio::test]
    async fn test_reconcile_dedups_ids() {
        let (_, registry) = seeded_registry();
        let fetched = vec![
            Space::new("1-1", "first", SpaceKind::Collab, SpaceStatus::Free, "", "a"),
            Space::new("1-1", "second", SpaceKind::Collab, SpaceStatus::Occupied, "", "a"),
            Space::new("1-1", "third", SpaceKind::Balcony, SpaceStatus::Free, "", "a"),
        ];

        registry.reconcile(fetched).await;
        let collabs = registry.collabs();
        assert_eq!(collabs.len(), 1);
        assert_eq!(collabs[0].name, "first");
        assert!(registry.balconies().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_keeps_tags() {
        let (_, registry) = seeded_registry();
        registry.update_space("1-1", true, vec!["music".into()], "");
        registry.reconcile(seed::default_spaces()).await;
        assert_eq!(registry.tags("1-1"), vec!["music".to_string()]);
        assert_eq!(registry.tags("b-l2-1"), vec!["smoking".to_string()]);
    }

    #[tokio::test]
    async fn test_optimistic_then_converge() {
        let (memory, registry) = seeded_registry();
        memory.set_fail_saves(true);

        // "1-1" starts free both locally and remotely
        registry.update_space("1-1", true, vec![], "test");
        assert_eq!(registry.space("1-1").unwrap().status, SpaceStatus::Occupied);

        registry.flush().await;
        let fetched = registry.store().fetch_all().await.unwrap();
        registry.reconcile(fetched).await;

        let space = registry.space("1-1").unwrap();
        assert_eq!(space.status, SpaceStatus::Free);
        assert_eq!(space.note, "Sunny Side");
    }

    /// Delegates queries to memory, never finishes a save.
    struct HangingSaves(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl crate::storage::RecordStore for HangingSaves {
        fn backend_name(&self) -> &str {
            "hanging"
        }

        async fn query(
            &self,
            record_type: &str,
            filter: &crate::record::RecordFilter,
        ) -> anyhow::Result<Vec<Record>> {
            self.0.query(record_type, filter).await
        }

        async fn save(&self, record: &Record) -> anyhow::Result<Record> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(record.clone())
        }
    }

    #[tokio::test]
    async fn test_hung_save_is_bounded_by_timeout() {
        let records = seed::default_spaces().iter().map(Record::from_space).collect();
        let memory = Arc::new(MemoryStore::with_records(records));
        let store = SpaceStore::new(Arc::new(HangingSaves(memory.clone())));
        let registry = SpaceRegistry::new(store, Duration::from_millis(50));

        registry.update_space("1-1", true, vec![], "first");
        registry.update_space("1-2", true, vec![], "second");
        tokio::time::timeout(Duration::from_secs(5), registry.flush())
            .await
            .expect("worker stuck on a hung save");

        // Both saves were abandoned; local state keeps the edits
        assert_eq!(registry.space("1-1").unwrap().note, "first");
        assert_eq!(registry.space("1-2").unwrap().note, "second");
        assert_eq!(memory.save_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_updates_persist_in_applied_order() {
        let (_, registry) = seeded_registry();

        for round in 0..50 {
            tokio::task::block_in_place(|| {
                std::thread::scope(|scope| {
                    for who in ["a", "b", "c", "d"] {
                        let registry = &registry;
                        scope.spawn(move || {
                            for i in 0..50 {
                                let note = format!("{who}{round}-{i}");
                                registry.update_space("1-1", true, vec![], &note);
                            }
                        });
                    }
                });
            });
            registry.flush().await;

            let local = registry.space("1-1").unwrap().note;
            let remote = registry
                .store()
                .fetch_all()
                .await
                .unwrap()
                .into_iter()
                .find(|s| s.id == "1-1")
                .unwrap()
                .note;
            assert_eq!(local, remote, "local and remote disagree in round {round}");
        }
    }

    #[tokio::test]
    async fn test_seed_on_empty() {
        let memory = Arc::new(MemoryStore::new());
        let registry = SpaceRegistry::new(SpaceStore::new(memory.clone()), TIMEOUT);
        registry.update_space("1-1", true, vec![], "local only");
        registry.flush().await;
        let before = registry.snapshot();

        let outcome = registry.reconcile(Vec::new()).await;

        let defaults = seed::default_spaces();
        assert_eq!(
            outcome,
            ReconcileOutcome::Seeded(SeedReport { written: defaults.len(), failed: 0 })
        );
        assert_eq!(registry.snapshot(), before);
        assert_eq!(registry.store().fetch_all().await.unwrap().len(), defaults.len());

        let mut seeded: Vec<Space> = memory.records().iter().filter_map(Record::to_space).collect();
        let mut expected = defaults;
        seeded.sort_by(|a, b| a.id.cmp(&b.id));
        expected.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(seeded, expected);
    }

    #[tokio::test]
    async fn test_last_writer_wins_across_devices() {
        let (memory, phone) = seeded_registry();
        let tablet = SpaceRegistry::new(SpaceStore::new(memory.clone()), TIMEOUT);

        // Both devices touch b-l1 inside one poll window; the tablet saves last.
        phone.update_space("b-l1", true, vec!["smoking".into()], "Smoke break");
        phone.flush().await;
        tablet.update_space("b-l1", false, vec![], "Leaving");
        tablet.flush().await;

        for device in [&phone, &tablet] {
            let fetched = device.store().fetch_all().await.unwrap();
            device.reconcile(fetched).await;
            let space = device.space("b-l1").unwrap();
            assert_eq!(space.status, SpaceStatus::Free);
            assert_eq!(space.note, "Leaving");
        }
        // Tags never travel: each device keeps its own
        assert_eq!(phone.tags("b-l1"), vec!["smoking".to_string()]);
        assert!(tablet.tags("b-l1").is_empty());
    }

    #[tokio::test]
    async fn test_uniqueness_after_operations() {
        let (_, registry) = seeded_registry();
        registry.update_space("1-1", true, vec![], "");
        let mut fetched = seed::default_spaces();
        fetched.extend(seed::default_balconies());
        registry.reconcile(fetched).await;
        registry.update_space("b-l1", true, vec![], "");

        for list in [registry.collabs(), registry.balconies()] {
            let unique: HashSet<&str> = list.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(unique.len(), list.len());
        }
    }

    #[tokio::test]
    async fn test_spaces_for_activity() {
        let (_, registry) = seeded_registry();
        let smoking = registry.spaces_for_activity(ActivityCategory::Smoking);
        assert_eq!(ids(&smoking), ["b-l2-1"]);

        let quiet = registry.spaces_for_activity(ActivityCategory::Quiet);
        assert!(quiet.iter().all(|s| s.status == SpaceStatus::Free));
        assert_eq!(quiet.len(), 15);

        registry.update_space("1-1", true, vec!["instrument".into()], "");
        assert_eq!(ids(&registry.spaces_for_activity(ActivityCategory::Instrument)), ["1-1"]);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let (_, registry) = seeded_registry();
        let mut rx = registry.subscribe();
        let dropped = registry.subscribe();
        drop(dropped);

        registry.update_space("1-3", true, vec![], "");
        registry.reconcile(seed::default_spaces()).await;

        assert_eq!(rx.recv().await, Some(RegistryEvent::SpaceUpdated { id: "1-3".into() }));
        assert_eq!(rx.recv().await, Some(RegistryEvent::Synced { collabs: 16, balconies: 6 }));
        assert_eq!(registry.subscribers.lock().unwrap().len(), 1);
    }
}
