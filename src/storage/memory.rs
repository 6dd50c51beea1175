//! In-process record backend.
//!
//! Doubles as the test fake: queries and saves can be switched to fail, and
//! every save is counted, so sync behavior can be exercised without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{generate_record_name, RecordStore};
use crate::record::{Record, RecordFilter};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    fail_queries: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with records (native names are assigned if missing).
    pub fn with_records(records: Vec<Record>) -> Self {
        let records = records
            .into_iter()
            .map(|mut r| {
                r.record_name.get_or_insert_with(generate_record_name);
                r
            })
            .collect();
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of every stored record.
    pub fn records(&self) -> Vec<Record> {
        self.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Record>>> {
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn query(&self, record_type: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            anyhow::bail!("memory store: query failed (injected)");
        }
        let records = self.lock()?;
        Ok(records
            .iter()
            .filter(|r| r.record_type == record_type && filter.matches(r))
            .cloned()
            .collect())
    }

    async fn save(&self, record: &Record) -> Result<Record> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("memory store: save failed (injected)");
        }
        let mut records = self.lock()?;
        let mut stored = record.clone();
        match &record.record_name {
            Some(name) => {
                match records.iter_mut().find(|r| r.record_name.as_ref() == Some(name)) {
                    Some(existing) => *existing = stored.clone(),
                    None => records.push(stored.clone()),
                }
            }
            None => {
                stored.record_name = Some(generate_record_name());
                records.push(stored.clone());
            }
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }
}
