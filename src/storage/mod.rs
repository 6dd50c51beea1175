//! Raw record backends for the space store.
//!
//! - [`MemoryStore`]: in-process records (tests, demos, `backend = "memory"`)
//! - [`LocalStore`]: redb file, single-device offline use (default)
//! - [`CloudKitStore`]: CloudKit Web Services public database (multi-device sync)
//!
//! [`crate::store::SpaceStore`] holds an `Arc<dyn RecordStore>` and every
//! remote read/write goes through it.

pub mod cloudkit;
pub mod local;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::record::{Record, RecordFilter};

pub use cloudkit::CloudKitStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// A flat, last-writer-wins record collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable backend name (e.g., "memory", "local", "cloudkit").
    fn backend_name(&self) -> &str;

    /// All records of `record_type` matching `filter`, in store order.
    async fn query(&self, record_type: &str, filter: &RecordFilter) -> Result<Vec<Record>>;

    /// Create (no `record_name`) or overwrite (with `record_name`) a record.
    /// Returns the record as stored, with its native name filled in.
    async fn save(&self, record: &Record) -> Result<Record>;
}

/// Build the backend selected in the config.
pub fn open_backend(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Local => Arc::new(LocalStore::open(&config.local)?),
        StoreBackend::CloudKit => Arc::new(CloudKitStore::new(&config.cloudkit)?),
    };
    tracing::info!("Using {} record store", store.backend_name());
    Ok(store)
}

/// Random store-native record name for backends that assign their own.
pub(crate) fn generate_record_name() -> String {
    use rand::Rng;
    let n: u128 = rand::thread_rng().gen();
    format!("{:032x}", n)
}
