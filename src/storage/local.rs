//! Local record backend: one redb table, keyed by record name.
//!
//! ```text
//! records:  record_name → JSON Record
//! ```
//!
//! Single-device only; useful offline and as the default when no cloud
//! container is configured. The async trait methods call straight through
//! to redb's synchronous transactions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};

use super::{generate_record_name, RecordStore};
use crate::config::LocalStoreConfig;
use crate::record::{Record, RecordFilter};

const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    pub fn open(config: &LocalStoreConfig) -> Result<Self> {
        let path = match &config.path {
            Some(p) => PathBuf::from(p),
            None => Self::default_path()?,
        };
        Self::create(&path)
    }

    /// Open or create the database at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("failed to open record store at {}", path.display()))?;
        // Ensure table exists
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(RECORDS_TABLE)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .context("Failed to get data directory")?
            .join("academy-spaces");
        std::fs::create_dir_all(&data_dir)
            .context("Failed to create data directory")?;
        Ok(data_dir.join("records.redb"))
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    fn backend_name(&self) -> &str {
        "local"
    }

    async fn query(&self, record_type: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        let rtxn = self.db.begin_read()?;
        let table = rtxn.open_table(RECORDS_TABLE)?;
        let mut records = Vec::new();
        for item in table.iter()? {
            let (key, val) = item?;
            match serde_json::from_slice::<Record>(val.value()) {
                Ok(record) if record.record_type == record_type && filter.matches(&record) => {
                    records.push(record)
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping corrupt record {}: {}", key.value(), e),
            }
        }
        Ok(records)
    }

    async fn save(&self, record: &Record) -> Result<Record> {
        let mut stored = record.clone();
        let name = stored
            .record_name
            .get_or_insert_with(generate_record_name)
            .clone();
        let json = serde_json::to_vec(&stored)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS_TABLE)?;
            table.insert(name.as_str(), json.as_slice())?;
        }
        txn.commit()?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RECORD_TYPE;
    use crate::space::{Space, SpaceKind, SpaceStatus};

    fn space(id: &str) -> Space {
        Space::new(id, id, SpaceKind::Collab, SpaceStatus::Free, "", id)
    }

    #[tokio::test]
    async fn test_save_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(&dir.path().join("records.redb")).unwrap();

        store.save(&Record::from_space(&space("1-1"))).await.unwrap();
        store.save(&Record::from_space(&space("1-2"))).await.unwrap();

        let all = store.query(RECORD_TYPE, &RecordFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.record_name.is_some()));

        let one = store.query(RECORD_TYPE, &RecordFilter::id_equals("1-2")).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].to_space(), Some(space("1-2")));
    }

    #[tokio::test]
    async fn test_overwrite_by_record_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(&dir.path().join("records.redb")).unwrap();

        let mut saved = store.save(&Record::from_space(&space("1-1"))).await.unwrap();
        saved.set("status", "occupied");
        store.save(&saved).await.unwrap();

        let all = store.query(RECORD_TYPE, &RecordFilter::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("status"), Some("occupied"));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.redb");
        {
            let store = LocalStore::create(&path).unwrap();
            store.save(&Record::from_space(&space("b-l1"))).await.unwrap();
        }
        let store = LocalStore::create(&path).unwrap();
        let all = store.query(RECORD_TYPE, &RecordFilter::All).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
