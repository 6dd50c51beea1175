//! Space-level gateway over a raw [`RecordStore`].
//!
//! Records are addressed by their `id` field, never by the store-native
//! record name, so the app can look them up again with its own id scheme.

use std::sync::Arc;

use anyhow::Result;

use crate::record::{Record, RecordFilter, RECORD_TYPE};
use crate::space::Space;
use crate::storage::RecordStore;

/// Result of pushing one space's occupancy to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No record carries this id. Callers treat this as a no-op.
    NotFound,
}

/// What a seeding pass managed to write. Writes are independent, so a
/// partial seed is left as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub written: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SpaceStore {
    backend: Arc<dyn RecordStore>,
}

impl SpaceStore {
    pub fn new(backend: Arc<dyn RecordStore>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Every decodable space, sorted by id. Undecodable records are skipped.
    /// `Err` only when the store itself could not be queried.
    pub async fn fetch_all(&self) -> Result<Vec<Space>> {
        let records = self.backend.query(RECORD_TYPE, &RecordFilter::All).await?;
        let total = records.len();

        let mut spaces: Vec<Space> = records
            .iter()
            .filter_map(|record| {
                let space = record.to_space();
                if space.is_none() {
                    tracing::warn!(
                        "Dropping undecodable record {}",
                        record.record_name.as_deref().unwrap_or("<unnamed>")
                    );
                }
                space
            })
            .collect();
        spaces.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!("Fetched {} spaces ({} records)", spaces.len(), total);
        Ok(spaces)
    }

    /// Overwrite status and note on the record whose `id` matches.
    /// With several matches only the first is touched.
    pub async fn update(&self, space: &Space) -> Result<UpdateOutcome> {
        let matches = self
            .backend
            .query(RECORD_TYPE, &RecordFilter::id_equals(&space.id))
            .await?;

        let Some(mut record) = matches.into_iter().next() else {
            return Ok(UpdateOutcome::NotFound);
        };
        record.apply_occupancy(space);
        self.backend.save(&record).await?;
        tracing::debug!("Saved {} ({}) to {}", space.id, space.status, self.backend_name());
        Ok(UpdateOutcome::Updated)
    }

    /// Write one fresh record per space. Only meant for an empty store:
    /// nothing here checks for existing records.
    pub async fn seed_if_empty(&self, spaces: &[Space]) -> SeedReport {
        tracing::info!("Seeding {} with {} spaces", self.backend_name(), spaces.len());
        let mut report = SeedReport::default();
        for space in spaces {
            match self.backend.save(&Record::from_space(space)).await {
                Ok(_) => report.written += 1,
                Err(e) => {
                    tracing::warn!("Error seeding {}: {}", space.name, e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}
