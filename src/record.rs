//! Flat record shape of the remote store and the `Space` codec.
//!
//! ```text
//! AcademySpace {
//!     id               → Space::id        (required)
//!     name             → Space::name      (required)
//!     type             → Space::kind      (required, "collab" | "balcony")
//!     status           → Space::status    (required, "occupied" | anything else = free)
//!     descriptionText  → Space::note      (optional, default "")
//!     imageName        → Space::image_ref (required)
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::space::{Space, SpaceStatus};

pub const RECORD_TYPE: &str = "AcademySpace";

pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const STATUS: &str = "status";
    pub const DESCRIPTION: &str = "descriptionText";
    pub const IMAGE: &str = "imageName";
}

/// One raw record as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Store-native identifier. `None` until the store has saved it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    pub record_type: String,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(record_type: &str) -> Self {
        Self {
            record_name: None,
            record_type: record_type.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Fresh (unsaved) record carrying every field of `space`.
    pub fn from_space(space: &Space) -> Self {
        let mut record = Record::new(RECORD_TYPE);
        record.set(fields::ID, &space.id);
        record.set(fields::NAME, &space.name);
        record.set(fields::TYPE, space.kind.to_string());
        record.set(fields::STATUS, space.status.to_string());
        record.set(fields::DESCRIPTION, &space.note);
        record.set(fields::IMAGE, &space.image_ref);
        record
    }

    /// Overwrite the mutable occupancy fields from `space`.
    pub fn apply_occupancy(&mut self, space: &Space) {
        self.set(fields::STATUS, space.status.to_string());
        self.set(fields::DESCRIPTION, &space.note);
    }

    /// Decode into a `Space`, or None when a required field is missing or
    /// the type is not one we know.
    pub fn to_space(&self) -> Option<Space> {
        let id = self.get(fields::ID)?;
        let name = self.get(fields::NAME)?;
        let kind = self.get(fields::TYPE)?.parse().ok()?;
        let status = SpaceStatus::from_wire(self.get(fields::STATUS)?);
        let image_ref = self.get(fields::IMAGE)?;
        let note = self.get(fields::DESCRIPTION).unwrap_or("");
        Some(Space::new(id, name, kind, status, note, image_ref))
    }
}

/// Query predicate understood by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    FieldEquals { field: String, value: String },
}

impl RecordFilter {
    pub fn id_equals(id: &str) -> Self {
        RecordFilter::FieldEquals {
            field: fields::ID.to_string(),
            value: id.to_string(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::FieldEquals { field, value } => record.get(field) == Some(value.as_str()),
        }
    }
}
