use serde::{Deserialize, Serialize};

/// Which registry collection a space belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceKind {
    Collab,
    Balcony,
}

impl SpaceKind {
    /// Activity tags the toggle sheet offers for this kind of space.
    pub fn activity_tags(&self) -> &'static [&'static str] {
        use crate::activity::tags;
        match self {
            SpaceKind::Collab => &[tags::MUSIC, tags::MOVIE, tags::INSTRUMENT, tags::CROWDED],
            SpaceKind::Balcony => &[tags::SMOKING, tags::CROWDED],
        }
    }
}

impl std::fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpaceKind::Collab => write!(f, "collab"),
            SpaceKind::Balcony => write!(f, "balcony"),
        }
    }
}

impl std::str::FromStr for SpaceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collab" => Ok(SpaceKind::Collab),
            "balcony" => Ok(SpaceKind::Balcony),
            _ => Err(anyhow::anyhow!("Unknown space type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceStatus {
    Free,
    Occupied,
}

impl SpaceStatus {
    pub fn from_occupied(is_occupied: bool) -> Self {
        if is_occupied {
            SpaceStatus::Occupied
        } else {
            SpaceStatus::Free
        }
    }

    pub fn is_occupied(&self) -> bool {
        *self == SpaceStatus::Occupied
    }

    /// Lenient wire decoding: anything other than "occupied" reads as free.
    pub fn from_wire(s: &str) -> Self {
        Self::from_occupied(s == "occupied")
    }
}

impl std::fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpaceStatus::Free => write!(f, "free"),
            SpaceStatus::Occupied => write!(f, "occupied"),
        }
    }
}

/// A physical location tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Application-level identifier, unique across both collections
    pub id: String,
    pub name: String,
    pub kind: SpaceKind,
    pub status: SpaceStatus,
    /// "What are you doing?" free text, may be empty
    pub note: String,
    /// Presentation asset reference, opaque to the core
    pub image_ref: String,
}

impl Space {
    pub fn new(
        id: &str,
        name: &str,
        kind: SpaceKind,
        status: SpaceStatus,
        note: &str,
        image_ref: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            status,
            note: note.to_string(),
            image_ref: image_ref.to_string(),
        }
    }

    /// Copy of this space with only status and note replaced.
    pub fn with_occupancy(&self, status: SpaceStatus, note: &str) -> Self {
        Self {
            status,
            note: note.to_string(),
            ..self.clone()
        }
    }
}
