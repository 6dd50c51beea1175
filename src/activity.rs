//! Activity tags attached to spaces, and the categories used to browse by them.
//!
//! Tags live only in the registry's memory; they are never written to the
//! remote record store.

use std::collections::HashMap;

use crate::space::{Space, SpaceStatus};

pub mod tags {
    pub const MUSIC: &str = "music";
    pub const MOVIE: &str = "movie";
    pub const INSTRUMENT: &str = "instrument";
    pub const SMOKING: &str = "smoking";
    pub const CROWDED: &str = "crowded";
}

/// Side-table of activity tags keyed by space id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTags {
    by_space: HashMap<String, Vec<String>>,
}

impl ActivityTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tags for one space. An empty list keeps an (empty) entry.
    pub fn set(&mut self, id: &str, tags: Vec<String>) {
        self.by_space.insert(id.to_string(), tags);
    }

    pub fn get(&self, id: &str) -> &[String] {
        self.by_space.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str, tag: &str) -> bool {
        self.get(id).iter().any(|t| t == tag)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_space.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_space.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for ActivityTags {
    fn from_iter<I: IntoIterator<Item = (S, Vec<String>)>>(iter: I) -> Self {
        Self {
            by_space: iter.into_iter().map(|(id, tags)| (id.into(), tags)).collect(),
        }
    }
}

/// Browse-by-activity categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityCategory {
    Quiet,
    Crowded,
    Smoking,
    Movies,
    Instrument,
    Music,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 6] = [
        ActivityCategory::Quiet,
        ActivityCategory::Crowded,
        ActivityCategory::Smoking,
        ActivityCategory::Movies,
        ActivityCategory::Instrument,
        ActivityCategory::Music,
    ];

    /// The tag a space must carry to match, or None for status-based categories.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            ActivityCategory::Quiet => None,
            ActivityCategory::Crowded => Some(tags::CROWDED),
            ActivityCategory::Smoking => Some(tags::SMOKING),
            ActivityCategory::Movies => Some(tags::MOVIE),
            ActivityCategory::Instrument => Some(tags::INSTRUMENT),
            ActivityCategory::Music => Some(tags::MUSIC),
        }
    }

    pub fn matches(&self, space: &Space, tags: &ActivityTags) -> bool {
        match self.tag() {
            Some(tag) => tags.contains(&space.id, tag),
            None => space.status == SpaceStatus::Free,
        }
    }
}

impl std::fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActivityCategory::Quiet => "quiet",
            ActivityCategory::Crowded => "crowded",
            ActivityCategory::Smoking => "smoking",
            ActivityCategory::Movies => "movies",
            ActivityCategory::Instrument => "instrument",
            ActivityCategory::Music => "music",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ActivityCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ActivityCategory::ALL
            .into_iter()
            .find(|c| c.to_string() == lower)
            .ok_or_else(|| anyhow::anyhow!("Unknown activity category: {}", s))
    }
}
