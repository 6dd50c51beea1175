//! Compiled-in defaults: the registry starts from these, and an empty
//! remote store gets seeded with them.

use crate::activity::{tags, ActivityTags};
use crate::space::{Space, SpaceKind, SpaceStatus};

use crate::space::SpaceStatus::{Free, Occupied};

const COLLABS: &[(&str, &str, SpaceStatus, &str)] = &[
    ("1-1", "Collab 01-01", Free, "Sunny Side"),
    ("1-2", "Collab 01-02", Occupied, "Meeting"),
    ("1-3", "Collab 01-03", Free, "Quiet"),
    ("1-4", "Collab 01-04", Free, "Near Entrance"),
    ("2-1", "Collab 02-01", Free, ""),
    ("2-2", "Collab 02-02", Occupied, "Brainstorming"),
    ("2-3", "Collab 02-03", Free, ""),
    ("2-4", "Collab 02-04", Free, ""),
    ("2-5", "Collab 02-05", Occupied, "Zoom Call"),
    ("2-6", "Collab 02-06", Free, ""),
    ("3-1", "Collab 03-01", Free, ""),
    ("3-2", "Collab 03-02", Occupied, "Occupied by John"),
    ("3-3", "Collab 03-03", Free, ""),
    ("3-4", "Collab 03-04", Free, ""),
    ("3-5", "Collab 03-05", Free, ""),
    ("3-6", "Collab 03-06", Occupied, "Design Review"),
];

// (id, name, status, note, image)
const BALCONIES: &[(&str, &str, SpaceStatus, &str, &str)] = &[
    ("b-l1", "Balcony lab 1", Free, "Sunny spot", "Balcony lab 1"),
    ("b-l2-1", "First Balcony lab 2", Occupied, "Smoking area", "Balcony lab 2"),
    ("b-l2-2", "Second Balcony lab 2", Free, "Quiet corner", "2 Balcony lab 2"),
    ("b-l3", "Balcony lab 3", Free, "View of the park", "Balcony lab 3"),
    ("b-s1", "Balcony Seminar 1", Free, "", "Balcony Seminar 1"),
    ("b-s2", "Balcony Seminar 2", Occupied, "Phone call", "Balcony Seminar 2"),
];

pub fn default_collabs() -> Vec<Space> {
    COLLABS
        .iter()
        .map(|&(id, name, status, note)| Space::new(id, name, SpaceKind::Collab, status, note, name))
        .collect()
}

pub fn default_balconies() -> Vec<Space> {
    BALCONIES
        .iter()
        .map(|&(id, name, status, note, image)| {
            Space::new(id, name, SpaceKind::Balcony, status, note, image)
        })
        .collect()
}

/// Every default space, collabs first.
pub fn default_spaces() -> Vec<Space> {
    let mut all = default_collabs();
    all.extend(default_balconies());
    all
}

pub fn default_tags() -> ActivityTags {
    let entries: [(&str, &[&str]); 6] = [
        ("1-2", &[tags::MUSIC, "microphone"]),
        ("2-2", &["laptop"]),
        ("2-5", &["video"]),
        ("3-6", &["drawing"]),
        ("b-l2-1", &[tags::SMOKING]),
        ("b-s2", &["phone"]),
    ];
    entries
        .into_iter()
        .map(|(id, t)| (id, t.iter().map(|s| s.to_string()).collect::<Vec<String>>()))
        .collect()
}
