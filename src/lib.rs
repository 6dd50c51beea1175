//! Occupancy tracking for shared academy spaces (collaboration rooms and
//! balconies), kept in step across devices through a flat remote record
//! store polled on a fixed interval.

pub mod activity;
pub mod commands;
pub mod config;
pub mod record;
pub mod registry;
pub mod seed;
pub mod space;
pub mod storage;
pub mod store;
pub mod sync;

pub use registry::{ReconcileOutcome, RegistryEvent, RegistrySnapshot, SpaceRegistry};
pub use space::{Space, SpaceKind, SpaceStatus};
pub use store::SpaceStore;
pub use sync::SyncLoop;
