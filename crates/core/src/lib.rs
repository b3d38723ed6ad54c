//! Stoneyard Core Crate
//!
//! The synchronization and enrichment pipeline behind the stoneyard
//! backend:
//!
//! - [`CacheStore`]: Redis-backed persistent cache (identifier index,
//!   one serialized record per entity, per-class freshness markers).
//! - [`ReferenceOverlay`]: static reforge definitions loaded once at
//!   startup and merged into entities on cache-write and on read.
//! - [`SyncService`]: enrichment/merge logic combining freshly fetched
//!   entities with previously cached derived fields.
//! - [`scheduler`]: two independent background timers (slow catalog
//!   refresh, fast price-only refresh).
//!
//! Readers (the HTTP layer) go through [`SyncService`]'s read side at
//! any time, including mid-refresh; they see whatever was last
//! successfully cached.

pub mod errors;
pub mod models;
pub mod overlay;
pub mod scheduler;
pub mod store;
pub mod sync;

pub use errors::SyncError;
pub use models::{Item, Reforge, ReforgeEffect, StatBlock};
pub use overlay::ReferenceOverlay;
pub use scheduler::ScheduleConfig;
pub use store::{CacheStore, DataClass};
pub use sync::{needs_catalog_refresh, SyncConfig, SyncOutcome, SyncService};
