//! Redis-backed cache store.
//!
//! The key schema is the sole source of truth for "already known"
//! entities and must stay stable across restarts:
//!
//! - `reforge_stones:ids` — set of known entity identifiers
//! - `reforge_stone:{id}` — one serialized record per entity
//! - `reforge_stones:catalog_updated` / `reforge_stones:price_updated`
//!   — epoch-ms freshness markers per data class
//! - `reforge_stones:count` — total entity count at last catalog batch
//!
//! Per-entity writes are independently atomic per key; entities are
//! independent, so no multi-key transaction is needed. Nothing is ever
//! deleted: the cache mirrors the catalog, it is not an LRU.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::{Result, SyncError};
use crate::models::Item;

/// Identifier index key.
pub const IDS_KEY: &str = "reforge_stones:ids";

/// Total entity count key.
pub const COUNT_KEY: &str = "reforge_stones:count";

const RECORD_KEY_PREFIX: &str = "reforge_stone:";

/// Key of the serialized record for one entity.
pub fn record_key(id: &str) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// The two data classes tracked by independent freshness markers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataClass {
    /// Slow-changing catalog data (entity existence and base metadata).
    Catalog,
    /// Fast-changing market price data.
    Price,
}

impl DataClass {
    /// Redis key of this class's freshness marker.
    pub fn marker_key(self) -> &'static str {
        match self {
            DataClass::Catalog => "reforge_stones:catalog_updated",
            DataClass::Price => "reforge_stones:price_updated",
        }
    }

    /// Human-readable label for logs.
    pub fn label(self) -> &'static str {
        match self {
            DataClass::Catalog => "catalog",
            DataClass::Price => "price",
        }
    }
}

/// Redis-backed persistent cache for enriched entities.
///
/// Cheap to clone; the underlying connection manager multiplexes and
/// reconnects on its own.
#[derive(Clone)]
pub struct CacheStore {
    conn: ConnectionManager,
}

impl CacheStore {
    /// Connect to Redis. A failure here means the store is unavailable
    /// and the caller cannot run any refresh cycle.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| SyncError::StoreUnavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SyncError::StoreUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Read the identifier index.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(IDS_KEY).await?)
    }

    /// Read one cached entity, or `None` when the id is unknown.
    pub async fn get(&self, id: &str) -> Result<Option<Item>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(record_key(id)).await?;
        match raw {
            None => Ok(None),
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }

    /// Overwrite the serialized record and add the id to the index.
    /// Idempotent.
    pub async fn upsert(&self, id: &str, item: &Item) -> Result<()> {
        let json = serde_json::to_string(item)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(record_key(id), json).await?;
        let _: () = conn.sadd(IDS_KEY, id).await?;
        Ok(())
    }

    /// Read a freshness marker (epoch ms), or `None` when the class has
    /// never completed a refresh.
    pub async fn marker(&self, class: DataClass) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(class.marker_key()).await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    /// Advance a freshness marker. Only called after a successful
    /// write-through of a whole batch.
    pub async fn set_marker(&self, class: DataClass, epoch_ms: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(class.marker_key(), epoch_ms).await?;
        Ok(())
    }

    /// Record the total entity count of the last catalog batch.
    pub async fn set_count(&self, count: usize) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(COUNT_KEY, count as i64).await?;
        Ok(())
    }
}
