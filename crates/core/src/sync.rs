//! The synchronization and enrichment pipeline.
//!
//! Combines freshly fetched entities with previously cached derived
//! fields, writes them through the cache store, and advances the
//! per-class freshness markers. Per-entity failures are logged and
//! skipped; only store-unavailable conditions abort a batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use stoneyard_market_data::{BazaarSnapshot, CatalogSource, PriceSource};

use crate::errors::Result;
use crate::models::{Item, Reforge};
use crate::overlay::ReferenceOverlay;
use crate::store::{CacheStore, DataClass};

/// Default age beyond which catalog data counts as stale.
pub const DEFAULT_CATALOG_STALENESS: Duration = Duration::from_secs(6 * 60 * 60);

/// Tunables for the refresh cycles.
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Age beyond which catalog data counts as stale.
    pub catalog_staleness: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catalog_staleness: DEFAULT_CATALOG_STALENESS,
        }
    }
}

/// Aggregate outcome of one enrichment batch, for logging.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncOutcome {
    /// Entities not previously present in the identifier index.
    pub new: usize,
    /// Entities that already existed and were overwritten.
    pub updated: usize,
}

impl SyncOutcome {
    pub fn total(&self) -> usize {
        self.new + self.updated
    }
}

/// Decide whether a non-forced catalog cycle must hit the upstream.
///
/// A fresh marker with a non-empty identifier index skips the fetch.
/// An empty index forces a fetch regardless of marker age, so a cold
/// cache with a stale marker still recovers.
pub fn needs_catalog_refresh(
    marker_ms: Option<i64>,
    id_count: usize,
    staleness: Duration,
    now_ms: i64,
) -> bool {
    if id_count == 0 {
        return true;
    }
    match marker_ms {
        None => true,
        Some(updated_ms) => now_ms.saturating_sub(updated_ms) >= staleness.as_millis() as i64,
    }
}

/// Replace an item's bazaar-derived fields from a fetched snapshot.
/// Absent data leaves the previous value in place, so a thin snapshot
/// never erases previously-good fields.
fn apply_snapshot(item: &mut Item, snapshot: &BazaarSnapshot) {
    if snapshot.buy_price > 0.0 {
        item.bazaar_buy_price = Some(snapshot.buy_price);
    }
    if snapshot.sell_price > 0.0 {
        item.bazaar_sell_price = Some(snapshot.sell_price);
    }

    let buys = snapshot.top_buy_orders();
    if !buys.is_empty() {
        item.bazaar_buy_orders = buys;
    }
    let sells = snapshot.top_sell_orders();
    if !sells.is_empty() {
        item.bazaar_sell_orders = sells;
    }
}

/// Enrich one item in place with price data and its overlay entry.
/// Individual fetch failures are logged and leave the previous value.
async fn enrich_item(prices: &dyn PriceSource, overlay: &ReferenceOverlay, item: &mut Item) {
    match prices.lowest_auction_price(item.id()).await {
        Ok(Some(price)) => item.auction_price = Some(price),
        Ok(None) => {}
        Err(e) => debug!("No auction price for {}: {}", item.id(), e),
    }

    match prices.bazaar_snapshot(item.id()).await {
        Ok(snapshot) => apply_snapshot(item, &snapshot),
        Err(e) => warn!("Error fetching bazaar data for {}: {}", item.id(), e),
    }

    if let Some(effect) = overlay.effect_for_stone(item.id()) {
        item.reforge_effect = Some(effect);
    }
}

/// Orchestrates fetch, enrichment, and cache writes.
pub struct SyncService {
    store: CacheStore,
    catalog: Arc<dyn CatalogSource>,
    prices: Arc<dyn PriceSource>,
    overlay: Arc<ReferenceOverlay>,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(
        store: CacheStore,
        catalog: Arc<dyn CatalogSource>,
        prices: Arc<dyn PriceSource>,
        overlay: Arc<ReferenceOverlay>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            prices,
            overlay,
            config,
        }
    }

    /// Run one catalog refresh cycle. Returns `Ok(true)` when an
    /// upstream fetch actually ran.
    pub async fn refresh_catalog(&self, force: bool) -> Result<bool> {
        if force {
            info!("Force fetch requested. Fetching new data...");
        } else {
            let marker = self.store.marker(DataClass::Catalog).await?;
            let id_count = self.store.list_ids().await?.len();
            if !needs_catalog_refresh(
                marker,
                id_count,
                self.config.catalog_staleness,
                Utc::now().timestamp_millis(),
            ) {
                debug!(
                    "Catalog data is fresh ({} entities cached). Skipping fetch.",
                    id_count
                );
                return Ok(false);
            }
        }

        info!("Fetching reforge stones from the catalog API...");
        let (catalog_items, _upstream_last_updated) = self.catalog.fetch_catalog().await?;
        let items: Vec<Item> = catalog_items.into_iter().map(Item::from_catalog).collect();

        let outcome = self.enrich_and_store(items, DataClass::Catalog).await?;
        info!(
            "Catalog refresh complete ({} new, {} updated)",
            outcome.new, outcome.updated
        );
        Ok(true)
    }

    /// Enrich a batch of entities and write them through.
    ///
    /// Per-entity failures (price fetch, serialization, record write)
    /// are logged and skipped; the batch continues. The freshness
    /// marker for `class` is advanced only after the whole batch has
    /// been processed.
    pub async fn enrich_and_store(
        &self,
        items: Vec<Item>,
        class: DataClass,
    ) -> Result<SyncOutcome> {
        let known: HashSet<String> = self.store.list_ids().await?.into_iter().collect();

        let total = items.len();
        let mut outcome = SyncOutcome::default();
        for mut item in items {
            if known.contains(item.id()) {
                // Seed derived fields from the cached record so a failed
                // fetch this cycle never erases previously-good data.
                match self.store.get(item.id()).await {
                    Ok(Some(cached)) => item.carry_derived_from(cached),
                    Ok(None) => {}
                    Err(e) => warn!("Error reading cached record {}: {}", item.id(), e),
                }
            }

            enrich_item(self.prices.as_ref(), &self.overlay, &mut item).await;

            if let Err(e) = self.store.upsert(item.id(), &item).await {
                warn!("Error storing {}: {}", item.id(), e);
                continue;
            }

            if known.contains(item.id()) {
                outcome.updated += 1;
            } else {
                info!("New reforge stone found: {} ({})", item.base.name, item.id());
                outcome.new += 1;
            }
        }

        self.store
            .set_marker(class, Utc::now().timestamp_millis())
            .await?;
        self.store.set_count(total).await?;

        if outcome.new > 0 {
            info!("Stored {} new reforge stones (total: {})", outcome.new, total);
        } else {
            info!("No new reforge stones found (total: {})", total);
        }
        Ok(outcome)
    }

    /// Price-only refresh: iterates the identifier index instead of
    /// re-fetching the catalog, re-fetches price data per entity, and
    /// advances the price marker afterwards.
    pub async fn refresh_prices_only(&self) -> Result<SyncOutcome> {
        let ids = self.store.list_ids().await?;
        if ids.is_empty() {
            debug!("Price refresh skipped: no cached entities yet");
            return Ok(SyncOutcome::default());
        }

        let total = ids.len();
        let mut outcome = SyncOutcome::default();
        for id in ids {
            let mut item = match self.store.get(&id).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    debug!("Cached record missing for {}", id);
                    continue;
                }
                Err(e) => {
                    warn!("Error reading cached record {}: {}", id, e);
                    continue;
                }
            };

            enrich_item(self.prices.as_ref(), &self.overlay, &mut item).await;

            if let Err(e) = self.store.upsert(&id, &item).await {
                warn!("Error storing {}: {}", id, e);
                continue;
            }
            outcome.updated += 1;
        }

        self.store
            .set_marker(DataClass::Price, Utc::now().timestamp_millis())
            .await?;
        info!(
            "Price refresh complete ({}/{} entities)",
            outcome.updated, total
        );
        Ok(outcome)
    }

    /// Read all cached entities. Undecodable or missing records are
    /// logged and skipped so one bad record never breaks the listing.
    pub async fn list_items(&self) -> Result<Vec<Item>> {
        let ids = self.store.list_ids().await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get(&id).await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => debug!("Cached record missing for {}", id),
                Err(e) => warn!("Error reading cached record {}: {}", id, e),
            }
        }
        Ok(items)
    }

    /// Merged reforge list for the read API, decorated with each
    /// stone's cached name, tier, and best available price, sorted by
    /// reforge name.
    pub async fn list_reforges(&self) -> Result<Vec<Reforge>> {
        let mut reforges = self.overlay.all_reforges();
        for reforge in reforges.iter_mut() {
            if reforge.stone_id.is_empty() {
                continue;
            }
            match self.store.get(&reforge.stone_id).await {
                Ok(Some(stone)) => {
                    reforge.stone_name = stone.base.name.clone();
                    reforge.stone_tier = stone.base.tier.clone();
                    reforge.stone_price = stone.best_price();
                }
                Ok(None) => {}
                Err(e) => debug!("No cached record for stone {}: {}", reforge.stone_id, e),
            }
        }

        reforges.sort_by(|a, b| a.reforge_name.cmp(&b.reforge_name));
        Ok(reforges)
    }

    /// Freshness marker accessor for the read API.
    pub async fn last_updated(&self, class: DataClass) -> Result<Option<i64>> {
        self.store.marker(class).await
    }
}
