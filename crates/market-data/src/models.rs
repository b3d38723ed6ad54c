//! Wire models for the two upstream APIs, plus the pure reductions
//! applied to fetched price data before it is cached.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of order-book entries kept per side after reduction.
pub const TOP_ORDER_COUNT: usize = 3;

/// Envelope returned by the catalog API.
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    pub success: bool,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: i64,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// One item as served by the catalog API.
///
/// Base fields (id, name, category, tier) are immutable once cached;
/// the remaining metadata is passed through unmodified so the cached
/// record keeps everything the catalog knows about the item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tier: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc_sell_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glowing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soulbound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_auction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_specific: Option<Value>,
}

/// Snapshot returned by the bazaar endpoint for one product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BazaarSnapshot {
    #[serde(default)]
    pub buy_price: f64,
    #[serde(default)]
    pub sell_price: f64,
    #[serde(default)]
    pub buy_orders: Vec<OrderSummary>,
    #[serde(default)]
    pub sell_orders: Vec<OrderSummary>,
}

impl BazaarSnapshot {
    /// Top buy orders, highest buyer price first.
    pub fn top_buy_orders(&self) -> Vec<OrderSummary> {
        top_buy_orders(&self.buy_orders)
    }

    /// Top sell orders, lowest seller price first.
    pub fn top_sell_orders(&self) -> Vec<OrderSummary> {
        top_sell_orders(&self.sell_orders)
    }
}

/// One aggregated order-book entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub amount: i64,
    pub price_per_unit: f64,
    pub orders: i64,
}

/// Reduce a buy-order book to the top entries by unit price,
/// descending (highest buyer price first).
///
/// The sort is stable, so ties preserve fetch order; reducing an
/// already-reduced list is a no-op.
pub fn top_buy_orders(orders: &[OrderSummary]) -> Vec<OrderSummary> {
    let mut sorted = orders.to_vec();
    sorted.sort_by(|a, b| b.price_per_unit.total_cmp(&a.price_per_unit));
    sorted.truncate(TOP_ORDER_COUNT);
    sorted
}

/// Reduce a sell-order book to the top entries by unit price,
/// ascending (lowest seller price first).
pub fn top_sell_orders(orders: &[OrderSummary]) -> Vec<OrderSummary> {
    let mut sorted = orders.to_vec();
    sorted.sort_by(|a, b| a.price_per_unit.total_cmp(&b.price_per_unit));
    sorted.truncate(TOP_ORDER_COUNT);
    sorted
}

/// One listing from the auctions endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionListing {
    #[serde(default)]
    pub starting_bid: i64,
    #[serde(default)]
    pub highest_bid_amount: i64,
    #[serde(default)]
    pub bin: bool,
}

/// Derive the minimum viable price from a set of auction listings: the
/// lowest BIN starting bid when any BIN listing exists, otherwise the
/// lowest non-BIN highest bid. Zero and negative amounts never count.
pub fn lowest_viable_price(listings: &[AuctionListing]) -> Option<i64> {
    let lowest_bin = listings
        .iter()
        .filter(|l| l.bin && l.starting_bid > 0)
        .map(|l| l.starting_bid)
        .min();
    if lowest_bin.is_some() {
        return lowest_bin;
    }

    listings
        .iter()
        .filter(|l| !l.bin && l.highest_bid_amount > 0)
        .map(|l| l.highest_bid_amount)
        .min()
}
