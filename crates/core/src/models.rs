//! Domain model: cached entities and merged reforge definitions.
//!
//! Stored records must be byte-stable: serializing the same data twice
//! must produce identical JSON. All maps are `BTreeMap` and all
//! optional fields skip serialization when empty for that reason.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stoneyard_market_data::{CatalogItem, OrderSummary};

/// Stat block for one rarity: stat name to value.
pub type StatBlock = BTreeMap<String, f64>;

/// Reforge effect attached to a stone, parsed from the reference-data
/// overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReforgeEffect {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reforge_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_types: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_rarities: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reforge_stats: BTreeMap<String, StatBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reforge_ability: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reforge_costs: BTreeMap<String, i64>,
}

/// A cached item: the immutable catalog base plus derived fields that a
/// refresh may replace but never partially corrupt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub base: CatalogItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auction_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bazaar_buy_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bazaar_sell_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bazaar_buy_orders: Vec<OrderSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bazaar_sell_orders: Vec<OrderSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reforge_effect: Option<ReforgeEffect>,
}

impl Item {
    /// Wrap a freshly fetched catalog item with no derived fields yet.
    pub fn from_catalog(base: CatalogItem) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Stable entity identifier.
    pub fn id(&self) -> &str {
        &self.base.id
    }

    /// Carry previously cached derived fields into this record wherever
    /// the current cycle has not (yet) produced a value, so a failed
    /// fetch never erases previously-good data.
    pub fn carry_derived_from(&mut self, cached: Item) {
        if self.auction_price.is_none() {
            self.auction_price = cached.auction_price;
        }
        if self.bazaar_buy_price.is_none() {
            self.bazaar_buy_price = cached.bazaar_buy_price;
        }
        if self.bazaar_sell_price.is_none() {
            self.bazaar_sell_price = cached.bazaar_sell_price;
        }
        if self.bazaar_buy_orders.is_empty() {
            self.bazaar_buy_orders = cached.bazaar_buy_orders;
        }
        if self.bazaar_sell_orders.is_empty() {
            self.bazaar_sell_orders = cached.bazaar_sell_orders;
        }
        if self.reforge_effect.is_none() {
            self.reforge_effect = cached.reforge_effect;
        }
    }

    /// Best available price: auction, then bazaar buy, then bazaar sell.
    pub fn best_price(&self) -> Option<i64> {
        if let Some(price) = self.auction_price {
            return Some(price);
        }
        if let Some(price) = self.bazaar_buy_price {
            return Some(price as i64);
        }
        self.bazaar_sell_price.map(|price| price as i64)
    }
}

/// One merged reforge definition served by the read API: a generic
/// blacksmith definition or a stone definition, decorated with the
/// stone's cached name, tier, and best price when one exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reforge {
    pub reforge_name: String,
    pub item_types: String,
    pub required_rarities: Vec<String>,
    pub reforge_stats: BTreeMap<String, StatBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reforge_ability: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reforge_costs: BTreeMap<String, i64>,
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stone_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stone_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stone_tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stone_price: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached_item() -> Item {
        Item {
            base: CatalogItem {
                id: "AMBER_STONE".to_string(),
                name: "Amber Stone".to_string(),
                category: "REFORGE_STONE".to_string(),
                tier: "RARE".to_string(),
                ..Default::default()
            },
            auction_price: Some(1200),
            bazaar_buy_price: Some(1500.0),
            bazaar_sell_price: Some(1100.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_carry_derived_keeps_previous_values() {
        let mut fresh = Item::from_catalog(CatalogItem {
            id: "AMBER_STONE".to_string(),
            name: "Amber Stone".to_string(),
            ..Default::default()
        });

        fresh.carry_derived_from(cached_item());
        assert_eq!(fresh.auction_price, Some(1200));
        assert_eq!(fresh.bazaar_buy_price, Some(1500.0));
    }

    #[test]
    fn test_carry_derived_does_not_overwrite_fresh_values() {
        let mut fresh = Item::from_catalog(CatalogItem {
            id: "AMBER_STONE".to_string(),
            ..Default::default()
        });
        fresh.auction_price = Some(900);

        fresh.carry_derived_from(cached_item());
        assert_eq!(fresh.auction_price, Some(900));
    }

    #[test]
    fn test_best_price_prefers_auction() {
        let item = cached_item();
        assert_eq!(item.best_price(), Some(1200));

        let mut item = cached_item();
        item.auction_price = None;
        assert_eq!(item.best_price(), Some(1500));

        item.bazaar_buy_price = None;
        assert_eq!(item.best_price(), Some(1100));

        item.bazaar_sell_price = None;
        assert_eq!(item.best_price(), None);
    }

    #[test]
    fn test_serialization_is_byte_stable() {
        let item = cached_item();
        let first = serde_json::to_string(&item).unwrap();
        let second = serde_json::to_string(&item).unwrap();
        assert_eq!(first, second);

        let round_tripped: Item = serde_json::from_str(&first).unwrap();
        let third = serde_json::to_string(&round_tripped).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn test_empty_derived_fields_are_omitted() {
        let item = Item::from_catalog(CatalogItem {
            id: "A".to_string(),
            ..Default::default()
        });

        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("auction_price"));
        assert!(!json.contains("bazaar_buy_orders"));
        assert!(!json.contains("reforge_effect"));
    }
}
