//! Local reference-data overlay.
//!
//! Two read-mostly mappings loaded once at process start from static
//! JSON documents: stone-specific definitions keyed by stone item id,
//! and generic blacksmith definitions keyed by reforge name. Writes
//! only happen at load time; reads are guarded by a read-preferring
//! lock.

mod corrections;

pub use corrections::{StatCorrection, CORRECTIONS};

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};
use serde_json::{Map, Value};

use crate::errors::{Result, SyncError};
use crate::models::{Reforge, ReforgeEffect, StatBlock};
use corrections::apply_corrections;

/// File names expected inside the reference-data directory.
const STONES_FILE: &str = "reforgestones.json";
const GENERICS_FILE: &str = "reforges.json";

/// Source labels for merged reforge definitions.
const SOURCE_BLACKSMITH: &str = "Blacksmith";
const SOURCE_STONE: &str = "Reforge Stone";

/// In-memory reference-data overlay.
///
/// Injected into the components that need it rather than held as an
/// ambient global, so tests can build fresh instances from literal
/// documents.
#[derive(Default)]
pub struct ReferenceOverlay {
    /// Stone definitions keyed by stone item id.
    stones: RwLock<HashMap<String, Value>>,
    /// Generic blacksmith definitions keyed by reforge name.
    generics: RwLock<HashMap<String, Value>>,
}

impl ReferenceOverlay {
    /// Create an empty overlay. Entities are still cached without
    /// reforge effects when the reference data is missing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an overlay directly from parsed documents.
    pub fn from_documents(
        stones: HashMap<String, Value>,
        generics: HashMap<String, Value>,
    ) -> Self {
        Self {
            stones: RwLock::new(stones),
            generics: RwLock::new(generics),
        }
    }

    /// Load both documents from a directory containing
    /// `reforgestones.json` and `reforges.json`.
    pub fn load_from_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.load_stones(&dir.join(STONES_FILE))?;
        self.load_generics(&dir.join(GENERICS_FILE))?;
        Ok(())
    }

    /// Load (or reload) the stone definitions document.
    pub fn load_stones(&self, path: &Path) -> Result<()> {
        let map = read_document(path)?;
        info!(
            "Loaded {} stone definitions from {}",
            map.len(),
            path.display()
        );
        *self.write(&self.stones) = map;
        Ok(())
    }

    /// Load (or reload) the generic reforge definitions document.
    pub fn load_generics(&self, path: &Path) -> Result<()> {
        let map = read_document(path)?;
        info!(
            "Loaded {} reforge definitions from {}",
            map.len(),
            path.display()
        );
        *self.write(&self.generics) = map;
        Ok(())
    }

    /// Parsed reforge effect for a stone id, if the overlay knows it.
    pub fn effect_for_stone(&self, id: &str) -> Option<ReforgeEffect> {
        let stones = self.read(&self.stones);
        let data = stones.get(id)?.as_object()?;
        Some(parse_effect(data, None))
    }

    /// Merged reforge list: generic definitions first, stone definitions
    /// overlaid on top. A stone entry wins over a generic entry with the
    /// same reforge name by explicit ordering, not by timestamp. The
    /// correction table is applied last.
    pub fn all_reforges(&self) -> Vec<Reforge> {
        let generics = self.read(&self.generics);
        let stones = self.read(&self.stones);

        let mut merged: HashMap<String, Reforge> = HashMap::new();

        for (name, data) in generics.iter() {
            if let Some(map) = data.as_object() {
                merged.insert(name.clone(), build_reforge(name, map, SOURCE_BLACKSMITH));
            }
        }

        for (stone_id, data) in stones.iter() {
            let Some(map) = data.as_object() else {
                continue;
            };
            let Some(name) = map.get("reforgeName").and_then(Value::as_str) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let mut reforge = build_reforge(name, map, SOURCE_STONE);
            reforge.stone_id = stone_id.clone();
            merged.insert(name.to_string(), reforge);
        }

        let mut reforges: Vec<Reforge> = merged.into_values().collect();
        apply_corrections(&mut reforges);
        reforges
    }

    /// Lock for reading, recovering from poison if necessary. Writes
    /// only happen at load time, so recovered data is at worst a
    /// partially reloaded document.
    fn read<'a>(
        &self,
        lock: &'a RwLock<HashMap<String, Value>>,
    ) -> RwLockReadGuard<'a, HashMap<String, Value>> {
        lock.read().unwrap_or_else(|poisoned| {
            warn!("Reference overlay lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write<'a>(
        &self,
        lock: &'a RwLock<HashMap<String, Value>>,
    ) -> RwLockWriteGuard<'a, HashMap<String, Value>> {
        lock.write().unwrap_or_else(|poisoned| {
            warn!("Reference overlay lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn read_document(path: &Path) -> Result<HashMap<String, Value>> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|e| SyncError::Overlay(format!("failed to parse {}: {}", path.display(), e)))
}

/// Parse a raw overlay entry into a reforge effect. The entry's own
/// `reforgeName` is used unless a key name is supplied (generic entries
/// are keyed by reforge name and may omit the field).
fn parse_effect(data: &Map<String, Value>, key_name: Option<&str>) -> ReforgeEffect {
    let reforge_name = data
        .get("reforgeName")
        .and_then(Value::as_str)
        .or(key_name)
        .unwrap_or_default()
        .to_string();

    ReforgeEffect {
        reforge_name,
        item_types: data
            .get("itemTypes")
            .map(parse_item_types)
            .unwrap_or_default(),
        required_rarities: parse_string_array(data.get("requiredRarities")),
        reforge_stats: parse_stats(data.get("reforgeStats")),
        reforge_ability: data.get("reforgeAbility").cloned(),
        reforge_costs: parse_costs(data.get("reforgeCosts")),
    }
}

fn build_reforge(name: &str, data: &Map<String, Value>, source: &str) -> Reforge {
    let effect = parse_effect(data, Some(name));
    Reforge {
        reforge_name: name.to_string(),
        item_types: effect.item_types,
        required_rarities: effect.required_rarities,
        reforge_stats: effect.reforge_stats,
        reforge_ability: effect.reforge_ability,
        reforge_costs: effect.reforge_costs,
        source: source.to_string(),
        ..Default::default()
    }
}

/// Item types are either a plain string or an object restricting the
/// reforge to specific items, encoded as `SPECIFIC:a,b,c`.
fn parse_item_types(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let names = map.get("internalName").or_else(|| map.get("itemId"));
            match names.and_then(Value::as_array) {
                Some(list) => {
                    let joined = list
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(",");
                    format!("SPECIFIC:{joined}")
                }
                None => String::new(),
            }
        }
        _ => String::new(),
    }
}

fn parse_string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_stats(value: Option<&Value>) -> std::collections::BTreeMap<String, StatBlock> {
    let mut stats = std::collections::BTreeMap::new();
    if let Some(map) = value.and_then(Value::as_object) {
        for (rarity, block) in map {
            if let Some(block) = block.as_object() {
                let parsed: StatBlock = block
                    .iter()
                    .filter_map(|(stat, v)| v.as_f64().map(|v| (stat.clone(), v)))
                    .collect();
                stats.insert(rarity.clone(), parsed);
            }
        }
    }
    stats
}

fn parse_costs(value: Option<&Value>) -> std::collections::BTreeMap<String, i64> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(rarity, v)| v.as_f64().map(|v| (rarity.clone(), v as i64)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stone_doc() -> HashMap<String, Value> {
        HashMap::from([(
            "AMBER_STONE".to_string(),
            json!({
                "reforgeName": "Amber",
                "itemTypes": "PICKAXE",
                "requiredRarities": ["COMMON", "RARE"],
                "reforgeCosts": {"COMMON": 10000.0, "RARE": 25000.0},
                "reforgeStats": {
                    "COMMON": {"mining_speed": 10.0},
                    "RARE": {"mining_speed": 25.0, "mining_fortune": 5.0}
                }
            }),
        )])
    }

    fn generic_doc() -> HashMap<String, Value> {
        HashMap::from([(
            "Amber".to_string(),
            json!({
                "itemTypes": "SWORD",
                "requiredRarities": ["COMMON"],
                "reforgeStats": {"COMMON": {"strength": 3.0}}
            }),
        )])
    }

    #[test]
    fn test_effect_for_stone() {
        let overlay = ReferenceOverlay::from_documents(stone_doc(), HashMap::new());

        let effect = overlay.effect_for_stone("AMBER_STONE").unwrap();
        assert_eq!(effect.reforge_name, "Amber");
        assert_eq!(effect.item_types, "PICKAXE");
        assert_eq!(effect.required_rarities, vec!["COMMON", "RARE"]);
        assert_eq!(effect.reforge_costs.get("RARE"), Some(&25000));
        assert_eq!(
            effect.reforge_stats.get("RARE").and_then(|s| s.get("mining_speed")),
            Some(&25.0)
        );
    }

    #[test]
    fn test_effect_for_unknown_stone_is_none() {
        let overlay = ReferenceOverlay::from_documents(stone_doc(), HashMap::new());
        assert!(overlay.effect_for_stone("UNKNOWN").is_none());
    }

    #[test]
    fn test_stone_entry_wins_over_generic_entry() {
        let overlay = ReferenceOverlay::from_documents(stone_doc(), generic_doc());

        let reforges = overlay.all_reforges();
        assert_eq!(reforges.len(), 1);

        let amber = &reforges[0];
        assert_eq!(amber.reforge_name, "Amber");
        assert_eq!(amber.source, "Reforge Stone");
        assert_eq!(amber.stone_id, "AMBER_STONE");
        // The merged record carries the stone entry's fields, not the
        // generic entry's.
        assert_eq!(amber.item_types, "PICKAXE");
        assert_eq!(
            amber.reforge_stats.get("COMMON").and_then(|s| s.get("mining_speed")),
            Some(&10.0)
        );
        assert!(amber
            .reforge_stats
            .get("COMMON")
            .and_then(|s| s.get("strength"))
            .is_none());
    }

    #[test]
    fn test_generic_only_entry_is_kept() {
        let overlay = ReferenceOverlay::from_documents(HashMap::new(), generic_doc());

        let reforges = overlay.all_reforges();
        assert_eq!(reforges.len(), 1);
        assert_eq!(reforges[0].source, "Blacksmith");
        assert!(reforges[0].stone_id.is_empty());
    }

    #[test]
    fn test_specific_item_types_encoding() {
        let types = parse_item_types(&json!({"internalName": ["HYPERION", "VALKYRIE"]}));
        assert_eq!(types, "SPECIFIC:HYPERION,VALKYRIE");

        let types = parse_item_types(&json!({"itemId": ["ASPECT_OF_THE_END"]}));
        assert_eq!(types, "SPECIFIC:ASPECT_OF_THE_END");

        let types = parse_item_types(&json!("AXE"));
        assert_eq!(types, "AXE");
    }

    #[test]
    fn test_correction_is_applied_to_merged_list() {
        let stones = HashMap::from([(
            "ANCIENT_CLAW".to_string(),
            json!({
                "reforgeName": "Ancient",
                "itemTypes": "ARMOR",
                "reforgeStats": {
                    "COMMON": {"crit_damage": 3.0, "intelligence": 6.0},
                    "RARE": {"crit_damage": 8.0}
                }
            }),
        )]);
        let overlay = ReferenceOverlay::from_documents(stones, HashMap::new());

        let reforges = overlay.all_reforges();
        let ancient = reforges
            .iter()
            .find(|r| r.reforge_name == "Ancient")
            .unwrap();

        let common = ancient.reforge_stats.get("COMMON").unwrap();
        assert_eq!(common.get("crit_chance"), Some(&3.0));
        assert!(common.get("crit_damage").is_none());
        assert_eq!(common.get("intelligence"), Some(&6.0));

        // Other rarities are untouched.
        let rare = ancient.reforge_stats.get("RARE").unwrap();
        assert_eq!(rare.get("crit_damage"), Some(&8.0));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reforgestones.json"),
            serde_json::to_string(&stone_doc()).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("reforges.json"),
            serde_json::to_string(&generic_doc()).unwrap(),
        )
        .unwrap();

        let overlay = ReferenceOverlay::new();
        overlay.load_from_dir(dir.path()).unwrap();
        assert!(overlay.effect_for_stone("AMBER_STONE").is_some());
        assert_eq!(overlay.all_reforges().len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = ReferenceOverlay::new();
        assert!(overlay.load_from_dir(dir.path()).is_err());
    }
}
