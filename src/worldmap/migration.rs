//! Legacy-to-unified config schema migration.
//!
//! The legacy format keeps roads, dungeons, and towns in three separate maps;
//! the unified format folds roads and dungeons into one `pathways` map and
//! stamps the document with a version and migration metadata. The transform
//! is idempotent: a document that already carries `pathways` passes through
//! untouched, so running the migration twice is safe.
//!
//! Missing dungeon fields are inferred rather than rejected, because the
//! legacy admin screens never required them:
//! - `dungeon_type` from name substrings (cave/洞窟, ruins/遺跡, tower/塔,
//!   underground/地下; anything else defaults to cave)
//! - `floors` defaults to 1
//! - `min_level`/`max_level` from the difficulty band
//! - `boss` lifted out of an embedded `boss_battle` special action
//!
//! Unknown fields in any document survive in per-record extension bags so a
//! round-trip loses nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::validate_location_id;
use crate::worldmap::errors::WorldMapError;
use crate::worldmap::storage::{WorldStore, WriteBatch};
use crate::worldmap::types::{
    Difficulty, DungeonDetail, DungeonType, Location, LocationCategory, LocationDetail,
    PathwayDetail, SpecialAction, TownConnection, TownDetail,
};

/// Version stamped onto migrated documents. v1 was the legacy split-map
/// format; v2 is the unified pathway schema.
pub const UNIFIED_CONFIG_VERSION: u32 = 2;

const DEFAULT_PATHWAY_LENGTH: u32 = 100;
const DEFAULT_ENCOUNTER_RATE: f64 = 0.1;
const DEFAULT_DUNGEON_FLOORS: u32 = 1;

/// Name substrings that determine a dungeon's type when the legacy record
/// does not carry one. The legacy tool was bilingual, so both English and
/// Japanese spellings appear in production names.
const DUNGEON_TYPE_HINTS: &[(&str, DungeonType)] = &[
    ("cave", DungeonType::Cave),
    ("洞窟", DungeonType::Cave),
    ("ruins", DungeonType::Ruins),
    ("遺跡", DungeonType::Ruins),
    ("tower", DungeonType::Tower),
    ("塔", DungeonType::Tower),
    ("underground", DungeonType::Underground),
    ("地下", DungeonType::Underground),
];

pub fn infer_dungeon_type(name: &str) -> DungeonType {
    let lowered = name.to_lowercase();
    for (hint, dungeon_type) in DUNGEON_TYPE_HINTS {
        if lowered.contains(hint) {
            return *dungeon_type;
        }
    }
    DungeonType::Cave
}

// ---- document shapes ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialActionDoc {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TownConnectionDoc {
    pub target_location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TownDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub special_actions: Vec<SpecialActionDoc>,
    #[serde(default)]
    pub connections: Vec<TownConnectionDoc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegacyRoadDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub encounter_rate: Option<f64>,
    #[serde(default)]
    pub spawn_list_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegacyDungeonDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub encounter_rate: Option<f64>,
    #[serde(default)]
    pub dungeon_type: Option<DungeonType>,
    #[serde(default)]
    pub floors: Option<u32>,
    #[serde(default)]
    pub min_level: Option<u32>,
    #[serde(default)]
    pub max_level: Option<u32>,
    #[serde(default)]
    pub boss: Option<String>,
    #[serde(default)]
    pub special_actions: Vec<SpecialActionDoc>,
    #[serde(default)]
    pub spawn_list_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The superseded split-map configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LegacyConfig {
    #[serde(default)]
    pub roads: BTreeMap<String, LegacyRoadDoc>,
    #[serde(default)]
    pub dungeons: BTreeMap<String, LegacyDungeonDoc>,
    #[serde(default)]
    pub towns: BTreeMap<String, TownDoc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One entry of the unified `pathways` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathwayDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: LocationCategory,
    pub length: u32,
    pub difficulty: Difficulty,
    pub encounter_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dungeon_type: Option<DungeonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_actions: Vec<SpecialActionDoc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationMetadata {
    pub migrated_at: DateTime<Utc>,
    pub source_format: String,
    pub migrator: String,
}

/// The current configuration document: versioned, with roads and dungeons
/// unified under `pathways`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedConfig {
    pub version: u32,
    pub pathways: BTreeMap<String, PathwayDoc>,
    pub towns: BTreeMap<String, TownDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MigrationMetadata>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub roads_migrated: usize,
    pub dungeons_migrated: usize,
    pub towns_carried: usize,
}

/// Result of feeding a document through the migration.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// The document was already in the unified schema; returned unchanged.
    AlreadyUnified(UnifiedConfig),
    Migrated {
        config: UnifiedConfig,
        report: MigrationReport,
    },
}

impl MigrationOutcome {
    pub fn config(&self) -> &UnifiedConfig {
        match self {
            MigrationOutcome::AlreadyUnified(config) => config,
            MigrationOutcome::Migrated { config, .. } => config,
        }
    }

    pub fn into_config(self) -> UnifiedConfig {
        match self {
            MigrationOutcome::AlreadyUnified(config) => config,
            MigrationOutcome::Migrated { config, .. } => config,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, MigrationOutcome::AlreadyUnified(_))
    }
}

/// Migrate an arbitrary config document. Detects the schema by shape: a
/// top-level `pathways` map means unified, `roads`/`dungeons` mean legacy. A
/// document carrying both is malformed.
pub fn migrate_document(value: Value) -> Result<MigrationOutcome, WorldMapError> {
    let has_pathways = value.get("pathways").is_some();
    let has_legacy_maps = value.get("roads").is_some() || value.get("dungeons").is_some();
    if has_pathways && has_legacy_maps {
        return Err(WorldMapError::Validation(
            "document mixes unified 'pathways' with legacy 'roads'/'dungeons' maps".into(),
        ));
    }
    if has_pathways {
        let config: UnifiedConfig = serde_json::from_value(value)?;
        return Ok(MigrationOutcome::AlreadyUnified(config));
    }
    let legacy: LegacyConfig = serde_json::from_value(value)?;
    let (config, report) = migrate_legacy(legacy);
    Ok(MigrationOutcome::Migrated { config, report })
}

/// Pure legacy-to-unified transform.
pub fn migrate_legacy(legacy: LegacyConfig) -> (UnifiedConfig, MigrationReport) {
    let mut pathways = BTreeMap::new();
    let mut report = MigrationReport::default();

    for (id, road) in legacy.roads {
        pathways.insert(
            id,
            PathwayDoc {
                name: road.name,
                description: road.description,
                category: LocationCategory::Road,
                length: road.length.unwrap_or(DEFAULT_PATHWAY_LENGTH),
                difficulty: road.difficulty.unwrap_or(Difficulty::Normal),
                encounter_rate: road.encounter_rate.unwrap_or(DEFAULT_ENCOUNTER_RATE),
                spawn_list_id: road.spawn_list_id,
                dungeon_type: None,
                floors: None,
                min_level: None,
                max_level: None,
                boss: None,
                special_actions: Vec::new(),
                is_active: road.is_active,
                extra: road.extra,
            },
        );
        report.roads_migrated += 1;
    }

    for (id, dungeon) in legacy.dungeons {
        let difficulty = dungeon.difficulty.unwrap_or(Difficulty::Normal);
        let (band_min, band_max) = difficulty.level_range();
        let dungeon_type = dungeon
            .dungeon_type
            .unwrap_or_else(|| infer_dungeon_type(&dungeon.name));
        let boss = dungeon.boss.or_else(|| {
            dungeon
                .special_actions
                .iter()
                .find(|a| a.kind == "boss_battle")
                .and_then(|a| a.boss.clone())
        });
        pathways.insert(
            id,
            PathwayDoc {
                name: dungeon.name,
                description: dungeon.description,
                category: LocationCategory::Dungeon,
                length: dungeon.length.unwrap_or(DEFAULT_PATHWAY_LENGTH),
                difficulty,
                encounter_rate: dungeon.encounter_rate.unwrap_or(DEFAULT_ENCOUNTER_RATE),
                spawn_list_id: dungeon.spawn_list_id,
                dungeon_type: Some(dungeon_type),
                floors: Some(dungeon.floors.unwrap_or(DEFAULT_DUNGEON_FLOORS)),
                min_level: Some(dungeon.min_level.unwrap_or(band_min)),
                max_level: Some(dungeon.max_level.unwrap_or(band_max)),
                boss,
                special_actions: dungeon.special_actions,
                is_active: dungeon.is_active,
                extra: dungeon.extra,
            },
        );
        report.dungeons_migrated += 1;
    }

    report.towns_carried = legacy.towns.len();

    let config = UnifiedConfig {
        version: UNIFIED_CONFIG_VERSION,
        pathways,
        towns: legacy.towns,
        metadata: Some(MigrationMetadata {
            migrated_at: Utc::now(),
            source_format: "legacy_v1".to_string(),
            migrator: format!("mapsmith {}", env!("CARGO_PKG_VERSION")),
        }),
        extra: legacy.extra,
    };

    info!(
        "migrated legacy config: {} road(s), {} dungeon(s), {} town(s) carried",
        report.roads_migrated, report.dungeons_migrated, report.towns_carried
    );
    (config, report)
}

// ---- store import ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub pathways_imported: usize,
    pub towns_imported: usize,
}

impl PathwayDoc {
    pub fn into_location(self, id: &str) -> Result<Location, WorldMapError> {
        validate_location_id(id)
            .map_err(|e| WorldMapError::Validation(format!("pathway id '{}': {}", id, e)))?;
        let pathway = PathwayDetail {
            length: self.length,
            difficulty: self.difficulty,
            encounter_rate: self.encounter_rate,
            spawn_list_id: self.spawn_list_id,
        };
        let detail = match self.category {
            LocationCategory::Road => LocationDetail::Road(pathway),
            LocationCategory::Dungeon => {
                let (band_min, band_max) = self.difficulty.level_range();
                LocationDetail::Dungeon(DungeonDetail {
                    pathway,
                    dungeon_type: self
                        .dungeon_type
                        .unwrap_or_else(|| infer_dungeon_type(&self.name)),
                    floors: self.floors.unwrap_or(DEFAULT_DUNGEON_FLOORS),
                    min_level: self.min_level.unwrap_or(band_min),
                    max_level: self.max_level.unwrap_or(band_max),
                    boss: self.boss,
                    special_actions: self
                        .special_actions
                        .into_iter()
                        .map(|a| SpecialAction {
                            kind: a.kind,
                            boss: a.boss,
                        })
                        .collect(),
                })
            }
            LocationCategory::Town => {
                return Err(WorldMapError::Validation(format!(
                    "pathway '{}' declares category 'town'",
                    id
                )))
            }
        };
        let mut location = match detail {
            LocationDetail::Road(p) => {
                let mut l = Location::road(id, &self.name);
                l.detail = LocationDetail::Road(p);
                l
            }
            LocationDetail::Dungeon(d) => {
                let mut l = Location::dungeon(id, &self.name, d.dungeon_type);
                l.detail = LocationDetail::Dungeon(d);
                l
            }
            LocationDetail::Town(_) => unreachable!(),
        };
        location.description = self.description;
        location.is_active = self.is_active;
        Ok(location)
    }
}

impl TownDoc {
    pub fn into_location(self, id: &str) -> Result<Location, WorldMapError> {
        validate_location_id(id)
            .map_err(|e| WorldMapError::Validation(format!("town id '{}': {}", id, e)))?;
        let mut location = Location::town(id, &self.name).with_description(&self.description);
        location.is_active = self.is_active;
        location.detail = LocationDetail::Town(TownDetail {
            services: self.services,
            special_actions: self
                .special_actions
                .into_iter()
                .map(|a| SpecialAction {
                    kind: a.kind,
                    boss: a.boss,
                })
                .collect(),
            connections: self
                .connections
                .into_iter()
                .map(|c| TownConnection {
                    target_location_id: c.target_location_id,
                    action_label: c.action_label,
                    is_enabled: c.is_enabled,
                })
                .collect(),
        });
        Ok(location)
    }
}

/// Load a unified config into the store as location records, atomically.
/// Town embedded connection targets are checked against the documents being
/// imported plus whatever already exists in the store.
pub fn import_unified(
    store: &WorldStore,
    config: UnifiedConfig,
) -> Result<ImportReport, WorldMapError> {
    if config.version != UNIFIED_CONFIG_VERSION {
        return Err(WorldMapError::SchemaMismatch {
            entity: "unified config",
            expected: UNIFIED_CONFIG_VERSION as u8,
            found: config.version as u8,
        });
    }

    let mut incoming_ids: Vec<String> = config.pathways.keys().cloned().collect();
    incoming_ids.extend(config.towns.keys().cloned());

    let mut batch = WriteBatch::new();
    let mut report = ImportReport::default();

    for (id, doc) in config.pathways {
        batch.put_location(&doc.into_location(&id)?)?;
        report.pathways_imported += 1;
    }
    for (id, doc) in config.towns {
        for conn in &doc.connections {
            let target = &conn.target_location_id;
            if !incoming_ids.iter().any(|i| i == target) && !store.location_exists(target)? {
                return Err(WorldMapError::ReferentialIntegrity(format!(
                    "town '{}' connection targets unknown location '{}'",
                    id, target
                )));
            }
        }
        batch.put_location(&doc.into_location(&id)?)?;
        report.towns_imported += 1;
    }

    store.commit(batch)?;
    info!(
        "imported unified config: {} pathway(s), {} town(s)",
        report.pathways_imported, report.towns_imported
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dungeon_type_inference_covers_both_languages() {
        assert_eq!(infer_dungeon_type("Mossy Cave"), DungeonType::Cave);
        assert_eq!(infer_dungeon_type("古代洞窟"), DungeonType::Cave);
        assert_eq!(infer_dungeon_type("Sunken Ruins"), DungeonType::Ruins);
        assert_eq!(infer_dungeon_type("忘れられた遺跡"), DungeonType::Ruins);
        assert_eq!(infer_dungeon_type("Mage Tower"), DungeonType::Tower);
        assert_eq!(infer_dungeon_type("魔法の塔"), DungeonType::Tower);
        assert_eq!(infer_dungeon_type("Underground Passage"), DungeonType::Underground);
        assert_eq!(infer_dungeon_type("地下水路"), DungeonType::Underground);
        // No hint at all falls back to cave.
        assert_eq!(infer_dungeon_type("The Hollow"), DungeonType::Cave);
    }

    #[test]
    fn difficulty_bands_fill_missing_levels() {
        let legacy: LegacyConfig = serde_json::from_value(json!({
            "roads": {},
            "dungeons": {
                "d1": {"name": "Old Cave", "difficulty": "hard"}
            },
            "towns": {}
        }))
        .unwrap();
        let (config, _) = migrate_legacy(legacy);
        let d1 = &config.pathways["d1"];
        assert_eq!(d1.min_level, Some(8));
        assert_eq!(d1.max_level, Some(20));
        assert_eq!(d1.floors, Some(1));
    }

    #[test]
    fn boss_lifted_from_special_action() {
        let legacy: LegacyConfig = serde_json::from_value(json!({
            "dungeons": {
                "d1": {
                    "name": "Drake Tower",
                    "special_actions": [
                        {"type": "shrine"},
                        {"type": "boss_battle", "boss": "elder_drake"}
                    ]
                }
            }
        }))
        .unwrap();
        let (config, _) = migrate_legacy(legacy);
        let d1 = &config.pathways["d1"];
        assert_eq!(d1.boss.as_deref(), Some("elder_drake"));
        assert_eq!(d1.dungeon_type, Some(DungeonType::Tower));
        // Special actions survive the lift.
        assert_eq!(d1.special_actions.len(), 2);
    }

    #[test]
    fn explicit_fields_win_over_inference() {
        let legacy: LegacyConfig = serde_json::from_value(json!({
            "dungeons": {
                "d1": {
                    "name": "Ancient Cave",
                    "difficulty": "extreme",
                    "dungeon_type": "ruins",
                    "floors": 7,
                    "min_level": 30,
                    "max_level": 60,
                    "boss": "lich_king"
                }
            }
        }))
        .unwrap();
        let (config, _) = migrate_legacy(legacy);
        let d1 = &config.pathways["d1"];
        assert_eq!(d1.dungeon_type, Some(DungeonType::Ruins));
        assert_eq!(d1.floors, Some(7));
        assert_eq!(d1.min_level, Some(30));
        assert_eq!(d1.max_level, Some(60));
        assert_eq!(d1.boss.as_deref(), Some("lich_king"));
    }

    #[test]
    fn unknown_fields_survive_in_extension_bag() {
        let legacy: LegacyConfig = serde_json::from_value(json!({
            "roads": {
                "r1": {"name": "North Road", "weather_zone": "alpine"}
            },
            "custom_flag": true
        }))
        .unwrap();
        let (config, _) = migrate_legacy(legacy);
        assert_eq!(config.pathways["r1"].extra["weather_zone"], json!("alpine"));
        assert_eq!(config.extra["custom_flag"], json!(true));
    }

    #[test]
    fn mixed_schema_document_is_rejected() {
        let err = migrate_document(json!({
            "pathways": {},
            "roads": {}
        }))
        .unwrap_err();
        assert!(matches!(err, WorldMapError::Validation(_)));
    }
}
