//! End-to-end migration: legacy JSON document in, unified config out,
//! unified config into the store.

use mapsmith::worldmap::{
    import_unified, migrate_document, DungeonType, LocationCategory, LocationDetail,
    WorldMapError, WorldStoreBuilder, UNIFIED_CONFIG_VERSION,
};
use serde_json::json;
use tempfile::TempDir;

fn legacy_document() -> serde_json::Value {
    json!({
        "roads": {
            "east_road": {
                "name": "East Road",
                "description": "The trade route east",
                "length": 120,
                "difficulty": "easy",
                "encounter_rate": 0.05
            }
        },
        "dungeons": {
            "ancient_cave": {
                "name": "古代洞窟",
                "difficulty": "hard",
                "special_actions": [
                    {"type": "boss_battle", "boss": "cave_matriarch"}
                ]
            }
        },
        "towns": {
            "ashford": {
                "name": "Ashford",
                "services": ["inn", "shop"],
                "connections": [
                    {"target_location_id": "east_road", "action_label": "leave_town"}
                ]
            }
        }
    })
}

#[test]
fn legacy_document_migrates_with_inference() {
    let outcome = migrate_document(legacy_document()).unwrap();
    assert!(!outcome.is_noop());
    let config = outcome.into_config();
    assert_eq!(config.version, UNIFIED_CONFIG_VERSION);

    // Road carries its explicit fields into the unified record.
    let road = &config.pathways["east_road"];
    assert_eq!(road.category, LocationCategory::Road);
    assert_eq!(road.length, 120);
    assert!((road.encounter_rate - 0.05).abs() < 1e-9);

    // Dungeon fields the legacy record never carried are inferred: type from
    // the name, levels from the difficulty band, floors defaulted, boss
    // lifted from the special action.
    let dungeon = &config.pathways["ancient_cave"];
    assert_eq!(dungeon.category, LocationCategory::Dungeon);
    assert_eq!(dungeon.dungeon_type, Some(DungeonType::Cave));
    assert_eq!(dungeon.min_level, Some(8));
    assert_eq!(dungeon.max_level, Some(20));
    assert_eq!(dungeon.floors, Some(1));
    assert_eq!(dungeon.boss.as_deref(), Some("cave_matriarch"));

    assert_eq!(config.towns.len(), 1);
    let metadata = config.metadata.expect("migration metadata stamped");
    assert_eq!(metadata.source_format, "legacy_v1");
}

#[test]
fn migration_is_idempotent() {
    let config = migrate_document(legacy_document()).unwrap().into_config();
    let round_tripped = serde_json::to_value(&config).unwrap();

    let second = migrate_document(round_tripped).unwrap();
    assert!(second.is_noop());
    assert_eq!(second.into_config(), config);
}

#[test]
fn migrated_config_imports_into_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path())
        .without_world_seed()
        .open()
        .unwrap();

    let config = migrate_document(legacy_document()).unwrap().into_config();
    let report = import_unified(&store, config).unwrap();
    assert_eq!(report.pathways_imported, 2);
    assert_eq!(report.towns_imported, 1);

    let cave = store.get_location("ancient_cave").unwrap();
    assert_eq!(cave.name, "古代洞窟");
    match &cave.detail {
        LocationDetail::Dungeon(d) => {
            assert_eq!(d.dungeon_type, DungeonType::Cave);
            assert_eq!(d.min_level, 8);
            assert_eq!(d.max_level, 20);
            assert_eq!(d.boss.as_deref(), Some("cave_matriarch"));
        }
        other => panic!("expected dungeon, got {:?}", other),
    }

    // Town embedded connection survived, pointing at an imported pathway.
    let town = store.get_location("ashford").unwrap();
    match &town.detail {
        LocationDetail::Town(t) => {
            assert_eq!(t.connections[0].target_location_id, "east_road");
            assert_eq!(t.services, vec!["inn".to_string(), "shop".to_string()]);
        }
        other => panic!("expected town, got {:?}", other),
    }
}

#[test]
fn import_rejects_dangling_town_connection() {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path())
        .without_world_seed()
        .open()
        .unwrap();

    let config = migrate_document(json!({
        "roads": {},
        "towns": {
            "ashford": {
                "name": "Ashford",
                "connections": [
                    {"target_location_id": "nowhere"}
                ]
            }
        }
    }))
    .unwrap()
    .into_config();

    let err = import_unified(&store, config).unwrap_err();
    assert!(matches!(err, WorldMapError::ReferentialIntegrity(_)), "{err}");
    // Nothing was written.
    assert!(!store.location_exists("ashford").unwrap());
}

#[test]
fn import_accepts_target_already_in_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path())
        .without_world_seed()
        .open()
        .unwrap();
    store
        .put_location(mapsmith::worldmap::Location::road("old_road", "Old Road"))
        .unwrap();

    let config = migrate_document(json!({
        "towns": {
            "ashford": {
                "name": "Ashford",
                "connections": [
                    {"target_location_id": "old_road"}
                ]
            }
        }
    }))
    .unwrap()
    .into_config();

    import_unified(&store, config).unwrap();
    assert!(store.location_exists("ashford").unwrap());
}

#[test]
fn import_rejects_wrong_version() {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path())
        .without_world_seed()
        .open()
        .unwrap();

    let mut config = migrate_document(legacy_document()).unwrap().into_config();
    config.version = 1;
    let err = import_unified(&store, config).unwrap_err();
    assert!(matches!(err, WorldMapError::SchemaMismatch { .. }), "{err}");
}
