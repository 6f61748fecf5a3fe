//! Spawn allocation: delta application with soft removal, and the
//! active-rate-sum constraint that fails the whole save.

use std::collections::HashMap;

use mapsmith::worldmap::{
    GraphService, Location, SpawnEntry, SpawnService, WorldMapError, WorldStoreBuilder,
};
use tempfile::TempDir;

fn setup_services() -> (GraphService, SpawnService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path())
        .without_world_seed()
        .open()
        .unwrap();
    let graph = GraphService::new(store.clone());
    let spawns = SpawnService::new(store);

    graph.create_location(Location::road("road_1", "East Road")).unwrap();
    graph.create_location(Location::town("town_a", "Ashford")).unwrap();
    (graph, spawns, temp_dir)
}

fn entries(pairs: &[(&str, f64)]) -> HashMap<String, SpawnEntry> {
    pairs
        .iter()
        .map(|(id, rate)| (id.to_string(), SpawnEntry::new(*rate).with_levels(1, 3)))
        .collect()
}

#[test]
fn replace_creates_and_links_spawn_list() {
    let (graph, spawns, _temp) = setup_services();

    let report = spawns
        .replace_spawns("road_1", entries(&[("goblin", 0.4), ("wolf", 0.3)]))
        .unwrap();
    assert_eq!(report.added, vec!["goblin".to_string(), "wolf".to_string()]);
    assert!(report.removed.is_empty());
    assert!((report.active_rate_sum - 0.7).abs() < 1e-9);

    let road = graph.store().get_location("road_1").unwrap();
    let list_id = road.spawn_list_id().expect("spawn list linked").to_string();
    let list = graph.store().get_spawn_list(&list_id).unwrap();
    assert_eq!(list.monsters.len(), 2);
    assert!(list.monsters["goblin"].is_active);
}

#[test]
fn oversubscribed_rates_leave_prior_state_unchanged() {
    let (graph, spawns, _temp) = setup_services();

    spawns
        .replace_spawns("road_1", entries(&[("goblin", 0.4), ("wolf", 0.3)]))
        .unwrap();

    // 0.4 + 0.5 + 0.2 = 1.1 > 1.0
    let err = spawns
        .replace_spawns(
            "road_1",
            entries(&[("goblin", 0.4), ("wolf", 0.5), ("bat", 0.2)]),
        )
        .unwrap_err();
    assert!(matches!(err, WorldMapError::ConstraintViolation(_)), "{err}");
    assert!(err.is_precondition());

    // Prior list untouched.
    let road = graph.store().get_location("road_1").unwrap();
    let list = graph
        .store()
        .get_spawn_list(road.spawn_list_id().unwrap())
        .unwrap();
    assert_eq!(list.monsters.len(), 2);
    assert!(!list.monsters.contains_key("bat"));
    assert!((list.monsters["wolf"].spawn_rate - 0.3).abs() < 1e-9);
}

#[test]
fn missing_entries_are_soft_removed_and_reactivated() {
    let (graph, spawns, _temp) = setup_services();

    spawns
        .replace_spawns("road_1", entries(&[("goblin", 0.4), ("wolf", 0.3)]))
        .unwrap();

    // goblin disappears from the save: deactivated, not deleted.
    let report = spawns
        .replace_spawns("road_1", entries(&[("wolf", 0.3), ("bat", 0.2)]))
        .unwrap();
    assert_eq!(report.removed, vec!["goblin".to_string()]);
    assert_eq!(report.added, vec!["bat".to_string()]);
    assert_eq!(report.updated, vec!["wolf".to_string()]);

    let road = graph.store().get_location("road_1").unwrap();
    let list = graph
        .store()
        .get_spawn_list(road.spawn_list_id().unwrap())
        .unwrap();
    assert!(!list.monsters["goblin"].is_active);
    assert!(list.monsters["bat"].is_active);
    // Inactive entries do not count toward the sum.
    assert!((list.active_rate_sum() - 0.5).abs() < 1e-9);

    // goblin returns: reactivated in place.
    spawns
        .replace_spawns("road_1", entries(&[("goblin", 0.2), ("wolf", 0.3)]))
        .unwrap();
    let list = graph
        .store()
        .get_spawn_list(road.spawn_list_id().unwrap())
        .unwrap();
    assert!(list.monsters["goblin"].is_active);
    assert!((list.monsters["goblin"].spawn_rate - 0.2).abs() < 1e-9);
    assert!(!list.monsters["bat"].is_active);
}

#[test]
fn remove_spawn_deletes_one_entry() {
    let (graph, spawns, _temp) = setup_services();

    spawns
        .replace_spawns("road_1", entries(&[("goblin", 0.4), ("wolf", 0.3)]))
        .unwrap();
    spawns.remove_spawn("road_1", "goblin").unwrap();

    let road = graph.store().get_location("road_1").unwrap();
    let list = graph
        .store()
        .get_spawn_list(road.spawn_list_id().unwrap())
        .unwrap();
    assert!(!list.monsters.contains_key("goblin"));

    let err = spawns.remove_spawn("road_1", "goblin").unwrap_err();
    assert!(matches!(err, WorldMapError::NotFound(_)), "{err}");
}

#[test]
fn towns_cannot_carry_spawn_lists() {
    let (_graph, spawns, _temp) = setup_services();
    let err = spawns
        .replace_spawns("town_a", entries(&[("goblin", 0.4)]))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");
}

#[test]
fn out_of_range_rate_rejected_before_any_write() {
    let (graph, spawns, _temp) = setup_services();
    let err = spawns
        .replace_spawns("road_1", entries(&[("goblin", 1.5)]))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");
    // No list was created or linked.
    let road = graph.store().get_location("road_1").unwrap();
    assert!(road.spawn_list_id().is_none());
}

#[test]
fn exact_full_allocation_is_legal() {
    let (_graph, spawns, _temp) = setup_services();
    let report = spawns
        .replace_spawns(
            "road_1",
            entries(&[("goblin", 0.4), ("wolf", 0.3), ("bat", 0.3)]),
        )
        .unwrap();
    assert!((report.active_rate_sum - 1.0).abs() < 1e-9);
}
