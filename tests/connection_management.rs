//! Connection CRUD through the graph service: duplicate detection over the
//! unordered endpoint pair, shortcut uniqueness, and position validation.

use mapsmith::worldmap::{
    mirror_draft, ConnectionDraft, GraphService, KeyboardShortcut, Location, WorldMapError,
    WorldStoreBuilder,
};
use tempfile::TempDir;

fn setup_graph() -> (GraphService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path())
        .without_world_seed()
        .open()
        .unwrap();
    let graph = GraphService::new(store);

    graph.create_location(Location::town("town_a", "Ashford")).unwrap();
    graph.create_location(Location::town("town_b", "Bellwater")).unwrap();
    graph.create_location(Location::road("road_1", "East Road")).unwrap();
    graph.create_location(Location::road("road_2", "West Road")).unwrap();
    (graph, temp_dir)
}

#[test]
fn create_and_fetch_connection() {
    let (graph, _temp) = setup_graph();

    let created = graph
        .create_connection(
            ConnectionDraft::new("town_a", "road_1")
                .with_positions(None, Some(0))
                .with_action_label("leave_town"),
        )
        .unwrap();

    let fetched = graph.store().get_connection(created.id).unwrap();
    assert_eq!(fetched.source_location_id, "town_a");
    assert_eq!(fetched.target_location_id, "road_1");
    assert_eq!(fetched.target_position, Some(0));
    assert_eq!(fetched.action_label.as_deref(), Some("leave_town"));
    assert!(fetched.is_enabled);
}

#[test]
fn duplicate_unordered_pair_rejected() {
    let (graph, _temp) = setup_graph();

    graph
        .create_connection(ConnectionDraft::new("town_a", "road_1").with_positions(None, Some(0)))
        .unwrap();

    // Same direction again.
    let err = graph
        .create_connection(ConnectionDraft::new("town_a", "road_1").with_positions(None, Some(0)))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");

    // Reverse direction of a plain (non-bidirectional) edge is a duplicate
    // of the same unordered pair.
    let err = graph
        .create_connection(ConnectionDraft::new("road_1", "town_a").with_positions(Some(0), None))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");
}

#[test]
fn bidirectional_pair_occupies_one_slot() {
    let (graph, _temp) = setup_graph();

    // Forward half, explicitly bidirectional.
    let forward = ConnectionDraft::new("town_a", "road_1")
        .bidirectional()
        .with_positions(None, Some(0));
    graph.create_connection(forward.clone()).unwrap();

    // The synthesized reverse half is the one permitted coexistence.
    graph.create_connection(mirror_draft(&forward)).unwrap();

    // A third record on this pair fails in either direction.
    let err = graph.create_connection(forward.clone()).unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");
    let err = graph.create_connection(mirror_draft(&forward)).unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");
}

#[test]
fn self_loops_rejected_on_both_creation_paths() {
    let (graph, _temp) = setup_graph();

    let draft = ConnectionDraft::new("road_1", "road_1").with_positions(Some(0), Some(100));
    let err = graph.create_connection(draft.clone()).unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");

    let err = graph.create_bidirectional(draft).unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");
    assert!(err.is_precondition());

    // Nothing was written and the location is still fully usable.
    assert!(graph.store().connections_referencing("road_1").unwrap().is_empty());
    graph
        .create_connection(ConnectionDraft::new("town_a", "road_1").with_positions(None, Some(0)))
        .unwrap();
}

#[test]
fn create_bidirectional_persists_both_directions() {
    let (graph, _temp) = setup_graph();

    let (forward, reverse) = graph
        .create_bidirectional(
            ConnectionDraft::new("town_a", "road_1")
                .with_positions(None, Some(0))
                .with_shortcut(KeyboardShortcut::Up),
        )
        .unwrap();

    assert_eq!(forward.source_location_id, "town_a");
    assert_eq!(reverse.source_location_id, "road_1");
    assert_eq!(reverse.source_position, Some(0));
    assert_eq!(reverse.keyboard_shortcut, Some(KeyboardShortcut::Down));

    let err = graph
        .create_bidirectional(ConnectionDraft::new("road_1", "town_a").with_positions(Some(0), None))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");
}

#[test]
fn pathway_endpoints_require_positions() {
    let (graph, _temp) = setup_graph();

    // Missing target position on a pathway endpoint.
    let err = graph
        .create_connection(ConnectionDraft::new("town_a", "road_1"))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");

    // Position on a town endpoint.
    let err = graph
        .create_connection(
            ConnectionDraft::new("town_a", "road_1").with_positions(Some(10), Some(0)),
        )
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");

    // Position out of range.
    let err = graph
        .create_connection(
            ConnectionDraft::new("town_a", "road_1").with_positions(None, Some(150)),
        )
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Validation(_)), "{err}");
}

#[test]
fn missing_endpoint_is_referential_error() {
    let (graph, _temp) = setup_graph();

    let err = graph
        .create_connection(ConnectionDraft::new("town_a", "nowhere"))
        .unwrap_err();
    assert!(matches!(err, WorldMapError::ReferentialIntegrity(_)), "{err}");
}

#[test]
fn keyboard_shortcut_unique_per_source() {
    let (graph, _temp) = setup_graph();

    graph
        .create_connection(
            ConnectionDraft::new("road_1", "town_a")
                .with_positions(Some(0), None)
                .with_shortcut(KeyboardShortcut::Left),
        )
        .unwrap();

    // Same shortcut leaving the same source.
    let err = graph
        .create_connection(
            ConnectionDraft::new("road_1", "town_b")
                .with_positions(Some(100), None)
                .with_shortcut(KeyboardShortcut::Left),
        )
        .unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");

    // Same shortcut from a different source is fine.
    graph
        .create_connection(
            ConnectionDraft::new("road_2", "town_b")
                .with_positions(Some(0), None)
                .with_shortcut(KeyboardShortcut::Left),
        )
        .unwrap();
}

#[test]
fn deleting_a_connection_frees_the_pair() {
    let (graph, _temp) = setup_graph();

    let created = graph
        .create_connection(ConnectionDraft::new("town_a", "road_1").with_positions(None, Some(0)))
        .unwrap();
    graph.delete_connection(created.id).unwrap();

    assert!(matches!(
        graph.store().get_connection(created.id),
        Err(WorldMapError::NotFound(_))
    ));

    // The unordered pair slot is free again.
    graph
        .create_connection(ConnectionDraft::new("road_1", "town_a").with_positions(Some(0), None))
        .unwrap();
}

#[test]
fn update_connection_revalidates() {
    let (graph, _temp) = setup_graph();

    let mut connection = graph
        .create_connection(ConnectionDraft::new("town_a", "road_1").with_positions(None, Some(0)))
        .unwrap();
    graph
        .create_connection(ConnectionDraft::new("town_a", "road_2").with_positions(None, Some(0)))
        .unwrap();

    // Retargeting onto an occupied pair is a conflict.
    connection.target_location_id = "road_2".to_string();
    let err = graph.update_connection(connection.clone()).unwrap_err();
    assert!(matches!(err, WorldMapError::Conflict(_)), "{err}");

    // An ordinary field edit passes.
    connection.target_location_id = "road_1".to_string();
    connection.is_enabled = false;
    let updated = graph.update_connection(connection).unwrap();
    assert!(!graph.store().get_connection(updated.id).unwrap().is_enabled);
}
