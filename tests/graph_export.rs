//! Renderer export: the `elements`/`stats` JSON shape, edge filters, and the
//! dangling-reference warnings.

use mapsmith::worldmap::{
    ConnectionDraft, ConnectionType, ExportFilters, ExportService, GraphService, Location,
    WorldStore, WorldStoreBuilder,
};
use tempfile::TempDir;

fn seeded_store() -> (WorldStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = WorldStoreBuilder::new(temp_dir.path()).open().unwrap();
    (store, temp_dir)
}

#[test]
fn seeded_world_exports_expected_counts() {
    let (store, _temp) = seeded_store();
    let export = ExportService::new(store)
        .export_graph(&ExportFilters::default())
        .unwrap();

    assert_eq!(export.stats.nodes_count, 4);
    assert_eq!(export.stats.edges_count, 3);
    assert_eq!(export.stats.categories["town"], 2);
    assert_eq!(export.stats.categories["road"], 1);
    assert_eq!(export.stats.categories["dungeon"], 1);
    assert!(export.stats.warnings.is_empty());

    // Nodes come back sorted by id.
    let ids: Vec<&str> = export.elements.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["harborview", "millbrook", "mosscap_cave", "old_mill_road"]);
}

#[test]
fn export_serializes_to_the_renderer_contract() {
    let (store, _temp) = seeded_store();
    let export = ExportService::new(store)
        .export_graph(&ExportFilters::default())
        .unwrap();

    let json = serde_json::to_value(&export).unwrap();
    let nodes = json["elements"]["nodes"].as_array().unwrap();
    let edges = json["elements"]["edges"].as_array().unwrap();
    assert_eq!(nodes.len(), 4);
    assert_eq!(edges.len(), 3);

    assert!(nodes[0]["id"].is_string());
    assert!(nodes[0]["label"].is_string());
    assert!(nodes[0]["category"].is_string());
    assert!(edges[0]["source"].is_string());
    assert!(edges[0]["target"].is_string());
    assert_eq!(edges[0]["connection_type"], "start");
    assert!(json["stats"]["nodes_count"].is_number());
    assert!(json["stats"]["edges_count"].is_number());
}

#[test]
fn source_filter_narrows_edges_but_not_nodes() {
    let (store, _temp) = seeded_store();
    let filters = ExportFilters {
        source_location_id: Some("old_mill_road".to_string()),
        ..Default::default()
    };
    let export = ExportService::new(store).export_graph(&filters).unwrap();

    assert_eq!(export.stats.nodes_count, 4);
    assert_eq!(export.stats.edges_count, 2);
    assert!(export
        .elements
        .edges
        .iter()
        .all(|e| e.source == "old_mill_road"));
}

#[test]
fn connection_type_filter_applies() {
    let (store, _temp) = seeded_store();
    let graph = GraphService::new(store.clone());
    graph
        .create_bidirectional(
            ConnectionDraft::new("millbrook", "mosscap_cave").with_positions(None, Some(0)),
        )
        .unwrap();

    let filters = ExportFilters {
        connection_type: Some(ConnectionType::Bidirectional),
        ..Default::default()
    };
    let export = ExportService::new(store).export_graph(&filters).unwrap();
    assert_eq!(export.stats.edges_count, 2);
    assert!(export
        .elements
        .edges
        .iter()
        .all(|e| e.connection_type == "bidirectional"));
}

#[test]
fn disabled_records_hidden_unless_requested() {
    let (store, _temp) = seeded_store();
    let graph = GraphService::new(store.clone());
    graph
        .create_connection(
            ConnectionDraft::new("millbrook", "mosscap_cave")
                .with_positions(None, Some(0))
                .disabled(),
        )
        .unwrap();
    let mut inn = Location::town("quietford", "Quietford");
    inn.is_active = false;
    store.put_location(inn).unwrap();

    let service = ExportService::new(store);
    let export = service.export_graph(&ExportFilters::default()).unwrap();
    assert_eq!(export.stats.nodes_count, 4);
    assert_eq!(export.stats.edges_count, 3);

    let filters = ExportFilters {
        include_disabled: true,
        ..Default::default()
    };
    let export = service.export_graph(&filters).unwrap();
    assert_eq!(export.stats.nodes_count, 5);
    assert_eq!(export.stats.edges_count, 4);
}

#[test]
fn dangling_endpoint_becomes_a_warning_not_an_error() {
    let (store, _temp) = seeded_store();
    let graph = GraphService::new(store.clone());
    let connection = graph
        .create_connection(
            ConnectionDraft::new("millbrook", "mosscap_cave").with_positions(None, Some(0)),
        )
        .unwrap();
    // Break the graph behind the service's back.
    store.delete_location("mosscap_cave").unwrap();

    let export = ExportService::new(store)
        .export_graph(&ExportFilters::default())
        .unwrap();
    assert!(export
        .stats
        .warnings
        .iter()
        .any(|w| w.contains("mosscap_cave") && w.contains(&connection.id.to_string())));
    // The broken edge is still exported for the renderer to flag.
    assert!(export.elements.edges.iter().any(|e| e.id == connection.id));
}
