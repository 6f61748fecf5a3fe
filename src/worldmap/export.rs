//! Read-only graph projection for the visualization layer.
//!
//! The field names and nesting here (`elements.nodes`, `elements.edges`,
//! `stats`) are a wire contract with the renderer; change them and every
//! deployed map view breaks. Data-quality problems (dangling endpoints) are
//! reported inside the result, never raised.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::worldmap::errors::WorldMapError;
use crate::worldmap::storage::WorldStore;
use crate::worldmap::types::ConnectionType;

/// Optional predicates narrowing the exported edge set. Nodes are always
/// exported in full so the renderer can show isolated locations.
#[derive(Debug, Clone, Default)]
pub struct ExportFilters {
    pub connection_type: Option<ConnectionType>,
    pub source_location_id: Option<String>,
    pub include_disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeExport {
    pub id: String,
    pub label: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeExport {
    pub id: u64,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub connection_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphStats {
    pub nodes_count: usize,
    pub edges_count: usize,
    pub categories: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphElements {
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphExport {
    pub elements: GraphElements,
    pub stats: GraphStats,
}

pub struct ExportService {
    store: WorldStore,
}

impl ExportService {
    pub fn new(store: WorldStore) -> Self {
        Self { store }
    }

    /// Project the stores into renderer JSON. Never mutates; a store failure
    /// aborts with no partial output.
    pub fn export_graph(&self, filters: &ExportFilters) -> Result<GraphExport, WorldMapError> {
        let mut export = GraphExport::default();

        let locations = self.store.list_locations()?;
        for location in &locations {
            if !location.is_active && !filters.include_disabled {
                continue;
            }
            let category = location.category().as_str().to_string();
            *export.stats.categories.entry(category.clone()).or_insert(0) += 1;
            export.elements.nodes.push(NodeExport {
                id: location.id.clone(),
                label: location.name.clone(),
                category,
            });
        }
        export.elements.nodes.sort_by(|a, b| a.id.cmp(&b.id));

        for connection in self.store.list_connections()? {
            if !connection.is_enabled && !filters.include_disabled {
                continue;
            }
            if let Some(wanted) = filters.connection_type {
                if connection.connection_type != wanted {
                    continue;
                }
            }
            if let Some(source) = &filters.source_location_id {
                if &connection.source_location_id != source {
                    continue;
                }
            }
            for endpoint in [&connection.source_location_id, &connection.target_location_id] {
                if !self.store.location_exists(endpoint)? {
                    export.stats.warnings.push(format!(
                        "edge {} references missing location '{}'",
                        connection.id, endpoint
                    ));
                }
            }
            export.elements.edges.push(EdgeExport {
                id: connection.id,
                source: connection.source_location_id,
                target: connection.target_location_id,
                label: connection.action_label,
                connection_type: connection.connection_type.as_str().to_string(),
                direction: connection.direction,
            });
        }

        export.stats.nodes_count = export.elements.nodes.len();
        export.stats.edges_count = export.elements.edges.len();
        Ok(export)
    }
}
