//! World-map data model, persistence, and the graph consistency engine.
//! The admin layer calls into the services here and gets plain result/error
//! values back; rendering, permissions, and audit logging live elsewhere.

pub mod errors;
pub mod export;
pub mod graph;
pub mod migration;
pub mod mirror;
pub mod spawns;
pub mod state;
pub mod storage;
pub mod types;

pub use errors::WorldMapError;
pub use export::{ExportFilters, ExportService, GraphExport};
pub use graph::{GraphService, IntegrityIssue, IntegrityIssueKind, IntegrityReport, RenameReport};
pub use migration::{
    import_unified, migrate_document, migrate_legacy, LegacyConfig, MigrationOutcome,
    MigrationReport, UnifiedConfig, UNIFIED_CONFIG_VERSION,
};
pub use mirror::{mirror_draft, opposite_action_label, opposite_edge_type, opposite_shortcut};
pub use spawns::{SpawnReport, SpawnService};
pub use state::{canonical_world_seed, SEED_HOME_TOWN_ID, SEED_LOCATION_IDS, SEED_SPAWN_LIST_ID};
pub use storage::{WorldStore, WorldStoreBuilder, WriteBatch};
pub use types::*;
