//! # Mapsmith - World-Map Administration Engine
//!
//! Mapsmith administers the text-based world map of a browser game: towns,
//! roads, and dungeons (roads and dungeons jointly "pathways") connected by
//! directed or bidirectional edges, with per-pathway monster-spawn tables.
//!
//! ## Features
//!
//! - **Graph Consistency**: Connection creation with duplicate and shortcut
//!   conflict detection, position validation against endpoint categories, and
//!   guarded deletes.
//! - **Rename Cascade**: Location-id renames propagate atomically through
//!   connections, branch sub-references, town connection lists, and player
//!   location refs - all or nothing.
//! - **Bidirectional Synthesis**: The reverse edge of a bidirectional
//!   connection is derived from one set of opposite-pair tables (edge type,
//!   action label, keyboard shortcut).
//! - **Spawn Allocation**: Spawn-list saves are delta-applied with
//!   soft-removal and the active-rate-sum ≤ 1.0 constraint enforced before
//!   any write.
//! - **Schema Migration**: One-shot, idempotent conversion of the legacy
//!   roads/dungeons/towns config into the unified pathway schema, with field
//!   inference for data the old tool never required.
//! - **Graph Export**: Read-only node/edge/stats JSON for the visualization
//!   layer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mapsmith::worldmap::{ConnectionDraft, GraphService, WorldStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = WorldStore::open("data/world")?;
//!     let graph = GraphService::new(store);
//!
//!     let draft = ConnectionDraft::new("millbrook", "old_mill_road")
//!         .with_positions(None, Some(0));
//!     let (forward, reverse) = graph.create_bidirectional(draft)?;
//!     println!("created {} and {}", forward.id, reverse.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`worldmap`] - Data model, sled persistence, and the consistency engine
//! - [`config`] - Configuration loading and validation
//! - [`validation`] - Shared id/name/rate validation
//! - [`logutil`] - Log-line sanitization helpers
//!
//! The admin-facing layer (permissions, audit log, HTML) is an external
//! collaborator: it calls the services in [`worldmap`] and receives plain
//! result/error values.

pub mod config;
pub mod logutil;
pub mod validation;
pub mod worldmap;
