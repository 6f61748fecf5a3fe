//! Monster-spawn allocation for pathways.
//!
//! A pathway links to one spawn list; each save replaces the list wholesale.
//! Entries that disappear from a save are soft-removed (`is_active = false`)
//! so their history survives, and the sum of active spawn rates is checked
//! against 1.0 before anything is written.

use log::info;

use crate::validation::spawn_rate_in_bounds;
use crate::worldmap::errors::WorldMapError;
use crate::worldmap::storage::{WorldStore, WriteBatch};
use crate::worldmap::types::{SpawnEntry, SpawnList};

use std::collections::HashMap;

/// Tolerance for the rate-sum comparison; keeps 0.4 + 0.3 + 0.3 legal.
const RATE_SUM_EPSILON: f64 = 1e-9;

/// Delta summary of one replace operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
    pub active_rate_sum: f64,
}

pub struct SpawnService {
    store: WorldStore,
}

impl SpawnService {
    pub fn new(store: WorldStore) -> Self {
        Self { store }
    }

    /// Replace the spawn table of `pathway_id` with `entries`.
    ///
    /// Existing entries missing from `entries` are deactivated, entries in
    /// both are overwritten, and new entries are inserted (or reactivated, if
    /// a deactivated entry with the same monster id exists). The resulting
    /// active-rate sum must stay within 1.0 or nothing is written.
    pub fn replace_spawns(
        &self,
        pathway_id: &str,
        entries: HashMap<String, SpawnEntry>,
    ) -> Result<SpawnReport, WorldMapError> {
        let mut location = self.store.get_location(pathway_id)?;
        if !location.is_pathway() {
            return Err(WorldMapError::Validation(format!(
                "location '{}' is a town; spawn lists attach to pathways",
                pathway_id
            )));
        }
        for (monster_id, entry) in &entries {
            if !spawn_rate_in_bounds(entry.spawn_rate) {
                return Err(WorldMapError::Validation(format!(
                    "spawn rate {} for '{}' outside 0.0..=1.0",
                    entry.spawn_rate, monster_id
                )));
            }
            if entry.max_level < entry.min_level {
                return Err(WorldMapError::Validation(format!(
                    "level range {}..{} for '{}' is inverted",
                    entry.min_level, entry.max_level, monster_id
                )));
            }
        }

        let (mut list, list_is_new) = match location.spawn_list_id() {
            Some(id) => (self.store.get_spawn_list(id)?, false),
            None => {
                let id = format!("spawns_{}", pathway_id);
                (SpawnList::new(&id, &location.name), true)
            }
        };

        let mut report = SpawnReport::default();

        for (monster_id, existing) in &mut list.monsters {
            if !entries.contains_key(monster_id) && existing.is_active {
                existing.is_active = false;
                report.removed.push(monster_id.clone());
            }
        }
        for (monster_id, entry) in entries {
            let mut entry = entry;
            entry.is_active = true;
            if list.monsters.insert(monster_id.clone(), entry).is_some() {
                report.updated.push(monster_id);
            } else {
                report.added.push(monster_id);
            }
        }
        report.added.sort_unstable();
        report.removed.sort_unstable();
        report.updated.sort_unstable();

        report.active_rate_sum = list.active_rate_sum();
        if report.active_rate_sum > 1.0 + RATE_SUM_EPSILON {
            return Err(WorldMapError::ConstraintViolation(format!(
                "active spawn rates for '{}' sum to {:.3} (limit 1.0)",
                pathway_id, report.active_rate_sum
            )));
        }

        list.touch();
        let mut batch = WriteBatch::new();
        batch.put_spawn_list(&list)?;
        if list_is_new {
            if let Some(pathway) = location.pathway_mut() {
                pathway.spawn_list_id = Some(list.id.clone());
            }
            location.touch();
            batch.put_location(&location)?;
        }
        self.store.commit(batch)?;

        info!(
            "replaced spawns for '{}': +{} -{} ~{} (rate sum {:.3})",
            pathway_id,
            report.added.len(),
            report.removed.len(),
            report.updated.len(),
            report.active_rate_sum
        );
        Ok(report)
    }

    /// Delete one monster entry outright. Removal can only lower the active
    /// rate sum, so this never violates the constraint.
    pub fn remove_spawn(&self, pathway_id: &str, monster_id: &str) -> Result<(), WorldMapError> {
        let location = self.store.get_location(pathway_id)?;
        let Some(spawn_list_id) = location.spawn_list_id() else {
            return Err(WorldMapError::NotFound(format!(
                "location '{}' has no spawn list",
                pathway_id
            )));
        };
        let mut list = self.store.get_spawn_list(spawn_list_id)?;
        if list.monsters.remove(monster_id).is_none() {
            return Err(WorldMapError::NotFound(format!(
                "spawn entry: {} in {}",
                monster_id, spawn_list_id
            )));
        }
        self.store.put_spawn_list(list)?;
        Ok(())
    }
}
