//! Graph consistency engine: every mutation of locations and connections goes
//! through here so the structural invariants hold no matter what the admin
//! layer sends.
//!
//! Invariants enforced:
//! - at most one connection per ordered direction of an endpoint pair, and an
//!   unordered pair is only ever shared by the two halves of a bidirectional
//!   pair;
//! - keyboard shortcuts are unique among one source location's outgoing
//!   connections;
//! - pathway endpoints carry a position in 0..=100, town endpoints carry none;
//! - a location id rename cascades atomically through connections, branch
//!   sub-references, town connection lists, and player location refs.

use std::collections::BTreeMap;
use std::fmt;

use log::{info, warn};

use crate::logutil::escape_log;
use crate::validation::{validate_display_name, validate_location_id};
use crate::worldmap::errors::WorldMapError;
use crate::worldmap::mirror::mirror_draft;
use crate::worldmap::storage::{WorldStore, WriteBatch};
use crate::worldmap::types::{
    Connection, ConnectionDraft, ConnectionType, Location, LocationCategory, LocationDetail,
    POSITION_MAX,
};

/// Outcome summary of a rename cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameReport {
    pub old_id: String,
    pub new_id: String,
    pub connections_updated: usize,
    pub towns_updated: usize,
    pub players_updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityIssueKind {
    DanglingSource,
    DanglingTarget,
    DanglingBranch,
    DanglingSpawnList,
    DanglingTownConnection,
}

/// One referential-integrity finding. Collected into a report, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityIssue {
    pub kind: IntegrityIssueKind,
    /// The record holding the broken reference (connection id or location id).
    pub subject: String,
    /// The location or spawn-list id that does not resolve.
    pub missing_id: String,
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            IntegrityIssueKind::DanglingSource => "source location",
            IntegrityIssueKind::DanglingTarget => "target location",
            IntegrityIssueKind::DanglingBranch => "branch target",
            IntegrityIssueKind::DanglingSpawnList => "spawn list",
            IntegrityIssueKind::DanglingTownConnection => "town connection target",
        };
        write!(f, "{} references missing {} {}", self.subject, what, self.missing_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    pub connections_checked: usize,
    pub locations_checked: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validates and mutates location/connection data on top of a [`WorldStore`].
pub struct GraphService {
    store: WorldStore,
}

impl GraphService {
    pub fn new(store: WorldStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    // ---- locations ----

    pub fn create_location(&self, location: Location) -> Result<Location, WorldMapError> {
        validate_location_id(&location.id)
            .map_err(|e| WorldMapError::Validation(format!("location id '{}': {}", location.id, e)))?;
        validate_display_name(&location.name)
            .map_err(|e| WorldMapError::Validation(format!("location name: {}", e)))?;
        if self.store.location_exists(&location.id)? {
            return Err(WorldMapError::Conflict(format!(
                "location '{}' already exists",
                location.id
            )));
        }
        self.check_location_references(&location)?;
        self.store.put_location(location.clone())?;
        info!(
            "created {} '{}' ({})",
            location.category().as_str(),
            location.id,
            escape_log(&location.name)
        );
        Ok(location)
    }

    /// Update a location in place. The id and category are immutable here;
    /// renames go through [`GraphService::rename_location`].
    pub fn update_location(&self, location: Location) -> Result<Location, WorldMapError> {
        validate_display_name(&location.name)
            .map_err(|e| WorldMapError::Validation(format!("location name: {}", e)))?;
        let existing = self.store.get_location(&location.id)?;
        if existing.category() != location.category() {
            return Err(WorldMapError::Validation(format!(
                "location '{}' category is immutable ({} -> {})",
                location.id,
                existing.category().as_str(),
                location.category().as_str()
            )));
        }
        self.check_location_references(&location)?;
        self.store.put_location(location.clone())?;
        Ok(location)
    }

    fn check_location_references(&self, location: &Location) -> Result<(), WorldMapError> {
        if let Some(spawn_list_id) = location.spawn_list_id() {
            if !self.store.spawn_list_exists(spawn_list_id)? {
                return Err(WorldMapError::ReferentialIntegrity(format!(
                    "location '{}' references missing spawn list '{}'",
                    location.id, spawn_list_id
                )));
            }
        }
        if let LocationDetail::Town(town) = &location.detail {
            for conn in &town.connections {
                if !self.store.location_exists(&conn.target_location_id)? {
                    return Err(WorldMapError::ReferentialIntegrity(format!(
                        "town '{}' connection targets missing location '{}'",
                        location.id, conn.target_location_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Hard-delete a location. Refused while anything still points at it.
    pub fn delete_location(&self, location_id: &str) -> Result<(), WorldMapError> {
        let location = self.store.get_location(location_id)?;
        let referencing = self.store.connections_referencing(location_id)?;
        if !referencing.is_empty() {
            return Err(WorldMapError::Conflict(format!(
                "location '{}' is referenced by {} connection(s); delete those first",
                location_id,
                referencing.len()
            )));
        }
        if let Some(spawn_list_id) = location.spawn_list_id() {
            return Err(WorldMapError::Conflict(format!(
                "location '{}' still references spawn list '{}'; clear it first",
                location_id, spawn_list_id
            )));
        }
        let holding_towns: Vec<String> = self
            .store
            .locations_by_category(LocationCategory::Town)?
            .into_iter()
            .filter(|town| match &town.detail {
                LocationDetail::Town(detail) => detail
                    .connections
                    .iter()
                    .any(|c| c.target_location_id == location_id),
                _ => false,
            })
            .map(|town| town.id)
            .collect();
        if !holding_towns.is_empty() {
            return Err(WorldMapError::Conflict(format!(
                "location '{}' appears in the connection list of town(s) {}; remove those entries first",
                location_id,
                holding_towns.join(", ")
            )));
        }
        let occupants = self.store.players_at(location_id)?;
        if !occupants.is_empty() {
            return Err(WorldMapError::BusinessRule(format!(
                "location '{}' is occupied by {} player(s)",
                location_id,
                occupants.len()
            )));
        }
        self.store.delete_location(location_id)
    }

    // ---- connections ----

    fn validate_positions(&self, draft: &ConnectionDraft) -> Result<(), WorldMapError> {
        let source = self.get_endpoint(&draft.source_location_id)?;
        let target = self.get_endpoint(&draft.target_location_id)?;
        Self::check_position(&source, draft.source_position, "source")?;
        Self::check_position(&target, draft.target_position, "target")?;
        for branch in &draft.branches {
            if !self.store.location_exists(&branch.target_location_id)? {
                return Err(WorldMapError::ReferentialIntegrity(format!(
                    "branch targets missing location '{}'",
                    branch.target_location_id
                )));
            }
            if branch.position > POSITION_MAX {
                return Err(WorldMapError::Validation(format!(
                    "branch position {} outside 0..={}",
                    branch.position, POSITION_MAX
                )));
            }
        }
        Ok(())
    }

    fn get_endpoint(&self, location_id: &str) -> Result<Location, WorldMapError> {
        match self.store.get_location(location_id) {
            Ok(location) => Ok(location),
            Err(WorldMapError::NotFound(_)) => Err(WorldMapError::ReferentialIntegrity(format!(
                "endpoint '{}' does not exist",
                location_id
            ))),
            Err(err) => Err(err),
        }
    }

    fn check_position(
        endpoint: &Location,
        position: Option<u8>,
        side: &str,
    ) -> Result<(), WorldMapError> {
        if endpoint.is_pathway() {
            match position {
                None => Err(WorldMapError::Validation(format!(
                    "{} endpoint '{}' is a pathway and requires a position",
                    side, endpoint.id
                ))),
                Some(p) if p > POSITION_MAX => Err(WorldMapError::Validation(format!(
                    "{} position {} outside 0..={}",
                    side, p, POSITION_MAX
                ))),
                Some(_) => Ok(()),
            }
        } else if position.is_some() {
            Err(WorldMapError::Validation(format!(
                "{} endpoint '{}' is a town and takes no position",
                side, endpoint.id
            )))
        } else {
            Ok(())
        }
    }

    fn check_shortcut_unique(
        &self,
        draft: &ConnectionDraft,
        exclude: Option<u64>,
    ) -> Result<(), WorldMapError> {
        let Some(shortcut) = draft.keyboard_shortcut else {
            return Ok(());
        };
        for other in self.store.connections_from(&draft.source_location_id)? {
            if Some(other.id) == exclude {
                continue;
            }
            if other.keyboard_shortcut == Some(shortcut) {
                return Err(WorldMapError::Conflict(format!(
                    "keyboard shortcut {:?} already bound at '{}' (connection {})",
                    shortcut, draft.source_location_id, other.id
                )));
            }
        }
        Ok(())
    }

    /// Duplicate detection over the canonical unordered pair key. The only
    /// permitted coexistence is the two directed halves of a bidirectional
    /// pair.
    fn check_pair_free(&self, draft: &ConnectionDraft) -> Result<(), WorldMapError> {
        if draft.source_location_id == draft.target_location_id {
            return Err(WorldMapError::Validation(format!(
                "connection may not loop '{}' onto itself",
                draft.source_location_id
            )));
        }
        let existing = self
            .store
            .edge_pair_ids(&draft.source_location_id, &draft.target_location_id)?;
        match existing.len() {
            0 => Ok(()),
            1 => {
                let other = self.store.get_connection(existing[0])?;
                let is_reverse_half = other.connection_type == ConnectionType::Bidirectional
                    && draft.connection_type == ConnectionType::Bidirectional
                    && other.source_location_id == draft.target_location_id
                    && other.target_location_id == draft.source_location_id;
                if is_reverse_half {
                    Ok(())
                } else {
                    Err(WorldMapError::Conflict(format!(
                        "connection between '{}' and '{}' already exists (connection {})",
                        draft.source_location_id, draft.target_location_id, other.id
                    )))
                }
            }
            _ => Err(WorldMapError::Conflict(format!(
                "both directions between '{}' and '{}' already exist",
                draft.source_location_id, draft.target_location_id
            ))),
        }
    }

    /// Validate and persist one directed connection.
    pub fn create_connection(&self, draft: ConnectionDraft) -> Result<Connection, WorldMapError> {
        self.check_pair_free(&draft)?;
        self.validate_positions(&draft)?;
        self.check_shortcut_unique(&draft, None)?;

        let id = self.store.next_connection_id()?;
        let connection = Connection::from_draft(id, draft);
        self.store.insert_connection(&connection)?;
        Ok(connection)
    }

    /// Create both directions of a bidirectional connection in one atomic
    /// write. The reverse direction is synthesized from the forward draft.
    pub fn create_bidirectional(
        &self,
        draft: ConnectionDraft,
    ) -> Result<(Connection, Connection), WorldMapError> {
        let draft = draft.bidirectional();
        if draft.source_location_id == draft.target_location_id {
            return Err(WorldMapError::Validation(format!(
                "connection may not loop '{}' onto itself",
                draft.source_location_id
            )));
        }
        // Unlike the single-record path, even a lone reverse half occupies
        // the pair: this operation writes both directions itself.
        let existing = self
            .store
            .edge_pair_ids(&draft.source_location_id, &draft.target_location_id)?;
        if !existing.is_empty() {
            return Err(WorldMapError::Conflict(format!(
                "connection between '{}' and '{}' already exists",
                draft.source_location_id, draft.target_location_id
            )));
        }
        let reverse = mirror_draft(&draft);

        self.validate_positions(&draft)?;
        self.validate_positions(&reverse)?;
        self.check_shortcut_unique(&draft, None)?;
        self.check_shortcut_unique(&reverse, None)?;

        let forward_id = self.store.next_connection_id()?;
        let reverse_id = self.store.next_connection_id()?;
        let forward = Connection::from_draft(forward_id, draft);
        let reverse = Connection::from_draft(reverse_id, reverse);
        self.store.insert_connection_pair(&forward, &reverse)?;
        Ok((forward, reverse))
    }

    /// Rewrite an existing connection with full re-validation.
    pub fn update_connection(&self, mut connection: Connection) -> Result<Connection, WorldMapError> {
        let previous = self.store.get_connection(connection.id)?;
        let draft = ConnectionDraft {
            source_location_id: connection.source_location_id.clone(),
            target_location_id: connection.target_location_id.clone(),
            connection_type: connection.connection_type,
            source_position: connection.source_position,
            target_position: connection.target_position,
            edge_type: connection.edge_type,
            action_label: connection.action_label.clone(),
            keyboard_shortcut: connection.keyboard_shortcut,
            is_enabled: connection.is_enabled,
            direction: connection.direction.clone(),
            branches: connection.branches.clone(),
        };
        let endpoints_changed = previous.source_location_id != connection.source_location_id
            || previous.target_location_id != connection.target_location_id;
        if endpoints_changed {
            self.check_pair_free(&draft)?;
        }
        self.validate_positions(&draft)?;
        self.check_shortcut_unique(&draft, Some(connection.id))?;

        connection.touch();
        self.store.update_connection(&connection)?;
        Ok(connection)
    }

    pub fn delete_connection(&self, connection_id: u64) -> Result<(), WorldMapError> {
        self.store.delete_connection(connection_id)
    }

    // ---- rename cascade ----

    /// Rename a location id and cascade the change through every structure
    /// that references it: connection endpoints, branch sub-references, town
    /// embedded connection lists, player location refs, the reference
    /// indexes, and finally the location record itself. All writes happen in
    /// one transaction; a failure anywhere leaves the graph untouched.
    pub fn rename_location(
        &self,
        old_id: &str,
        new_id: &str,
    ) -> Result<RenameReport, WorldMapError> {
        validate_location_id(new_id)
            .map_err(|e| WorldMapError::Validation(format!("location id '{}': {}", new_id, e)))?;
        let mut location = self.store.get_location(old_id)?;
        if self.store.location_exists(new_id)? {
            return Err(WorldMapError::Conflict(format!(
                "location '{}' already exists",
                new_id
            )));
        }
        let occupants = self.store.players_at(old_id)?;
        if !occupants.is_empty() {
            return Err(WorldMapError::BusinessRule(format!(
                "cannot rename '{}': occupied by {} player(s)",
                old_id,
                occupants.len()
            )));
        }

        let mut batch = WriteBatch::new();

        // Pass 1: collect every referencing record through the indexes.
        let referencing = self.store.connections_referencing(old_id)?;
        // Unordered endpoint pairs whose canonical key moves with the rename.
        let mut moved_pairs: BTreeMap<Vec<u8>, (String, String)> = BTreeMap::new();

        for mut connection in referencing.clone() {
            let had_old_endpoint = connection.source_location_id == old_id
                || connection.target_location_id == old_id;
            if had_old_endpoint {
                let old_pair = (
                    connection.source_location_id.clone(),
                    connection.target_location_id.clone(),
                );
                moved_pairs
                    .entry(pair_fingerprint(&old_pair.0, &old_pair.1))
                    .or_insert(old_pair);
            }
            if connection.source_location_id == old_id {
                connection.source_location_id = new_id.to_string();
            }
            if connection.target_location_id == old_id {
                connection.target_location_id = new_id.to_string();
            }
            for branch in &mut connection.branches {
                if branch.target_location_id == old_id {
                    branch.target_location_id = new_id.to_string();
                }
            }
            connection.touch();
            batch.put_connection(&connection)?;
            batch.delete_location_index(old_id, connection.id);
            batch.put_location_index(new_id, connection.id);
        }

        for (_, (a, b)) in moved_pairs {
            let ids = self.store.edge_pair_ids(&a, &b)?;
            batch.delete_edge_pair(&a, &b);
            let a2 = if a == old_id { new_id } else { a.as_str() };
            let b2 = if b == old_id { new_id } else { b.as_str() };
            batch.put_edge_pair(a2, b2, &ids)?;
        }

        let mut towns_updated = 0;
        for mut town in self.store.locations_by_category(LocationCategory::Town)? {
            if town.id == old_id {
                // The renamed location itself is rewritten below.
                continue;
            }
            let LocationDetail::Town(detail) = &mut town.detail else {
                continue;
            };
            let mut changed = false;
            for conn in &mut detail.connections {
                if conn.target_location_id == old_id {
                    conn.target_location_id = new_id.to_string();
                    changed = true;
                }
            }
            if changed {
                town.touch();
                batch.put_location(&town)?;
                towns_updated += 1;
            }
        }

        // Safety net: step 2 guarantees no occupants, but any ref that slipped
        // in is rewritten rather than left dangling.
        let mut players_updated = 0;
        for mut player in self.store.players_at(old_id)? {
            player.location_id = new_id.to_string();
            player.touch();
            batch.put_player(&player)?;
            players_updated += 1;
        }

        batch.delete_location(old_id);
        location.id = new_id.to_string();
        if let LocationDetail::Town(detail) = &mut location.detail {
            for conn in &mut detail.connections {
                if conn.target_location_id == old_id {
                    conn.target_location_id = new_id.to_string();
                }
            }
        }
        location.touch();
        batch.put_location(&location)?;

        // Pass 2: one atomic commit.
        self.store.commit(batch)?;

        let report = RenameReport {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
            connections_updated: referencing.len(),
            towns_updated,
            players_updated,
        };
        info!(
            "renamed location '{}' -> '{}': {} connection(s), {} town list(s), {} player ref(s)",
            old_id, new_id, report.connections_updated, report.towns_updated, report.players_updated
        );
        Ok(report)
    }

    // ---- integrity ----

    /// Scan the whole graph and report broken references. Findings are
    /// collected, never raised; an operator fixes them with the ordinary
    /// update operations.
    pub fn validate_graph(&self) -> Result<IntegrityReport, WorldMapError> {
        let mut report = IntegrityReport::default();

        for connection in self.store.list_connections()? {
            report.connections_checked += 1;
            let subject = format!("connection {}", connection.id);
            if !self.store.location_exists(&connection.source_location_id)? {
                report.issues.push(IntegrityIssue {
                    kind: IntegrityIssueKind::DanglingSource,
                    subject: subject.clone(),
                    missing_id: connection.source_location_id.clone(),
                });
            }
            if !self.store.location_exists(&connection.target_location_id)? {
                report.issues.push(IntegrityIssue {
                    kind: IntegrityIssueKind::DanglingTarget,
                    subject: subject.clone(),
                    missing_id: connection.target_location_id.clone(),
                });
            }
            for branch in &connection.branches {
                if !self.store.location_exists(&branch.target_location_id)? {
                    report.issues.push(IntegrityIssue {
                        kind: IntegrityIssueKind::DanglingBranch,
                        subject: subject.clone(),
                        missing_id: branch.target_location_id.clone(),
                    });
                }
            }
        }

        for location in self.store.list_locations()? {
            report.locations_checked += 1;
            if let Some(spawn_list_id) = location.spawn_list_id() {
                if !self.store.spawn_list_exists(spawn_list_id)? {
                    report.issues.push(IntegrityIssue {
                        kind: IntegrityIssueKind::DanglingSpawnList,
                        subject: format!("location {}", location.id),
                        missing_id: spawn_list_id.to_string(),
                    });
                }
            }
            if let LocationDetail::Town(town) = &location.detail {
                for conn in &town.connections {
                    if !self.store.location_exists(&conn.target_location_id)? {
                        report.issues.push(IntegrityIssue {
                            kind: IntegrityIssueKind::DanglingTownConnection,
                            subject: format!("location {}", location.id),
                            missing_id: conn.target_location_id.clone(),
                        });
                    }
                }
            }
        }

        if !report.is_clean() {
            warn!("graph validation found {} issue(s)", report.issues.len());
        }
        Ok(report)
    }
}

fn pair_fingerprint(a: &str, b: &str) -> Vec<u8> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}|{}", lo, hi).into_bytes()
}
