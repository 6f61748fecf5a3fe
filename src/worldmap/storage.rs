use std::path::{Path, PathBuf};

use log::{debug, info};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::IVec;

use crate::worldmap::errors::WorldMapError;
use crate::worldmap::state::canonical_world_seed;
use crate::worldmap::types::{
    Connection, Location, PlayerRecord, SpawnList, CONNECTION_SCHEMA_VERSION,
    LOCATION_SCHEMA_VERSION, PLAYER_SCHEMA_VERSION, SPAWN_LIST_SCHEMA_VERSION,
};

const TREE_PRIMARY: &str = "worldmap";

const PREFIX_LOCATIONS: &str = "locations:";
const PREFIX_CONNECTIONS: &str = "connections:";
const PREFIX_SPAWN_LISTS: &str = "spawnlists:";
const PREFIX_PLAYERS: &str = "players:";
const PREFIX_EDGE_KEYS: &str = "edgekeys:";
const PREFIX_LOC_INDEX: &str = "locidx:";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct WorldStoreBuilder {
    path: PathBuf,
    ensure_world_seed: bool,
}

impl WorldStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ensure_world_seed: true,
        }
    }

    /// Opt out of seeding the canonical world during initialization (useful
    /// for targeted tests).
    pub fn without_world_seed(mut self) -> Self {
        self.ensure_world_seed = false;
        self
    }

    pub fn open(self) -> Result<WorldStore, WorldMapError> {
        WorldStore::open_with_options(self.path, self.ensure_world_seed)
    }
}

/// One all-or-nothing set of writes against the primary tree. Cascading
/// operations collect every record they touch into a batch first, then commit
/// once; a failed commit leaves the store exactly as it was.
#[derive(Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn put_location(&mut self, location: &Location) -> Result<(), WorldMapError> {
        let mut location = location.clone();
        location.schema_version = LOCATION_SCHEMA_VERSION;
        self.ops.push(BatchOp::Put(
            WorldStore::location_key(&location.id),
            encode(&location)?,
        ));
        Ok(())
    }

    pub fn delete_location(&mut self, location_id: &str) {
        self.ops
            .push(BatchOp::Delete(WorldStore::location_key(location_id)));
    }

    pub fn put_connection(&mut self, connection: &Connection) -> Result<(), WorldMapError> {
        let mut connection = connection.clone();
        connection.schema_version = CONNECTION_SCHEMA_VERSION;
        self.ops.push(BatchOp::Put(
            WorldStore::connection_key(connection.id),
            encode(&connection)?,
        ));
        Ok(())
    }

    pub fn delete_connection(&mut self, connection_id: u64) {
        self.ops
            .push(BatchOp::Delete(WorldStore::connection_key(connection_id)));
    }

    pub fn put_edge_pair(
        &mut self,
        a: &str,
        b: &str,
        connection_ids: &[u64],
    ) -> Result<(), WorldMapError> {
        self.ops.push(BatchOp::Put(
            WorldStore::edge_pair_key(a, b),
            encode(&connection_ids.to_vec())?,
        ));
        Ok(())
    }

    pub fn delete_edge_pair(&mut self, a: &str, b: &str) {
        self.ops
            .push(BatchOp::Delete(WorldStore::edge_pair_key(a, b)));
    }

    pub fn put_location_index(&mut self, location_id: &str, connection_id: u64) {
        self.ops.push(BatchOp::Put(
            WorldStore::location_index_key(location_id, connection_id),
            Vec::new(),
        ));
    }

    pub fn delete_location_index(&mut self, location_id: &str, connection_id: u64) {
        self.ops.push(BatchOp::Delete(WorldStore::location_index_key(
            location_id,
            connection_id,
        )));
    }

    pub fn put_spawn_list(&mut self, list: &SpawnList) -> Result<(), WorldMapError> {
        let mut list = list.clone();
        list.schema_version = SPAWN_LIST_SCHEMA_VERSION;
        self.ops.push(BatchOp::Put(
            WorldStore::spawn_list_key(&list.id),
            encode(&list)?,
        ));
        Ok(())
    }

    pub fn delete_spawn_list(&mut self, spawn_list_id: &str) {
        self.ops
            .push(BatchOp::Delete(WorldStore::spawn_list_key(spawn_list_id)));
    }

    pub fn put_player(&mut self, player: &PlayerRecord) -> Result<(), WorldMapError> {
        let mut player = player.clone();
        player.schema_version = PLAYER_SCHEMA_VERSION;
        self.ops.push(BatchOp::Put(
            WorldStore::player_key(&player.username),
            encode(&player)?,
        ));
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, WorldMapError> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, WorldMapError> {
    Ok(bincode::deserialize::<T>(&bytes)?)
}

/// Sled-backed persistence for world-map records. Locations, connections,
/// spawn lists, player refs, and the two reference indexes all live in one
/// primary tree under distinct key prefixes so multi-record cascades can run
/// as a single sled transaction.
#[derive(Clone)]
pub struct WorldStore {
    db: sled::Db,
    primary: sled::Tree,
}

impl WorldStore {
    /// Open (or create) the world store rooted at `path`. When `seed_world`
    /// is true the canonical starter world is inserted if no locations exist
    /// yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WorldMapError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, seed_world: bool) -> Result<Self, WorldMapError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let primary = db.open_tree(TREE_PRIMARY)?;
        let store = Self { db, primary };

        if seed_world {
            store.seed_world_if_needed()?;
        }

        Ok(store)
    }

    fn location_key(location_id: &str) -> Vec<u8> {
        format!("{}{}", PREFIX_LOCATIONS, location_id).into_bytes()
    }

    fn connection_key(connection_id: u64) -> Vec<u8> {
        // Zero-padded so lexicographic scan order matches numeric order.
        format!("{}{:020}", PREFIX_CONNECTIONS, connection_id).into_bytes()
    }

    fn spawn_list_key(spawn_list_id: &str) -> Vec<u8> {
        format!("{}{}", PREFIX_SPAWN_LISTS, spawn_list_id).into_bytes()
    }

    fn player_key(username: &str) -> Vec<u8> {
        format!("{}{}", PREFIX_PLAYERS, username.to_ascii_lowercase()).into_bytes()
    }

    /// Canonical unordered-pair key: both orderings of the same endpoints map
    /// to one index entry, making duplicate-edge detection a point lookup.
    fn edge_pair_key(a: &str, b: &str) -> Vec<u8> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{}{}|{}", PREFIX_EDGE_KEYS, lo, hi).into_bytes()
    }

    fn location_index_key(location_id: &str, connection_id: u64) -> Vec<u8> {
        format!("{}{}:{:020}", PREFIX_LOC_INDEX, location_id, connection_id).into_bytes()
    }

    // ---- locations ----

    /// Insert or update a location record.
    pub fn put_location(&self, mut location: Location) -> Result<(), WorldMapError> {
        location.schema_version = LOCATION_SCHEMA_VERSION;
        location.touch();
        let key = Self::location_key(&location.id);
        let bytes = encode(&location)?;
        self.primary.insert(key, bytes)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn get_location(&self, location_id: &str) -> Result<Location, WorldMapError> {
        let key = Self::location_key(location_id);
        let Some(bytes) = self.primary.get(&key)? else {
            return Err(WorldMapError::NotFound(format!("location: {}", location_id)));
        };
        let record: Location = decode(bytes)?;
        if record.schema_version != LOCATION_SCHEMA_VERSION {
            return Err(WorldMapError::SchemaMismatch {
                entity: "location",
                expected: LOCATION_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn location_exists(&self, location_id: &str) -> Result<bool, WorldMapError> {
        Ok(self
            .primary
            .contains_key(Self::location_key(location_id))?)
    }

    /// Remove a location record. Callers are expected to have cleared every
    /// reference first; the graph service enforces that.
    pub fn delete_location(&self, location_id: &str) -> Result<(), WorldMapError> {
        self.primary.remove(Self::location_key(location_id))?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn list_locations(&self) -> Result<Vec<Location>, WorldMapError> {
        let mut locations = Vec::new();
        for entry in self.primary.scan_prefix(PREFIX_LOCATIONS.as_bytes()) {
            let (_, bytes) = entry?;
            locations.push(decode::<Location>(bytes)?);
        }
        Ok(locations)
    }

    pub fn locations_by_category(
        &self,
        category: crate::worldmap::types::LocationCategory,
    ) -> Result<Vec<Location>, WorldMapError> {
        Ok(self
            .list_locations()?
            .into_iter()
            .filter(|l| l.category() == category)
            .collect())
    }

    // ---- connections ----

    /// Allocate the next surrogate connection id.
    pub fn next_connection_id(&self) -> Result<u64, WorldMapError> {
        Ok(self.db.generate_id()?)
    }

    pub fn get_connection(&self, connection_id: u64) -> Result<Connection, WorldMapError> {
        let key = Self::connection_key(connection_id);
        let Some(bytes) = self.primary.get(&key)? else {
            return Err(WorldMapError::NotFound(format!(
                "connection: {}",
                connection_id
            )));
        };
        let record: Connection = decode(bytes)?;
        if record.schema_version != CONNECTION_SCHEMA_VERSION {
            return Err(WorldMapError::SchemaMismatch {
                entity: "connection",
                expected: CONNECTION_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn list_connections(&self) -> Result<Vec<Connection>, WorldMapError> {
        let mut connections = Vec::new();
        for entry in self.primary.scan_prefix(PREFIX_CONNECTIONS.as_bytes()) {
            let (_, bytes) = entry?;
            connections.push(decode::<Connection>(bytes)?);
        }
        Ok(connections)
    }

    /// Connection ids already occupying the unordered endpoint pair `{a, b}`.
    pub fn edge_pair_ids(&self, a: &str, b: &str) -> Result<Vec<u64>, WorldMapError> {
        match self.primary.get(Self::edge_pair_key(a, b))? {
            Some(bytes) => decode::<Vec<u64>>(bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Every connection referencing `location_id` as an endpoint or branch
    /// target, resolved through the location index instead of a full scan.
    pub fn connections_referencing(
        &self,
        location_id: &str,
    ) -> Result<Vec<Connection>, WorldMapError> {
        let prefix = format!("{}{}:", PREFIX_LOC_INDEX, location_id);
        let mut connections = Vec::new();
        for entry in self.primary.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            let Some(id_text) = text.strip_prefix(&prefix) else {
                continue;
            };
            let connection_id: u64 = id_text.parse().map_err(|_| {
                WorldMapError::NotFound(format!("malformed index key: {}", text))
            })?;
            connections.push(self.get_connection(connection_id)?);
        }
        debug!(
            "location index hit: {} -> {} connection(s)",
            location_id,
            connections.len()
        );
        Ok(connections)
    }

    /// Outgoing connections of one source location. Keyboard-shortcut
    /// uniqueness is scoped to this set.
    pub fn connections_from(&self, location_id: &str) -> Result<Vec<Connection>, WorldMapError> {
        Ok(self
            .connections_referencing(location_id)?
            .into_iter()
            .filter(|c| c.source_location_id == location_id)
            .collect())
    }

    /// Persist a new connection and its index entries in one transaction.
    pub fn insert_connection(&self, connection: &Connection) -> Result<(), WorldMapError> {
        let mut pair_ids =
            self.edge_pair_ids(&connection.source_location_id, &connection.target_location_id)?;
        pair_ids.push(connection.id);

        let mut batch = WriteBatch::new();
        batch.put_connection(connection)?;
        batch.put_edge_pair(
            &connection.source_location_id,
            &connection.target_location_id,
            &pair_ids,
        )?;
        for loc in connection.referenced_location_ids() {
            batch.put_location_index(loc, connection.id);
        }
        self.commit(batch)
    }

    /// Persist both directions of a bidirectional pair in one transaction.
    pub fn insert_connection_pair(
        &self,
        forward: &Connection,
        reverse: &Connection,
    ) -> Result<(), WorldMapError> {
        let mut pair_ids =
            self.edge_pair_ids(&forward.source_location_id, &forward.target_location_id)?;
        pair_ids.push(forward.id);
        pair_ids.push(reverse.id);

        let mut batch = WriteBatch::new();
        batch.put_connection(forward)?;
        batch.put_connection(reverse)?;
        batch.put_edge_pair(
            &forward.source_location_id,
            &forward.target_location_id,
            &pair_ids,
        )?;
        for loc in forward.referenced_location_ids() {
            batch.put_location_index(loc, forward.id);
        }
        for loc in reverse.referenced_location_ids() {
            batch.put_location_index(loc, reverse.id);
        }
        self.commit(batch)
    }

    /// Rewrite an existing connection record in place, refreshing index
    /// entries when endpoints or branch targets changed.
    pub fn update_connection(&self, connection: &Connection) -> Result<(), WorldMapError> {
        let previous = self.get_connection(connection.id)?;
        let mut batch = WriteBatch::new();
        batch.put_connection(connection)?;

        let old_pair = (
            previous.source_location_id.clone(),
            previous.target_location_id.clone(),
        );
        let new_pair = (
            connection.source_location_id.clone(),
            connection.target_location_id.clone(),
        );
        if Self::edge_pair_key(&old_pair.0, &old_pair.1)
            != Self::edge_pair_key(&new_pair.0, &new_pair.1)
        {
            let remaining: Vec<u64> = self
                .edge_pair_ids(&old_pair.0, &old_pair.1)?
                .into_iter()
                .filter(|id| *id != connection.id)
                .collect();
            if remaining.is_empty() {
                batch.delete_edge_pair(&old_pair.0, &old_pair.1);
            } else {
                batch.put_edge_pair(&old_pair.0, &old_pair.1, &remaining)?;
            }
            let mut pair_ids = self.edge_pair_ids(&new_pair.0, &new_pair.1)?;
            pair_ids.push(connection.id);
            batch.put_edge_pair(&new_pair.0, &new_pair.1, &pair_ids)?;
        }

        for loc in previous.referenced_location_ids() {
            batch.delete_location_index(loc, previous.id);
        }
        for loc in connection.referenced_location_ids() {
            batch.put_location_index(loc, connection.id);
        }
        self.commit(batch)
    }

    /// Remove a connection record and every index entry that points at it.
    pub fn delete_connection(&self, connection_id: u64) -> Result<(), WorldMapError> {
        let connection = self.get_connection(connection_id)?;
        let remaining: Vec<u64> = self
            .edge_pair_ids(&connection.source_location_id, &connection.target_location_id)?
            .into_iter()
            .filter(|id| *id != connection_id)
            .collect();

        let mut batch = WriteBatch::new();
        batch.delete_connection(connection_id);
        if remaining.is_empty() {
            batch.delete_edge_pair(
                &connection.source_location_id,
                &connection.target_location_id,
            );
        } else {
            batch.put_edge_pair(
                &connection.source_location_id,
                &connection.target_location_id,
                &remaining,
            )?;
        }
        for loc in connection.referenced_location_ids() {
            batch.delete_location_index(loc, connection_id);
        }
        self.commit(batch)
    }

    // ---- spawn lists ----

    pub fn put_spawn_list(&self, mut list: SpawnList) -> Result<(), WorldMapError> {
        list.schema_version = SPAWN_LIST_SCHEMA_VERSION;
        list.touch();
        let key = Self::spawn_list_key(&list.id);
        let bytes = encode(&list)?;
        self.primary.insert(key, bytes)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn get_spawn_list(&self, spawn_list_id: &str) -> Result<SpawnList, WorldMapError> {
        let key = Self::spawn_list_key(spawn_list_id);
        let Some(bytes) = self.primary.get(&key)? else {
            return Err(WorldMapError::NotFound(format!(
                "spawn list: {}",
                spawn_list_id
            )));
        };
        let record: SpawnList = decode(bytes)?;
        if record.schema_version != SPAWN_LIST_SCHEMA_VERSION {
            return Err(WorldMapError::SchemaMismatch {
                entity: "spawn_list",
                expected: SPAWN_LIST_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn spawn_list_exists(&self, spawn_list_id: &str) -> Result<bool, WorldMapError> {
        Ok(self
            .primary
            .contains_key(Self::spawn_list_key(spawn_list_id))?)
    }

    pub fn list_spawn_lists(&self) -> Result<Vec<SpawnList>, WorldMapError> {
        let mut lists = Vec::new();
        for entry in self.primary.scan_prefix(PREFIX_SPAWN_LISTS.as_bytes()) {
            let (_, bytes) = entry?;
            lists.push(decode::<SpawnList>(bytes)?);
        }
        Ok(lists)
    }

    // ---- players ----

    pub fn put_player(&self, mut player: PlayerRecord) -> Result<(), WorldMapError> {
        player.schema_version = PLAYER_SCHEMA_VERSION;
        player.touch();
        let key = Self::player_key(&player.username);
        let bytes = encode(&player)?;
        self.primary.insert(key, bytes)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn get_player(&self, username: &str) -> Result<PlayerRecord, WorldMapError> {
        let key = Self::player_key(username);
        let Some(bytes) = self.primary.get(&key)? else {
            return Err(WorldMapError::NotFound(format!("player: {}", username)));
        };
        decode(bytes)
    }

    pub fn list_players(&self) -> Result<Vec<PlayerRecord>, WorldMapError> {
        let mut players = Vec::new();
        for entry in self.primary.scan_prefix(PREFIX_PLAYERS.as_bytes()) {
            let (_, bytes) = entry?;
            players.push(decode::<PlayerRecord>(bytes)?);
        }
        Ok(players)
    }

    /// Players currently standing at `location_id`. The rename cascade
    /// refuses to run while this is non-empty.
    pub fn players_at(&self, location_id: &str) -> Result<Vec<PlayerRecord>, WorldMapError> {
        Ok(self
            .list_players()?
            .into_iter()
            .filter(|p| p.location_id == location_id)
            .collect())
    }

    // ---- atomic commit ----

    /// Apply a batch of writes atomically: either every op lands or none do.
    pub fn commit(&self, batch: WriteBatch) -> Result<(), WorldMapError> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!("committing {} op(s)", batch.len());
        self.primary
            .transaction(|tx| -> ConflictableTransactionResult<(), WorldMapError> {
                for op in &batch.ops {
                    match op {
                        BatchOp::Put(key, value) => {
                            tx.insert(key.as_slice(), value.as_slice())?;
                        }
                        BatchOp::Delete(key) => {
                            tx.remove(key.as_slice())?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Abort(inner) => inner,
                TransactionError::Storage(inner) => WorldMapError::Sled(inner),
            })?;
        self.primary.flush()?;
        Ok(())
    }

    // ---- seeding ----

    fn seed_world_if_needed(&self) -> Result<(), WorldMapError> {
        if self
            .primary
            .scan_prefix(PREFIX_LOCATIONS.as_bytes())
            .next()
            .is_some()
        {
            return Ok(());
        }

        let seed = canonical_world_seed();
        info!(
            "seeding canonical world: {} locations, {} connections, {} spawn lists",
            seed.locations.len(),
            seed.connections.len(),
            seed.spawn_lists.len()
        );
        for location in seed.locations {
            self.put_location(location)?;
        }
        for list in seed.spawn_lists {
            self.put_spawn_list(list)?;
        }
        for draft in seed.connections {
            let id = self.next_connection_id()?;
            self.insert_connection(&Connection::from_draft(id, draft))?;
        }
        Ok(())
    }
}
