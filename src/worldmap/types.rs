use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LOCATION_SCHEMA_VERSION: u8 = 1;
pub const CONNECTION_SCHEMA_VERSION: u8 = 1;
pub const SPAWN_LIST_SCHEMA_VERSION: u8 = 1;
pub const PLAYER_SCHEMA_VERSION: u8 = 1;

/// Positions along a pathway are percentages of its traversal.
pub const POSITION_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    Town,
    Road,
    Dungeon,
}

impl LocationCategory {
    /// Roads and dungeons are jointly "pathways": traversable locations with
    /// positional connections and spawn tables.
    pub fn is_pathway(self) -> bool {
        matches!(self, LocationCategory::Road | LocationCategory::Dungeon)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LocationCategory::Town => "town",
            LocationCategory::Road => "road",
            LocationCategory::Dungeon => "dungeon",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DungeonType {
    Cave,
    Ruins,
    Tower,
    Underground,
}

impl DungeonType {
    pub fn as_str(self) -> &'static str {
        match self {
            DungeonType::Cave => "cave",
            DungeonType::Ruins => "ruins",
            DungeonType::Tower => "tower",
            DungeonType::Underground => "underground",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Extreme,
}

impl Difficulty {
    /// Default monster level band used when a migrated dungeon does not carry
    /// explicit min/max levels.
    pub fn level_range(self) -> (u32, u32) {
        match self {
            Difficulty::Easy => (1, 5),
            Difficulty::Normal => (3, 10),
            Difficulty::Hard => (8, 20),
            Difficulty::Extreme => (15, 50),
        }
    }
}

/// A special action a town or dungeon offers (inn rest, boss battle, shrine).
/// Boss battles carry the boss monster id so migration can lift it onto the
/// dungeon record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialAction {
    pub kind: String,
    #[serde(default)]
    pub boss: Option<String>,
}

impl SpecialAction {
    pub fn boss_battle(boss: &str) -> Self {
        Self {
            kind: "boss_battle".to_string(),
            boss: Some(boss.to_string()),
        }
    }
}

/// Entry in a town's embedded connection list. Towns predate the Connection
/// table and still carry these for menu rendering; the rename cascade must
/// keep them pointing at live location ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TownConnection {
    pub target_location_id: String,
    #[serde(default)]
    pub action_label: Option<String>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl TownConnection {
    pub fn new(target: &str) -> Self {
        Self {
            target_location_id: target.to_string(),
            action_label: None,
            is_enabled: true,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.action_label = Some(label.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TownDetail {
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub special_actions: Vec<SpecialAction>,
    #[serde(default)]
    pub connections: Vec<TownConnection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathwayDetail {
    pub length: u32,
    pub difficulty: Difficulty,
    pub encounter_rate: f64,
    #[serde(default)]
    pub spawn_list_id: Option<String>,
}

impl Default for PathwayDetail {
    fn default() -> Self {
        Self {
            length: 100,
            difficulty: Difficulty::Normal,
            encounter_rate: 0.1,
            spawn_list_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DungeonDetail {
    pub pathway: PathwayDetail,
    pub dungeon_type: DungeonType,
    pub floors: u32,
    pub min_level: u32,
    pub max_level: u32,
    #[serde(default)]
    pub boss: Option<String>,
    #[serde(default)]
    pub special_actions: Vec<SpecialAction>,
}

/// Category-specific payload of a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LocationDetail {
    Town(TownDetail),
    Road(PathwayDetail),
    Dungeon(DungeonDetail),
}

impl LocationDetail {
    pub fn category(&self) -> LocationCategory {
        match self {
            LocationDetail::Town(_) => LocationCategory::Town,
            LocationDetail::Road(_) => LocationCategory::Road,
            LocationDetail::Dungeon(_) => LocationCategory::Dungeon,
        }
    }
}

/// A town, road, or dungeon on the world map. `id` is the stable key every
/// other record points at; it only ever changes through the rename cascade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: String,
    pub detail: LocationDetail,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Location {
    fn new(id: &str, name: &str, detail: LocationDetail) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            detail,
            is_active: true,
            created_at: now,
            updated_at: now,
            schema_version: LOCATION_SCHEMA_VERSION,
        }
    }

    pub fn town(id: &str, name: &str) -> Self {
        Self::new(id, name, LocationDetail::Town(TownDetail::default()))
    }

    pub fn road(id: &str, name: &str) -> Self {
        Self::new(id, name, LocationDetail::Road(PathwayDetail::default()))
    }

    pub fn dungeon(id: &str, name: &str, dungeon_type: DungeonType) -> Self {
        let (min_level, max_level) = Difficulty::Normal.level_range();
        Self::new(
            id,
            name,
            LocationDetail::Dungeon(DungeonDetail {
                pathway: PathwayDetail::default(),
                dungeon_type,
                floors: 1,
                min_level,
                max_level,
                boss: None,
                special_actions: Vec::new(),
            }),
        )
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        if let Some(pathway) = self.pathway_mut() {
            pathway.difficulty = difficulty;
        }
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        if let Some(pathway) = self.pathway_mut() {
            pathway.length = length;
        }
        self
    }

    /// Set a dungeon's boss and record the matching boss-battle action, the
    /// same pairing the config migration maintains.
    pub fn with_boss(mut self, boss: &str) -> Self {
        if let LocationDetail::Dungeon(dungeon) = &mut self.detail {
            dungeon.boss = Some(boss.to_string());
            dungeon.special_actions.push(SpecialAction::boss_battle(boss));
        }
        self
    }

    pub fn with_spawn_list(mut self, spawn_list_id: &str) -> Self {
        if let Some(pathway) = self.pathway_mut() {
            pathway.spawn_list_id = Some(spawn_list_id.to_string());
        }
        self
    }

    pub fn with_town_connection(mut self, conn: TownConnection) -> Self {
        if let LocationDetail::Town(town) = &mut self.detail {
            town.connections.push(conn);
        }
        self
    }

    pub fn with_service(mut self, service: &str) -> Self {
        if let LocationDetail::Town(town) = &mut self.detail {
            town.services.push(service.to_string());
        }
        self
    }

    pub fn category(&self) -> LocationCategory {
        self.detail.category()
    }

    pub fn is_pathway(&self) -> bool {
        self.category().is_pathway()
    }

    /// The pathway payload shared by roads and dungeons, if any.
    pub fn pathway(&self) -> Option<&PathwayDetail> {
        match &self.detail {
            LocationDetail::Road(pathway) => Some(pathway),
            LocationDetail::Dungeon(dungeon) => Some(&dungeon.pathway),
            LocationDetail::Town(_) => None,
        }
    }

    pub fn pathway_mut(&mut self) -> Option<&mut PathwayDetail> {
        match &mut self.detail {
            LocationDetail::Road(pathway) => Some(pathway),
            LocationDetail::Dungeon(dungeon) => Some(&mut dungeon.pathway),
            LocationDetail::Town(_) => None,
        }
    }

    pub fn spawn_list_id(&self) -> Option<&str> {
        self.pathway().and_then(|p| p.spawn_list_id.as_deref())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Start,
    End,
    Bidirectional,
}

impl ConnectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Start => "start",
            ConnectionType::End => "end",
            ConnectionType::Bidirectional => "bidirectional",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Normal,
    Branch,
    Portal,
    Exit,
    Enter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardShortcut {
    Up,
    Down,
    Left,
    Right,
}

/// Branch-style sub-reference: an alternate destination forking off a
/// connection at a given position along the pathway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchRef {
    pub position: u8,
    pub target_location_id: String,
    #[serde(default)]
    pub action_label: Option<String>,
}

/// Candidate connection as submitted by the admin layer, before the store has
/// assigned a surrogate id. Also the unit the bidirectional synthesizer works
/// on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionDraft {
    pub source_location_id: String,
    pub target_location_id: String,
    pub connection_type: ConnectionType,
    pub source_position: Option<u8>,
    pub target_position: Option<u8>,
    pub edge_type: EdgeType,
    pub action_label: Option<String>,
    pub keyboard_shortcut: Option<KeyboardShortcut>,
    pub is_enabled: bool,
    /// Legacy free-text direction, kept for backward compatibility only.
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub branches: Vec<BranchRef>,
}

impl ConnectionDraft {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source_location_id: source.to_string(),
            target_location_id: target.to_string(),
            connection_type: ConnectionType::Start,
            source_position: None,
            target_position: None,
            edge_type: EdgeType::Normal,
            action_label: None,
            keyboard_shortcut: None,
            is_enabled: true,
            direction: None,
            branches: Vec::new(),
        }
    }

    pub fn bidirectional(mut self) -> Self {
        self.connection_type = ConnectionType::Bidirectional;
        self
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    pub fn with_positions(mut self, source: Option<u8>, target: Option<u8>) -> Self {
        self.source_position = source;
        self.target_position = target;
        self
    }

    pub fn with_edge_type(mut self, edge_type: EdgeType) -> Self {
        self.edge_type = edge_type;
        self
    }

    pub fn with_action_label(mut self, label: &str) -> Self {
        self.action_label = Some(label.to_string());
        self
    }

    pub fn with_shortcut(mut self, shortcut: KeyboardShortcut) -> Self {
        self.keyboard_shortcut = Some(shortcut);
        self
    }

    pub fn with_branch(mut self, branch: BranchRef) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }
}

/// A directed edge between two locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    pub id: u64,
    pub source_location_id: String,
    pub target_location_id: String,
    pub connection_type: ConnectionType,
    pub source_position: Option<u8>,
    pub target_position: Option<u8>,
    pub edge_type: EdgeType,
    pub action_label: Option<String>,
    pub keyboard_shortcut: Option<KeyboardShortcut>,
    pub is_enabled: bool,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub branches: Vec<BranchRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Connection {
    pub fn from_draft(id: u64, draft: ConnectionDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_location_id: draft.source_location_id,
            target_location_id: draft.target_location_id,
            connection_type: draft.connection_type,
            source_position: draft.source_position,
            target_position: draft.target_position,
            edge_type: draft.edge_type,
            action_label: draft.action_label,
            keyboard_shortcut: draft.keyboard_shortcut,
            is_enabled: draft.is_enabled,
            direction: draft.direction,
            branches: draft.branches,
            created_at: now,
            updated_at: now,
            schema_version: CONNECTION_SCHEMA_VERSION,
        }
    }

    /// All location ids this record references (endpoints plus branch
    /// targets); the set the rename cascade and reference index care about.
    pub fn referenced_location_ids(&self) -> Vec<&str> {
        let mut ids = vec![
            self.source_location_id.as_str(),
            self.target_location_id.as_str(),
        ];
        for branch in &self.branches {
            ids.push(branch.target_location_id.as_str());
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One monster's allocation inside a spawn list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpawnEntry {
    pub spawn_rate: f64,
    pub priority: u32,
    pub min_level: u32,
    pub max_level: u32,
    pub is_active: bool,
}

impl SpawnEntry {
    pub fn new(spawn_rate: f64) -> Self {
        Self {
            spawn_rate,
            priority: 0,
            min_level: 1,
            max_level: 1,
            is_active: true,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_levels(mut self, min_level: u32, max_level: u32) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }
}

/// Named table of monster-spawn entries attached to one or more pathways.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpawnList {
    pub id: String,
    pub name: String,
    pub monsters: HashMap<String, SpawnEntry>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl SpawnList {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            monsters: HashMap::new(),
            updated_at: Utc::now(),
            schema_version: SPAWN_LIST_SCHEMA_VERSION,
        }
    }

    pub fn with_monster(mut self, monster_id: &str, entry: SpawnEntry) -> Self {
        self.monsters.insert(monster_id.to_string(), entry);
        self
    }

    /// Sum of spawn rates over active entries; the constraint the allocation
    /// service enforces is `active_rate_sum() <= 1.0`.
    pub fn active_rate_sum(&self) -> f64 {
        self.monsters
            .values()
            .filter(|e| e.is_active)
            .map(|e| e.spawn_rate)
            .sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Player position record. The engine only reads and rewrites `location_id`;
/// everything else about players lives with the game server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub username: String,
    pub location_id: String,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(username: &str, location_id: &str) -> Self {
        Self {
            username: username.to_string(),
            location_id: location_id.to_string(),
            updated_at: Utc::now(),
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
