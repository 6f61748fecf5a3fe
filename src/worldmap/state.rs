//! Canonical starter world.
//!
//! A small, self-consistent map inserted into an empty store so a fresh
//! deployment has something to administer and the integration tests have a
//! deterministic fixture. Operators are expected to replace all of it.

use crate::worldmap::types::{
    ConnectionDraft, ConnectionType, Difficulty, DungeonType, EdgeType, KeyboardShortcut,
    Location, SpawnEntry, SpawnList, TownConnection,
};

/// Town every seeded road ultimately leads back to.
pub const SEED_HOME_TOWN_ID: &str = "millbrook";

/// Location ids of the canonical starter world.
pub const SEED_LOCATION_IDS: &[&str] = &[
    SEED_HOME_TOWN_ID,
    "harborview",
    "old_mill_road",
    "mosscap_cave",
];

pub const SEED_SPAWN_LIST_ID: &str = "spawns_old_mill_road";

pub struct WorldSeed {
    pub locations: Vec<Location>,
    pub connections: Vec<ConnectionDraft>,
    pub spawn_lists: Vec<SpawnList>,
}

/// Two towns joined by a road, with a dungeon branching off the road.
pub fn canonical_world_seed() -> WorldSeed {
    let millbrook = Location::town(SEED_HOME_TOWN_ID, "Millbrook")
        .with_description("A quiet milling town at the river crossing.")
        .with_service("inn")
        .with_service("market")
        .with_town_connection(TownConnection::new("old_mill_road").with_label("leave_town"));

    let harborview = Location::town("harborview", "Harborview")
        .with_description("Salt wind, gulls, and a crowded quay.")
        .with_service("inn")
        .with_service("harbor")
        .with_town_connection(TownConnection::new("old_mill_road").with_label("leave_town"));

    let old_mill_road = Location::road("old_mill_road", "Old Mill Road")
        .with_description("The cart road between Millbrook and Harborview.")
        .with_length(100)
        .with_difficulty(Difficulty::Easy)
        .with_spawn_list(SEED_SPAWN_LIST_ID);

    let mosscap_cave = Location::dungeon("mosscap_cave", "Mosscap Cave", DungeonType::Cave)
        .with_description("A damp cave mouth half-hidden by ferns.")
        .with_difficulty(Difficulty::Normal)
        .with_boss("mosscap_matriarch");

    let connections = vec![
        ConnectionDraft::new(SEED_HOME_TOWN_ID, "old_mill_road")
            .with_positions(None, Some(0))
            .with_action_label("leave_town")
            .with_shortcut(KeyboardShortcut::Up),
        ConnectionDraft::new("old_mill_road", "harborview")
            .with_connection_type(ConnectionType::End)
            .with_positions(Some(100), None)
            .with_edge_type(EdgeType::Exit)
            .with_action_label("enter_town"),
        ConnectionDraft::new("old_mill_road", "mosscap_cave")
            .with_positions(Some(60), Some(0))
            .with_edge_type(EdgeType::Enter)
            .with_action_label("enter_dungeon"),
    ];

    let spawn_lists = vec![SpawnList::new(SEED_SPAWN_LIST_ID, "Old Mill Road")
        .with_monster("goblin", SpawnEntry::new(0.4).with_levels(1, 3))
        .with_monster("wolf", SpawnEntry::new(0.3).with_levels(2, 4).with_priority(1))
        .with_monster("bat", SpawnEntry::new(0.2).with_levels(1, 2))];

    WorldSeed {
        locations: vec![millbrook, harborview, old_mill_road, mosscap_cave],
        connections,
        spawn_lists,
    }
}
