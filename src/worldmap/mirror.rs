//! Reverse-edge synthesis for bidirectional connections.
//!
//! Given one direction of a connection, derives the field values of its
//! logical reverse: endpoints and positions swap, and the edge type, action
//! label, and keyboard shortcut map through fixed opposite-pair tables. All
//! three tables live here and nowhere else, which keeps the involution
//! property (mirroring twice returns the original) testable in one place.

use crate::worldmap::types::{ConnectionDraft, EdgeType, KeyboardShortcut};

/// Opposite pairs for action labels. Lookup works in both directions; a label
/// outside the table has no derivable opposite and the reverse edge is left
/// unlabeled for the UI to infer one.
const OPPOSITE_ACTION_LABELS: &[(&str, &str)] = &[
    ("turn_left", "turn_right"),
    ("move_north", "move_south"),
    ("move_east", "move_west"),
    ("go_up", "go_down"),
    ("enter_dungeon", "exit_dungeon"),
    ("enter_town", "leave_town"),
];

pub fn opposite_edge_type(edge_type: EdgeType) -> EdgeType {
    match edge_type {
        EdgeType::Exit => EdgeType::Enter,
        EdgeType::Enter => EdgeType::Exit,
        EdgeType::Normal => EdgeType::Normal,
        EdgeType::Branch => EdgeType::Branch,
        EdgeType::Portal => EdgeType::Portal,
    }
}

pub fn opposite_shortcut(shortcut: KeyboardShortcut) -> KeyboardShortcut {
    match shortcut {
        KeyboardShortcut::Up => KeyboardShortcut::Down,
        KeyboardShortcut::Down => KeyboardShortcut::Up,
        KeyboardShortcut::Left => KeyboardShortcut::Right,
        KeyboardShortcut::Right => KeyboardShortcut::Left,
    }
}

pub fn opposite_action_label(label: &str) -> Option<&'static str> {
    for (a, b) in OPPOSITE_ACTION_LABELS {
        if *a == label {
            return Some(b);
        }
        if *b == label {
            return Some(a);
        }
    }
    None
}

/// Derive the reverse direction of `draft`. Pure; the caller persists both
/// directions and applies the same duplicate-detection rule to each.
pub fn mirror_draft(draft: &ConnectionDraft) -> ConnectionDraft {
    ConnectionDraft {
        source_location_id: draft.target_location_id.clone(),
        target_location_id: draft.source_location_id.clone(),
        connection_type: draft.connection_type,
        source_position: draft.target_position,
        target_position: draft.source_position,
        edge_type: opposite_edge_type(draft.edge_type),
        action_label: draft
            .action_label
            .as_deref()
            .and_then(opposite_action_label)
            .map(str::to_string),
        keyboard_shortcut: draft.keyboard_shortcut.map(opposite_shortcut),
        is_enabled: draft.is_enabled,
        direction: None,
        // Branch alternates describe the forward traversal; they do not
        // mirror onto the reverse edge.
        branches: Vec::new(),
    }
}
