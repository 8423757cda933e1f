//! Fixed gesture-label → editor-command table plus the passthrough rule for
//! already-command-shaped labels. See SPEC_FULL.md §4.3.

use crate::editor::EditorCommand;

/// `(gesture label, editor/pseudo command)`. `switch_edit_staff` and
/// `toggle_playback` are pseudo-commands: the route handler broadcasts them
/// without dispatching to the editor (§9 open-question decision — switching
/// instrument-edit focus is a UI concern, not `EditorCommand::ToggleInstrument`).
const GESTURE_TABLE: &[(&str, &str)] = &[
    ("PITCH_UP", "pitch_up"),
    ("PITCH_DOWN", "pitch_down"),
    ("TOGGLE_PLAYBACK", "toggle_playback"),
    ("SCROLL_FORWARD", "move_right"),
    ("SCROLL_BACKWARD", "move_left"),
    ("SWITCH_STAFF", "switch_edit_staff"),
    ("ADD_NOTE", "add_note"),
    ("DELETE_NOTE", "delete_note"),
    ("TOGGLE_INSTRUMENT", "switch_edit_staff"),
    ("SPLIT_NOTE", "split_note"),
    ("MERGE_NOTE", "merge_note"),
    ("MAKE_REST", "make_rest"),
];

/// Commands the coordination server recognizes but does not hand to the
/// editor — they only produce a broadcast.
pub const PSEUDO_COMMANDS: &[&str] = &["toggle_playback", "switch_edit_staff"];

fn is_known_command(lower: &str) -> bool {
    EditorCommand::parse(lower).is_some() || PSEUDO_COMMANDS.contains(&lower)
}

/// Resolves a gesture label to a command string, or `None` for an unknown
/// gesture. Tries the fixed table first, then falls back to the passthrough
/// rule: a label whose lowercased form is already a known command (editor
/// command or pseudo-command) is accepted as-is.
pub fn map_gesture(label: &str) -> Option<String> {
    if let Some((_, cmd)) = GESTURE_TABLE.iter().find(|(g, _)| *g == label) {
        return Some((*cmd).to_string());
    }
    let lower = label.to_lowercase();
    if is_known_command(&lower) {
        return Some(lower);
    }
    None
}

pub fn is_pseudo_command(command: &str) -> bool {
    PSEUDO_COMMANDS.contains(&command)
}
