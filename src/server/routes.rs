//! Route handlers for the coordination server's HTTP surface (§4.3).

use crate::editor::EditorCommand;
use crate::llm::{EditRange, GeminiClient};
use crate::model::Sequence;
use crate::server::gesture_map::{is_pseudo_command, map_gesture};
use crate::server::state::{ServerMessage, ServerState};
use log::warn;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

#[derive(Deserialize)]
struct PutSequenceBody {
    sequence: Sequence,
}

#[derive(Deserialize)]
struct GestureBody {
    gesture: String,
    #[allow(dead_code)]
    confidence: f64,
    #[allow(dead_code)]
    timestamp: f64,
}

#[derive(Deserialize)]
struct SpeechBody {
    text: String,
    #[serde(default)]
    selection_start_index: Option<usize>,
    #[serde(default)]
    selection_end_index: Option<usize>,
}

/// `(status code, reason phrase, JSON body)`.
pub type Response = (u16, &'static str, String);

fn ok(body: serde_json::Value) -> Response {
    (200, "OK", body.to_string())
}

fn bad_request(reason: &str) -> Response {
    (400, "Bad Request", serde_json::json!({"status": "error", "reason": reason}).to_string())
}

pub fn get_sequence(state: &Arc<Mutex<ServerState>>) -> Response {
    let st = state.lock().unwrap();
    ok(serde_json::json!({
        "sequence": st.sequence(),
        "cursor": st.cursor(),
    }))
}

pub fn put_sequence(state: &Arc<Mutex<ServerState>>, body: &[u8]) -> Response {
    let parsed: PutSequenceBody = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return bad_request(&format!("malformed sequence JSON: {e}")),
    };
    let mut st = state.lock().unwrap();
    st.editor.replace_sequence(parsed.sequence);
    let note_count = st.sequence().notes.len();
    let sequence = st.sequence().clone();
    st.broadcast(&ServerMessage::SequenceUpdate { sequence });
    ok(serde_json::json!({"status": "ok", "note_count": note_count}))
}

pub fn post_gestures(state: &Arc<Mutex<ServerState>>, body: &[u8]) -> Response {
    let parsed: GestureBody = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return bad_request(&format!("malformed gesture JSON: {e}")),
    };

    let Some(command) = map_gesture(&parsed.gesture) else {
        warn!("unknown gesture label: {}", parsed.gesture);
        return ok(serde_json::json!({"status": "ignored", "reason": "unknown gesture"}));
    };

    let mut st = state.lock().unwrap();

    if is_pseudo_command(&command) {
        st.broadcast(&ServerMessage::Command {
            command: command.clone(),
            cursor: None,
        });
        return ok(serde_json::json!({"status": "ok", "command": command}));
    }

    let Some(editor_cmd) = EditorCommand::parse(&command) else {
        warn!("gesture mapped to unrecognized command: {command}");
        return ok(serde_json::json!({"status": "ignored", "reason": "unknown command"}));
    };

    match st.editor.execute(editor_cmd) {
        Ok(()) => {
            let cursor = st.cursor();
            st.broadcast(&ServerMessage::Command {
                command: command.clone(),
                cursor: Some(cursor),
            });
            ok(serde_json::json!({"status": "ok", "command": command, "cursor": cursor}))
        }
        Err(e) => {
            warn!("gesture command {command} not applicable: {e}");
            ok(serde_json::json!({"status": "ignored", "reason": e.to_string()}))
        }
    }
}

pub fn post_speech(
    state: &Arc<Mutex<ServerState>>,
    llm: &Option<Arc<GeminiClient>>,
    body: &[u8],
) -> Response {
    let parsed: SpeechBody = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return bad_request(&format!("malformed speech JSON: {e}")),
    };

    if parsed.text.trim().is_empty() {
        return bad_request("text must not be empty");
    }

    let (pre_state, range) = {
        let st = state.lock().unwrap();
        let pre_state = st.sequence().clone();

        let range = match (parsed.selection_start_index, parsed.selection_end_index) {
            (None, None) => None,
            (Some(start), Some(end)) => {
                if pre_state.notes.is_empty() || start > end || end >= pre_state.notes.len() {
                    return bad_request("invalid selection range");
                }
                Some(EditRange { start, end })
            }
            _ => return bad_request("both selection bounds must be provided together"),
        };
        (pre_state, range)
    };

    let Some(client) = llm else {
        warn!("speech edit requested but no LLM client is configured");
        return ok(serde_json::json!({"status": "error", "reason": "failed to process instruction"}));
    };

    let candidate = match client.edit_sequence(&pre_state, &parsed.text, range) {
        Ok(seq) => seq,
        Err(e) => {
            crate::llm::log_edit_failure(&e);
            return ok(serde_json::json!({"status": "error", "reason": "failed to process instruction"}));
        }
    };

    if let Some(r) = range {
        if let Err(reason) = enforce_range(&pre_state, &candidate, r) {
            return ok(serde_json::json!({"status": "error", "reason": reason}));
        }
    }

    let mut st = state.lock().unwrap();
    st.editor.replace_sequence(candidate);
    let note_count = st.sequence().notes.len();
    let sequence = st.sequence().clone();
    st.broadcast(&ServerMessage::SequenceUpdate { sequence });
    ok(serde_json::json!({"status": "ok", "note_count": note_count}))
}

/// §4.3 step 5: a ranged edit must preserve total note count and leave
/// every note outside `[range.start, range.end]` structurally identical.
fn enforce_range(pre: &Sequence, post: &Sequence, range: EditRange) -> Result<(), String> {
    if pre.notes.len() != post.notes.len() {
        return Err("strict selection mode requires unchanged total note count".to_string());
    }
    for i in 0..pre.notes.len() {
        if i >= range.start && i <= range.end {
            continue;
        }
        if pre.notes[i] != post.notes[i] {
            return Err(format!("out-of-range mutation detected at note index {i}"));
        }
    }
    Ok(())
}

pub fn health() -> Response {
    ok(serde_json::json!({"status": "ok"}))
}

pub fn not_found() -> Response {
    (404, "Not Found", serde_json::json!({"status": "error", "reason": "not found"}).to_string())
}
