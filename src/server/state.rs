//! Canonical server state: the sequence editor plus the registered
//! WebSocket subscriber list, guarded by one mutex for linearizability
//! (§5): every handler's apply → snapshot → broadcast section holds the
//! lock for its entire duration.

use crate::editor::SequenceEditor;
use crate::model::Sequence;
use crate::server::transport::WsConnection;
use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SequenceUpdate {
        sequence: Sequence,
    },
    Command {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cursor: Option<usize>,
    },
}

pub struct ServerState {
    pub editor: SequenceEditor,
    subscribers: Vec<WsConnection>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            editor: SequenceEditor::new(Sequence::untitled()),
            subscribers: Vec::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        self.editor.sequence()
    }

    pub fn cursor(&self) -> usize {
        self.editor.cursor()
    }

    /// Registers a new subscriber and sends it the initial `sequence_update`
    /// while still holding the caller's lock, so it reflects state at the
    /// moment of accept and arrives before any later broadcast (§5 ordering
    /// guarantee).
    pub fn register_subscriber(&mut self, mut conn: WsConnection) {
        let msg = ServerMessage::SequenceUpdate {
            sequence: self.sequence().clone(),
        };
        if let Ok(json) = serde_json::to_string(&msg) {
            conn.send_text(&json);
        }
        if conn.alive {
            self.subscribers.push(conn);
        }
    }

    /// Sends `msg` to every registered subscriber, sequentially. Any socket
    /// whose send fails is dropped from the registry afterward (lazy
    /// unregister-on-error, per §5).
    pub fn broadcast(&mut self, msg: &ServerMessage) {
        let json = match serde_json::to_string(msg) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize broadcast message: {e}");
                return;
            }
        };
        for sub in self.subscribers.iter_mut() {
            sub.send_text(&json);
        }
        self.subscribers.retain(|s| s.alive);
    }

    /// Closes every registered subscriber socket, for shutdown (§5
    /// cancellation contract).
    pub fn close_all(&mut self) {
        for sub in self.subscribers.drain(..) {
            sub.close();
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Sketch of the UI-side three-cursor aggregate described in §9: two edit
/// cursors and one playback cursor, each clamped into the sequence's index
/// range. The editor itself stays a single-cursor state machine; a real UI
/// client would multiplex onto `ServerState`'s one canonical cursor by
/// setting it before issuing a command and keeping the other two slots in
/// its own local state. Not exercised by any endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorSlots {
    pub primary_edit: usize,
    pub secondary_edit: usize,
    pub playback: usize,
}

impl CursorSlots {
    pub fn clamp_to(&mut self, note_count: usize) {
        let max = note_count.saturating_sub(1);
        self.primary_edit = self.primary_edit.min(max);
        self.secondary_edit = self.secondary_edit.min(max);
        self.playback = self.playback.min(max);
    }
}
