//! Core musical data model: pitches, notes, sequences, and key signatures.
//!
//! Mirrors the wire schema shared by `GET/PUT /sequence`, `/speech`
//! responses, and `sequence_update` WebSocket frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel pitch string for a rest.
pub const REST: &str = "REST";

/// The closed, ordered set of 24 pitches spanning C4..B5. The ordering is
/// the semitone lattice every pitch-shift/transpose operation walks.
pub const PITCH_ORDER: [&str; 24] = [
    "C4", "C#4", "D4", "D#4", "E4", "F4", "F#4", "G4", "G#4", "A4", "A#4", "B4", "C5", "C#5",
    "D5", "D#5", "E5", "F5", "F#5", "G5", "G#5", "A5", "A#5", "B5",
];

/// Returns the index of `pitch` in [`PITCH_ORDER`], or `None` for `REST`
/// or any string outside the closed set.
pub fn pitch_index(pitch: &str) -> Option<usize> {
    PITCH_ORDER.iter().position(|&p| p == pitch)
}

/// Returns the pitch string at `index`, or `None` if out of range.
pub fn index_to_pitch(index: usize) -> Option<&'static str> {
    PITCH_ORDER.get(index).copied()
}

/// Shift `pitch` by `delta` semitone-steps along [`PITCH_ORDER`], clamping
/// at the extremes (no wraparound). Returns `None` only if `pitch` is not
/// in the closed set (callers are expected to resolve rests to a seed
/// pitch before calling this).
pub fn shift_pitch(pitch: &str, delta: i32) -> Option<&'static str> {
    let idx = pitch_index(pitch)? as i32;
    let shifted = (idx + delta).clamp(0, PITCH_ORDER.len() as i32 - 1);
    index_to_pitch(shifted as usize)
}

/// Note duration expressed as a visual/encoding hint. Authoritative timing
/// is always `Note::duration`; `note_type` SHOULD agree but may drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteType {
    /// Canonical (duration, NoteType) table, duration → name.
    const CANONICAL: [(f64, NoteType); 5] = [
        (4.0, NoteType::Whole),
        (2.0, NoteType::Half),
        (1.0, NoteType::Quarter),
        (0.5, NoteType::Eighth),
        (0.25, NoteType::Sixteenth),
    ];

    /// Looks up the canonical note type for `duration`, tolerance `1e-6`.
    /// Returns `None` if no canonical duration matches.
    pub fn canonical_for(duration: f64) -> Option<NoteType> {
        Self::CANONICAL
            .iter()
            .find(|(d, _)| (d - duration).abs() < 1e-6)
            .map(|(_, t)| *t)
    }
}

/// One note or rest on one of the two instrument lanes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// `"<letter><accidental?><octave>"` or `"REST"`.
    pub pitch: String,
    /// Positive rational number of beats. Canonical values: 4, 2, 1, 0.5, 0.25.
    pub duration: f64,
    /// Non-negative start position in beats from sequence origin.
    pub beat: f64,
    pub note_type: NoteType,
    /// 0 or 1: two-lane polyphony.
    pub instrument: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_bank: Option<String>,
}

impl Note {
    pub fn is_rest(&self) -> bool {
        self.pitch == REST
    }

    /// `-1` conceptually for a rest; modeled as `None`.
    pub fn pitch_index(&self) -> Option<usize> {
        if self.is_rest() {
            None
        } else {
            pitch_index(&self.pitch)
        }
    }

    /// Updates `note_type` to the canonical type for `duration`, leaving it
    /// unchanged if no canonical duration matches (per §4.1 canonicalization rule).
    pub fn resync_note_type(&mut self) {
        if let Some(t) = NoteType::canonical_for(self.duration) {
            self.note_type = t;
        }
    }
}

/// Key signature: tonic name plus the accidental count/sign it carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySignature {
    pub name: &'static str,
    pub num_accidentals: i8,
    pub is_sharps: bool,
}

/// The closed set of 24 key names (12 major + 12 relative minor), each
/// with its canonical accidental count/sign.
pub const KEYS: [KeySignature; 24] = [
    KeySignature { name: "C major", num_accidentals: 0, is_sharps: true },
    KeySignature { name: "G major", num_accidentals: 1, is_sharps: true },
    KeySignature { name: "D major", num_accidentals: 2, is_sharps: true },
    KeySignature { name: "A major", num_accidentals: 3, is_sharps: true },
    KeySignature { name: "E major", num_accidentals: 4, is_sharps: true },
    KeySignature { name: "B major", num_accidentals: 5, is_sharps: true },
    KeySignature { name: "F# major", num_accidentals: 6, is_sharps: true },
    KeySignature { name: "F major", num_accidentals: 1, is_sharps: false },
    KeySignature { name: "Bb major", num_accidentals: 2, is_sharps: false },
    KeySignature { name: "Eb major", num_accidentals: 3, is_sharps: false },
    KeySignature { name: "Ab major", num_accidentals: 4, is_sharps: false },
    KeySignature { name: "Db major", num_accidentals: 5, is_sharps: false },
    KeySignature { name: "A minor", num_accidentals: 0, is_sharps: true },
    KeySignature { name: "E minor", num_accidentals: 1, is_sharps: true },
    KeySignature { name: "B minor", num_accidentals: 2, is_sharps: true },
    KeySignature { name: "F# minor", num_accidentals: 3, is_sharps: true },
    KeySignature { name: "C# minor", num_accidentals: 4, is_sharps: true },
    KeySignature { name: "G# minor", num_accidentals: 5, is_sharps: true },
    KeySignature { name: "D# minor", num_accidentals: 6, is_sharps: true },
    KeySignature { name: "D minor", num_accidentals: 1, is_sharps: false },
    KeySignature { name: "G minor", num_accidentals: 2, is_sharps: false },
    KeySignature { name: "C minor", num_accidentals: 3, is_sharps: false },
    KeySignature { name: "F minor", num_accidentals: 4, is_sharps: false },
    KeySignature { name: "Bb minor", num_accidentals: 5, is_sharps: false },
];

/// Looks up key metadata by name.
pub fn key_by_name(name: &str) -> Option<KeySignature> {
    KEYS.iter().find(|k| k.name == name).copied()
}

/// Tonic pitch-class offset (semitones from C) for a key name, used only by
/// key-signature transpose (§4.1A). Major/minor tonic letters are parsed
/// from the key name's leading pitch-class token.
fn tonic_semitone(name: &str) -> Option<i32> {
    let token = name.split(' ').next()?;
    let (letter, rest) = token.split_at(1);
    let base = match letter.chars().next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let accidental: i32 = match rest {
        "#" => 1,
        "b" => -1,
        "" => 0,
        _ => return None,
    };
    Some((base + accidental).rem_euclid(12))
}

/// Semitone delta to move from `old_key` to `new_key`'s tonic, in `[-11, 11]`
/// taking the shorter direction is NOT assumed — the delta is the literal
/// forward distance `new - old` so repeated application is well-defined.
pub fn key_transpose_delta(old_key: &str, new_key: &str) -> Option<i32> {
    let old = tonic_semitone(old_key)?;
    let new = tonic_semitone(new_key)?;
    Some(new - old)
}

/// `{name, bpm, time_sig_num, time_sig_den, key, notes[]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub bpm: u32,
    pub time_sig_num: u32,
    pub time_sig_den: u32,
    pub key: String,
    pub notes: Vec<Note>,
}

impl Sequence {
    /// An empty sequence named "Untitled", created on server boot.
    pub fn untitled() -> Self {
        Self {
            name: "Untitled".to_string(),
            bpm: 120,
            time_sig_num: 4,
            time_sig_den: 4,
            key: "C major".to_string(),
            notes: Vec::new(),
        }
    }

    /// Re-sorts `notes` by `(beat, instrument, pitch_index)`, per the
    /// ordering invariant (§3). Only import/replace paths call this —
    /// individual editor commands preserve index order.
    pub fn sort_notes(&mut self) {
        self.notes.sort_by(|a, b| {
            a.beat
                .partial_cmp(&b.beat)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.instrument.cmp(&b.instrument))
                .then_with(|| {
                    let ai = a.pitch_index().map(|i| i as i64).unwrap_or(-1);
                    let bi = b.pitch_index().map(|i| i as i64).unwrap_or(-1);
                    ai.cmp(&bi)
                })
        });
    }

    /// `bpm` clamped into `[30, 280]`, per §3's invariant.
    pub fn clamp_bpm(&mut self) {
        self.bpm = self.bpm.clamp(30, 280);
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} bpm, {}/{}, {}] ({} notes)",
            self.name,
            self.bpm,
            self.time_sig_num,
            self.time_sig_den,
            self.key,
            self.notes.len()
        )
    }
}

/// Required top-level keys an LLM-returned sequence JSON must carry
/// (§4.3 step 4).
pub const REQUIRED_SEQUENCE_KEYS: [&str; 5] =
    ["name", "bpm", "time_sig_num", "time_sig_den", "key"];

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: &str, duration: f64, beat: f64, instrument: u8) -> Note {
        Note {
            pitch: pitch.to_string(),
            duration,
            beat,
            note_type: NoteType::canonical_for(duration).unwrap_or(NoteType::Quarter),
            instrument,
            sample_bank: None,
        }
    }

    #[test]
    fn pitch_order_spans_two_octaves() {
        assert_eq!(PITCH_ORDER.len(), 24);
        assert_eq!(PITCH_ORDER[0], "C4");
        assert_eq!(PITCH_ORDER[23], "B5");
    }

    #[test]
    fn shift_pitch_clamps_at_extremes() {
        assert_eq!(shift_pitch("C4", -1), Some("C4"));
        assert_eq!(shift_pitch("B5", 1), Some("B5"));
        assert_eq!(shift_pitch("C4", 1), Some("C#4"));
    }

    #[test]
    fn shift_pitch_rejects_rest() {
        assert_eq!(shift_pitch(REST, 1), None);
    }

    #[test]
    fn note_type_canonical_table() {
        assert_eq!(NoteType::canonical_for(4.0), Some(NoteType::Whole));
        assert_eq!(NoteType::canonical_for(0.25), Some(NoteType::Sixteenth));
        assert_eq!(NoteType::canonical_for(0.3), None);
        assert_eq!(NoteType::canonical_for(1.0 + 5e-7), Some(NoteType::Quarter));
    }

    #[test]
    fn resync_note_type_leaves_non_canonical_unchanged() {
        let mut n = note("C4", 0.3, 0.0, 0);
        n.note_type = NoteType::Eighth;
        n.resync_note_type();
        assert_eq!(n.note_type, NoteType::Eighth);
    }

    #[test]
    fn sort_notes_orders_by_beat_then_instrument_then_pitch() {
        let mut seq = Sequence::untitled();
        seq.notes = vec![
            note("D4", 1.0, 1.0, 1),
            note("C4", 1.0, 1.0, 0),
            note("C4", 1.0, 0.0, 0),
            note(REST, 1.0, 1.0, 0),
        ];
        seq.sort_notes();
        let pitches: Vec<&str> = seq.notes.iter().map(|n| n.pitch.as_str()).collect();
        assert_eq!(pitches, vec!["C4", REST, "C4", "D4"]);
    }

    #[test]
    fn key_transpose_delta_is_directional() {
        assert_eq!(key_transpose_delta("C major", "D major"), Some(2));
        assert_eq!(key_transpose_delta("D major", "C major"), Some(-2));
        assert_eq!(key_transpose_delta("C major", "C major"), Some(0));
    }

    #[test]
    fn key_by_name_roundtrip() {
        let k = key_by_name("G major").unwrap();
        assert_eq!(k.num_accidentals, 1);
        assert!(k.is_sharps);
        assert!(key_by_name("nonexistent").is_none());
    }
}
