//! Ordered gesture classifier: palm swipe, pinch, peace-sign hold, index
//! swipe, each independently cooldown-gated. See SPEC_FULL.md §4.2.

use crate::gesture::landmarks::{dist3, palm_centre, MotionBuffer, MotionFrame, INDEX_TIP, THUMB_TIP};
use serde::Serialize;
use std::collections::HashMap;

pub const W_PALM: usize = 12;
pub const PALM_DX_THRESHOLD: f32 = 0.10;
pub const PALM_DX_DY_RATIO: f32 = 1.8;

pub const W_PINCH: usize = 8;
pub const PINCH_OPEN_THRESHOLD: f32 = 0.07;
pub const PINCH_DISTANCE_THRESHOLD: f32 = 0.045;

pub const W_PEACE: usize = 8;
pub const MIN_HOLD: usize = 4;

pub const W_SWIPE: usize = 12;
pub const SWIPE_DY_THRESHOLD: f32 = 0.12;
pub const SWIPE_DY_DX_RATIO: f32 = 1.8;

pub const GESTURE_COOLDOWN_SECS: f64 = 0.6;

/// Minimum buffered frames before any detector is attempted.
pub const MIN_FRAMES_FOR_DETECTION: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureLabel {
    ScrollForward,
    ScrollBackward,
    TogglePlayback,
    SwitchStaff,
    PitchUp,
    PitchDown,
}

#[derive(Debug, Clone, Serialize)]
pub struct GestureEvent {
    pub gesture: GestureLabel,
    pub confidence: f32,
    pub timestamp: f64,
}

/// Edge-triggered latch state for the pinch and peace-sign detectors.
#[derive(Default)]
struct Latches {
    pinch_was_open: bool,
    peace_was_inactive: bool,
    peace_hold_count: usize,
}

pub struct Classifier {
    last_fire: HashMap<GestureLabel, f64>,
    latches: Latches,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            last_fire: HashMap::new(),
            latches: Latches {
                peace_was_inactive: true,
                ..Default::default()
            },
        }
    }

    /// Resets latch state; called when the hand is lost and the ring buffer
    /// is cleared. Cooldown timers are wall-clock based and survive a reset.
    pub fn reset_latches(&mut self) {
        self.latches = Latches {
            peace_was_inactive: true,
            ..Default::default()
        };
    }

    fn cooldown_elapsed(&self, label: GestureLabel, now: f64) -> bool {
        match self.last_fire.get(&label) {
            Some(&t) => now - t >= GESTURE_COOLDOWN_SECS,
            None => true,
        }
    }

    fn fire(&mut self, label: GestureLabel, confidence: f32, now: f64) -> Option<GestureEvent> {
        if !self.cooldown_elapsed(label, now) {
            return None;
        }
        self.last_fire.insert(label, now);
        Some(GestureEvent {
            gesture: label,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: now,
        })
    }

    fn detect_palm_swipe(&mut self, buf: &MotionBuffer, now: f64) -> Option<GestureEvent> {
        let latest = buf.latest()?;
        if !latest.finger_state.open_palm() {
            return None;
        }
        let (dx, dy) = buf.displacement(W_PALM, |f| {
            let c = palm_centre(&f.landmarks);
            (c[0], c[1])
        })?;
        if dx.abs() < PALM_DX_THRESHOLD {
            return None;
        }
        if dx.abs() < PALM_DX_DY_RATIO * dy.abs() {
            return None;
        }
        // Frame is mirrored before detection, so a palm moving right on
        // screen is dx < 0 in landmark space.
        let label = if dx < 0.0 {
            GestureLabel::ScrollForward
        } else {
            GestureLabel::ScrollBackward
        };
        let confidence = (dx.abs() / (2.0 * PALM_DX_THRESHOLD)).min(1.0);
        self.fire(label, confidence, now)
    }

    fn detect_pinch(&mut self, buf: &MotionBuffer, now: f64) -> Option<GestureEvent> {
        let latest = buf.latest()?;
        if buf.len() < W_PINCH {
            return None;
        }
        let dist = dist3(latest.landmarks[THUMB_TIP], latest.landmarks[INDEX_TIP]);
        let was_open = self.latches.pinch_was_open;
        self.latches.pinch_was_open = dist > PINCH_OPEN_THRESHOLD;

        if was_open && dist <= PINCH_DISTANCE_THRESHOLD {
            let confidence = (1.0 - dist / PINCH_DISTANCE_THRESHOLD).clamp(0.0, 1.0);
            return self.fire(GestureLabel::TogglePlayback, confidence, now);
        }
        None
    }

    fn detect_peace_hold(&mut self, buf: &MotionBuffer, now: f64) -> Option<GestureEvent> {
        let latest = buf.latest()?;
        if latest.finger_state.peace_sign() {
            self.latches.peace_hold_count += 1;
        } else {
            self.latches.peace_hold_count = 0;
            self.latches.peace_was_inactive = true;
            return None;
        }

        if buf.len() < W_PEACE || self.latches.peace_hold_count < MIN_HOLD {
            return None;
        }
        if !self.latches.peace_was_inactive {
            return None;
        }
        self.latches.peace_was_inactive = false;
        let confidence = (self.latches.peace_hold_count as f32 / W_PEACE as f32).min(1.0);
        self.fire(GestureLabel::SwitchStaff, confidence, now)
    }

    fn detect_index_swipe(&mut self, buf: &MotionBuffer, now: f64) -> Option<GestureEvent> {
        let latest = buf.latest()?;
        if !latest.finger_state.only_index() {
            return None;
        }
        let (dx, dy) = buf.displacement(W_SWIPE, |f: &MotionFrame| {
            (f.landmarks[INDEX_TIP][0], f.landmarks[INDEX_TIP][1])
        })?;
        if dy.abs() < SWIPE_DY_THRESHOLD {
            return None;
        }
        if dy.abs() < SWIPE_DY_DX_RATIO * dx.abs() {
            return None;
        }
        let label = if dy < 0.0 {
            GestureLabel::PitchUp
        } else {
            GestureLabel::PitchDown
        };
        let confidence = (dy.abs() / (2.0 * SWIPE_DY_THRESHOLD)).min(1.0);
        self.fire(label, confidence, now)
    }

    /// Runs the ordered detector chain against the current buffer state,
    /// returning at most one event. The first detector whose geometric
    /// condition is met determines the candidate gesture; if that gesture's
    /// cooldown has not elapsed the frame is silent (no fallthrough to
    /// lower-priority detectors).
    pub fn classify(&mut self, buf: &MotionBuffer, now: f64) -> Option<GestureEvent> {
        if buf.len() < MIN_FRAMES_FOR_DETECTION {
            return None;
        }
        if let Some(ev) = self.detect_palm_swipe(buf, now) {
            return Some(ev);
        }
        if let Some(ev) = self.detect_pinch(buf, now) {
            return Some(ev);
        }
        if let Some(ev) = self.detect_peace_hold(buf, now) {
            return Some(ev);
        }
        self.detect_index_swipe(buf, now)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
