//! Hand-landmark frame types, the fixed-capacity motion ring buffer, and the
//! two-stage landmark filter (outlier rejection + EMA). See SPEC_FULL.md §4.2.

use crate::gesture::finger_state::FingerState;
use std::collections::VecDeque;

/// Planar-jump outlier-rejection threshold, normalized image units.
pub const LANDMARK_MAX_JUMP: f32 = 0.18;
/// EMA smoothing factor.
pub const ALPHA: f32 = 0.55;
/// Motion ring-buffer capacity.
pub const N_BUF: usize = 20;

/// 21-point hand landmark, `(x, y, z)` normalized to `[0,1]` in image space.
pub type Point3 = [f32; 3];

/// MediaPipe-style hand landmark indices.
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Raw output of the external hand-landmark detector for one frame: 21
/// normalized `(x,y,z)` triples plus handedness.
#[derive(Debug, Clone, Copy)]
pub struct HandObservation {
    pub landmarks: [Point3; 21],
    pub right_hand: bool,
}

pub fn planar_dist(a: Point3, b: Point3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

pub fn dist3(a: Point3, b: Point3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Palm centre: midpoint of wrist and middle-finger MCP. Reused as the
/// palm-swipe trajectory anchor too.
pub fn palm_centre(landmarks: &[Point3; 21]) -> Point3 {
    let w = landmarks[WRIST];
    let m = landmarks[MIDDLE_MCP];
    [(w[0] + m[0]) / 2.0, (w[1] + m[1]) / 2.0, (w[2] + m[2]) / 2.0]
}

#[derive(Default)]
struct LandmarkHistory {
    /// Previously-smoothed position (most recent).
    prev1: Option<Point3>,
    /// Second-most-recent smoothed position, for constant-velocity prediction.
    prev2: Option<Point3>,
}

/// Applies the two-stage filter (outlier rejection, then EMA) to each of the
/// 21 landmarks independently, maintaining per-landmark smoothing history.
pub struct LandmarkFilter {
    history: [LandmarkHistory; 21],
}

impl LandmarkFilter {
    pub fn new() -> Self {
        Self {
            history: Default::default(),
        }
    }

    /// Filters one raw observation, returning the smoothed landmarks.
    pub fn push(&mut self, raw: &[Point3; 21]) -> [Point3; 21] {
        let mut out = [[0.0f32; 3]; 21];
        for i in 0..21 {
            let h = &mut self.history[i];
            let raw_pt = raw[i];

            let effective = match h.prev1 {
                None => raw_pt,
                Some(prev1) => {
                    if planar_dist(prev1, raw_pt) > LANDMARK_MAX_JUMP {
                        match h.prev2 {
                            Some(prev2) => [
                                prev1[0] + (prev1[0] - prev2[0]),
                                prev1[1] + (prev1[1] - prev2[1]),
                                prev1[2] + (prev1[2] - prev2[2]),
                            ],
                            None => prev1,
                        }
                    } else {
                        raw_pt
                    }
                }
            };

            let smoothed = match h.prev1 {
                None => effective,
                Some(prev1) => [
                    ALPHA * effective[0] + (1.0 - ALPHA) * prev1[0],
                    ALPHA * effective[1] + (1.0 - ALPHA) * prev1[1],
                    ALPHA * effective[2] + (1.0 - ALPHA) * prev1[2],
                ],
            };

            h.prev2 = h.prev1;
            h.prev1 = Some(smoothed);
            out[i] = smoothed;
        }
        out
    }

    /// Resets all smoothing history (called when the ring buffer is cleared
    /// on hand loss).
    pub fn reset(&mut self) {
        self.history = Default::default();
    }
}

impl Default for LandmarkFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable snapshot stored in the motion ring buffer.
#[derive(Debug, Clone, Copy)]
pub struct MotionFrame {
    pub timestamp: f64,
    pub landmarks: [Point3; 21],
    pub finger_state: FingerState,
}

/// Fixed-capacity FIFO of [`MotionFrame`]s; the oldest is evicted on push
/// once full.
pub struct MotionBuffer {
    frames: VecDeque<MotionFrame>,
    capacity: usize,
}

impl MotionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: MotionFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn latest(&self) -> Option<&MotionFrame> {
        self.frames.back()
    }

    /// The displacement `(dx, dy)` of `extract(frame)` between the oldest
    /// frame in the last `window` frames and the latest frame. Returns
    /// `None` if fewer than `window` frames are buffered.
    pub fn displacement(
        &self,
        window: usize,
        extract: impl Fn(&MotionFrame) -> (f32, f32),
    ) -> Option<(f32, f32)> {
        if self.frames.len() < window {
            return None;
        }
        let start_idx = self.frames.len() - window;
        let start = extract(&self.frames[start_idx]);
        let end = extract(self.frames.back().unwrap());
        Some((end.0 - start.0, end.1 - start.1))
    }

    /// Iterates the last `window` frames, oldest first. Empty if fewer than
    /// `window` frames are buffered.
    pub fn last_window(&self, window: usize) -> impl Iterator<Item = &MotionFrame> {
        let len = self.frames.len();
        let skip = if len >= window { len - window } else { len + 1 };
        self.frames.iter().skip(skip)
    }

    /// Maximum value of `extract(frame)` over the last `window` frames.
    pub fn window_max(&self, window: usize, extract: impl Fn(&MotionFrame) -> f32) -> Option<f32> {
        if self.frames.len() < window {
            return None;
        }
        self.last_window(window)
            .map(extract)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f32| a.max(v))))
    }
}
