//! Wires a [`FrameSource`] and [`LandmarkDetector`] through the landmark
//! filter and classifier, emitting gesture events as they fire.

use crate::gesture::detectors::Classifier;
use crate::gesture::emit::GestureEmitter;
use crate::gesture::finger_state::derive_finger_state;
use crate::gesture::landmarks::{LandmarkFilter, MotionBuffer, MotionFrame, N_BUF};
use crate::gesture::source::{FrameSource, LandmarkDetector};
use log::debug;

pub struct GesturePipeline {
    source: Box<dyn FrameSource>,
    detector: Box<dyn LandmarkDetector>,
    filter: LandmarkFilter,
    buffer: MotionBuffer,
    classifier: Classifier,
    emitter: GestureEmitter,
}

impl GesturePipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
        emitter: GestureEmitter,
    ) -> Self {
        Self {
            source,
            detector,
            filter: LandmarkFilter::new(),
            buffer: MotionBuffer::new(N_BUF),
            classifier: Classifier::new(),
            emitter,
        }
    }

    /// Processes frames until the source is exhausted, driving `clock` for
    /// each frame's timestamp. Returns the number of frames processed.
    pub fn run(&mut self, mut clock: impl FnMut() -> f64) -> usize {
        let mut processed = 0;
        while let Some(frame) = self.source.read() {
            let now = clock();
            self.step(&frame, now);
            processed += 1;
        }
        self.source.release();
        processed
    }

    /// Processes one already-acquired camera frame; exposed separately from
    /// [`run`] so tests can drive the pipeline frame-by-frame.
    pub fn step(&mut self, frame: &crate::gesture::source::CameraFrame, now: f64) {
        match self.detector.detect(frame) {
            None => {
                self.buffer.clear();
                self.filter.reset();
                self.classifier.reset_latches();
            }
            Some(obs) => {
                let smoothed = self.filter.push(&obs.landmarks);
                let finger_state = derive_finger_state(&smoothed);
                self.buffer.push(MotionFrame {
                    timestamp: now,
                    landmarks: smoothed,
                    finger_state,
                });
                if let Some(event) = self.classifier.classify(&self.buffer, now) {
                    debug!("gesture fired: {:?}", event.gesture);
                    self.emitter.emit(event);
                }
            }
        }
    }
}
