//! Gesture-recognition pipeline: camera acquisition, landmark filtering,
//! finger-state derivation, and the ordered gesture classifier.

pub mod detectors;
pub mod emit;
pub mod finger_state;
pub mod landmarks;
pub mod pipeline;
pub mod source;

pub use detectors::{Classifier, GestureEvent, GestureLabel};
pub use pipeline::GesturePipeline;
