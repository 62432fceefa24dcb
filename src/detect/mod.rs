//! Detection and frame model shared by every other module.
//!
//! Detections arrive from an external detector; this crate never runs a model.

mod result;

pub use result::{BoundingBox, Detection, DetectionRecord, Frame, Resolution};
