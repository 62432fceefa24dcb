//! Scene Assist
//!
//! Command interpretation and temporal aggregation for a spoken-command assistant
//! that answers questions about a live stream of object detections.
//!
//! # Architecture
//!
//! A feeder pushes one detection [`Frame`] per detector tick into a shared
//! [`TemporalBuffer`]. Each command is parsed into [`CommandSlots`], optionally
//! reclassified by the semantic fallback, and executed against the buffered window
//! to produce a short reply such as "1 person on the left.".
//!
//! Answers come from a sliding window rather than the latest frame, so single-frame
//! detector flicker neither creates nor hides objects.
//!
//! # Module Structure
//!
//! - `detect`: Detection and frame model, wire records
//! - `vocab`: Synonyms, colors, number words, pluralization
//! - `spatial`: Region classification and detection filters
//! - `parse`: Intent classification and slot extraction
//! - `frame`: Temporal buffer and windowed queries
//! - `answer`: Per-intent executors over a frame or the buffer
//! - `semantic`: Intent reclassification (feature `semantic`)
//! - `assistant`: The command pipeline and utility commands
//! - `capture`: Command sources and reply sinks
//! - `ingest`: Frame sources and the feeder thread
//! - `config`: File and environment configuration

pub mod answer;
pub mod assistant;
pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod parse;
pub mod semantic;
pub mod spatial;
pub mod vocab;

pub use answer::{AlertSpec, WindowSettings};
pub use assistant::{Assistant, UtilityCommand};
pub use capture::{CaptureError, CommandSource, ReplySink};
pub use config::AssistConfig;
pub use detect::{BoundingBox, Detection, DetectionRecord, Frame, Resolution};
pub use frame::TemporalBuffer;
pub use ingest::{spawn_feeder, FeedHandle, FrameSource};
pub use parse::{CommandParser, CommandSlots, Intent};
pub use semantic::{IntentReclassifier, NoopReclassifier, Reclassification};
#[cfg(feature = "semantic")]
pub use semantic::{HashingEmbedder, SemanticMatcher};
pub use spatial::{DetectionFilter, Region};
