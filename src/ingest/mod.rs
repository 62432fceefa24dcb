//! Detection frame sources.
//!
//! This module provides different sources of detection frames:
//! - Scripted synthetic scenarios (`mock`)
//! - JSON-lines recordings from an external detector (`jsonl`)
//!
//! Sources run on the feeder thread (`feeder`), which pushes every frame into the
//! shared `TemporalBuffer` at the detector cadence. The ingestion layer is
//! responsible for:
//! - Producing one `Frame` per detector tick
//! - Announcing hazardous labels as they appear
//!
//! The ingestion layer MUST NOT answer commands or hold history of its own.

use anyhow::Result;

use crate::detect::Frame;

pub mod feeder;
pub mod jsonl;
pub mod mock;

pub use feeder::{spawn_feeder, FeedHandle, FeederOptions, HazardWatch};
pub use jsonl::JsonLinesSource;
pub use mock::{MockSource, Scenario};

/// Producer of detection frames, one per detector tick.
pub trait FrameSource: Send {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Short human-readable name for logs.
    fn describe(&self) -> String;
}
