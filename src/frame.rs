//! Temporal buffer of recent detection frames.
//!
//! - `TemporalBuffer`: bounded ring of frames sized as `round(fps * max_window_sec)`.
//! - Windowed queries (`count`, `present`, `location`) smooth over single-frame flicker.
//!
//! One producer ingests at the detector cadence while consumers query on command
//! arrival. Ingest is atomic under the buffer lock and every query copies its window
//! out under the same lock before iterating, so readers never see a torn sequence.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::detect::{Detection, Frame, Resolution};
use crate::spatial::{detection_region, DetectionFilter, HorizontalRegion, Region};

pub const DEFAULT_WINDOW_SEC: f32 = 0.6;
pub const DEFAULT_PERSIST_FRAC: f32 = 0.6;
pub const DEFAULT_MAX_WINDOW_SEC: f32 = 2.0;

/// Horizontal distribution of detections, one slot per third of the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HorizontalBreakdown {
    pub left: usize,
    pub center: usize,
    pub right: usize,
}

impl HorizontalBreakdown {
    pub fn add(&mut self, region: HorizontalRegion) {
        match region {
            HorizontalRegion::Left => self.left += 1,
            HorizontalRegion::Center => self.center += 1,
            HorizontalRegion::Right => self.right += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.center == 0 && self.right == 0
    }
}

/// Snapshot of buffer occupancy, used by the `debug:status` command.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferStatus {
    pub frames_in_buffer: usize,
    pub capacity: usize,
    pub window_frames: usize,
    pub last_detections: usize,
    /// Labels in the newest frame with their counts, in first-seen order.
    pub last_labels: Vec<(String, usize)>,
}

pub struct TemporalBuffer {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    fps: f32,
    resolution: Resolution,
}

impl TemporalBuffer {
    /// Creates a buffer holding `round(fps * max_window_sec)` frames (at least one).
    pub fn new(fps: f32, max_window_sec: f32, resolution: Resolution) -> Self {
        let capacity = (fps * max_window_sec).round();
        let capacity = if capacity.is_finite() && capacity >= 1.0 {
            capacity as usize
        } else {
            1
        };
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            fps,
            resolution,
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the deque half-updated, so a
    // poisoned guard is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validates a frame, fills missing image sizes and appends it, evicting the
    /// oldest frame when full.
    pub fn ingest(&self, frame: Frame) {
        let frame = frame.sanitized(self.resolution);
        let mut frames = self.lock();
        while frames.len() >= self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Number of frames a window of `window_sec` covers right now.
    pub fn window_len(&self, window_sec: f32) -> usize {
        self.frames_for(window_sec).min(self.len())
    }

    fn frames_for(&self, window_sec: f32) -> usize {
        let n = (self.fps * window_sec).round();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }

    /// Copies the trailing window, oldest first.
    pub fn window(&self, window_sec: f32) -> Vec<Frame> {
        let wanted = self.frames_for(window_sec);
        let frames = self.lock();
        let n = wanted.min(frames.len());
        frames.iter().skip(frames.len() - n).cloned().collect()
    }

    /// Median of the per-frame filtered counts across the window.
    ///
    /// The median rides out flicker and single-frame misses better than the mean.
    /// Even-length windows average the two middle values, so the result may end
    /// in `.5`. An empty window counts zero.
    pub fn count(&self, filter: &DetectionFilter<'_>, window_sec: f32) -> f32 {
        let window = self.window(window_sec);
        let per_frame: Vec<usize> = window
            .iter()
            .map(|frame| filter.count(frame, self.resolution))
            .collect();
        median(per_frame)
    }

    /// True when at least `persist_frac` of the window frames hold `min_count` or
    /// more matching detections. An empty window is never present.
    pub fn present(
        &self,
        filter: &DetectionFilter<'_>,
        window_sec: f32,
        persist_frac: f32,
        min_count: u32,
    ) -> bool {
        let window = self.window(window_sec);
        if window.is_empty() {
            return false;
        }
        let min_count = min_count.max(1) as usize;
        let hits = window
            .iter()
            .filter(|frame| filter.count(frame, self.resolution) >= min_count)
            .count();
        let frac = hits as f32 / window.len() as f32;
        log::debug!(
            "presence {:?}: {}/{} frames hit (need {:.2})",
            filter.label,
            hits,
            window.len(),
            persist_frac
        );
        frac >= persist_frac
    }

    /// Majority region of matching detections across the window.
    ///
    /// Each detection votes once for its horizontal and once for its vertical bucket.
    /// On a tie the bucket that first received a vote wins.
    pub fn location(&self, label: Option<&str>, threshold: f32, window_sec: f32) -> Option<Region> {
        let filter = DetectionFilter::new(threshold).label(label);
        let mut votes: Vec<(Region, usize)> = Vec::new();
        let mut vote = |region: Region| match votes.iter_mut().find(|(r, _)| *r == region) {
            Some((_, n)) => *n += 1,
            None => votes.push((region, 1)),
        };
        for frame in self.window(window_sec) {
            for det in filter.apply(&frame, self.resolution) {
                let (h, v) = detection_region(det, self.resolution);
                vote(h.into());
                vote(v.into());
            }
        }
        let mut best: Option<(Region, usize)> = None;
        for (region, n) in votes {
            if best.is_none_or(|(_, top)| n > top) {
                best = Some((region, n));
            }
        }
        best.map(|(region, _)| region)
    }

    /// Labels seen in the window with their total number of qualifying detections,
    /// in first-seen order.
    pub fn label_totals(&self, threshold: f32, window_sec: f32) -> Vec<(String, usize)> {
        let filter = DetectionFilter::new(threshold);
        let mut totals: Vec<(String, usize)> = Vec::new();
        for frame in self.window(window_sec) {
            for det in filter.apply(&frame, self.resolution) {
                tally(&mut totals, &det.label);
            }
        }
        totals
    }

    /// Detections above `threshold` across the window, oldest frame first.
    pub fn detections(&self, threshold: f32, window_sec: f32) -> Vec<Detection> {
        let filter = DetectionFilter::new(threshold);
        self.window(window_sec)
            .into_iter()
            .flat_map(|frame| frame.detections)
            .filter(|det| filter.matches(det, self.resolution))
            .collect()
    }

    pub fn status(&self, window_sec: f32) -> BufferStatus {
        let window_frames = self.window_len(window_sec);
        let frames = self.lock();
        let mut last_labels = Vec::new();
        let last_detections = frames.back().map_or(0, |frame| {
            for det in frame {
                tally(&mut last_labels, &det.label);
            }
            frame.len()
        });
        BufferStatus {
            frames_in_buffer: frames.len(),
            capacity: self.capacity,
            window_frames,
            last_detections,
            last_labels,
        }
    }
}

impl Default for TemporalBuffer {
    fn default() -> Self {
        Self::new(24.0, DEFAULT_MAX_WINDOW_SEC, Resolution::default())
    }
}

pub(crate) fn tally(counts: &mut Vec<(String, usize)>, label: &str) {
    match counts.iter_mut().find(|(l, _)| l == label) {
        Some((_, n)) => *n += 1,
        None => counts.push((label.to_string(), 1)),
    }
}

/// Median of integer samples; the mean of the two middle values for even lengths.
pub fn median(mut values: Vec<usize>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid] as f32
    } else {
        (values[mid - 1] + values[mid]) as f32 / 2.0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
