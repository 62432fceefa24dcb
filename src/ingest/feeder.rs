//! Feeder thread: pulls frames from a source into the shared temporal buffer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::detect::Frame;
use crate::frame::TemporalBuffer;

/// Announces hazardous labels, at most once per label per cooldown.
#[derive(Clone, Debug)]
pub struct HazardWatch {
    labels: Vec<String>,
    threshold: f32,
    cooldown: Duration,
    last_spoken: HashMap<String, Instant>,
}

impl HazardWatch {
    pub fn new(labels: Vec<String>, threshold: f32, cooldown: Duration) -> Self {
        Self {
            labels: labels.into_iter().map(|l| l.to_lowercase()).collect(),
            threshold,
            cooldown,
            last_spoken: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Announcements due for `frame` observed at `now`.
    pub fn observe(&mut self, frame: &Frame, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        for det in frame {
            if det.confidence < self.threshold || !self.labels.contains(&det.label) {
                continue;
            }
            let cooled = self
                .last_spoken
                .get(&det.label)
                .is_none_or(|at| now.duration_since(*at) > self.cooldown);
            if cooled {
                self.last_spoken.insert(det.label.clone(), now);
                due.push(format!("Hazard detected: {}.", det.label));
            }
        }
        due
    }
}

pub struct FeederOptions {
    /// Pause between frames.
    pub period: Duration,
    pub hazards: Option<(HazardWatch, Sender<String>)>,
}

impl FeederOptions {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            hazards: None,
        }
    }

    pub fn with_hazards(mut self, watch: HazardWatch, announcements: Sender<String>) -> Self {
        if !watch.is_empty() {
            self.hazards = Some((watch, announcements));
        }
        self
    }
}

pub struct FeedHandle {
    frames: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Frames ingested so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|join| join.is_finished())
    }

    /// Signals the feeder to stop and waits for it. Returns the frame count.
    pub fn stop(mut self) -> Result<u64> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wait()
    }

    /// Waits for the source to run dry. Returns the frame count.
    pub fn join(mut self) -> Result<u64> {
        self.wait()
    }

    fn wait(&mut self) -> Result<u64> {
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("feeder thread panicked"))?;
        }
        Ok(self.frames())
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Runs `source` on a named thread, ingesting every frame into `buffer`.
///
/// The thread stops when the source is exhausted, when it fails (logged), or when
/// the handle is stopped or dropped.
pub fn spawn_feeder(
    mut source: Box<dyn FrameSource>,
    buffer: Arc<TemporalBuffer>,
    options: FeederOptions,
) -> Result<FeedHandle> {
    let frames = Arc::new(AtomicU64::new(0));
    let shutdown = Arc::new(AtomicBool::new(false));
    let frames_thread = frames.clone();
    let shutdown_thread = shutdown.clone();
    let FeederOptions {
        period,
        mut hazards,
    } = options;

    let join = std::thread::Builder::new()
        .name("feeder".to_string())
        .spawn(move || {
            log::info!("feeder started: {}", source.describe());
            while !shutdown_thread.load(Ordering::SeqCst) {
                let frame = match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        log::info!("feeder: {} exhausted", source.describe());
                        break;
                    }
                    Err(err) => {
                        log::error!("feeder stopped: {:#}", err);
                        break;
                    }
                };
                let frame = frame.sanitized(buffer.resolution());
                if let Some((watch, tx)) = hazards.as_mut() {
                    for announcement in watch.observe(&frame, Instant::now()) {
                        if tx.send(announcement).is_err() {
                            log::debug!("hazard listener gone");
                        }
                    }
                }
                log::debug!("feeder: ingesting frame with {} detection(s)", frame.len());
                buffer.ingest(frame);
                frames_thread.fetch_add(1, Ordering::SeqCst);
                if !period.is_zero() {
                    std::thread::sleep(period);
                }
            }
        })
        .context("failed to spawn feeder thread")?;

    Ok(FeedHandle {
        frames,
        shutdown,
        join: Some(join),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, Resolution};
    use crate::ingest::{MockSource, Scenario};
    use std::sync::mpsc;

    fn knife(conf: f32) -> Frame {
        Frame::new(vec![Detection::new(
            "knife",
            conf,
            BoundingBox::new(10.0, 10.0, 50.0, 50.0),
        )])
    }

    #[test]
    fn hazard_cooldown_is_per_label() {
        let mut watch = HazardWatch::new(
            vec!["knife".into(), "fire".into()],
            0.5,
            Duration::from_secs(3),
        );
        let t0 = Instant::now();
        assert_eq!(watch.observe(&knife(0.9), t0), vec!["Hazard detected: knife."]);
        assert!(watch.observe(&knife(0.9), t0 + Duration::from_secs(1)).is_empty());
        assert!(watch.observe(&knife(0.3), t0 + Duration::from_secs(5)).is_empty());
        assert_eq!(watch.observe(&knife(0.9), t0 + Duration::from_secs(4)).len(), 1);
    }

    #[test]
    fn feeder_drains_bounded_source() -> Result<()> {
        let buffer = Arc::new(TemporalBuffer::new(24.0, 2.0, Resolution::default()));
        let source = MockSource::new(Scenario::CrowdCar, 6.0, 24.0, Resolution::default())
            .with_limit(30);
        let handle = spawn_feeder(
            Box::new(source),
            buffer.clone(),
            FeederOptions::new(Duration::ZERO),
        )?;
        assert_eq!(handle.join()?, 30);
        assert_eq!(buffer.len(), 30);
        Ok(())
    }

    #[test]
    fn feeder_stops_on_request_and_announces_hazards() -> Result<()> {
        struct Knives;
        impl FrameSource for Knives {
            fn next_frame(&mut self) -> Result<Option<Frame>> {
                Ok(Some(knife(0.9)))
            }
            fn describe(&self) -> String {
                "knives".into()
            }
        }

        let buffer = Arc::new(TemporalBuffer::default());
        let (tx, rx) = mpsc::channel();
        let watch = HazardWatch::new(vec!["knife".into()], 0.5, Duration::from_secs(60));
        let handle = spawn_feeder(
            Box::new(Knives),
            buffer.clone(),
            FeederOptions::new(Duration::from_millis(1)).with_hazards(watch, tx),
        )?;
        let first = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(first, "Hazard detected: knife.");
        let frames = handle.stop()?;
        assert!(frames >= 1);
        assert!(buffer.len() <= buffer.capacity());
        // one announcement per cooldown
        assert!(rx.try_recv().is_err());
        Ok(())
    }
}
