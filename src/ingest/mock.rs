//! Synthetic detection scenarios.
//!
//! `MockSource` replays scripted actors at a fixed frame rate so the assistant can
//! be exercised without a camera or detector.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::FrameSource;
use crate::detect::{BoundingBox, Detection, Frame, Resolution};

const DEFAULT_SEED: u64 = 7;
/// Consecutive empty time after which an auto-restarting scenario starts over.
const IDLE_RESTART_SEC: f32 = 0.5;

/// Box trajectory as `(cx, cy, w, h)` over time since spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Path {
    Static {
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
    },
    /// Moves from `from` to `to` over `duration` seconds, then stays put.
    Linear {
        from: (f32, f32),
        to: (f32, f32),
        duration: f32,
        w: f32,
        h: f32,
    },
}

impl Path {
    fn at(&self, t: f32) -> (f32, f32, f32, f32) {
        match *self {
            Path::Static { cx, cy, w, h } => (cx, cy, w, h),
            Path::Linear {
                from,
                to,
                duration,
                w,
                h,
            } => {
                let u = if duration > 0.0 {
                    t.clamp(0.0, duration) / duration
                } else {
                    1.0
                };
                (
                    from.0 * (1.0 - u) + to.0 * u,
                    from.1 * (1.0 - u) + to.1 * u,
                    w,
                    h,
                )
            }
        }
    }
}

/// One scripted object, visible while `spawn <= t <= despawn`.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub label: String,
    pub spawn: f32,
    pub despawn: f32,
    pub path: Path,
    pub confidence: f32,
    pub color: Option<String>,
}

impl Actor {
    pub fn new(label: &str, spawn: f32, despawn: f32, path: Path, confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            spawn,
            despawn,
            path,
            confidence,
            color: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    Empty,
    /// One person walking from the left edge to the right edge.
    PersonLeftRight,
    /// A standing person, and a dog visible for a single instant at t = 1 s.
    BlinkDog,
    /// Four people in a row and a red car driving right to left from t = 2 s.
    CrowdCar,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Empty,
        Scenario::PersonLeftRight,
        Scenario::BlinkDog,
        Scenario::CrowdCar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Empty => "empty",
            Scenario::PersonLeftRight => "person_lr",
            Scenario::BlinkDog => "blink_dog",
            Scenario::CrowdCar => "crowd_car",
        }
    }

    /// Actors and confidence jitter of the scenario, scripted over `duration` seconds.
    pub fn actors(&self, duration: f32) -> (Vec<Actor>, f32) {
        let person = |cx: f32| Path::Static {
            cx,
            cy: 330.0,
            w: 70.0,
            h: 160.0,
        };
        match self {
            Scenario::Empty => (Vec::new(), 0.0),
            Scenario::PersonLeftRight => (
                vec![Actor::new(
                    "person",
                    0.0,
                    duration,
                    Path::Linear {
                        from: (80.0, 320.0),
                        to: (560.0, 320.0),
                        duration,
                        w: 70.0,
                        h: 160.0,
                    },
                    0.92,
                )],
                0.0,
            ),
            Scenario::BlinkDog => (
                vec![
                    Actor::new(
                        "person",
                        0.0,
                        duration,
                        Path::Static {
                            cx: 200.0,
                            cy: 340.0,
                            w: 70.0,
                            h: 160.0,
                        },
                        0.95,
                    ),
                    Actor::new(
                        "dog",
                        0.98,
                        1.02,
                        Path::Static {
                            cx: 340.0,
                            cy: 380.0,
                            w: 90.0,
                            h: 70.0,
                        },
                        0.7,
                    ),
                ],
                0.0,
            ),
            Scenario::CrowdCar => (
                vec![
                    Actor::new("person", 0.0, duration, person(120.0), 0.9),
                    Actor::new("person", 0.0, duration, person(240.0), 0.88),
                    Actor::new("person", 0.0, duration, person(360.0), 0.86),
                    Actor::new("person", 0.0, duration, person(480.0), 0.9),
                    Actor::new(
                        "car",
                        2.0,
                        duration,
                        Path::Linear {
                            from: (600.0, 420.0),
                            to: (80.0, 420.0),
                            duration: (duration - 2.0).max(0.0),
                            w: 160.0,
                            h: 90.0,
                        },
                        0.85,
                    )
                    .with_color("red"),
                ],
                0.03,
            ),
        }
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s.trim())
            .ok_or_else(|| {
                let names: Vec<&str> = Scenario::ALL.iter().map(|s| s.name()).collect();
                anyhow!("unknown scenario '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

pub struct MockSource {
    name: &'static str,
    actors: Vec<Actor>,
    resolution: Resolution,
    fps: f32,
    jitter: f32,
    rng: StdRng,
    tick: u64,
    idle_ticks: u64,
    auto_restart: bool,
    limit: Option<u64>,
    produced: u64,
}

impl MockSource {
    pub fn new(scenario: Scenario, duration: f32, fps: f32, resolution: Resolution) -> Self {
        let (actors, jitter) = scenario.actors(duration);
        Self {
            name: scenario.name(),
            actors,
            resolution,
            fps: if fps > 0.0 { fps } else { 24.0 },
            jitter,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            tick: 0,
            idle_ticks: 0,
            auto_restart: false,
            limit: None,
            produced: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Starts over after half a second without any detection.
    pub fn with_auto_restart(mut self, enabled: bool) -> Self {
        self.auto_restart = enabled;
        self
    }

    /// Stops after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Scenario time of the next frame, in seconds.
    pub fn time(&self) -> f32 {
        self.tick as f32 / self.fps
    }

    fn clamp_box(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let max_x = self.resolution.width.saturating_sub(1) as f32;
        let max_y = self.resolution.height.saturating_sub(1) as f32;
        BoundingBox::new(
            (cx - w / 2.0).max(0.0),
            (cy - h / 2.0).max(0.0),
            (cx + w / 2.0).min(max_x),
            (cy + h / 2.0).min(max_y),
        )
    }

    fn render(&mut self) -> Frame {
        let t = self.time();
        let mut detections = Vec::new();
        for i in 0..self.actors.len() {
            let actor = &self.actors[i];
            if t < actor.spawn || t > actor.despawn {
                continue;
            }
            let (cx, cy, w, h) = actor.path.at(t - actor.spawn);
            let bbox = self.clamp_box(cx, cy, w, h);
            let label = actor.label.clone();
            let color = actor.color.clone();
            let mut confidence = actor.confidence;
            if self.jitter > 0.0 {
                confidence += self.rng.gen_range(-self.jitter..=self.jitter);
            }
            let mut det = Detection::new(label, confidence.clamp(0.0, 1.0), bbox)
                .with_image_size(self.resolution.width, self.resolution.height);
            if let Some(color) = color {
                det = det.with_color(color);
            }
            detections.push(det);
        }
        Frame::new(detections)
    }
}

impl FrameSource for MockSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        let frame = self.render();
        self.tick += 1;
        self.produced += 1;

        if self.auto_restart {
            self.idle_ticks = if frame.is_empty() { self.idle_ticks + 1 } else { 0 };
            if self.idle_ticks >= (self.fps * IDLE_RESTART_SEC) as u64 {
                log::debug!("mock scenario {} idle, restarting", self.name);
                self.tick = 0;
                self.idle_ticks = 0;
            }
        }
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("mock:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(scenario: Scenario) -> MockSource {
        MockSource::new(scenario, 5.0, 24.0, Resolution::default())
    }

    fn frames(source: &mut MockSource, n: usize) -> Vec<Frame> {
        (0..n)
            .map(|_| source.next_frame().unwrap().expect("unbounded source"))
            .collect()
    }

    #[test]
    fn scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert!("parade".parse::<Scenario>().is_err());
    }

    #[test]
    fn person_walks_left_to_right() {
        let mut src = source(Scenario::PersonLeftRight);
        let all = frames(&mut src, 121);
        let first = &all[0].detections[0];
        let last = &all[120].detections[0];
        assert!(first.bbox.center().0 < 100.0);
        assert!(last.bbox.center().0 > 540.0);
        assert_eq!(first.image_size, Some(Resolution::new(640, 480)));
    }

    #[test]
    fn dog_blinks_for_one_frame() {
        let mut src = source(Scenario::BlinkDog);
        let dog_frames = frames(&mut src, 72)
            .iter()
            .filter(|f| f.iter().any(|d| d.label == "dog"))
            .count();
        assert_eq!(dog_frames, 1);
    }

    #[test]
    fn car_appears_after_two_seconds_in_red() {
        let mut src = source(Scenario::CrowdCar);
        let all = frames(&mut src, 72);
        assert!(all[47].iter().all(|d| d.label == "person"));
        let car = all[48].iter().find(|d| d.label == "car").expect("car at t=2s");
        assert_eq!(car.color.as_deref(), Some("red"));
        assert_eq!(all[48].iter().filter(|d| d.label == "person").count(), 4);
        for frame in &all {
            assert!(frame.iter().all(|d| (0.0..=1.0).contains(&d.confidence)));
        }
    }

    #[test]
    fn same_seed_same_jitter() {
        let a = frames(&mut source(Scenario::CrowdCar).with_seed(3), 10);
        let b = frames(&mut source(Scenario::CrowdCar).with_seed(3), 10);
        assert_eq!(a, b);
    }

    #[test]
    fn boxes_are_clamped_to_image() {
        let mut src = MockSource::new(Scenario::PersonLeftRight, 5.0, 24.0, Resolution::new(100, 100));
        for frame in frames(&mut src, 10) {
            for det in &frame {
                assert!(det.bbox.x1 >= 0.0 && det.bbox.x2 <= 99.0);
                assert!(det.bbox.y1 >= 0.0 && det.bbox.y2 <= 99.0);
            }
        }
    }

    #[test]
    fn limit_and_auto_restart() {
        let mut src = MockSource::new(Scenario::PersonLeftRight, 1.0, 24.0, Resolution::default())
            .with_auto_restart(true)
            .with_limit(100);
        let all: Vec<Frame> = std::iter::from_fn(|| src.next_frame().unwrap()).collect();
        assert_eq!(all.len(), 100);
        // 25 frames of walking, 12 idle frames, then the walk starts over
        assert!(all[24].len() == 1);
        assert!(all[25..37].iter().all(Frame::is_empty));
        assert_eq!(all[37].len(), 1);
    }
}
