//! Coarse spatial reasoning over bounding boxes.
//!
//! The image is split into thirds horizontally and halves vertically. Every box
//! center falls into exactly one horizontal and one vertical bucket.

use std::fmt;

use crate::detect::{BoundingBox, Detection, Frame, Resolution};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HorizontalRegion {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerticalRegion {
    Top,
    Bottom,
}

/// A region a command can ask about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    Left,
    Right,
    Center,
    Top,
    Bottom,
}

impl Region {
    /// Parses a region keyword. "middle" is an alias of center.
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "center" | "centre" | "middle" => Some(Self::Center),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    /// Prepositional phrase used in spoken replies ("on the left", "at the top").
    pub fn phrase(&self) -> String {
        match self {
            Self::Left | Self::Right => format!("on the {}", self.as_str()),
            Self::Center => "in the center".to_string(),
            Self::Top | Self::Bottom => format!("at the {}", self.as_str()),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HorizontalRegion> for Region {
    fn from(h: HorizontalRegion) -> Self {
        match h {
            HorizontalRegion::Left => Self::Left,
            HorizontalRegion::Center => Self::Center,
            HorizontalRegion::Right => Self::Right,
        }
    }
}

impl From<VerticalRegion> for Region {
    fn from(v: VerticalRegion) -> Self {
        match v {
            VerticalRegion::Top => Self::Top,
            VerticalRegion::Bottom => Self::Bottom,
        }
    }
}

/// Classifies a box by its center point.
pub fn region_of(
    bbox: &BoundingBox,
    image_w: u32,
    image_h: u32,
) -> (HorizontalRegion, VerticalRegion) {
    let (cx, cy) = bbox.center();
    let w = image_w as f32;
    let h = image_h as f32;
    let horizontal = if cx < w / 3.0 {
        HorizontalRegion::Left
    } else if cx < 2.0 * w / 3.0 {
        HorizontalRegion::Center
    } else {
        HorizontalRegion::Right
    };
    let vertical = if cy < h / 2.0 {
        VerticalRegion::Top
    } else {
        VerticalRegion::Bottom
    };
    (horizontal, vertical)
}

/// Region buckets of a detection, using `fallback` when it carries no image size.
pub fn detection_region(
    det: &Detection,
    fallback: Resolution,
) -> (HorizontalRegion, VerticalRegion) {
    let size = det.image_size_or(fallback);
    region_of(&det.bbox, size.width, size.height)
}

pub fn matches_region(det: &Detection, want: Option<Region>, fallback: Resolution) -> bool {
    let Some(want) = want else {
        return true;
    };
    let (h, v) = detection_region(det, fallback);
    want == Region::from(h) || want == Region::from(v)
}

pub fn matches_color(det: &Detection, want: Option<&str>) -> bool {
    match want {
        None => true,
        Some(color) => det.color.as_deref() == Some(color),
    }
}

/// Normalized Manhattan distance between the box center and the image center.
pub fn center_offset(det: &Detection, fallback: Resolution) -> f32 {
    let size = det.image_size_or(fallback);
    let (w, h) = (size.width.max(1) as f32, size.height.max(1) as f32);
    let (cx, cy) = det.bbox.center();
    (cx - w / 2.0).abs() / w + (cy - h / 2.0).abs() / h
}

/// Predicate applied to every detection by frame and window queries.
#[derive(Clone, Copy, Debug)]
pub struct DetectionFilter<'a> {
    pub label: Option<&'a str>,
    pub threshold: f32,
    pub region: Option<Region>,
    pub color: Option<&'a str>,
}

impl<'a> DetectionFilter<'a> {
    pub fn new(threshold: f32) -> Self {
        Self {
            label: None,
            threshold,
            region: None,
            color: None,
        }
    }

    pub fn label(mut self, label: Option<&'a str>) -> Self {
        self.label = label;
        self
    }

    pub fn region(mut self, region: Option<Region>) -> Self {
        self.region = region;
        self
    }

    pub fn color(mut self, color: Option<&'a str>) -> Self {
        self.color = color;
        self
    }

    pub fn matches(&self, det: &Detection, fallback: Resolution) -> bool {
        if det.confidence < self.threshold {
            return false;
        }
        if self.label.is_some_and(|label| det.label != label) {
            return false;
        }
        matches_region(det, self.region, fallback) && matches_color(det, self.color)
    }

    pub fn apply<'f>(&self, frame: &'f Frame, fallback: Resolution) -> Vec<&'f Detection> {
        frame
            .iter()
            .filter(|det| self.matches(det, fallback))
            .collect()
    }

    pub fn count(&self, frame: &Frame, fallback: Resolution) -> usize {
        frame
            .iter()
            .filter(|det| self.matches(det, fallback))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, conf: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(label, conf, BoundingBox::new(x1, y1, x2, y2)).with_image_size(640, 480)
    }

    #[test]
    fn region_boundaries_resolve_to_higher_bucket() {
        // cx == w/3 and cx == 2w/3 exactly
        let b = BoundingBox::new(190.0, 0.0, 210.0, 0.0);
        let (h, _) = region_of(&b, 600, 480);
        assert_eq!(h, HorizontalRegion::Center);
        let b = BoundingBox::new(390.0, 0.0, 410.0, 0.0);
        let (h, _) = region_of(&b, 600, 480);
        assert_eq!(h, HorizontalRegion::Right);

        // cy == h/2 exactly
        let b = BoundingBox::new(0.0, 240.0, 0.0, 240.0);
        let (_, v) = region_of(&b, 640, 480);
        assert_eq!(v, VerticalRegion::Bottom);

        let b = BoundingBox::new(639.0, 0.0, 640.0, 1.0);
        assert_eq!(
            region_of(&b, 640, 480),
            (HorizontalRegion::Right, VerticalRegion::Top)
        );
    }

    #[test]
    fn region_partition_is_exhaustive_and_disjoint() {
        let (w, h) = (90u32, 60u32);
        for x in 0..=w {
            for y in 0..=h {
                let b = BoundingBox::new(x as f32, y as f32, x as f32, y as f32);
                let (hr, vr) = region_of(&b, w, h);
                let horizontal_hits = [
                    HorizontalRegion::Left,
                    HorizontalRegion::Center,
                    HorizontalRegion::Right,
                ]
                .iter()
                .filter(|r| **r == hr)
                .count();
                let vertical_hits = [VerticalRegion::Top, VerticalRegion::Bottom]
                    .iter()
                    .filter(|r| **r == vr)
                    .count();
                assert_eq!(horizontal_hits, 1);
                assert_eq!(vertical_hits, 1);
            }
        }
    }

    #[test]
    fn middle_is_center() {
        assert_eq!(Region::parse("middle"), Some(Region::Center));
        assert_eq!(Region::parse("Left"), Some(Region::Left));
        assert_eq!(Region::parse("front"), None);
    }

    #[test]
    fn absent_filters_always_match() {
        let d = det("dog", 0.7, 360.0, 300.0, 460.0, 420.0);
        assert!(matches_region(&d, None, Resolution::default()));
        assert!(matches_color(&d, None));
        assert!(!matches_color(&d, Some("brown")));
        assert!(matches_color(&d.clone().with_color("brown"), Some("brown")));
    }

    #[test]
    fn region_filter_matches_either_axis() {
        let d = det("dog", 0.7, 360.0, 300.0, 460.0, 420.0);
        assert!(matches_region(&d, Some(Region::Center), Resolution::default()));
        assert!(matches_region(&d, Some(Region::Bottom), Resolution::default()));
        assert!(!matches_region(&d, Some(Region::Left), Resolution::default()));
        assert!(!matches_region(&d, Some(Region::Top), Resolution::default()));
    }

    #[test]
    fn higher_threshold_never_returns_more() {
        let frame = Frame::new(vec![
            det("person", 0.92, 50.0, 120.0, 220.0, 460.0),
            det("person", 0.81, 420.0, 130.0, 560.0, 460.0),
            det("dog", 0.76, 360.0, 300.0, 460.0, 420.0),
            det("cup", 0.31, 10.0, 10.0, 20.0, 20.0),
        ]);
        let mut previous = usize::MAX;
        for step in 0..=20 {
            let t = step as f32 / 20.0;
            let kept = DetectionFilter::new(t).apply(&frame, Resolution::default());
            assert!(kept.iter().all(|d| d.confidence >= t));
            assert!(kept.len() <= previous);
            previous = kept.len();
        }
    }
}
