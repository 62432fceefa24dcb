use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left, `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Box area, floored at one square pixel.
    pub fn area(&self) -> f32 {
        ((self.x2 - self.x1) * (self.y2 - self.y1)).max(1.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Reorders corners so that `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }
}

/// One recognized object instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Source image size. `None` until ingestion fills in the configured default.
    pub image_size: Option<Resolution>,
    pub color: Option<String>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
            image_size: None,
            color: None,
        }
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some(Resolution::new(width, height));
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn image_size_or(&self, fallback: Resolution) -> Resolution {
        self.image_size.unwrap_or(fallback)
    }

    /// Validates a detection at the ingestion boundary.
    ///
    /// Returns `None` for records that cannot take part in any query (empty label,
    /// non-finite confidence or box coordinates). Otherwise clamps confidence,
    /// reorders box corners and fills in missing image dimensions.
    pub fn sanitized(mut self, fallback: Resolution) -> Option<Self> {
        if self.label.trim().is_empty()
            || !self.confidence.is_finite()
            || !self.bbox.is_finite()
        {
            return None;
        }
        self.label = self.label.trim().to_lowercase();
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.bbox = self.bbox.normalized();
        if self.image_size.is_none_or(|size| size.width == 0 || size.height == 0) {
            self.image_size = Some(fallback);
        }
        self.color = self
            .color
            .map(|color| color.trim().to_lowercase())
            .filter(|color| !color.is_empty());
        Some(self)
    }
}

/// All detections observed at one sampling tick. Order carries no meaning.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    /// Applies [`Detection::sanitized`] to every detection, dropping rejects.
    pub fn sanitized(self, fallback: Resolution) -> Self {
        let before = self.detections.len();
        let detections: Vec<Detection> = self
            .detections
            .into_iter()
            .filter_map(|det| det.sanitized(fallback))
            .collect();
        if detections.len() != before {
            log::debug!(
                "dropped {} malformed detection(s) at ingestion",
                before - detections.len()
            );
        }
        Self { detections }
    }
}

impl From<Vec<Detection>> for Frame {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Wire form of a detection as produced by an external detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub label: String,
    #[serde(alias = "confidence")]
    pub conf: f32,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    #[serde(default)]
    pub img_w: Option<u32>,
    #[serde(default)]
    pub img_h: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
}

impl From<DetectionRecord> for Detection {
    fn from(record: DetectionRecord) -> Self {
        let [x1, y1, x2, y2] = record.bbox;
        let image_size = match (record.img_w, record.img_h) {
            (Some(width), Some(height)) => Some(Resolution::new(width, height)),
            _ => None,
        };
        Detection {
            label: record.label,
            confidence: record.conf,
            bbox: BoundingBox::new(x1, y1, x2, y2),
            image_size,
            color: record.color,
        }
    }
}
