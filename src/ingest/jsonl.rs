//! JSON-lines detection feed.
//!
//! Each line is one frame: a JSON array of detection records, e.g.
//! `[{"label":"person","conf":0.92,"box":[50,120,220,460],"img_w":640,"img_h":480}]`.
//! Blank lines are frames with no detections.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::detect::{Detection, DetectionRecord, Frame};

/// Parses one frame: a JSON array of detection records, or a single record.
pub fn parse_frame(text: &str) -> Result<Frame> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Frame::default());
    }
    let records: Vec<DetectionRecord> = if trimmed.starts_with('{') {
        vec![serde_json::from_str(trimmed)?]
    } else {
        serde_json::from_str(trimmed)?
    };
    Ok(Frame::new(records.into_iter().map(Detection::from).collect()))
}

pub struct JsonLinesSource<R> {
    reader: R,
    origin: String,
    line_no: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R, origin: impl Into<String>) -> Self {
        Self {
            reader,
            origin: origin.into(),
            line_no: 0,
        }
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open detection feed {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead + Send> FrameSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .with_context(|| format!("failed to read {}", self.origin))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        parse_frame(&line)
            .map(Some)
            .map_err(|e| anyhow!("{}:{}: invalid frame: {}", self.origin, self.line_no, e))
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.origin)
    }
}

/// Reads every frame of a JSON-lines recording.
pub fn read_history(path: &Path) -> Result<Vec<Frame>> {
    let mut source = JsonLinesSource::open(path)?;
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame()? {
        frames.push(frame);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Resolution;

    #[test]
    fn reads_frames_line_by_line() -> Result<()> {
        let feed = concat!(
            r#"[{"label":"person","conf":0.92,"box":[50,120,220,460],"img_w":640,"img_h":480}]"#,
            "\n\n",
            r#"[{"label":"Dog","confidence":0.7,"box":[460,420,360,300],"color":"Brown"}]"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(feed.as_bytes(), "inline");

        let first = source.next_frame()?.expect("first frame");
        assert_eq!(first.len(), 1);
        assert_eq!(first.detections[0].image_size, Some(Resolution::new(640, 480)));

        assert!(source.next_frame()?.expect("blank frame").is_empty());

        let third = source.next_frame()?.expect("third frame").sanitized(Resolution::default());
        let dog = &third.detections[0];
        assert_eq!(dog.label, "dog");
        assert_eq!(dog.color.as_deref(), Some("brown"));
        assert_eq!(dog.bbox.x1, 360.0);

        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn malformed_line_reports_position() {
        let feed = "[]\n[{\"label\":\"cup\"}]\n";
        let mut source = JsonLinesSource::new(feed.as_bytes(), "feed.jsonl");
        assert!(source.next_frame().unwrap().unwrap().is_empty());
        let err = source.next_frame().unwrap_err().to_string();
        assert!(err.starts_with("feed.jsonl:2:"), "{err}");
    }

    #[test]
    fn single_object_is_a_one_detection_frame() -> Result<()> {
        let frame = parse_frame(r#"{"label":"cup","conf":0.8,"box":[1,2,3,4]}"#)?;
        assert_eq!(frame.len(), 1);
        Ok(())
    }
}
