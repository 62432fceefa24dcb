//! Command pipeline: parse, optionally reclassify, then execute against the
//! buffered window or a single frame.

use anyhow::Result;

use crate::answer::{self, WindowSettings};
use crate::capture::{capture, Capture, CommandSource, ReplySink};
use crate::config::AssistConfig;
use crate::detect::{Detection, Frame, Resolution};
use crate::frame::TemporalBuffer;
use crate::parse::{CommandParser, CommandSlots};
use crate::semantic::{IntentReclassifier, NoopReclassifier};

const VERY_CLOSE_AREA: f32 = 0.06;
const NEARBY_AREA: f32 = 0.02;

/// Shortcut commands answered from the buffer without going through the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UtilityCommand {
    Status,
    Objects,
    Closest,
}

impl UtilityCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let t = text.trim().to_lowercase();
        if t.starts_with("debug:status") {
            return Some(Self::Status);
        }
        match t.as_str() {
            "objects" | "speak objects" | "say objects" | "a" => Some(Self::Objects),
            "closest" | "speak closest" | "d" => Some(Self::Closest),
            _ => None,
        }
    }
}

/// Coarse distance bucket from a box's share of the image area.
pub fn proximity(normalized_area: f32) -> &'static str {
    if normalized_area >= VERY_CLOSE_AREA {
        "very close"
    } else if normalized_area >= NEARBY_AREA {
        "nearby"
    } else {
        "far"
    }
}

/// The largest box wins; the first one on ties.
fn closest<'a>(detections: &'a [Detection], fallback: Resolution) -> Option<(&'a Detection, f32)> {
    let mut best: Option<(&Detection, f32)> = None;
    for det in detections {
        let area = det.bbox.area();
        if best.is_none_or(|(top, _)| area > top.bbox.area()) {
            let size = det.image_size_or(fallback);
            let image_area = (size.width.max(1) as f32) * (size.height.max(1) as f32);
            best = Some((det, area / image_area));
        }
    }
    best
}

pub struct Assistant {
    parser: CommandParser,
    reclassifier: Box<dyn IntentReclassifier>,
    settings: WindowSettings,
}

impl Assistant {
    pub fn new(
        parser: CommandParser,
        reclassifier: Box<dyn IntentReclassifier>,
        settings: WindowSettings,
    ) -> Self {
        Self {
            parser,
            reclassifier,
            settings,
        }
    }

    /// Builds the pipeline described by `config`, with the semantic matcher when it
    /// is enabled and compiled in.
    pub fn from_config(config: &AssistConfig) -> Self {
        Self::new(
            config.parser(),
            reclassifier_for(config),
            config.window_settings(),
        )
    }

    pub fn settings(&self) -> WindowSettings {
        self.settings
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    /// Parses `text` and applies the reclassifier's override, if any.
    pub fn interpret(&self, text: &str) -> CommandSlots {
        let mut slots = self.parser.parse(text);
        if let Some(reclass) = self.reclassifier.reclassify(text, &slots) {
            log::debug!(
                "reclassified {:?}: {} -> {} via {:?} ({:.2})",
                text,
                slots.intent,
                reclass.intent,
                reclass.matched,
                reclass.score
            );
            reclass.apply(&mut slots);
        }
        slots
    }

    /// Answers a command about the buffered window.
    pub fn respond(&self, text: &str, buffer: &TemporalBuffer) -> String {
        if let Some(utility) = UtilityCommand::parse(text) {
            return self.utility(utility, buffer);
        }
        let slots = self.interpret(text);
        let reply = answer::answer_buffer(&slots, buffer, self.settings);
        log::info!("{} {:?} -> {:?}", slots.intent, text, reply);
        reply
    }

    /// Answers a command about one frame, for callers that hold no history.
    pub fn respond_to_frame(&self, text: &str, frame: &Frame, fallback: Resolution) -> String {
        let slots = self.interpret(text);
        answer::answer_frame(&slots, frame, fallback)
    }

    /// Answers commands from `source` until it closes. Returns the number answered.
    pub fn serve(
        &self,
        source: &mut dyn CommandSource,
        buffer: &TemporalBuffer,
        sink: &mut dyn ReplySink,
    ) -> Result<usize> {
        let mut answered = 0;
        loop {
            match capture(source) {
                Capture::Command(text) => {
                    sink.say(&self.respond(&text, buffer))?;
                    answered += 1;
                }
                Capture::Skip => continue,
                Capture::Closed => return Ok(answered),
            }
        }
    }

    pub fn utility(&self, command: UtilityCommand, buffer: &TemporalBuffer) -> String {
        let threshold = self.parser.default_threshold();
        match command {
            UtilityCommand::Status => {
                let status = buffer.status(self.settings.window_sec);
                let labels: Vec<String> = status
                    .last_labels
                    .iter()
                    .map(|(label, n)| format!("{label}={n}"))
                    .collect();
                format!(
                    "frames_in_buffer={} capacity={} window_n={} last_dets={} labels=[{}]",
                    status.frames_in_buffer,
                    status.capacity,
                    status.window_frames,
                    status.last_detections,
                    labels.join(", ")
                )
            }
            UtilityCommand::Objects => {
                let mut labels: Vec<String> = buffer
                    .detections(threshold, self.settings.window_sec)
                    .into_iter()
                    .map(|det| det.label)
                    .collect();
                labels.sort();
                labels.dedup();
                if labels.is_empty() {
                    "I don't see anything with enough confidence.".to_string()
                } else {
                    format!("Detected objects: {}.", labels.join(", "))
                }
            }
            UtilityCommand::Closest => {
                let detections = buffer.detections(threshold, self.settings.window_sec);
                match closest(&detections, buffer.resolution()) {
                    Some((det, share)) => {
                        format!("The closest object is {}, {}.", det.label, proximity(share))
                    }
                    None => "I don't see anything close.".to_string(),
                }
            }
        }
    }
}

impl Default for Assistant {
    fn default() -> Self {
        Self::from_config(&AssistConfig::default())
    }
}

#[cfg(feature = "semantic")]
fn reclassifier_for(config: &AssistConfig) -> Box<dyn IntentReclassifier> {
    if config.semantic.enabled {
        Box::new(crate::semantic::SemanticMatcher::new(
            Box::new(crate::semantic::HashingEmbedder::default()),
            config.semantic.acceptance,
        ))
    } else {
        Box::new(NoopReclassifier)
    }
}

#[cfg(not(feature = "semantic"))]
fn reclassifier_for(config: &AssistConfig) -> Box<dyn IntentReclassifier> {
    if config.semantic.enabled {
        log::warn!("semantic matching requested but not compiled in; using the rule parser only");
    }
    Box::new(NoopReclassifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn plain() -> Assistant {
        Assistant::new(
            CommandParser::default(),
            Box::new(NoopReclassifier),
            WindowSettings::default(),
        )
    }

    fn filled_buffer() -> TemporalBuffer {
        let buffer = TemporalBuffer::default();
        for _ in 0..20 {
            buffer.ingest(Frame::new(vec![
                Detection::new("person", 0.9, BoundingBox::new(50.0, 120.0, 220.0, 460.0)),
                Detection::new("cup", 0.8, BoundingBox::new(300.0, 300.0, 340.0, 340.0)),
                Detection::new("dog", 0.3, BoundingBox::new(0.0, 0.0, 640.0, 480.0)),
            ]));
        }
        buffer
    }

    #[test]
    fn utility_aliases() {
        assert_eq!(UtilityCommand::parse("A"), Some(UtilityCommand::Objects));
        assert_eq!(UtilityCommand::parse("say objects"), Some(UtilityCommand::Objects));
        assert_eq!(UtilityCommand::parse(" d "), Some(UtilityCommand::Closest));
        assert_eq!(UtilityCommand::parse("debug:status now"), Some(UtilityCommand::Status));
        assert_eq!(UtilityCommand::parse("objects on the left"), None);
    }

    #[test]
    fn objects_are_sorted_and_thresholded() {
        let reply = plain().respond("objects", &filled_buffer());
        assert_eq!(reply, "Detected objects: cup, person.");
        let reply = plain().respond("objects", &TemporalBuffer::default());
        assert_eq!(reply, "I don't see anything with enough confidence.");
    }

    #[test]
    fn closest_uses_box_area() {
        // person box is 170x340 of 640x480, about 0.19 of the image
        let reply = plain().respond("closest", &filled_buffer());
        assert_eq!(reply, "The closest object is person, very close.");
        let reply = plain().respond("d", &TemporalBuffer::default());
        assert_eq!(reply, "I don't see anything close.");
    }

    #[test]
    fn proximity_buckets() {
        assert_eq!(proximity(0.06), "very close");
        assert_eq!(proximity(0.02), "nearby");
        assert_eq!(proximity(0.019), "far");
    }

    #[test]
    fn status_reports_window() {
        let reply = plain().respond("debug:status", &filled_buffer());
        assert_eq!(
            reply,
            "frames_in_buffer=20 capacity=48 window_n=14 last_dets=3 labels=[person=1, cup=1, dog=1]"
        );
    }

    #[test]
    fn queries_go_through_parser() {
        let assistant = plain();
        let buffer = filled_buffer();
        assert_eq!(assistant.respond("how many people on the left?", &buffer), "1 person on the left.");
        assert_eq!(assistant.respond("is there a dog?", &buffer), "No, dog.");
        assert_eq!(assistant.respond("is there a dog over 20%?", &buffer), "Yes, dog.");
    }

    #[cfg(feature = "semantic")]
    #[test]
    fn semantic_layer_overrides_count_object() {
        let assistant = Assistant::default();
        let buffer = filled_buffer();
        assert_eq!(assistant.interpret("how many humans").object.as_deref(), Some("person"));
        assert_eq!(assistant.respond("how many humans", &buffer), "1 person.");
        // without the matcher the object stays unknown
        assert_eq!(plain().respond("how many humans", &buffer), "2 objects.");
    }
}
