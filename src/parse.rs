//! Rule-based command parser.
//!
//! Classifies free text into an [`Intent`] and extracts [`CommandSlots`]. The parser
//! is total: any input yields slots, falling back to `DescribeScene` with defaults.

use std::fmt;

use regex::Regex;

use crate::spatial::Region;
use crate::vocab::{self, COLORS};

pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_COOLDOWN_SEC: f32 = 1.0;
const DEFAULT_FPS: f32 = 24.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    QueryCount,
    QueryPresence,
    QueryLocation,
    DescribeScene,
    SetAlert,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryCount => "QueryCount",
            Self::QueryPresence => "QueryPresence",
            Self::QueryLocation => "QueryLocation",
            Self::DescribeScene => "DescribeScene",
            Self::SetAlert => "SetAlert",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters extracted from one command.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandSlots {
    pub intent: Intent,
    /// Canonical label, e.g. "person" for "people".
    pub object: Option<String>,
    pub region: Option<Region>,
    pub color: Option<String>,
    /// Minimum confidence, always within `0.0..=1.0`.
    pub threshold: f32,
    /// Always at least 1.
    pub min_count: u32,
    pub persist_sec: Option<f32>,
    pub cooldown_sec: f32,
}

impl CommandSlots {
    pub fn new(intent: Intent, threshold: f32) -> Self {
        Self {
            intent,
            object: None,
            region: None,
            color: None,
            threshold: threshold.clamp(0.0, 1.0),
            min_count: 1,
            persist_sec: None,
            cooldown_sec: DEFAULT_COOLDOWN_SEC,
        }
    }

    pub fn object_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.object.as_deref().unwrap_or(fallback)
    }
}

/// Intent classifiers and slot extractors, compiled once per parser.
pub struct CommandParser {
    fps: f32,
    default_threshold: f32,
    count: Regex,
    presence: Regex,
    location: Regex,
    alert: Regex,
    describe: Regex,
    where_word: Regex,
    when_word: Regex,
    any_word: Regex,
    token: Regex,
    region: Regex,
    color: Regex,
    threshold: Regex,
    duration_unit: Regex,
    percent_unit: Regex,
    min_count: Regex,
    or_more: Regex,
    duration: Regex,
}

fn pattern(src: &str) -> Regex {
    Regex::new(src).expect("command pattern is a valid regex")
}

impl CommandParser {
    /// `fps` converts "for N frames" into seconds.
    pub fn new(fps: f32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_FPS
        };
        Self {
            fps,
            default_threshold: DEFAULT_THRESHOLD,
            count: pattern(r"\bhow many\b|^count\b"),
            presence: pattern(r"^(?:is there|are there)\b|\bdo you see\b"),
            location: pattern(r"^where\s+(?:is|are)\b|^where's\b"),
            alert: pattern(r"\b(?:alert|notify|warn|tell)(?:\s+me)?\s+(?:when|if)\b"),
            describe: pattern(
                r"^describe\b|\bwhat (?:do|can) you see\b|\bwhat(?:'s| is) in front of me\b",
            ),
            where_word: pattern(r"\bwhere\b"),
            when_word: pattern(r"\b(?:when|if)\b"),
            any_word: pattern(r"\bany\b"),
            token: pattern(r"[a-z]+"),
            region: pattern(r"\b(left|right|center|centre|middle|top|bottom)\b"),
            color: pattern(&format!(r"\b({})\b", COLORS.join("|"))),
            threshold: pattern(
                r"(>=|>|\bover\b|\babove\b|\bat least\b|\bconfidence(?:\s+of)?\b|\bthreshold(?:\s+of)?\b)\s*(\d+(?:\.\d+)?)\s*(%|percent\b)?",
            ),
            duration_unit: pattern(r"^\s*(?:seconds?|secs?|s|frames?)\b"),
            percent_unit: pattern(r"^\s*(?:%|percent\b)"),
            min_count: pattern(r"(?:\bat least|>=)\s*(\d+(?:\.\d+)?|[a-z]+)"),
            or_more: pattern(r"\b(\d+|[a-z]+)\s+or\s+more\b"),
            duration: pattern(r"\b(?:for|over|at least)\s*(\d+(?:\.\d+)?)\s*(seconds?|secs?|s|frames?)\b"),
        }
    }

    /// Threshold used when the command names none. Clamped to `0.0..=1.0`.
    pub fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_THRESHOLD
        };
        self
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    pub fn parse(&self, text: &str) -> CommandSlots {
        let t = text.trim().to_lowercase();
        let mut slots = CommandSlots::new(self.classify(&t), self.default_threshold);

        slots.object = self.parse_object(&t).map(str::to_string);
        if slots.intent == Intent::DescribeScene
            && slots.object.is_some()
            && self.any_word.is_match(&t)
        {
            slots.intent = Intent::QueryPresence;
        }
        slots.region = self.parse_region(&t);
        slots.color = self.parse_color(&t);
        slots.threshold = self.parse_threshold(&t).unwrap_or(self.default_threshold);
        slots.min_count = self.parse_min_count(&t).unwrap_or(1).max(1);
        slots.persist_sec = self.parse_persist_sec(&t);

        log::debug!("parsed {:?} -> {:?}", text, slots);
        slots
    }

    /// Applies the classifiers in precedence order; the first hit wins.
    fn classify(&self, t: &str) -> Intent {
        let ordered = [
            (&self.count, Intent::QueryCount),
            (&self.presence, Intent::QueryPresence),
            (&self.location, Intent::QueryLocation),
            (&self.alert, Intent::SetAlert),
            (&self.describe, Intent::DescribeScene),
            (&self.where_word, Intent::QueryLocation),
            (&self.when_word, Intent::SetAlert),
        ];
        ordered
            .iter()
            .find(|(re, _)| re.is_match(t))
            .map(|(_, intent)| *intent)
            .unwrap_or(Intent::DescribeScene)
    }

    fn parse_object(&self, t: &str) -> Option<&'static str> {
        self.token
            .find_iter(t)
            .find_map(|m| vocab::canonical_label(m.as_str()))
    }

    fn parse_region(&self, t: &str) -> Option<Region> {
        self.region
            .captures(t)
            .and_then(|caps| Region::parse(&caps[1]))
    }

    fn parse_color(&self, t: &str) -> Option<String> {
        self.color.captures(t).map(|caps| caps[1].to_string())
    }

    /// First confidence cue in the text, normalized to a fraction.
    ///
    /// A cue followed by a duration unit is a duration. "at least"/">=" without a
    /// percent sign is a count.
    fn parse_threshold(&self, t: &str) -> Option<f32> {
        for caps in self.threshold.captures_iter(t) {
            let whole = caps.get(0)?;
            let cue = caps.get(1).map_or("", |m| m.as_str());
            let is_percent = caps.get(3).is_some();
            if !is_percent && self.duration_unit.is_match(&t[whole.end()..]) {
                continue;
            }
            if !is_percent && (cue == "at least" || cue == ">=") {
                continue;
            }
            let Ok(value) = caps[2].parse::<f32>() else {
                continue;
            };
            let value = if is_percent || value > 1.0 {
                value / 100.0
            } else {
                value
            };
            return Some(value.clamp(0.0, 1.0));
        }
        None
    }

    /// "at least N" or ">= N" followed by a percent sign or a duration unit is not a count.
    fn parse_min_count(&self, t: &str) -> Option<u32> {
        self.min_count
            .captures_iter(t)
            .filter(|caps| {
                let rest = &t[caps.get(0).map_or(t.len(), |m| m.end())..];
                !self.percent_unit.is_match(rest) && !self.duration_unit.is_match(rest)
            })
            .chain(self.or_more.captures_iter(t))
            .find_map(|caps| vocab::parse_count(&caps[1]))
    }

    fn parse_persist_sec(&self, t: &str) -> Option<f32> {
        let caps = self.duration.captures(t)?;
        let qty: f32 = caps[1].parse().ok()?;
        if caps[2].starts_with("frame") {
            Some(qty / self.fps)
        } else {
            Some(qty)
        }
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> CommandSlots {
        CommandParser::default().parse(text)
    }

    #[test]
    fn count_takes_precedence_over_presence() {
        let slots = parse("how many people do you see on the left?");
        assert_eq!(slots.intent, Intent::QueryCount);
        assert_eq!(slots.object.as_deref(), Some("person"));
        assert_eq!(slots.region, Some(Region::Left));
    }

    #[test]
    fn classifies_each_intent() {
        assert_eq!(parse("is there a dog over 70%?").intent, Intent::QueryPresence);
        assert_eq!(parse("where is the dog?").intent, Intent::QueryLocation);
        assert_eq!(parse("describe the scene").intent, Intent::DescribeScene);
        assert_eq!(
            parse("notify me if a bike shows up").intent,
            Intent::SetAlert
        );
        assert_eq!(parse("count the cups").intent, Intent::QueryCount);
    }

    #[test]
    fn keyword_fallbacks() {
        assert_eq!(parse("the cat, where did it go").intent, Intent::QueryLocation);
        assert_eq!(
            parse("alert me when a car appears at least 1 for 0.5 seconds").intent,
            Intent::SetAlert
        );
        assert_eq!(parse("let me know when a cat comes").intent, Intent::SetAlert);
    }

    #[test]
    fn any_upgrades_describe_to_presence() {
        let slots = parse("any dogs around?");
        assert_eq!(slots.intent, Intent::QueryPresence);
        assert_eq!(slots.object.as_deref(), Some("dog"));

        // no recognized object, no upgrade
        assert_eq!(parse("anything interesting?").intent, Intent::DescribeScene);
        assert_eq!(parse("any news?").intent, Intent::DescribeScene);
    }

    #[test]
    fn unparsable_text_defaults() {
        let slots = parse("qwerty zxcv");
        assert_eq!(slots, CommandSlots::new(Intent::DescribeScene, 0.5));

        let slots = parse("");
        assert_eq!(slots.intent, Intent::DescribeScene);
        assert_eq!(slots.threshold, 0.5);
        assert_eq!(slots.min_count, 1);
        assert!(slots.persist_sec.is_none());
    }

    #[test]
    fn threshold_accepts_fraction_and_percentage() {
        assert!((parse("is there a dog over 70%?").threshold - 0.7).abs() < 1e-6);
        assert!((parse("is there a dog above 0.8").threshold - 0.8).abs() < 1e-6);
        assert!((parse("any cat with confidence of 65").threshold - 0.65).abs() < 1e-6);
        assert!((parse("cups at least 90 percent").threshold - 0.9).abs() < 1e-6);
        assert_eq!(parse("is there a dog over 250%").threshold, 1.0);
    }

    #[test]
    fn counts_and_durations_are_not_thresholds() {
        let slots = parse("alert me when a car appears at least 1 for 0.5 seconds");
        assert_eq!(slots.threshold, 0.5);
        assert_eq!(slots.min_count, 1);
        assert_eq!(slots.persist_sec, Some(0.5));
        assert_eq!(slots.object.as_deref(), Some("car"));

        let slots = parse("tell me if a person stays over 3 seconds");
        assert_eq!(slots.threshold, 0.5);
        assert_eq!(slots.persist_sec, Some(3.0));
    }

    #[test]
    fn percentages_are_not_counts() {
        let slots = parse("is there a dog at least 80%?");
        assert!((slots.threshold - 0.8).abs() < 1e-6);
        assert_eq!(slots.min_count, 1);

        let slots = parse("alert me when at least 2 cars appear at least 70 percent");
        assert_eq!(slots.min_count, 2);
        assert!((slots.threshold - 0.7).abs() < 1e-6);
    }

    #[test]
    fn at_least_with_a_unit_is_a_duration() {
        let slots = parse("alert me when a dog stays at least 3 seconds");
        assert_eq!(slots.min_count, 1);
        assert_eq!(slots.persist_sec, Some(3.0));
        assert_eq!(slots.threshold, 0.5);

        let slots = CommandParser::new(24.0)
            .parse("alert me if at least 2 people stay at least 12 frames");
        assert_eq!(slots.min_count, 2);
        assert_eq!(slots.persist_sec, Some(0.5));
    }

    #[test]
    fn min_count_words_and_digits_agree() {
        let words = parse("alert me when at least two people appear");
        let digits = parse("alert me when at least 2 people appear");
        assert_eq!(words.min_count, 2);
        assert_eq!(digits.min_count, 2);
        assert_eq!(parse("notify me if 3 or more cars").min_count, 3);
        assert_eq!(parse("alert me when at least zero cats").min_count, 1);
    }

    #[test]
    fn frame_durations_use_fps() {
        let slots = CommandParser::new(24.0).parse("alert me if a dog stays for 12 frames");
        assert_eq!(slots.persist_sec, Some(0.5));
        let slots = CommandParser::new(10.0).parse("alert me if a dog stays for 12 frames");
        assert!((slots.persist_sec.unwrap() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn region_and_color_slots() {
        let slots = parse("is there a red car in the middle?");
        assert_eq!(slots.region, Some(Region::Center));
        assert_eq!(slots.color.as_deref(), Some("red"));
        assert_eq!(slots.object.as_deref(), Some("car"));
    }

    #[test]
    fn default_threshold_is_configurable_and_clamped() {
        let parser = CommandParser::default().with_default_threshold(1.7);
        assert_eq!(parser.parse("describe").threshold, 1.0);
        let parser = CommandParser::default().with_default_threshold(0.35);
        assert_eq!(parser.parse("how many cups").threshold, 0.35);
    }
}
