//! Executors that turn parsed commands into spoken replies.
//!
//! Each intent has a single-frame executor (answers about one detector tick) and a
//! buffer executor (answers about the trailing window). All of them are pure: they
//! read their inputs and return a string.

use crate::detect::{Detection, Frame, Resolution};
use crate::frame::{median, tally, HorizontalBreakdown, TemporalBuffer};
use crate::parse::{CommandSlots, Intent};
use crate::spatial::{center_offset, detection_region, DetectionFilter, Region, VerticalRegion};
use crate::vocab::pluralize;

/// Persistence reported in alert confirmations when the command names none.
pub const DEFAULT_ALERT_PERSIST_SEC: f32 = 0.3;
const DESCRIBE_TOP_LABELS: usize = 3;
const NOTHING_SEEN: &str = "I don't see anything with enough confidence.";

/// Window parameters used by buffer executors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSettings {
    pub window_sec: f32,
    pub persist_frac: f32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            window_sec: crate::frame::DEFAULT_WINDOW_SEC,
            persist_frac: crate::frame::DEFAULT_PERSIST_FRAC,
        }
    }
}

/// Description of an armed alert. Only used to phrase the confirmation; nothing
/// stores or evaluates it against later frames.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertSpec {
    pub object: Option<String>,
    pub region: Option<Region>,
    pub threshold: f32,
    pub min_count: u32,
    pub persist_sec: f32,
    pub cooldown_sec: f32,
}

impl AlertSpec {
    pub fn from_slots(slots: &CommandSlots) -> Self {
        Self {
            object: slots.object.clone(),
            region: slots.region,
            threshold: slots.threshold,
            min_count: slots.min_count.max(1),
            persist_sec: slots.persist_sec.unwrap_or(DEFAULT_ALERT_PERSIST_SEC),
            cooldown_sec: slots.cooldown_sec,
        }
    }

    pub fn confirmation(&self) -> String {
        let region = match self.region {
            Some(region) => format!("appear {} ", region.phrase()),
            None => "appear ".to_string(),
        };
        format!(
            "Alert armed. I'll notify you when {}+ {} {}for ≥{:.1}s at ≥{}%.",
            self.min_count,
            self.object.as_deref().unwrap_or("target"),
            region,
            self.persist_sec,
            (self.threshold * 100.0).round() as u32,
        )
    }
}

fn region_suffix(region: Option<Region>) -> String {
    region.map(|r| format!(" {}", r.phrase())).unwrap_or_default()
}

/// Position phrase of one detection: "on the left", or "on the left at the bottom".
fn position_phrase(det: &Detection, fallback: Resolution) -> String {
    let (h, v) = detection_region(det, fallback);
    let horizontal = Region::from(h).phrase();
    match v {
        VerticalRegion::Top => horizontal,
        VerticalRegion::Bottom => format!("{horizontal} at the bottom"),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rounds half to even, so a median of 0.5 reads as zero and 1.5 as two.
fn spoken_count(value: f32) -> usize {
    value.round_ties_even().max(0.0) as usize
}

fn slot_filter(slots: &CommandSlots) -> DetectionFilter<'_> {
    DetectionFilter::new(slots.threshold)
        .label(slots.object.as_deref())
        .region(slots.region)
        .color(slots.color.as_deref())
}

fn describe_counts(counts: &[(String, usize)], breakdown: HorizontalBreakdown) -> String {
    let mut ranked: Vec<&(String, usize)> = counts.iter().filter(|(_, n)| *n > 0).collect();
    if ranked.is_empty() {
        return NOTHING_SEEN.to_string();
    }
    // stable sort keeps first-seen order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let parts: Vec<String> = ranked
        .iter()
        .take(DESCRIBE_TOP_LABELS)
        .map(|(label, n)| format!("{} {}", n, pluralize(label, *n)))
        .collect();
    let mut reply = format!("I see {}", parts.join(", "));
    if !breakdown.is_empty() {
        let mut places = Vec::new();
        if breakdown.left > 0 {
            places.push(format!("{} on the left", breakdown.left));
        }
        if breakdown.center > 0 {
            places.push(format!("{} in the center", breakdown.center));
        }
        if breakdown.right > 0 {
            places.push(format!("{} on the right", breakdown.right));
        }
        reply.push_str(&format!(" ({})", places.join(", ")));
    }
    reply.push('.');
    reply
}

// ----------------------------------------------------------------------------
// Single-frame executors
// ----------------------------------------------------------------------------

pub fn frame_presence(slots: &CommandSlots, frame: &Frame, fallback: Resolution) -> String {
    let n = slot_filter(slots).count(frame, fallback);
    let target = slots.object_or("object");
    let region = region_suffix(slots.region);
    if n > 0 {
        format!("Yes, {} {}{}.", n, pluralize(target, n), region)
    } else {
        format!("No {}{}.", pluralize(target, 2), region)
    }
}

pub fn frame_count(slots: &CommandSlots, frame: &Frame, fallback: Resolution) -> String {
    let n = slot_filter(slots).count(frame, fallback);
    format!(
        "{} {}{}.",
        n,
        pluralize(slots.object_or("object"), n),
        region_suffix(slots.region)
    )
}

/// Reports the most confident detection, preferring the one nearest the image
/// center when confidences tie.
pub fn frame_location(slots: &CommandSlots, frame: &Frame, fallback: Resolution) -> String {
    let filter = DetectionFilter::new(slots.threshold).label(slots.object.as_deref());
    let found = filter.apply(frame, fallback);
    // replace only on a strictly better key so full ties keep the first detection
    let best = found.iter().copied().fold(None::<&Detection>, |best, det| match best {
        Some(top)
            if det
                .confidence
                .total_cmp(&top.confidence)
                .then_with(|| {
                    center_offset(top, fallback).total_cmp(&center_offset(det, fallback))
                })
                .is_le() =>
        {
            Some(top)
        }
        _ => Some(det),
    });
    let Some(best) = best else {
        return format!("I don't see a {}.", slots.object_or("target"));
    };
    let position = position_phrase(best, fallback);
    if found.len() == 1 {
        format!("The {} is {}.", best.label, position)
    } else {
        format!(
            "I see {} {}. The closest one is {}.",
            found.len(),
            pluralize(&best.label, found.len()),
            position
        )
    }
}

pub fn frame_describe(slots: &CommandSlots, frame: &Frame, fallback: Resolution) -> String {
    let filter = DetectionFilter::new(slots.threshold);
    let mut counts = Vec::new();
    let mut breakdown = HorizontalBreakdown::default();
    for det in filter.apply(frame, fallback) {
        tally(&mut counts, &det.label);
        breakdown.add(detection_region(det, fallback).0);
    }
    describe_counts(&counts, breakdown)
}

pub fn set_alert(slots: &CommandSlots) -> String {
    AlertSpec::from_slots(slots).confirmation()
}

/// Answers a command about a single frame.
pub fn answer_frame(slots: &CommandSlots, frame: &Frame, fallback: Resolution) -> String {
    match slots.intent {
        Intent::QueryPresence => frame_presence(slots, frame, fallback),
        Intent::QueryCount => frame_count(slots, frame, fallback),
        Intent::QueryLocation => frame_location(slots, frame, fallback),
        Intent::DescribeScene => frame_describe(slots, frame, fallback),
        Intent::SetAlert => set_alert(slots),
    }
}

// ----------------------------------------------------------------------------
// Buffer executors
// ----------------------------------------------------------------------------

/// Presence over the window, stretched to cover a requested persistence duration.
pub fn buffer_presence(
    slots: &CommandSlots,
    buffer: &TemporalBuffer,
    settings: WindowSettings,
) -> String {
    let window = settings.window_sec.max(slots.persist_sec.unwrap_or(0.0));
    let present = buffer.present(
        &slot_filter(slots),
        window,
        settings.persist_frac,
        slots.min_count,
    );
    let subject = slots
        .object
        .as_deref()
        .map(|object| format!(", {object}"))
        .unwrap_or_default();
    let verdict = if present { "Yes" } else { "No" };
    format!("{verdict}{subject}{}.", region_suffix(slots.region))
}

pub fn buffer_count(
    slots: &CommandSlots,
    buffer: &TemporalBuffer,
    settings: WindowSettings,
) -> String {
    let n = spoken_count(buffer.count(&slot_filter(slots), settings.window_sec));
    format!(
        "{} {}{}.",
        n,
        pluralize(slots.object_or("object"), n),
        region_suffix(slots.region)
    )
}

pub fn buffer_location(
    slots: &CommandSlots,
    buffer: &TemporalBuffer,
    settings: WindowSettings,
) -> String {
    let target = slots.object_or("target");
    match buffer.location(slots.object.as_deref(), slots.threshold, settings.window_sec) {
        Some(region) => format!("{} is {}.", capitalize(target), region.phrase()),
        None => format!("I don't see a {target}."),
    }
}

/// Summarizes the window: per-label median counts, ranked by how often each label
/// was detected, plus a left/center/right breakdown of the same medians.
///
/// The reply re-sorts the ranked labels by median count (stable, so detection
/// frequency breaks ties) and drops labels whose median rounds to zero. A label
/// detected often but in fewer than half the frames can therefore be left out.
pub fn buffer_describe(
    slots: &CommandSlots,
    buffer: &TemporalBuffer,
    settings: WindowSettings,
) -> String {
    let window = buffer.window(settings.window_sec);
    let fallback = buffer.resolution();
    let totals = buffer.label_totals(slots.threshold, settings.window_sec);

    let label_medians: Vec<(String, usize)> = totals
        .iter()
        .map(|(label, _)| {
            let filter = DetectionFilter::new(slots.threshold).label(Some(label.as_str()));
            let per_frame = window.iter().map(|f| filter.count(f, fallback)).collect();
            (label.clone(), spoken_count(median(per_frame)))
        })
        .collect();
    // rank by detection frequency, report the per-frame median
    let mut ranked: Vec<(String, usize)> = Vec::new();
    let mut order: Vec<usize> = (0..totals.len()).collect();
    order.sort_by(|a, b| totals[*b].1.cmp(&totals[*a].1));
    for idx in order {
        ranked.push(label_medians[idx].clone());
    }

    let filter = DetectionFilter::new(slots.threshold);
    let mut breakdown = HorizontalBreakdown::default();
    let (mut left, mut center, mut right) = (Vec::new(), Vec::new(), Vec::new());
    for frame in &window {
        let mut per = HorizontalBreakdown::default();
        for det in filter.apply(frame, fallback) {
            per.add(detection_region(det, fallback).0);
        }
        left.push(per.left);
        center.push(per.center);
        right.push(per.right);
    }
    breakdown.left = spoken_count(median(left));
    breakdown.center = spoken_count(median(center));
    breakdown.right = spoken_count(median(right));

    describe_counts(&ranked, breakdown)
}

/// Answers a command about the buffered window.
pub fn answer_buffer(
    slots: &CommandSlots,
    buffer: &TemporalBuffer,
    settings: WindowSettings,
) -> String {
    match slots.intent {
        Intent::QueryPresence => buffer_presence(slots, buffer, settings),
        Intent::QueryCount => buffer_count(slots, buffer, settings),
        Intent::QueryLocation => buffer_location(slots, buffer, settings),
        Intent::DescribeScene => buffer_describe(slots, buffer, settings),
        Intent::SetAlert => set_alert(slots),
    }
}
