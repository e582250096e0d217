//! Rule-based conversion of raw detections into hazard guidance.
//!
//! No model is involved: object classes come from a fixed table, risk from
//! class plus proximity plus confidence, and the wording from the side of
//! the frame the object sits in.
//!
//! | Class    | Base risk | Examples                         |
//! |----------|-----------|----------------------------------|
//! | Obstacle | MEDIUM    | chair, table, stairs, pole, door |
//! | Sign     | LOW       | exit, entrance, restroom         |
//! | Safe     | CLEAR     | book, person                     |
//!
//! A `near` object raises a non-clear risk by one level, and an uncertain
//! detection (confidence below 0.5) raises any risk by one level. Both are
//! capped at HIGH. Only the stop rule reaches CRITICAL: a hazard keyword
//! object that is near and dead ahead.

use stride_types::{GuidanceMessage, RiskLevel};

use crate::response::{Detection, Severity, Side};

/// Detections below this confidence are ignored.
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Detections below this confidence count as uncertain and get one extra
/// risk level.
pub const UNCERTAIN_CONFIDENCE: f64 = 0.5;

/// Labels that trigger the stop recommendation when near and centred.
pub const HAZARD_KEYWORDS: &[&str] = &["stairs", "wall", "door", "person", "obstacle", "pole", "edge"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Obstacle,
    Sign,
    Safe,
}

/// Ordered so exact lookups win and partial matches prefer obstacles.
const CLASS_TABLE: &[(&str, ObjectClass)] = &[
    ("chair", ObjectClass::Obstacle),
    ("office-chair", ObjectClass::Obstacle),
    ("table", ObjectClass::Obstacle),
    ("desk", ObjectClass::Obstacle),
    ("monitor", ObjectClass::Obstacle),
    ("tv", ObjectClass::Obstacle),
    ("books", ObjectClass::Obstacle),
    ("bookshelf", ObjectClass::Obstacle),
    ("whiteboard", ObjectClass::Obstacle),
    ("stairs", ObjectClass::Obstacle),
    ("wall", ObjectClass::Obstacle),
    ("door", ObjectClass::Obstacle),
    ("pole", ObjectClass::Obstacle),
    ("edge", ObjectClass::Obstacle),
    ("obstacle", ObjectClass::Obstacle),
    ("exit", ObjectClass::Sign),
    ("entrance", ObjectClass::Sign),
    ("restroom", ObjectClass::Sign),
    ("toilet", ObjectClass::Sign),
    ("history", ObjectClass::Sign),
    ("science", ObjectClass::Sign),
    ("arts", ObjectClass::Sign),
    ("book", ObjectClass::Safe),
    ("person", ObjectClass::Safe),
];

/// Classify a detection label. Unknown labels are obstacles.
pub fn classify(label: &str) -> ObjectClass {
    let label = label.trim().to_lowercase();
    if let Some((_, class)) = CLASS_TABLE.iter().find(|(key, _)| *key == label) {
        return *class;
    }
    CLASS_TABLE
        .iter()
        .find(|(key, _)| label.contains(key) || key.contains(label.as_str()))
        .map(|(_, class)| *class)
        .filter(|_| !label.is_empty())
        .unwrap_or(ObjectClass::Obstacle)
}

/// Speakable name for a label, capitalised for the start of a sentence.
pub fn spoken_name(label: &str) -> String {
    let label = label.trim().to_lowercase();
    let name = if label.contains("chair") {
        "chair".to_string()
    } else if label.contains("table") {
        "table".to_string()
    } else if label.contains("monitor") {
        "monitor".to_string()
    } else if label.contains("whiteboard") {
        "whiteboard".to_string()
    } else if label.contains("bookshelf") {
        "bookshelf".to_string()
    } else if label.contains("book") {
        if label.ends_with('s') { "books" } else { "book" }.to_string()
    } else if (label.contains("exit") || label.contains("entrance")) && !label.contains("sign") {
        format!("{label} sign")
    } else {
        label.replace(['-', '_'], " ")
    };
    capitalise(&name)
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_hazard(label: &str) -> bool {
    let label = label.to_lowercase();
    HAZARD_KEYWORDS.iter().any(|k| label.contains(k))
}

/// Risk for one detection, before the stop rule.
pub fn assess_risk(class: ObjectClass, severity: Severity, confidence: f64) -> RiskLevel {
    let mut risk = match class {
        ObjectClass::Obstacle => RiskLevel::Medium,
        ObjectClass::Sign => RiskLevel::Low,
        ObjectClass::Safe => RiskLevel::Clear,
    };
    if severity == Severity::Near && risk != RiskLevel::Clear {
        risk = risk.raised(RiskLevel::High);
    }
    if confidence < UNCERTAIN_CONFIDENCE {
        risk = risk.raised(RiskLevel::High);
    }
    risk
}

/// Guidance for one detection, or `None` when it should not be spoken.
pub fn guidance_for(detection: &Detection) -> Option<GuidanceMessage> {
    let confidence = detection.confidence.clamp(0.0, 1.0);
    if confidence < MIN_CONFIDENCE {
        return None;
    }
    let severity = detection.resolved_severity();
    if severity == Severity::None {
        return None;
    }
    let side = detection.resolved_side();
    let name = spoken_name(&detection.label);

    let (text, risk) = if severity == Severity::Near && side == Side::Center && is_hazard(&detection.label) {
        (format!("Stop. {name} directly ahead."), RiskLevel::Critical)
    } else {
        let place = match side {
            Side::Left => "on your left",
            Side::Center => "ahead",
            Side::Right => "on your right",
        };
        let nearby = if severity == Severity::Near { ", nearby" } else { "" };
        let class = classify(&detection.label);
        (
            format!("{name} {place}{nearby}"),
            assess_risk(class, severity, confidence),
        )
    };

    let priority = u32::from(risk.as_u8()) * 10 + (confidence * 10.0).floor() as u32;
    Some(GuidanceMessage::new(text, risk).with_priority(priority))
}

/// Guidance for every speakable detection, highest priority first.
pub fn guidance_from_detections(detections: &[Detection]) -> Vec<GuidanceMessage> {
    let mut out: Vec<GuidanceMessage> = detections.iter().filter_map(guidance_for).collect();
    out.sort_by(|a, b| b.priority.cmp(&a.priority));
    out
}
