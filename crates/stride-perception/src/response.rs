//! Perception backend response model and message selection.
//!
//! Backends disagree on key casing, so every multi-word field accepts both
//! snake_case and camelCase. Unknown fields are ignored.
//!
//! ```json
//! {
//!   "frame_id": "5c1b…",
//!   "spoken_message": "Chair on your left",
//!   "risk_level": "HIGH",
//!   "guidance_messages": [{ "message": "Chair on your left", "risk_level": "HIGH" }],
//!   "detections": [{
//!     "label": "office-chair",
//!     "confidence": 0.82,
//!     "bbox_norm": { "cx": 0.2, "cy": 0.6, "w": 0.2, "h": 0.3 },
//!     "severity": "near",
//!     "side": "left",
//!     "distance_m": null
//!   }]
//! }
//! ```

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use stride_types::{GuidanceMessage, RiskLevel, StrideError};

use crate::reasoning;

/// Spoken when a response carries nothing usable.
pub const NO_HAZARDS: &str = "No hazards detected";

/// Strings backends send while a result is not ready yet, compared after
/// [`normalise`] has stripped case, ellipses and surrounding punctuation.
const PLACEHOLDERS: &[&str] = &[
    "processing",
    "loading",
    "analyzing",
    "analysing",
    "please wait",
    "waiting",
    "pending",
    "n/a",
    "none",
    "null",
    "undefined",
    "placeholder",
];

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// Normalised bounding box; all values in `[0, 1]` of the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

/// Coarse proximity bucket derived from the box area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Near,
    Mid,
    Far,
    None,
}

impl Severity {
    /// Bucket a box by the fraction of the frame it covers.
    pub fn from_area(area_frac: f64) -> Self {
        const BASE: f64 = 0.14;
        if area_frac >= BASE {
            Self::Near
        } else if area_frac >= BASE * 0.55 {
            Self::Mid
        } else if area_frac >= BASE * 0.32 {
            Self::Far
        } else {
            Self::None
        }
    }
}

/// Horizontal third of the frame an object sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Center,
    Right,
}

impl Side {
    pub fn from_cx(cx: f64) -> Self {
        if cx < 0.4 {
            Self::Left
        } else if cx > 0.6 {
            Self::Right
        } else {
            Self::Center
        }
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    #[serde(alias = "category")]
    pub label: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, alias = "bboxNorm")]
    pub bbox_norm: Option<BoundingBox>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default, alias = "distanceM")]
    pub distance_m: Option<f64>,
}

impl Detection {
    /// Reported severity, else derived from the box, else `Mid`.
    pub fn resolved_severity(&self) -> Severity {
        self.severity
            .or_else(|| self.bbox_norm.map(|b| Severity::from_area(b.w * b.h)))
            .unwrap_or(Severity::Mid)
    }

    /// Reported side, else derived from the box, else `Center`.
    pub fn resolved_side(&self) -> Side {
        self.side
            .or_else(|| self.bbox_norm.map(|b| Side::from_cx(b.cx)))
            .unwrap_or(Side::Center)
    }
}

/// One pre-composed message from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredGuidance {
    #[serde(alias = "text")]
    pub message: String,
    #[serde(default, alias = "riskLevel", alias = "risk")]
    pub risk_level: Option<String>,
}

/// Body returned by the perception backend for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerceptionResponse {
    #[serde(default, alias = "frameId")]
    pub frame_id: Option<String>,
    #[serde(default, alias = "spokenMessage")]
    pub spoken_message: Option<String>,
    #[serde(default, alias = "riskLevel")]
    pub risk_level: Option<String>,
    #[serde(default, alias = "guidanceMessages")]
    pub guidance_messages: Vec<StructuredGuidance>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

// ────────────────────────────────────────────────────────────────────────────
// Selection
// ────────────────────────────────────────────────────────────────────────────

/// Where a selected message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Spoken,
    Structured,
    Detections,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub message: GuidanceMessage,
    pub source: MessageSource,
}

fn normalise(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '…')
        .to_lowercase()
}

/// `true` for empty text and the not-ready strings backends emit, e.g.
/// `"Processing..."` or `"Loading…"`.
pub fn is_placeholder(text: &str) -> bool {
    let t = normalise(text);
    t.is_empty() || PLACEHOLDERS.contains(&t.as_str())
}

/// A non-blank message that only says the result is not ready.
fn is_pending_marker(text: &str) -> bool {
    !text.trim().is_empty() && is_placeholder(text)
}

/// Map a risk tag; unknown or absent tags are treated as MEDIUM.
pub fn map_risk(tag: Option<&str>) -> RiskLevel {
    tag.and_then(RiskLevel::from_tag).unwrap_or(RiskLevel::Medium)
}

impl PerceptionResponse {
    /// Parse a response body.
    ///
    /// # Errors
    ///
    /// [`StrideError::BadResponse`] when the body is not a response object.
    pub fn from_json(body: &str) -> Result<Self, StrideError> {
        serde_json::from_str(body).map_err(|e| StrideError::BadResponse(e.to_string()))
    }

    /// Pick the single message worth speaking for this frame.
    ///
    /// Order: top-level spoken message, first structured message, the
    /// highest-priority detection, then the neutral fallback. Placeholder
    /// strings are skipped at every stage.
    ///
    /// Returns `None` when nothing usable was found and the backend sent a
    /// not-ready marker: the frame was never analysed, so the neutral
    /// all-clear must not be spoken for it.
    pub fn select(&self) -> Option<Selection> {
        let top_tag = self.risk_level.as_deref();

        if let Some(text) = self.spoken_message.as_deref().filter(|t| !is_placeholder(t)) {
            return Some(Selection {
                message: GuidanceMessage::new(text.trim(), map_risk(top_tag)),
                source: MessageSource::Spoken,
            });
        }

        if let Some(g) = self.guidance_messages.iter().find(|g| !is_placeholder(&g.message)) {
            let risk = map_risk(top_tag.or(g.risk_level.as_deref()));
            return Some(Selection {
                message: GuidanceMessage::new(g.message.trim(), risk),
                source: MessageSource::Structured,
            });
        }

        if let Some(mut derived) = reasoning::guidance_from_detections(&self.detections)
            .into_iter()
            .next()
        {
            if let Some(risk) = top_tag.and_then(RiskLevel::from_tag) {
                derived.risk = risk;
            }
            return Some(Selection {
                message: derived,
                source: MessageSource::Detections,
            });
        }

        let pending = self
            .spoken_message
            .as_deref()
            .into_iter()
            .chain(self.guidance_messages.iter().map(|g| g.message.as_str()))
            .any(is_pending_marker);
        if pending {
            return None;
        }

        Some(Selection {
            message: GuidanceMessage::new(NO_HAZARDS, RiskLevel::Clear),
            source: MessageSource::Fallback,
        })
    }
}

/// JSON schema of [`PerceptionResponse`], as served to backend authors.
pub fn response_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(PerceptionResponse)).unwrap_or_default()
}
