use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// A WGS-84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build from a GeoJSON-ordered `[longitude, latitude]` pair.
    pub const fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// A single location fix delivered by the location provider.
///
/// Positions are ephemeral: the tracker keeps only the most recent one.
/// `received_at` is the monotonic arrival time and drives every cooldown
/// decision made from a position update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres, when the provider reports one.
    pub accuracy_m: Option<f64>,
    /// Course over ground in degrees clockwise from true north.
    pub heading_deg: Option<f64>,
    pub received_at: Instant,
}

impl Position {
    /// A fix stamped with the current monotonic time.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Instant::now())
    }

    /// A fix stamped with an explicit arrival time.
    pub fn at(latitude: f64, longitude: f64, received_at: Instant) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            heading_deg: None,
            received_at,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Kind of directional action a [`RouteStep`] asks the user to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManeuverType {
    Depart,
    Straight,
    Left,
    Right,
    Uturn,
    Roundabout,
    Arrive,
}

impl ManeuverType {
    /// Parse the string maneuver tags used by flat maneuver-list routing
    /// responses. Unknown tags fall back to [`ManeuverType::Straight`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "depart" | "start" => Self::Depart,
            "left" | "turn-left" | "turn_left" | "sharp-left" | "slight-left" | "keep-left" => {
                Self::Left
            }
            "right" | "turn-right" | "turn_right" | "sharp-right" | "slight-right"
            | "keep-right" => Self::Right,
            "uturn" | "u-turn" | "u_turn" => Self::Uturn,
            "roundabout" | "rotary" | "exit-roundabout" => Self::Roundabout,
            "arrive" | "goal" | "destination" => Self::Arrive,
            _ => Self::Straight,
        }
    }
}

/// One maneuver of a [`Route`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub maneuver: ManeuverType,
    /// Distance from this step to the next maneuver, refined live while the
    /// step is active.
    pub distance_to_next_m: f64,
    pub start: Coordinate,
    pub end: Coordinate,
    /// Explicit point at which the maneuver is performed, when the routing
    /// backend supplies one.
    pub maneuver_point: Option<Coordinate>,
    pub road_name: Option<String>,
}

impl RouteStep {
    /// The point the tracker measures arrival against.
    pub fn target(&self) -> Coordinate {
        self.maneuver_point.unwrap_or(self.end)
    }
}

/// Where a route ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub coordinate: Coordinate,
    pub name: Option<String>,
}

impl Destination {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            name: None,
        }
    }

    pub fn named(coordinate: Coordinate, name: impl Into<String>) -> Self {
        Self {
            coordinate,
            name: Some(name.into()),
        }
    }
}

/// An ordered sequence of steps from an origin to a [`Destination`].
///
/// Routes are replaced wholesale on recalculation; the only in-place
/// mutation is refinement of the active step's `distance_to_next_m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub steps: Vec<RouteStep>,
    pub total_distance_m: f64,
    /// Display polyline.
    pub geometry: Vec<Coordinate>,
    pub destination: Destination,
    /// `true` for the synthetic straight-line route used when the routing
    /// backend is unavailable.
    #[serde(default)]
    pub degraded: bool,
}

impl Route {
    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

/// Ordinal severity attached to every spoken message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Clear,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Parse a case-insensitive risk tag. Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "clear" | "none" | "safe" => Some(Self::Clear),
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// One level higher, capped at `cap`.
    pub fn raised(self, cap: Self) -> Self {
        let next = match self {
            Self::Clear => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        };
        next.min(cap).max(self)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Clear => "CLEAR",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A short, speakable message plus the severity that decides whether it may
/// bypass rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceMessage {
    pub text: String,
    pub risk: RiskLevel,
    /// Higher is more important. Used to order derived hazard messages.
    pub priority: Option<u32>,
}

impl GuidanceMessage {
    pub fn new(text: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            text: text.into(),
            risk,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Device sensors that require a runtime permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Location,
    Camera,
    Microphone,
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Location => "location",
            Self::Camera => "camera",
            Self::Microphone => "microphone",
        };
        f.write_str(s)
    }
}

/// Which speech gate a message went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePurpose {
    Navigation,
    Hazard,
}

/// Unified event wrapper for the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "stride-runtime::tracker"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A message passed its gate and was handed to the speech engine.
    GuidanceSpoken {
        purpose: GatePurpose,
        text: String,
        risk: RiskLevel,
    },
    RouteInstalled {
        steps: usize,
        total_distance_m: f64,
        degraded: bool,
    },
    /// The routing backend failed and a straight-line route was installed.
    RoutingDegraded { reason: String },
    StepAdvanced { index: usize, instruction: String },
    Progress {
        step_index: usize,
        remaining_m: f64,
        eta_secs: u64,
    },
    RecalculationStarted { latitude: f64, longitude: f64 },
    RecalculationFinished { success: bool },
    Arrived,
    /// A collaborator failed in a way worth surfacing once.
    ServiceFault { component: String, message: String },
    PermissionDenied(Sensor),
    /// The host is shutting down.
    Shutdown { reason: String },
}

/// Global error type spanning routing, perception, sensors and speech.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum StrideError {
    #[error("Routing unavailable: {0}")]
    RoutingUnavailable(String),

    #[error("Sensor timeout on {sensor} after {after_ms} ms")]
    SensorTimeout { sensor: String, after_ms: u64 },

    #[error("Permission denied: {0}")]
    PermissionDenied(Sensor),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Speech synthesis error: {0}")]
    SpeechSynthesis(String),

    #[error("Perception request failed: {0}")]
    PerceptionFailed(String),

    #[error("Unexpected response format: {0}")]
    BadResponse(String),

    #[error("Event bus error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StrideError {
    /// `true` for deadline expiries, which are logged but never surfaced.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::SensorTimeout { .. })
    }
}
