//! Routing service boundary.
//!
//! The tracker asks a [`RoutingService`] for a walking route and receives a
//! normalized [`Route`]. Two backend body shapes are understood by
//! [`normalize_route`]:
//!
//! * **Segmented GeoJSON** (openrouteservice `/geojson`):
//!   `features[0].geometry.coordinates` holds the polyline and
//!   `features[0].properties.segments[].steps[]` the maneuvers, each with a
//!   numeric `type` and a `way_points` index pair into the polyline.
//! * **Flat maneuver list**: `{ total_distance, geometry, maneuvers[] }`
//!   where every maneuver carries a string `type` and its `location`.
//!
//! Whatever the shape, the normalized route always ends with an `arrive`
//! step.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stride_perception::geo::{haversine_m, path_length_m};
use stride_types::{Coordinate, Destination, ManeuverType, Route, RouteStep, StrideError};
use thiserror::Error;
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the HTTP clients in this crate.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The HTTP request failed or returned an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The body could not be understood.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

impl From<ClientError> for StrideError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http(e) => StrideError::RoutingUnavailable(e.to_string()),
            ClientError::BadResponse(msg) => StrideError::BadResponse(msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles and the service trait
// ─────────────────────────────────────────────────────────────────────────────

/// Travel profile requested from the routing backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingProfile {
    #[default]
    FootWalking,
    Wheelchair,
}

impl RoutingProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FootWalking => "foot-walking",
            Self::Wheelchair => "wheelchair",
        }
    }
}

impl fmt::Display for RoutingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingProfile {
    type Err = StrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "foot-walking" | "walking" | "foot" => Ok(Self::FootWalking),
            "wheelchair" => Ok(Self::Wheelchair),
            other => Err(StrideError::Config(format!("unknown routing profile '{other}'"))),
        }
    }
}

/// A source of walking routes.
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Plan a route from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// [`StrideError::RoutingUnavailable`] when the backend cannot be
    /// reached, [`StrideError::BadResponse`] when its answer is unusable.
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: &Destination,
        profile: RoutingProfile,
    ) -> Result<Route, StrideError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalization
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GeoJsonBody {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: LineString,
    properties: Properties,
}

#[derive(Deserialize)]
struct LineString {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct Properties {
    #[serde(default)]
    segments: Vec<Segment>,
    #[serde(default)]
    summary: Option<Summary>,
}

#[derive(Deserialize)]
struct Summary {
    #[serde(default)]
    distance: Option<f64>,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    steps: Vec<OrsStep>,
}

#[derive(Deserialize)]
struct OrsStep {
    #[serde(default)]
    distance: f64,
    instruction: String,
    #[serde(rename = "type")]
    kind: u8,
    way_points: Vec<usize>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct FlatBody {
    #[serde(default, alias = "totalDistance")]
    total_distance: Option<f64>,
    #[serde(default)]
    geometry: Vec<Vec<f64>>,
    maneuvers: Vec<FlatManeuver>,
}

#[derive(Deserialize)]
struct FlatManeuver {
    instruction: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    distance: f64,
    location: Vec<f64>,
    #[serde(default, alias = "roadName")]
    road_name: Option<String>,
    #[serde(default, alias = "maneuverPoint")]
    maneuver_point: Option<Vec<f64>>,
}

/// Map an openrouteservice numeric step type.
pub fn maneuver_from_ors(kind: u8) -> ManeuverType {
    match kind {
        0 | 2 | 4 | 12 => ManeuverType::Left,
        1 | 3 | 5 | 13 => ManeuverType::Right,
        7 | 8 => ManeuverType::Roundabout,
        9 => ManeuverType::Uturn,
        10 => ManeuverType::Arrive,
        11 => ManeuverType::Depart,
        _ => ManeuverType::Straight,
    }
}

fn lon_lat(pair: &[f64]) -> Result<Coordinate, StrideError> {
    match pair {
        [lon, lat, ..] => Ok(Coordinate::new(*lat, *lon)),
        _ => Err(StrideError::BadResponse(format!(
            "coordinate needs [lon, lat], got {pair:?}"
        ))),
    }
}

fn road_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && n != "-")
}

/// Ensure the final step is a terminal `arrive` at `at`.
fn terminate(steps: &mut Vec<RouteStep>, at: Coordinate, destination: &Destination) {
    if steps.last().is_some_and(|s| s.maneuver == ManeuverType::Arrive) {
        return;
    }
    let instruction = match &destination.name {
        Some(name) => format!("Arrive at {name}"),
        None => "Arrive at your destination".to_string(),
    };
    steps.push(RouteStep {
        instruction,
        maneuver: ManeuverType::Arrive,
        distance_to_next_m: 0.0,
        start: at,
        end: at,
        maneuver_point: None,
        road_name: None,
    });
}

/// Convert a routing backend body into a [`Route`].
///
/// # Errors
///
/// [`StrideError::BadResponse`] when the body matches neither known shape,
/// contains no steps, or references geometry that does not exist.
pub fn normalize_route(body: &Value, destination: &Destination) -> Result<Route, StrideError> {
    if body.get("features").is_some() {
        normalize_geojson(body, destination)
    } else if body.get("maneuvers").is_some() {
        normalize_flat(body, destination)
    } else {
        Err(StrideError::BadResponse(
            "routing body has neither 'features' nor 'maneuvers'".into(),
        ))
    }
}

fn normalize_geojson(body: &Value, destination: &Destination) -> Result<Route, StrideError> {
    let parsed = GeoJsonBody::deserialize(body)
        .map_err(|e| StrideError::BadResponse(format!("geojson route: {e}")))?;
    let feature = parsed
        .features
        .into_iter()
        .next()
        .ok_or_else(|| StrideError::BadResponse("geojson route has no features".into()))?;

    let geometry = feature
        .geometry
        .coordinates
        .iter()
        .map(|p| lon_lat(p))
        .collect::<Result<Vec<_>, _>>()?;

    let point = |idx: usize| {
        geometry.get(idx).copied().ok_or_else(|| {
            StrideError::BadResponse(format!(
                "way point {idx} outside geometry of {} points",
                geometry.len()
            ))
        })
    };

    let segment_total: f64 = feature.properties.segments.iter().map(|s| s.distance).sum();
    let mut steps = Vec::new();
    for step in feature
        .properties
        .segments
        .into_iter()
        .flat_map(|s| s.steps)
    {
        let (from, to) = match step.way_points.as_slice() {
            [from, to, ..] => (*from, *to),
            _ => {
                return Err(StrideError::BadResponse(
                    "step way_points must hold two indices".into(),
                ));
            }
        };
        steps.push(RouteStep {
            instruction: step.instruction,
            maneuver: maneuver_from_ors(step.kind),
            distance_to_next_m: step.distance.max(0.0),
            start: point(from)?,
            end: point(to)?,
            maneuver_point: None,
            road_name: road_name(step.name),
        });
    }
    if steps.is_empty() {
        return Err(StrideError::BadResponse("route has no steps".into()));
    }

    let last = geometry.last().copied().unwrap_or(destination.coordinate);
    terminate(&mut steps, last, destination);

    let total_distance_m = feature
        .properties
        .summary
        .and_then(|s| s.distance)
        .unwrap_or(segment_total);

    Ok(Route {
        steps,
        total_distance_m,
        geometry,
        destination: destination.clone(),
        degraded: false,
    })
}

fn normalize_flat(body: &Value, destination: &Destination) -> Result<Route, StrideError> {
    let parsed = FlatBody::deserialize(body)
        .map_err(|e| StrideError::BadResponse(format!("flat route: {e}")))?;
    if parsed.maneuvers.is_empty() {
        return Err(StrideError::BadResponse("route has no steps".into()));
    }

    let locations = parsed
        .maneuvers
        .iter()
        .map(|m| lon_lat(&m.location))
        .collect::<Result<Vec<_>, _>>()?;
    let mut geometry = parsed
        .geometry
        .iter()
        .map(|p| lon_lat(p))
        .collect::<Result<Vec<_>, _>>()?;
    if geometry.is_empty() {
        geometry = locations.clone();
    }
    let final_point = geometry.last().copied().unwrap_or(destination.coordinate);

    let mut steps = Vec::with_capacity(parsed.maneuvers.len() + 1);
    for (i, m) in parsed.maneuvers.into_iter().enumerate() {
        let start = locations[i];
        let end = locations.get(i + 1).copied().unwrap_or(final_point);
        let maneuver_point = m.maneuver_point.as_deref().map(lon_lat).transpose()?;
        steps.push(RouteStep {
            instruction: m.instruction,
            maneuver: ManeuverType::from_tag(&m.kind),
            distance_to_next_m: m.distance.max(0.0),
            start,
            end,
            maneuver_point,
            road_name: road_name(m.road_name),
        });
    }
    terminate(&mut steps, final_point, destination);

    let total_distance_m = parsed
        .total_distance
        .unwrap_or_else(|| steps.iter().map(|s| s.distance_to_next_m).sum());

    Ok(Route {
        steps,
        total_distance_m,
        geometry,
        destination: destination.clone(),
        degraded: false,
    })
}

/// A synthetic two-step route used when no backend answer is available.
pub fn straight_line_route(origin: Coordinate, destination: &Destination) -> Route {
    let target = destination.coordinate;
    let distance = haversine_m(origin, target);
    let label = destination
        .name
        .clone()
        .unwrap_or_else(|| "your destination".to_string());
    let rounded = ((distance / 10.0).round() * 10.0) as u64;

    Route {
        steps: vec![
            RouteStep {
                instruction: format!(
                    "Head towards {label}, about {rounded} metres in a straight line"
                ),
                maneuver: ManeuverType::Depart,
                distance_to_next_m: distance,
                start: origin,
                end: target,
                maneuver_point: None,
                road_name: None,
            },
            RouteStep {
                instruction: format!("You have arrived at {label}"),
                maneuver: ManeuverType::Arrive,
                distance_to_next_m: 0.0,
                start: target,
                end: target,
                maneuver_point: None,
                road_name: None,
            },
        ],
        total_distance_m: path_length_m(&[origin, target]),
        geometry: vec![origin, target],
        destination: destination.clone(),
        degraded: true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for an openrouteservice-compatible directions endpoint.
pub struct HttpRoutingService {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl fmt::Debug for HttpRoutingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRoutingService")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpRoutingService {
    /// # Errors
    ///
    /// [`ClientError::Http`] when the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    async fn request(
        &self,
        origin: Coordinate,
        destination: &Destination,
        profile: RoutingProfile,
    ) -> Result<Value, ClientError> {
        let url = format!("{}/v2/directions/{}/geojson", self.base_url, profile);
        let target = destination.coordinate;
        let body = json!({
            "coordinates": [
                [origin.longitude, origin.latitude],
                [target.longitude, target.latitude],
            ],
            "instructions": true,
            "units": "m",
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header(reqwest::header::AUTHORIZATION, key);
        }
        debug!(%url, %origin, %target, "requesting route");
        let value: Value = req.send().await?.error_for_status()?.json().await?;
        Ok(value)
    }
}

#[async_trait]
impl RoutingService for HttpRoutingService {
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: &Destination,
        profile: RoutingProfile,
    ) -> Result<Route, StrideError> {
        let body = self.request(origin, destination, profile).await?;
        let route = normalize_route(&body, destination)?;
        info!(
            steps = route.steps.len(),
            total_distance_m = route.total_distance_m,
            %profile,
            "route received"
        );
        Ok(route)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted stub
// ─────────────────────────────────────────────────────────────────────────────

/// A routing service that replays queued answers, then repeats a default.
///
/// With no default it plans a direct two-step route from whatever origin it
/// is asked for. Used by tests and the CLI simulation.
#[derive(Debug)]
pub struct ScriptedRouting {
    queue: Mutex<VecDeque<Result<Route, StrideError>>>,
    default: Mutex<Option<Result<Route, StrideError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    origins: Mutex<Vec<Coordinate>>,
}

impl ScriptedRouting {
    /// Always answer with `route`.
    pub fn always(route: Route) -> Self {
        Self::with_default(Some(Ok(route)))
    }

    /// Always fail with `err`.
    pub fn failing(err: StrideError) -> Self {
        Self::with_default(Some(Err(err)))
    }

    /// Always answer with a direct route from the requested origin.
    pub fn direct() -> Self {
        Self::with_default(None)
    }

    fn with_default(default: Option<Result<Route, StrideError>>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
            origins: Mutex::new(Vec::new()),
        }
    }

    /// Answer the next call with `answer` instead of the default.
    pub fn push(&self, answer: Result<Route, StrideError>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(answer);
    }

    pub fn set_default(&self, answer: Result<Route, StrideError>) {
        *self.default.lock().unwrap_or_else(|e| e.into_inner()) = Some(answer);
    }

    /// Delay every answer; useful to exercise the routing timeout.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Origins of every call, oldest first.
    pub fn origins(&self) -> Vec<Coordinate> {
        self.origins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RoutingService for ScriptedRouting {
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: &Destination,
        _profile: RoutingProfile,
    ) -> Result<Route, StrideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.origins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(origin);
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let fallback = || {
            self.default
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
                .unwrap_or_else(|| {
                    let mut route = straight_line_route(origin, destination);
                    route.degraded = false;
                    Ok(route)
                })
        };
        let mut answer = queued.unwrap_or_else(fallback)?;
        answer.destination = destination.clone();
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> Destination {
        Destination::named(Coordinate::new(-37.9100, 145.0100), "Library")
    }

    fn ors_body() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [
                        [145.0000, -37.9000],
                        [145.0000, -37.9013],
                        [145.0020, -37.9013],
                        [145.0100, -37.9100]
                    ]
                },
                "properties": {
                    "summary": { "distance": 1350.0, "duration": 970.0 },
                    "segments": [{
                        "distance": 1350.0,
                        "steps": [
                            { "distance": 150.0, "instruction": "Head south on Main Street",
                              "type": 11, "way_points": [0, 1], "name": "Main Street" },
                            { "distance": 200.0, "instruction": "Turn right onto High Street",
                              "type": 1, "way_points": [1, 2], "name": "High Street" },
                            { "distance": 1000.0, "instruction": "Keep left",
                              "type": 12, "way_points": [2, 3], "name": "-" },
                            { "distance": 0.0, "instruction": "Arrive at Library",
                              "type": 10, "way_points": [3, 3], "name": "-" }
                        ]
                    }]
                }
            }]
        })
    }

    #[test]
    fn geojson_steps_are_normalized() {
        let route = normalize_route(&ors_body(), &dest()).unwrap();
        assert_eq!(route.steps.len(), 4);
        assert_eq!(route.total_distance_m, 1350.0);
        assert!(!route.degraded);

        let kinds: Vec<_> = route.steps.iter().map(|s| s.maneuver).collect();
        assert_eq!(
            kinds,
            vec![
                ManeuverType::Depart,
                ManeuverType::Right,
                ManeuverType::Left,
                ManeuverType::Arrive
            ]
        );
        assert_eq!(route.steps[0].end, Coordinate::new(-37.9013, 145.0000));
        assert_eq!(route.steps[1].start, route.steps[0].end);
        assert_eq!(route.steps[0].road_name.as_deref(), Some("Main Street"));
        assert_eq!(route.steps[2].road_name, None);
        assert_eq!(route.geometry.len(), 4);
    }

    #[test]
    fn way_point_out_of_range_is_rejected() {
        let mut body = ors_body();
        body["features"][0]["properties"]["segments"][0]["steps"][1]["way_points"] = json!([1, 99]);
        let err = normalize_route(&body, &dest()).unwrap_err();
        assert!(matches!(err, StrideError::BadResponse(_)));
    }

    #[test]
    fn flat_maneuvers_are_normalized_and_terminated() {
        let body = json!({
            "total_distance": 350.0,
            "geometry": [[145.0, -37.9], [145.0, -37.9013], [145.002, -37.9013]],
            "maneuvers": [
                { "instruction": "Head south", "type": "depart", "distance": 150.0,
                  "location": [145.0, -37.9] },
                { "instruction": "Turn right", "type": "right", "distance": 200.0,
                  "location": [145.0, -37.9013], "roadName": "High Street" }
            ]
        });
        let route = normalize_route(&body, &dest()).unwrap();
        assert_eq!(route.steps.len(), 3);
        assert_eq!(route.steps[0].end, Coordinate::new(-37.9013, 145.0));
        assert_eq!(route.steps[1].end, Coordinate::new(-37.9013, 145.002));
        assert_eq!(route.steps[1].road_name.as_deref(), Some("High Street"));
        assert_eq!(route.steps[2].maneuver, ManeuverType::Arrive);
        assert_eq!(route.steps[2].instruction, "Arrive at Library");
        assert_eq!(route.total_distance_m, 350.0);
    }

    #[test]
    fn flat_without_geometry_uses_maneuver_locations() {
        let body = json!({
            "maneuvers": [
                { "instruction": "Head south", "type": "depart", "distance": 150.0,
                  "location": [145.0, -37.9] },
                { "instruction": "Arrive", "type": "arrive", "distance": 0.0,
                  "location": [145.0, -37.9013] }
            ]
        });
        let route = normalize_route(&body, &dest()).unwrap();
        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.geometry.len(), 2);
        assert_eq!(route.total_distance_m, 150.0);
    }

    #[test]
    fn unknown_shape_is_bad_response() {
        let err = normalize_route(&json!({"routes": []}), &dest()).unwrap_err();
        assert!(matches!(err, StrideError::BadResponse(_)));
        let err = normalize_route(&json!({"maneuvers": []}), &dest()).unwrap_err();
        assert!(matches!(err, StrideError::BadResponse(_)));
    }

    #[test]
    fn ors_type_table() {
        assert_eq!(maneuver_from_ors(0), ManeuverType::Left);
        assert_eq!(maneuver_from_ors(13), ManeuverType::Right);
        assert_eq!(maneuver_from_ors(6), ManeuverType::Straight);
        assert_eq!(maneuver_from_ors(7), ManeuverType::Roundabout);
        assert_eq!(maneuver_from_ors(9), ManeuverType::Uturn);
        assert_eq!(maneuver_from_ors(42), ManeuverType::Straight);
    }

    #[test]
    fn straight_line_fallback_shape() {
        let origin = Coordinate::new(-37.9000, 145.0000);
        let route = straight_line_route(origin, &dest());
        assert!(route.degraded);
        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.steps[0].maneuver, ManeuverType::Depart);
        assert_eq!(route.steps[1].maneuver, ManeuverType::Arrive);
        assert_eq!(route.geometry, vec![origin, dest().coordinate]);
        assert!(route.steps[0].instruction.starts_with("Head towards Library"));
        assert!((route.total_distance_m - route.steps[0].distance_to_next_m).abs() < 1e-6);
    }

    #[test]
    fn profile_parsing() {
        assert_eq!("foot-walking".parse::<RoutingProfile>().unwrap(), RoutingProfile::FootWalking);
        assert_eq!("wheelchair".parse::<RoutingProfile>().unwrap(), RoutingProfile::Wheelchair);
        assert!("driving-car".parse::<RoutingProfile>().is_err());
        assert_eq!(RoutingProfile::default().to_string(), "foot-walking");
    }

    #[test]
    fn http_client_debug_redacts_key() {
        let svc = HttpRoutingService::new(
            "https://api.example.org/",
            Some("secret-key".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let dbg = format!("{svc:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("https://api.example.org\""));
    }

    #[tokio::test]
    async fn scripted_routing_replays_queue_then_default() {
        let origin = Coordinate::new(-37.9, 145.0);
        let svc = ScriptedRouting::always(straight_line_route(origin, &dest()));
        svc.push(Err(StrideError::RoutingUnavailable("down".into())));

        let first = svc.fetch_route(origin, &dest(), RoutingProfile::FootWalking).await;
        let second = svc.fetch_route(origin, &dest(), RoutingProfile::FootWalking).await;
        assert!(first.is_err());
        assert!(second.is_ok());
        assert_eq!(svc.calls(), 2);
        assert_eq!(svc.origins().len(), 2);
    }

    #[tokio::test]
    async fn direct_routing_starts_at_requested_origin() {
        let svc = ScriptedRouting::direct();
        let origin = Coordinate::new(-37.905, 145.002);
        let route = svc
            .fetch_route(origin, &dest(), RoutingProfile::Wheelchair)
            .await
            .unwrap();
        assert!(!route.degraded);
        assert_eq!(route.steps[0].start, origin);
        assert_eq!(route.destination, dest());
    }
}
