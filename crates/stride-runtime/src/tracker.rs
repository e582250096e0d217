//! [`RouteTracker`] – route state and turn-by-turn progression.
//!
//! The tracker owns one active [`Route`] and walks it as position fixes
//! arrive. Every fix is measured against the current step's target (its
//! maneuver point, else its end coordinate):
//!
//! 1. **Advance** – inside the arrival radius the step index moves forward
//!    by one and the new step's instruction is announced. Reaching the
//!    target of the final `arrive` step ends navigation.
//! 2. **Approach callout** – once per step, between the arrival radius and
//!    the approach distance, "In N metres, …" is announced.
//! 3. **Deviation** – when the fix is further than the deviation threshold
//!    from the current step's path and the recalculation cooldown has
//!    elapsed, a new route is requested from the current position.
//!
//! ```text
//!  Idle ──start_route──▶ Navigating ──deviation──▶ Recalculating
//!                           ▲  │                        │
//!                           │  └──────arrive──▶ Arrived │
//!                           └────────────────────────────┘
//! ```
//!
//! All mutation happens through `&mut self`, so a recalculation can never
//! overlap another one or a position update. Spoken output goes through the
//! navigation [`SpeechGate`]; lifecycle changes are published on the
//! [`EventBus`].

use std::sync::Arc;
use std::time::Duration;

use stride_hal::location::{LocationOptions, LocationProvider, LocationSubscription};
use stride_hal::speech::SpeechEngine;
use stride_kernel::{Cooldown, GatePolicy, GateStatus, SpeechGate};
use stride_middleware::EventBus;
use stride_middleware::routing::{RoutingProfile, RoutingService, straight_line_route};
use stride_perception::geo::{distance_to_segment_m, haversine_m};
use stride_types::{
    Coordinate, Destination, EventPayload, GatePurpose, ManeuverType, Position, RiskLevel, Route,
    Sensor, StrideError,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SOURCE: &str = "stride-runtime::tracker";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Thresholds and timings for [`RouteTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub profile: RoutingProfile,
    /// A step target closer than this counts as reached.
    pub arrival_threshold_m: f64,
    /// Upper bound of the approach callout band.
    pub approach_distance_m: f64,
    /// Distance from the step path that counts as off route.
    pub deviation_threshold_m: f64,
    /// Minimum time between two recalculation attempts.
    pub deviation_cooldown: Duration,
    /// Refinements of the current step distance smaller than this do not
    /// trigger an ETA update.
    pub eta_hysteresis_m: f64,
    pub walking_speed_mps: f64,
    pub routing_timeout: Duration,
    pub location: LocationOptions,
    pub speech: GatePolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            profile: RoutingProfile::FootWalking,
            arrival_threshold_m: 20.0,
            approach_distance_m: 80.0,
            deviation_threshold_m: 50.0,
            deviation_cooldown: Duration::from_secs(10),
            eta_hysteresis_m: 5.0,
            walking_speed_mps: 1.4,
            routing_timeout: Duration::from_secs(15),
            location: LocationOptions::default(),
            speech: GatePolicy::navigation(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Navigating,
    Recalculating,
    Arrived,
}

/// Remaining distance and time from the current position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteProgress {
    pub step_index: usize,
    pub remaining_m: f64,
    pub eta: Duration,
}

/// Markers that reset whenever the step or the route changes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct StepMarkers {
    pre_announced: bool,
    off_route: bool,
    /// Current-step distance the last ETA was computed from.
    eta_basis_m: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// RouteTracker
// ─────────────────────────────────────────────────────────────────────────────

pub struct RouteTracker {
    config: TrackerConfig,
    routing: Arc<dyn RoutingService>,
    gate: SpeechGate,
    bus: EventBus,
    state: TrackerState,
    route: Option<Route>,
    current_step: usize,
    markers: StepMarkers,
    recalc: Cooldown,
    recalc_attempts: usize,
    progress: Option<RouteProgress>,
    last_position: Option<Position>,
    subscription: Option<LocationSubscription>,
}

impl RouteTracker {
    pub fn new(
        config: TrackerConfig,
        routing: Arc<dyn RoutingService>,
        speech: Arc<dyn SpeechEngine>,
        bus: EventBus,
    ) -> Self {
        Self {
            gate: SpeechGate::new(config.speech, speech),
            recalc: Cooldown::new(config.deviation_cooldown),
            config,
            routing,
            bus,
            state: TrackerState::Idle,
            route: None,
            current_step: 0,
            markers: StepMarkers::default(),
            recalc_attempts: 0,
            progress: None,
            last_position: None,
            subscription: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn progress(&self) -> Option<RouteProgress> {
        self.progress
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    /// Number of recalculations attempted on the active navigation.
    pub fn recalculation_attempts(&self) -> usize {
        self.recalc_attempts
    }

    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ── Route lifecycle ─────────────────────────────────────────────────────

    /// Plan and install a route. Never fails: when the routing service is
    /// unavailable a degraded straight-line route is installed instead.
    /// Returns a copy of the installed route.
    pub async fn start_route(&mut self, origin: Coordinate, destination: Destination) -> Route {
        info!(%origin, target = %destination.coordinate, "starting route");
        let route = match self.fetch(origin, &destination).await {
            Ok(route) => route,
            Err(e) => {
                warn!(error = %e, "routing unavailable; falling back to straight line");
                self.bus.emit(
                    SOURCE,
                    EventPayload::RoutingDegraded {
                        reason: e.to_string(),
                    },
                );
                straight_line_route(origin, &destination)
            }
        };

        self.recalc.reset();
        self.recalc_attempts = 0;
        self.install(route.clone());

        let announcement = self.first_announcement();
        self.say(&announcement, RiskLevel::Low, true);
        route
    }

    /// Request a new route from `origin`.
    ///
    /// Returns `true` when a new route was installed. On failure the
    /// previous route stays active and the next attempt waits for the
    /// cooldown. Does nothing unless a route is active.
    pub async fn recalculate(&mut self, origin: Coordinate, destination: Destination) -> bool {
        self.recalculate_at(origin, destination, Instant::now()).await
    }

    async fn recalculate_at(
        &mut self,
        origin: Coordinate,
        destination: Destination,
        now: Instant,
    ) -> bool {
        if !matches!(self.state, TrackerState::Navigating) {
            debug!(state = ?self.state, "recalculation ignored");
            return false;
        }
        self.recalc.mark(now);
        self.recalc_attempts += 1;
        self.state = TrackerState::Recalculating;
        self.bus.emit(
            SOURCE,
            EventPayload::RecalculationStarted {
                latitude: origin.latitude,
                longitude: origin.longitude,
            },
        );
        info!(%origin, attempt = self.recalc_attempts, "recalculating route");
        self.say("Off route. Recalculating.", RiskLevel::Medium, false);

        match self.fetch(origin, &destination).await {
            Ok(route) => {
                self.install(route);
                self.bus
                    .emit(SOURCE, EventPayload::RecalculationFinished { success: true });
                let first = self.first_announcement();
                self.say(&first, RiskLevel::Low, true);
                true
            }
            Err(e) => {
                warn!(error = %e, "recalculation failed; keeping previous route");
                self.state = TrackerState::Navigating;
                self.bus
                    .emit(SOURCE, EventPayload::RecalculationFinished { success: false });
                false
            }
        }
    }

    /// Cancel the location subscription and forget the route. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
        if self.state != TrackerState::Idle {
            info!("navigation stopped");
        }
        self.state = TrackerState::Idle;
        self.route = None;
        self.current_step = 0;
        self.markers = StepMarkers::default();
        self.recalc.reset();
        self.progress = None;
        self.last_position = None;
        self.gate.reset();
    }

    // ── Location feed ───────────────────────────────────────────────────────

    /// Subscribe to `provider` with the configured options.
    ///
    /// # Errors
    ///
    /// Returns the provider's error. A permission denial is announced and
    /// published before it is returned.
    pub fn attach_location(&mut self, provider: &dyn LocationProvider) -> Result<(), StrideError> {
        if let Some(mut old) = self.subscription.take() {
            old.cancel();
        }
        match provider.subscribe(self.config.location) {
            Ok(sub) => {
                self.subscription = Some(sub);
                Ok(())
            }
            Err(StrideError::PermissionDenied(sensor)) => {
                warn!(%sensor, "location permission denied");
                self.say(
                    "Location permission is needed for navigation. Please enable it in settings.",
                    RiskLevel::High,
                    true,
                );
                self.bus.emit(SOURCE, EventPayload::PermissionDenied(sensor));
                Err(StrideError::PermissionDenied(sensor))
            }
            Err(e) => {
                self.bus.emit(
                    SOURCE,
                    EventPayload::ServiceFault {
                        component: Sensor::Location.to_string(),
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Wait for the next fix from the attached provider. `None` when no
    /// provider is attached or the feed ended.
    pub async fn next_update(&mut self) -> Option<Position> {
        match self.subscription.as_mut() {
            Some(sub) => sub.recv().await,
            None => None,
        }
    }

    /// Feed fixes into [`on_position_update`][Self::on_position_update]
    /// until arrival or until the feed ends. Returns the final state.
    pub async fn run(&mut self) -> TrackerState {
        while let Some(position) = self.next_update().await {
            self.on_position_update(position).await;
            if self.state == TrackerState::Arrived {
                break;
            }
        }
        self.state
    }

    // ── Tracking ────────────────────────────────────────────────────────────

    /// Process one fix. Ignored unless navigating.
    pub async fn on_position_update(&mut self, position: Position) {
        if self.state != TrackerState::Navigating {
            return;
        }
        self.last_position = Some(position);
        let here = position.coordinate();

        let Some(route) = self.route.as_ref() else {
            return;
        };
        let last_index = route.last_index();
        let step = &route.steps[self.current_step];
        let target_distance = haversine_m(here, step.target());
        let path_distance = distance_to_segment_m(here, step.start, step.end);
        let maneuver = step.maneuver;
        let instruction = step.instruction.clone();
        let destination = route.destination.clone();

        if target_distance < self.config.arrival_threshold_m {
            if self.current_step >= last_index {
                self.arrive(&destination);
            } else {
                self.advance();
            }
            return;
        }

        if !self.markers.pre_announced
            && target_distance <= self.config.approach_distance_m
            && !matches!(maneuver, ManeuverType::Depart | ManeuverType::Arrive)
        {
            self.markers.pre_announced = true;
            let metres = approach_metres(target_distance);
            self.say(&format!("In {metres} metres, {instruction}"), RiskLevel::Low, false);
        }

        if path_distance > self.config.deviation_threshold_m {
            if !self.markers.off_route {
                self.markers.off_route = true;
                info!(path_distance, step = self.current_step, "off route");
            }
            if self.recalc.ready(position.received_at) {
                self.recalculate_at(here, destination, position.received_at)
                    .await;
                return;
            }
            debug!(
                remaining = ?self.recalc.remaining(position.received_at),
                "off route; recalculation cooling down"
            );
        } else if self.markers.off_route {
            self.markers.off_route = false;
            info!(step = self.current_step, "back on route");
        }

        self.refine_progress(target_distance);
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn fetch(
        &self,
        origin: Coordinate,
        destination: &Destination,
    ) -> Result<Route, StrideError> {
        let request = self
            .routing
            .fetch_route(origin, destination, self.config.profile);
        let route = match tokio::time::timeout(self.config.routing_timeout, request).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(StrideError::RoutingUnavailable(format!(
                    "no answer within {} ms",
                    self.config.routing_timeout.as_millis()
                )));
            }
        };
        if route.steps.is_empty() {
            return Err(StrideError::BadResponse("route has no steps".into()));
        }
        Ok(route)
    }

    fn install(&mut self, route: Route) {
        self.bus.emit(
            SOURCE,
            EventPayload::RouteInstalled {
                steps: route.steps.len(),
                total_distance_m: route.total_distance_m,
                degraded: route.degraded,
            },
        );
        info!(
            steps = route.steps.len(),
            total_distance_m = route.total_distance_m,
            degraded = route.degraded,
            "route installed"
        );
        self.route = Some(route);
        self.current_step = 0;
        self.markers = StepMarkers::default();
        self.state = TrackerState::Navigating;
        self.recompute_progress();
    }

    fn first_announcement(&self) -> String {
        match self.route.as_ref() {
            Some(route) if route.degraded => format!(
                "Route service unavailable, using straight-line guidance. {}",
                route.steps[0].instruction
            ),
            Some(route) => route.steps[0].instruction.clone(),
            None => String::new(),
        }
    }

    fn advance(&mut self) {
        let Some(route) = self.route.as_ref() else {
            return;
        };
        self.current_step = (self.current_step + 1).min(route.last_index());
        self.markers = StepMarkers::default();
        let instruction = route.steps[self.current_step].instruction.clone();
        info!(index = self.current_step, %instruction, "step advanced");
        self.bus.emit(
            SOURCE,
            EventPayload::StepAdvanced {
                index: self.current_step,
                instruction: instruction.clone(),
            },
        );
        self.say(&instruction, RiskLevel::Low, false);
        self.recompute_progress();
    }

    fn arrive(&mut self, destination: &Destination) {
        self.state = TrackerState::Arrived;
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
        let text = match &destination.name {
            Some(name) => format!("You have arrived at {name}."),
            None => "You have arrived at your destination.".to_string(),
        };
        info!("arrived");
        self.bus.emit(SOURCE, EventPayload::Arrived);
        self.say(&text, RiskLevel::Low, true);
        self.progress = Some(RouteProgress {
            step_index: self.current_step,
            remaining_m: 0.0,
            eta: Duration::ZERO,
        });
    }

    /// Update the current step distance when it moved by more than the
    /// hysteresis, then recompute the ETA.
    fn refine_progress(&mut self, target_distance: f64) {
        let changed = self
            .markers
            .eta_basis_m
            .is_none_or(|basis| (basis - target_distance).abs() > self.config.eta_hysteresis_m);
        if !changed {
            return;
        }
        if let Some(route) = self.route.as_mut() {
            route.steps[self.current_step].distance_to_next_m = target_distance;
        }
        self.markers.eta_basis_m = Some(target_distance);
        self.recompute_progress();
    }

    fn recompute_progress(&mut self) {
        let Some(route) = self.route.as_ref() else {
            return;
        };
        let remaining_m: f64 = route.steps[self.current_step..]
            .iter()
            .map(|s| s.distance_to_next_m)
            .sum();
        let eta_secs = if self.config.walking_speed_mps > 0.0 {
            remaining_m / self.config.walking_speed_mps
        } else {
            0.0
        };
        let progress = RouteProgress {
            step_index: self.current_step,
            remaining_m,
            eta: Duration::from_secs_f64(eta_secs.max(0.0)),
        };
        self.progress = Some(progress);
        self.bus.emit(
            SOURCE,
            EventPayload::Progress {
                step_index: progress.step_index,
                remaining_m,
                eta_secs: progress.eta.as_secs(),
            },
        );
    }

    fn say(&mut self, text: &str, risk: RiskLevel, force: bool) -> bool {
        let spoken = self.gate.speak(text, risk, force);
        if spoken {
            self.bus.emit(
                SOURCE,
                EventPayload::GuidanceSpoken {
                    purpose: GatePurpose::Navigation,
                    text: text.to_string(),
                    risk,
                },
            );
        }
        spoken
    }
}

impl Drop for RouteTracker {
    fn drop(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
    }
}

/// Round an approach distance to the nearest 5 m for speech.
fn approach_metres(distance_m: f64) -> u64 {
    ((distance_m / 5.0).round() * 5.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_hal::sim::{SimLocation, SimSpeech};
    use stride_middleware::routing::ScriptedRouting;
    use stride_middleware::Topic;
    use stride_perception::geo::offset;
    use stride_types::RouteStep;

    const ORIGIN: Coordinate = Coordinate::new(-37.9000, 145.0000);
    const DEST: Coordinate = Coordinate::new(-37.9100, 145.0100);

    /// depart 150 m south, turn right and walk 200 m west, arrive.
    fn stub_route() -> Route {
        let corner = offset(ORIGIN, 0.0, -150.0);
        let end = offset(corner, -200.0, 0.0);
        let step = |instruction: &str, maneuver, distance, start, end| RouteStep {
            instruction: instruction.to_string(),
            maneuver,
            distance_to_next_m: distance,
            start,
            end,
            maneuver_point: None,
            road_name: None,
        };
        Route {
            steps: vec![
                step("Head south on Main Street", ManeuverType::Depart, 150.0, ORIGIN, corner),
                step("Turn right onto High Street", ManeuverType::Right, 200.0, corner, end),
                step("Arrive at the library", ManeuverType::Arrive, 0.0, end, end),
            ],
            total_distance_m: 350.0,
            geometry: vec![ORIGIN, corner, end],
            destination: Destination::named(DEST, "the library"),
            degraded: false,
        }
    }

    struct Harness {
        tracker: RouteTracker,
        routing: Arc<ScriptedRouting>,
        speech: Arc<SimSpeech>,
        bus: EventBus,
    }

    fn harness() -> Harness {
        let routing = Arc::new(ScriptedRouting::direct());
        routing.push(Ok(stub_route()));
        let speech = SimSpeech::new();
        let bus = EventBus::default();
        let tracker = RouteTracker::new(
            TrackerConfig::default(),
            routing.clone(),
            speech.clone(),
            bus.clone(),
        );
        Harness {
            tracker,
            routing,
            speech,
            bus,
        }
    }

    fn at(c: Coordinate) -> Position {
        Position::now(c.latitude, c.longitude)
    }

    #[tokio::test(start_paused = true)]
    async fn start_route_installs_and_forces_first_instruction() {
        let mut h = harness();
        let route = h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        assert_eq!(route.steps.len(), 3);
        assert_eq!(h.tracker.state(), TrackerState::Navigating);
        assert_eq!(h.tracker.current_step(), 0);
        assert_eq!(h.speech.last_spoken().as_deref(), Some("Head south on Main Street"));
    }

    #[tokio::test(start_paused = true)]
    async fn routing_failure_falls_back_to_straight_line() {
        let routing = Arc::new(ScriptedRouting::failing(StrideError::RoutingUnavailable(
            "502".into(),
        )));
        let speech = SimSpeech::new();
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let mut tracker =
            RouteTracker::new(TrackerConfig::default(), routing, speech.clone(), bus.clone());

        let route = tracker
            .start_route(ORIGIN, Destination::named(DEST, "the park"))
            .await;
        assert!(route.degraded);
        assert_eq!(route.steps.len(), 2);
        assert_eq!(tracker.state(), TrackerState::Navigating);
        assert!(
            speech
                .last_spoken()
                .is_some_and(|t| t.starts_with("Route service unavailable"))
        );
        let event = alerts.try_recv().expect("degraded alert");
        assert!(matches!(event.payload, EventPayload::RoutingDegraded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn routing_timeout_falls_back_to_straight_line() {
        let h = harness();
        h.routing.set_delay(Some(Duration::from_secs(60)));
        let mut tracker = h.tracker;
        let route = tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        assert!(route.degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_approach_advances_exactly_once() {
        let mut h = harness();
        let mut nav = h.bus.subscribe_to(Topic::Navigation);
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        while nav.try_recv().is_some() {}

        // Walk down step 0 in 5 m increments, past the corner.
        for metres in (0..=160).step_by(5) {
            let p = at(offset(ORIGIN, 0.0, -(metres as f64)));
            h.tracker.on_position_update(p).await;
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        let mut advances = 0;
        while let Some(event) = nav.try_recv() {
            if matches!(event.payload, EventPayload::StepAdvanced { index: 1, .. }) {
                advances += 1;
            }
        }
        assert_eq!(advances, 1);
        assert_eq!(h.tracker.current_step(), 1);
        assert_eq!(h.routing.calls(), 1, "no recalculation while on path");
    }

    #[tokio::test(start_paused = true)]
    async fn approach_callout_is_spoken_once_per_step() {
        let mut h = harness();
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        let corner = offset(ORIGIN, 0.0, -150.0);
        h.tracker.on_position_update(at(offset(corner, 0.0, 1.0))).await;
        assert_eq!(h.tracker.current_step(), 1);
        tokio::time::advance(Duration::from_secs(20)).await;

        // 60 m before the end of step 1.
        let near_end = offset(corner, -140.0, 0.0);
        h.tracker.on_position_update(at(near_end)).await;
        tokio::time::advance(Duration::from_secs(20)).await;
        h.tracker.on_position_update(at(offset(corner, -145.0, 0.0))).await;

        let callouts: Vec<_> = h
            .speech
            .spoken()
            .into_iter()
            .filter(|t| t.starts_with("In "))
            .collect();
        assert_eq!(callouts, vec!["In 60 metres, Turn right onto High Street".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_drift_triggers_exactly_one_recalculation() {
        let mut h = harness();
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;

        // 80 m east of the middle of step 0, sampled every 2 s for 20 s.
        let drifted = offset(ORIGIN, 80.0, -75.0);
        for _ in 0..10 {
            h.tracker.on_position_update(at(drifted)).await;
            tokio::time::advance(Duration::from_secs(2)).await;
        }

        assert_eq!(h.routing.calls(), 2, "start + one recalculation");
        assert_eq!(h.tracker.recalculation_attempts(), 1);
        assert_eq!(h.tracker.state(), TrackerState::Navigating);
        let route = h.tracker.route().unwrap();
        assert_eq!(route.steps[0].start, drifted);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_recalculation_keeps_route_and_waits_for_cooldown() {
        let mut h = harness();
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        h.routing
            .set_default(Err(StrideError::RoutingUnavailable("down".into())));

        let drifted = offset(ORIGIN, 80.0, -75.0);
        for _ in 0..10 {
            h.tracker.on_position_update(at(drifted)).await;
            tokio::time::advance(Duration::from_secs(2)).await;
        }

        // Attempts at t=0 and t=10; t=20 is outside the sampled window.
        assert_eq!(h.tracker.recalculation_attempts(), 2);
        assert_eq!(h.tracker.state(), TrackerState::Navigating);
        assert_eq!(h.tracker.route().unwrap().steps.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reaching_last_step_arrives_with_forced_message() {
        let mut h = harness();
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        let corner = offset(ORIGIN, 0.0, -150.0);
        let end = offset(corner, -200.0, 0.0);

        h.tracker.on_position_update(at(corner)).await;
        h.tracker.on_position_update(at(end)).await;
        assert_eq!(h.tracker.current_step(), 2);
        h.tracker.on_position_update(at(end)).await;

        assert_eq!(h.tracker.state(), TrackerState::Arrived);
        assert_eq!(
            h.speech.last_spoken().as_deref(),
            Some("You have arrived at your destination.")
        );
        assert_eq!(h.tracker.progress().map(|p| p.remaining_m), Some(0.0));

        // Further fixes are ignored.
        h.tracker.on_position_update(at(ORIGIN)).await;
        assert_eq!(h.tracker.state(), TrackerState::Arrived);
    }

    #[tokio::test(start_paused = true)]
    async fn eta_uses_walking_speed_and_hysteresis() {
        let mut h = harness();
        let mut telemetry = h.bus.subscribe_to(Topic::Telemetry);
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;

        let progress = h.tracker.progress().unwrap();
        assert_eq!(progress.remaining_m, 350.0);
        assert_eq!(progress.eta.as_secs(), 250);
        while telemetry.try_recv().is_some() {}

        // 100 m from the corner: refined, new ETA published.
        h.tracker.on_position_update(at(offset(ORIGIN, 0.0, -50.0))).await;
        assert!(telemetry.try_recv().is_some());
        // 3 m further: inside the hysteresis, nothing published.
        h.tracker.on_position_update(at(offset(ORIGIN, 0.0, -53.0))).await;
        assert!(telemetry.try_recv().is_none());
        let remaining = h.tracker.progress().unwrap().remaining_m;
        assert!((remaining - 300.0).abs() < 1.0, "got {remaining}");
    }

    #[tokio::test(start_paused = true)]
    async fn updates_are_ignored_when_idle() {
        let mut h = harness();
        h.tracker.on_position_update(at(ORIGIN)).await;
        assert_eq!(h.tracker.state(), TrackerState::Idle);
        assert!(h.tracker.last_position().is_none());
        assert!(!h.tracker.recalculate(ORIGIN, Destination::new(DEST)).await);
        assert_eq!(h.routing.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_subscription_and_is_idempotent() {
        let mut h = harness();
        let location = SimLocation::new();
        h.tracker.attach_location(location.as_ref()).unwrap();
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;
        assert!(location.has_subscriber());

        h.tracker.stop();
        assert!(!location.has_subscriber());
        assert!(!location.push(at(ORIGIN)));
        assert_eq!(h.tracker.state(), TrackerState::Idle);
        assert!(h.tracker.route().is_none());

        h.tracker.stop();
        assert_eq!(h.tracker.state(), TrackerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_announced_and_returned() {
        let mut h = harness();
        let mut alerts = h.bus.subscribe_to(Topic::SystemAlerts);
        let location = SimLocation::new();
        location.set_permission_denied(true);

        let err = h.tracker.attach_location(location.as_ref()).unwrap_err();
        assert!(matches!(err, StrideError::PermissionDenied(Sensor::Location)));
        assert!(
            h.speech
                .last_spoken()
                .is_some_and(|t| t.starts_with("Location permission"))
        );
        let event = alerts.try_recv().expect("permission alert");
        assert!(matches!(
            event.payload,
            EventPayload::PermissionDenied(Sensor::Location)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn run_pumps_subscription_until_arrival() {
        let mut h = harness();
        let location = SimLocation::new();
        h.tracker.attach_location(location.as_ref()).unwrap();
        h.tracker.start_route(ORIGIN, Destination::new(DEST)).await;

        let corner = offset(ORIGIN, 0.0, -150.0);
        let end = offset(corner, -200.0, 0.0);
        for c in [corner, end, end] {
            assert!(location.push(at(c)));
        }
        let final_state = h.tracker.run().await;
        assert_eq!(final_state, TrackerState::Arrived);
        assert!(!location.has_subscriber());
    }

    #[test]
    fn approach_distance_rounds_to_five_metres() {
        assert_eq!(approach_metres(62.4), 60);
        assert_eq!(approach_metres(62.6), 65);
        assert_eq!(approach_metres(20.0), 20);
    }
}
