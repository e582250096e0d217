//! REPL – Read-Eval-Print Loop for the stride interactive session.
//!
//! Supported slash-commands:
//!   /route [<lat,lon>] <lat,lon> [name]  – plan and start a route
//!   /pos <lat,lon>                       – feed a position fix
//!   /scan on|off|text|once               – control the sensing loop
//!   /status                              – tracker, gates and backends
//!   /schema                              – perception response JSON schema
//!   /stop                                – stop navigation and sensing
//!   /help                                – show this list
//!   /quit | /exit                        – gracefully exit the CLI

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tracing::warn;

use stride_hal::sim::{SimCamera, SimSpeech};
use stride_middleware::perception_client::{
    HttpPerceptionService, PerceptionReply, PerceptionService, ScriptedPerception,
};
use stride_middleware::routing::{HttpRoutingService, RoutingService, ScriptedRouting};
use stride_middleware::EventBus;
use stride_perception::PerceptionResponse;
use stride_perception::response::response_schema;
use stride_runtime::{CycleOutcome, RouteTracker, SensingLoop, SensingMode};
use stride_types::{Coordinate, Destination, Event, EventPayload, Position, RiskLevel};

use crate::config::Config;

const SOURCE: &str = "stride-cli";

/// Canned frame description used when no perception backend is reachable.
const DEMO_FRAME: &str = r#"{
    "frame_id": "demo",
    "detections": [
        {"label": "chair", "confidence": 0.82, "severity": "near", "side": "left"},
        {"label": "exit sign", "confidence": 0.64, "severity": "far", "side": "center"}
    ]
}"#;

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanArg {
    On,
    Off,
    Text,
    Once,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Route {
        origin: Option<Coordinate>,
        destination: Destination,
    },
    Pos(Coordinate),
    Scan(ScanArg),
    Status,
    Schema,
    Stop,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` for blank input.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();
        let cmd = match head {
            "/help" => Self::Help,
            "/status" => Self::Status,
            "/schema" => Self::Schema,
            "/stop" => Self::Stop,
            "/quit" | "/exit" => Self::Quit,
            "/pos" => match rest.as_slice() {
                [c] => Self::Pos(parse_coordinate(c)?),
                _ => return Err("usage: /pos <lat,lon>".to_string()),
            },
            "/scan" => match rest.as_slice() {
                ["on"] => Self::Scan(ScanArg::On),
                ["off"] => Self::Scan(ScanArg::Off),
                ["text"] => Self::Scan(ScanArg::Text),
                ["once"] => Self::Scan(ScanArg::Once),
                _ => return Err("usage: /scan on|off|text|once".to_string()),
            },
            "/route" => parse_route(&rest)?,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(Some(cmd))
    }
}

fn parse_route(args: &[&str]) -> Result<Command, String> {
    const USAGE: &str = "usage: /route [<lat,lon>] <lat,lon> [name]";
    let (origin, target, name) = match args {
        [] => return Err(USAGE.to_string()),
        [first, rest @ ..] => {
            let first = parse_coordinate(first)?;
            match rest.first().map(|s| parse_coordinate(s)) {
                Some(Ok(second)) => (Some(first), second, &rest[1..]),
                _ => (None, first, rest),
            }
        }
    };
    let destination = if name.is_empty() {
        Destination::new(target)
    } else {
        Destination::named(target, name.join(" "))
    };
    Ok(Command::Route {
        origin,
        destination,
    })
}

/// Parse `"lat,lon"` in decimal degrees.
pub fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("'{}' is not a lat,lon pair", s))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("'{}' is outside the valid coordinate range", s));
    }
    Ok(Coordinate::new(lat, lon))
}

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

/// Collaborators for one session and whether each is live.
pub struct Backends {
    pub routing: Arc<dyn RoutingService>,
    pub perception: Arc<dyn PerceptionService>,
    pub live_routing: bool,
    pub live_perception: bool,
}

impl Backends {
    /// Live HTTP clients where configured and reachable, simulators
    /// otherwise.
    pub fn from_config(cfg: &Config, perception_online: bool) -> Self {
        let tracker = cfg.tracker_config();
        let (routing, live_routing): (Arc<dyn RoutingService>, bool) = if cfg.has_routing_key() {
            match HttpRoutingService::new(
                cfg.routing_url.clone(),
                Some(cfg.routing_api_key.clone()),
                tracker.routing_timeout,
            ) {
                Ok(client) => (Arc::new(client), true),
                Err(e) => {
                    warn!(error = %e, "routing client unavailable; using direct router");
                    (Arc::new(ScriptedRouting::direct()), false)
                }
            }
        } else {
            (Arc::new(ScriptedRouting::direct()), false)
        };

        let sensing = cfg.sensing_config();
        let live = if perception_online {
            match HttpPerceptionService::new(cfg.perception_url.clone(), sensing.perception_deadline)
            {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "perception client unavailable; using demo frames");
                    None
                }
            }
        } else {
            None
        };
        let (perception, live_perception): (Arc<dyn PerceptionService>, bool) = match live {
            Some(client) => (Arc::new(client), true),
            None => {
                let demo = PerceptionResponse::from_json(DEMO_FRAME).unwrap_or_default();
                (
                    Arc::new(ScriptedPerception::new(PerceptionReply::Respond(demo))),
                    false,
                )
            }
        };

        Self {
            routing,
            perception,
            live_routing,
            live_perception,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the REPL should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One simulated walking session: a tracker and a sensing loop sharing a
/// speaker and a bus.
pub struct Session {
    tracker: RouteTracker,
    sensing: SensingLoop,
    camera: Arc<SimCamera>,
    bus: EventBus,
    events: broadcast::Receiver<Event>,
    live_routing: bool,
    live_perception: bool,
}

impl Session {
    pub fn new(cfg: &Config, bus: EventBus, backends: Backends) -> Self {
        let speech = SimSpeech::new();
        let camera = SimCamera::new("rear_camera");
        let events = bus.subscribe_all();
        let tracker = RouteTracker::new(
            cfg.tracker_config(),
            backends.routing,
            speech.clone(),
            bus.clone(),
        );
        let sensing = SensingLoop::new(
            cfg.sensing_config(),
            camera.clone(),
            backends.perception,
            speech,
            bus.clone(),
        );
        Self {
            tracker,
            sensing,
            camera,
            bus,
            events,
            live_routing: backends.live_routing,
            live_perception: backends.live_perception,
        }
    }

    pub async fn execute(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Help => cmd_help(),
            Command::Route {
                origin,
                destination,
            } => self.cmd_route(origin, destination).await,
            Command::Pos(c) => {
                self.tracker
                    .on_position_update(Position::now(c.latitude, c.longitude))
                    .await;
            }
            Command::Scan(arg) => self.cmd_scan(arg).await,
            Command::Status => self.cmd_status(),
            Command::Schema => cmd_schema(),
            Command::Stop => {
                self.tracker.stop();
                self.sensing.disable();
                println!("{}", "Navigation and sensing stopped.".green());
            }
            Command::Quit => {
                self.shutdown("operator quit");
                println!("{}", "Goodbye.".green());
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    async fn cmd_route(&mut self, origin: Option<Coordinate>, destination: Destination) {
        let origin = match origin.or_else(|| self.tracker.last_position().map(|p| p.coordinate()))
        {
            Some(origin) => origin,
            None => {
                println!(
                    "{} no origin given and no position known yet; use {} first.",
                    "Error:".red(),
                    "/pos <lat,lon>".bold()
                );
                return;
            }
        };
        let route = self.tracker.start_route(origin, destination).await;
        println!(
            "{} {} steps, {:.0} m{}",
            "Route:".bold(),
            route.steps.len(),
            route.total_distance_m,
            if route.degraded { " (straight-line fallback)".yellow().to_string() } else { String::new() }
        );
        for (i, step) in route.steps.iter().enumerate() {
            println!("  {:>2}. {} ({:.0} m)", i, step.instruction, step.distance_to_next_m);
        }
    }

    async fn cmd_scan(&mut self, arg: ScanArg) {
        let result = match arg {
            ScanArg::On => self
                .sensing
                .set_mode(SensingMode::HazardScan)
                .and_then(|()| self.sensing.enable()),
            ScanArg::Text => self
                .sensing
                .set_mode(SensingMode::TextReading)
                .and_then(|()| self.sensing.enable()),
            ScanArg::Off => {
                self.sensing.disable();
                Ok(())
            }
            ScanArg::Once => {
                if !self.sensing.mode().is_live() {
                    if let Err(e) = self.sensing.set_mode(SensingMode::HazardScan) {
                        println!("{} {}", "Error:".red(), e);
                        return;
                    }
                }
                match self.sensing.scan_once().await {
                    CycleOutcome::Spoken { .. } => {}
                    other => println!("  scan: {:?}", other),
                }
                Ok(())
            }
        };
        match result {
            Ok(()) => println!(
                "  sensing: {} ({})",
                if self.sensing.is_running() { "running".green() } else { "idle".dimmed() },
                self.sensing.mode()
            ),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    fn cmd_status(&self) {
        println!("{}", "Status".bold().underline());
        println!("  Tracker     : {:?}", self.tracker.state());
        if let Some(route) = self.tracker.route() {
            let step = &route.steps[self.tracker.current_step()];
            println!(
                "  Step        : {}/{} – {}",
                self.tracker.current_step(),
                route.last_index(),
                step.instruction
            );
        }
        if let Some(p) = self.tracker.progress() {
            println!(
                "  Remaining   : {:.0} m, ETA {} s",
                p.remaining_m,
                p.eta.as_secs()
            );
        }
        if let Some(p) = self.tracker.last_position() {
            println!("  Position    : {}", p.coordinate());
        }
        println!(
            "  Recalcs     : {}",
            self.tracker.recalculation_attempts()
        );

        let nav = self.tracker.gate_status();
        println!(
            "  Nav gate    : last risk {}, cooldown {}, {} spoken",
            nav.last_risk,
            on_off(nav.cooldown_active),
            nav.history_len
        );

        let sensing = self.sensing.status();
        println!(
            "  Sensing     : {} / {} / {}",
            if sensing.enabled { "enabled" } else { "disabled" },
            sensing.mode,
            if sensing.cycle_in_flight { "cycle in flight" } else { "idle" }
        );
        println!(
            "  Hazard gate : last risk {}, cooldown {}, {} spoken",
            sensing.gate.last_risk,
            on_off(sensing.gate.cooldown_active),
            sensing.gate.history_len
        );
        if !sensing.failing.is_empty() {
            println!("  Failing     : {}", sensing.failing.join(", ").red());
        }
        println!("  Camera      : rear_camera ({:?})", self.camera_status());
        println!(
            "  Routing     : {}",
            if self.live_routing { "live".green() } else { "offline direct router".yellow() }
        );
        println!(
            "  Perception  : {}",
            if self.live_perception { "live".green() } else { "demo frames".yellow() }
        );
    }

    fn camera_status(&self) -> stride_hal::DeviceStatus {
        use stride_hal::CaptureDevice;
        self.camera.status()
    }

    /// Print everything published since the last call.
    pub fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(line) = describe(&event.payload) {
                        println!("{}", line);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    println!("  {}", format!("({} events skipped)", n).dimmed());
                }
                Err(_) => break,
            }
        }
    }

    /// Stop everything and announce shutdown on the bus.
    pub fn shutdown(&mut self, reason: &str) {
        self.tracker.stop();
        self.sensing.disable();
        self.bus.emit(
            SOURCE,
            EventPayload::Shutdown {
                reason: reason.to_string(),
            },
        );
    }
}

fn on_off(active: bool) -> &'static str {
    if active { "active" } else { "idle" }
}

fn risk_colored(text: &str, risk: RiskLevel) -> String {
    match risk {
        RiskLevel::Critical | RiskLevel::High => text.red().bold().to_string(),
        RiskLevel::Medium => text.yellow().to_string(),
        RiskLevel::Low | RiskLevel::Clear => text.to_string(),
    }
}

/// One console line for a bus event, `None` for events not worth showing.
pub fn describe(payload: &EventPayload) -> Option<String> {
    let line = match payload {
        EventPayload::GuidanceSpoken {
            purpose,
            text,
            risk,
        } => format!("  🔊 [{:?}/{}] {}", purpose, risk, risk_colored(text, *risk)),
        EventPayload::StepAdvanced { index, .. } => format!("  ➜ step {}", index),
        EventPayload::RecalculationFinished { success: false } => {
            format!("  {}", "recalculation failed; keeping previous route".yellow())
        }
        EventPayload::Arrived => format!("  {}", "arrived".green().bold()),
        EventPayload::RoutingDegraded { reason } => {
            format!("  {} {}", "routing degraded:".yellow(), reason)
        }
        EventPayload::ServiceFault { component, message } => {
            format!("  {} {}: {}", "fault".red(), component, message)
        }
        EventPayload::PermissionDenied(sensor) => {
            format!("  {} {}", "permission denied:".red(), sensor)
        }
        _ => return None,
    };
    Some(line)
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

/// Run the interactive loop until `/quit`, EOF, Ctrl-C or `shutdown` is set.
pub fn run(cfg: &Config, bus: EventBus, backends: Backends, rt: &Runtime, shutdown: Arc<AtomicBool>) {
    let _enter = rt.enter();
    let mut session = Session::new(cfg, bus, backends);
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", "stride>".bold().cyan());

    loop {
        session.drain_events();
        if shutdown.load(Ordering::SeqCst) {
            session.shutdown("ctrl-c");
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                session.shutdown("operator interrupt");
                println!("{}", "Goodbye.".green());
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                session.shutdown("terminal error");
                break;
            }
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match Command::parse(&line) {
            Ok(None) => {}
            Ok(Some(cmd)) => {
                if rt.block_on(session.execute(cmd)) == Flow::Quit {
                    session.drain_events();
                    break;
                }
            }
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e.yellow(),
                "/help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "stride Commands".bold().underline());
    println!("  {}  – plan a route (origin defaults to the last fix)", "/route [<lat,lon>] <lat,lon> [name]".bold().cyan());
    println!("  {}                       – feed a position fix", "/pos <lat,lon>".bold().cyan());
    println!("  {}               – hazard scan, text reading, or one frame", "/scan on|off|text|once".bold().cyan());
    println!("  {}                              – tracker, gates and backends", "/status".bold().cyan());
    println!("  {}                              – perception response schema", "/schema".bold().cyan());
    println!("  {}                                – stop navigation and sensing", "/stop".bold().cyan());
    println!("  {}                         – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_schema() {
    match serde_json::to_string_pretty(&response_schema()) {
        Ok(s) => println!("{}", s),
        Err(e) => println!("{}: {}", "Schema error".red(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_types::GatePurpose;

    #[test]
    fn parse_coordinate_accepts_lat_lon() {
        let c = parse_coordinate("-37.9,145.0").unwrap();
        assert_eq!(c, Coordinate::new(-37.9, 145.0));
        assert!(parse_coordinate("-37.9").is_err());
        assert!(parse_coordinate("north,145").is_err());
        assert!(parse_coordinate("91,0").is_err());
    }

    #[test]
    fn parse_route_with_origin_and_name() {
        let cmd = Command::parse("/route -37.9,145.0 -37.91,145.01 State Library")
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            Command::Route {
                origin: Some(Coordinate::new(-37.9, 145.0)),
                destination: Destination::named(Coordinate::new(-37.91, 145.01), "State Library"),
            }
        );
    }

    #[test]
    fn parse_route_without_origin() {
        let cmd = Command::parse("/route -37.91,145.01").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Route {
                origin: None,
                destination: Destination::new(Coordinate::new(-37.91, 145.01)),
            }
        );
        assert!(Command::parse("/route").is_err());
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("/quit").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("/exit").unwrap(), Some(Command::Quit));
        assert_eq!(
            Command::parse("/scan text").unwrap(),
            Some(Command::Scan(ScanArg::Text))
        );
        assert!(Command::parse("/scan maybe").is_err());
        assert!(Command::parse("/fly").is_err());
    }

    #[test]
    fn describe_shows_guidance_and_hides_progress() {
        let line = describe(&EventPayload::GuidanceSpoken {
            purpose: GatePurpose::Navigation,
            text: "Turn left".into(),
            risk: RiskLevel::Low,
        })
        .unwrap();
        assert!(line.contains("Turn left"));
        assert!(
            describe(&EventPayload::Progress {
                step_index: 0,
                remaining_m: 10.0,
                eta_secs: 7,
            })
            .is_none()
        );
    }

    #[test]
    fn demo_frame_parses_and_yields_detection_guidance() {
        let demo = PerceptionResponse::from_json(DEMO_FRAME).unwrap();
        let selection = demo.select().unwrap();
        assert_eq!(selection.message.text, "Chair on your left, nearby");
    }

    #[tokio::test]
    async fn offline_session_routes_and_tracks() {
        let cfg = Config::default();
        let bus = EventBus::default();
        let mut session = Session::new(&cfg, bus, Backends::from_config(&cfg, false));

        let route = Command::parse("/route -37.9,145.0 -37.91,145.01").unwrap().unwrap();
        assert_eq!(session.execute(route).await, Flow::Continue);
        assert_eq!(session.tracker.route().map(|r| r.steps.len()), Some(2));

        let pos = Command::parse("/pos -37.9001,145.0001").unwrap().unwrap();
        session.execute(pos).await;
        assert!(session.tracker.last_position().is_some());

        assert_eq!(session.execute(Command::Quit).await, Flow::Quit);
        assert!(session.tracker.route().is_none());
    }
}
