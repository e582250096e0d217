//! `stride-runtime` – The Guidance Core
//!
//! The stateful part of the client: it follows the user along a route and
//! periodically looks ahead through the camera, turning both into short
//! spoken messages.
//!
//! # Modules
//!
//! - [`tracker`] – [`RouteTracker`][tracker::RouteTracker]: the
//!   `Idle → Navigating → Recalculating → Arrived` state machine. Consumes
//!   position fixes, advances steps, issues approach callouts and requests a
//!   new route (at most once per cooldown window) when the user drifts off
//!   the path. Falls back to straight-line guidance when routing is down.
//! - [`sensing_loop`] – [`SensingLoop`][sensing_loop::SensingLoop]: the
//!   periodic capture → perception → speech cycle with single-slot
//!   admission, bounded waits and abort-on-disable.
//! - [`recent`] – [`RecentMessages`][recent::RecentMessages]: short-window
//!   duplicate detection for perception output.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter. Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.
//!
//! # Speech gating
//!
//! Neither component talks to the speech engine directly. Each owns a
//! [`SpeechGate`] configured for its purpose; the gate is re-exported here
//! so hosts can build one without depending on `stride-kernel`.

pub mod recent;
pub mod sensing_loop;
pub mod telemetry;
pub mod tracker;

pub use recent::RecentMessages;
pub use sensing_loop::{CycleOutcome, SensingConfig, SensingLoop, SensingMode, SensingStatus};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use tracker::{RouteProgress, RouteTracker, TrackerConfig, TrackerState};

pub use stride_kernel::{GatePolicy, SpeechGate};
