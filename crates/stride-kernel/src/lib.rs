//! `stride-kernel` – Arbitration & rate limiting
//!
//! The part of the guidance core that decides what is allowed to happen. It
//! does not compute guidance; it enforces timing rules on it.
//!
//! # Modules
//!
//! - [`speech_gate`] – [`SpeechGate`][speech_gate::SpeechGate]: the single
//!   interception point every utterance passes through. Applies force,
//!   risk-escalation, dedupe and cooldown rules per [`GatePurpose`][stride_types::GatePurpose].
//! - [`cooldown`] – [`Cooldown`][cooldown::Cooldown]: one rate-limit window,
//!   used for route recalculation.
//! - [`health`] – [`ServiceHealth`][health::ServiceHealth]: consecutive
//!   failure tracking so faults are surfaced once per streak.
//! - [`in_flight`] – [`InFlight`][in_flight::InFlight]: single-slot admission
//!   that keeps periodic cycles from overlapping.

pub mod cooldown;
pub mod health;
pub mod in_flight;
pub mod speech_gate;

pub use cooldown::Cooldown;
pub use health::{ComponentHealth, ServiceHealth};
pub use in_flight::{InFlight, InFlightGuard};
pub use speech_gate::{Decision, GatePolicy, GateStatus, SpeechGate, SpeechGateState, SpokenRecord};
