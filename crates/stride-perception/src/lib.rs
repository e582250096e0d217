//! `stride-perception` – Spatial and visual interpretation.
//!
//! Turns raw coordinates and raw perception backend output into the
//! quantities the guidance core reasons about: metres, sides and risk.
//!
//! # Modules
//!
//! - [`geo`] – haversine distance, offsets and point-to-segment distance
//!   (built on the `geo` crate) used for step tracking and deviation
//!   detection.
//! - [`response`] – [`PerceptionResponse`][response::PerceptionResponse]:
//!   the backend wire model, placeholder filtering, risk-tag mapping and
//!   selection of the one message worth speaking.
//! - [`reasoning`] – rule-based conversion of raw
//!   [`Detection`][response::Detection]s into prioritised guidance.

pub mod geo;
pub mod reasoning;
pub mod response;

pub use response::{Detection, MessageSource, PerceptionResponse, Selection};
