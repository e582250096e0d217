//! `stride-middleware` – The Nervous System
//!
//! Routes data between the guidance core, its observers and the remote
//! services it depends on, without caring about what the data means.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`routing`] – [`RoutingService`][routing::RoutingService] trait, the
//!   openrouteservice-compatible HTTP client, response normalization and the
//!   straight-line fallback route.
//! - [`perception_client`] – [`PerceptionService`][perception_client::PerceptionService]
//!   trait and the HTTP client that posts frames to `/detect` or `/ocr`.

pub mod bus;
pub mod perception_client;
pub mod routing;

pub use bus::{EventBus, SourceSubscriber, Topic, TopicReceiver};
pub use perception_client::{
    HttpPerceptionService, PerceptionReply, PerceptionService, ScriptedPerception, SensingMode,
};
pub use routing::{
    ClientError, HttpRoutingService, RoutingProfile, RoutingService, ScriptedRouting,
    normalize_route, straight_line_route,
};
