//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into four [`Topic`] lanes so observers only
//! receive the messages they care about:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | Route progress and ETA updates |
//! | [`Topic::Guidance`] | Every message that passed a speech gate |
//! | [`Topic::Navigation`] | Route lifecycle: installed, step advanced, recalculation, arrival |
//! | [`Topic::SystemAlerts`] | Service faults, permission denials, shutdown |
//!
//! Every event is additionally mirrored onto a firehose channel
//! ([`EventBus::subscribe_all`]) for loggers and the CLI.

use stride_types::{Event, EventPayload, StrideError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all first-class routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Telemetry,
    Guidance,
    Navigation,
    SystemAlerts,
}

impl Topic {
    /// The lane a payload belongs on.
    pub fn for_payload(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::Progress { .. } => Self::Telemetry,
            EventPayload::GuidanceSpoken { .. } => Self::Guidance,
            EventPayload::RouteInstalled { .. }
            | EventPayload::StepAdvanced { .. }
            | EventPayload::RecalculationStarted { .. }
            | EventPayload::RecalculationFinished { .. }
            | EventPayload::Arrived => Self::Navigation,
            EventPayload::RoutingDegraded { .. }
            | EventPayload::ServiceFault { .. }
            | EventPayload::PermissionDenied(_)
            | EventPayload::Shutdown { .. } => Self::SystemAlerts,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    firehose: broadcast::Sender<Event>,
    telemetry: broadcast::Sender<Event>,
    guidance: broadcast::Sender<Event>,
    navigation: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every channel independently.
    pub fn new(capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(capacity);
        let (telemetry, _) = broadcast::channel(capacity);
        let (guidance, _) = broadcast::channel(capacity);
        let (navigation, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            firehose,
            telemetry,
            guidance,
            navigation,
            system_alerts,
        }
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    /// Publish `event` to the given [`Topic`] channel and the firehose.
    ///
    /// Returns the number of receivers that were handed the event across both
    /// channels.
    ///
    /// # Errors
    ///
    /// [`StrideError::Channel`] when nobody at all is listening. Publishers
    /// treat this as normal and usually discard it.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, StrideError> {
        let mirrored = self.firehose.send(event.clone()).unwrap_or(0);
        let direct = self.topic_sender(topic).send(event).unwrap_or(0);
        match mirrored + direct {
            0 => Err(StrideError::Channel(format!(
                "No subscribers for topic {topic:?}"
            ))),
            n => Ok(n),
        }
    }

    /// Publish an event on the lane matching its payload.
    pub fn publish(&self, event: Event) -> Result<usize, StrideError> {
        let topic = Topic::for_payload(&event.payload);
        self.publish_to(topic, event)
    }

    /// Build and publish an event, ignoring the no-subscriber case.
    pub fn emit(&self, source: &str, payload: EventPayload) {
        let _ = self.publish(Event::new(source, payload));
    }

    // -----------------------------------------------------------------------
    // Subscribing
    // -----------------------------------------------------------------------

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.firehose.subscribe()
    }

    /// Subscribe to the firehose filtered by `source` prefix.
    pub fn subscribe_source(&self, prefix: impl Into<String>) -> SourceSubscriber {
        SourceSubscriber {
            prefix: prefix.into(),
            receiver: self.firehose.subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::Guidance => &self.guidance,
            Topic::Navigation => &self.navigation,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// `Lagged(n)` means the subscriber fell behind and `n` events were
    /// dropped; `Closed` means the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive; `None` when nothing is buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Source-prefix subscriber
// ---------------------------------------------------------------------------

/// A subscriber that only delivers events whose `source` field starts with the
/// given prefix.
pub struct SourceSubscriber {
    prefix: String,
    receiver: broadcast::Receiver<Event>,
}

impl SourceSubscriber {
    /// Wait for the next matching event. `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.source.starts_with(&self.prefix) => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(prefix = %self.prefix, lagged_by = n, "SourceSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_types::{GatePurpose, RiskLevel, Sensor};

    fn spoken(source: &str) -> Event {
        Event::new(
            source,
            EventPayload::GuidanceSpoken {
                purpose: GatePurpose::Hazard,
                text: "Chair ahead".to_string(),
                risk: RiskLevel::Medium,
            },
        )
    }

    #[tokio::test]
    async fn publish_and_receive_on_matching_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Guidance);

        let event = spoken("stride-runtime::sensing_loop");
        bus.publish(event.clone())?;

        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        assert_eq!(received.source, event.source);
        Ok(())
    }

    #[tokio::test]
    async fn firehose_sees_every_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut all = bus.subscribe_all();

        bus.publish(spoken("a"))?;
        bus.publish(Event::new("b", EventPayload::Arrived))?;

        assert!(matches!(all.recv().await?.payload, EventPayload::GuidanceSpoken { .. }));
        assert!(matches!(all.recv().await?.payload, EventPayload::Arrived));
        Ok(())
    }

    #[tokio::test]
    async fn source_subscriber_filters() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_source("stride-runtime::tracker");

        bus.publish(spoken("stride-runtime::sensing_loop"))?;
        let good = Event::new("stride-runtime::tracker", EventPayload::Arrived);
        bus.publish(good.clone())?;

        let received = sub.recv().await.ok_or("No event received")?;
        assert_eq!(received.id, good.id);
        Ok(())
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        assert!(bus.publish(spoken("test")).is_err());
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit("test", EventPayload::Arrived);
    }

    #[test]
    fn payloads_route_to_expected_topics() {
        assert_eq!(
            Topic::for_payload(&EventPayload::Progress {
                step_index: 0,
                remaining_m: 10.0,
                eta_secs: 7
            }),
            Topic::Telemetry
        );
        assert_eq!(Topic::for_payload(&EventPayload::Arrived), Topic::Navigation);
        assert_eq!(
            Topic::for_payload(&EventPayload::PermissionDenied(Sensor::Camera)),
            Topic::SystemAlerts
        );
    }

    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let _guidance = bus.subscribe_to(Topic::Guidance);

        bus.publish(spoken("x"))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "SystemAlerts must not receive a Guidance event");
        Ok(())
    }

    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(64);
        let mut slow = bus.subscribe_to(Topic::Guidance);
        for _ in 0..1_000 {
            let _ = bus.publish(spoken("flood"));
        }
        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[test]
    fn try_recv_skips_lag_and_drains() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe_to(Topic::Navigation);
        for _ in 0..10 {
            bus.emit("t", EventPayload::Arrived);
        }
        let mut n = 0;
        while rx.try_recv().is_some() {
            n += 1;
        }
        assert_eq!(n, 4);
    }
}
