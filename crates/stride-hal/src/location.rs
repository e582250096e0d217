//! Location provider trait and the subscription handle it returns.
//!
//! A provider delivers [`Position`] fixes asynchronously at a bounded
//! cadence. The consumer owns a [`LocationSubscription`]; calling
//! [`LocationSubscription::cancel`] closes the channel synchronously, after
//! which the provider's [`LocationFeed`] reports itself closed and no further
//! fix is handed to the consumer.

use std::time::Duration;

use stride_types::{Position, StrideError};
use tokio::sync::mpsc;

/// Number of undelivered fixes buffered before the provider starts dropping.
const FEED_CAPACITY: usize = 32;

/// Requested fix quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationAccuracy {
    Balanced,
    #[default]
    High,
    Best,
}

/// Options passed to [`LocationProvider::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationOptions {
    pub accuracy: LocationAccuracy,
    /// Minimum time between two delivered fixes.
    pub interval: Duration,
    /// Minimum movement between two delivered fixes, in metres.
    pub min_distance_m: f64,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            accuracy: LocationAccuracy::High,
            interval: Duration::from_millis(1000),
            min_distance_m: 2.0,
        }
    }
}

/// Producer half of a subscription, held by the provider.
#[derive(Debug, Clone)]
pub struct LocationFeed {
    tx: mpsc::Sender<Position>,
}

impl LocationFeed {
    /// Deliver a fix. Returns `false` once the subscription was cancelled or
    /// the buffer is full (the fix is dropped).
    pub fn push(&self, position: Position) -> bool {
        self.tx.try_send(position).is_ok()
    }

    /// `true` after the consumer cancelled or dropped its subscription.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the consumer cancels or drops its subscription.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Consumer half of a subscription.
#[derive(Debug)]
pub struct LocationSubscription {
    rx: mpsc::Receiver<Position>,
    cancelled: bool,
}

impl LocationSubscription {
    /// Create a connected feed/subscription pair.
    pub fn channel() -> (LocationFeed, Self) {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        (
            LocationFeed { tx },
            Self {
                rx,
                cancelled: false,
            },
        )
    }

    /// Wait for the next fix. Returns `None` once cancelled or once the
    /// provider hung up.
    pub async fn recv(&mut self) -> Option<Position> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Stop delivery. Buffered fixes are discarded. Idempotent.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A source of location fixes (GNSS, fused provider, simulator).
pub trait LocationProvider: Send + Sync {
    /// Start delivering fixes.
    ///
    /// # Errors
    ///
    /// Returns [`StrideError::PermissionDenied`] when the user has not
    /// granted location access, or [`StrideError::HardwareFault`] when the
    /// provider cannot start.
    fn subscribe(&self, options: LocationOptions) -> Result<LocationSubscription, StrideError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushed_fix_is_received() {
        let (feed, mut sub) = LocationSubscription::channel();
        assert!(feed.push(Position::now(-37.9, 145.0)));
        let fix = sub.recv().await.expect("fix should arrive");
        assert_eq!(fix.latitude, -37.9);
    }

    #[tokio::test]
    async fn cancel_closes_feed_and_discards_buffer() {
        let (feed, mut sub) = LocationSubscription::channel();
        feed.push(Position::now(1.0, 1.0));
        sub.cancel();
        assert!(feed.is_closed());
        assert!(!feed.push(Position::now(2.0, 2.0)));
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (_feed, mut sub) = LocationSubscription::channel();
        sub.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());
    }

    #[test]
    fn dropping_subscription_closes_feed() {
        let (feed, sub) = LocationSubscription::channel();
        drop(sub);
        assert!(feed.is_closed());
    }

    #[test]
    fn default_options_match_walking_cadence() {
        let opts = LocationOptions::default();
        assert_eq!(opts.accuracy, LocationAccuracy::High);
        assert_eq!(opts.interval, Duration::from_millis(1000));
        assert!((opts.min_distance_m - 2.0).abs() < f64::EPSILON);
    }
}
