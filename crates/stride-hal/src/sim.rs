//! In-process simulated drivers for tests and the CLI simulation shell.
//!
//! Every collaborator trait in this crate has a stub here that records what
//! it was asked to do and can be switched into failure modes (hung capture,
//! revoked permission, rejecting speech engine) so the coordination core can
//! be exercised without a phone attached.
//!
//! # Example
//!
//! ```rust
//! use stride_hal::sim::SimSpeech;
//! use stride_hal::speech::{SpeechEngine, Voice};
//!
//! let speech = SimSpeech::new();
//! speech.speak("Turn left onto Main Street", &Voice::default()).unwrap();
//! assert_eq!(speech.spoken(), vec!["Turn left onto Main Street".to_string()]);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stride_types::{Position, Sensor, StrideError};
use tracing::{debug, info};

use crate::camera::{CameraFrame, CaptureDevice, DeviceStatus};
use crate::location::{LocationFeed, LocationOptions, LocationProvider, LocationSubscription};
use crate::speech::{SpeechEngine, Voice};

/// Smallest valid JPEG: SOI marker followed by EOI marker.
const BLANK_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

/// How a [`SimCamera`] answers capture requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBehavior {
    /// Return a blank frame immediately.
    Instant,
    /// Return a blank frame after the given delay.
    Delayed(Duration),
    /// Never return.
    Hang,
    /// Fail with a hardware fault.
    Fail,
}

/// A simulated camera that returns a blank JPEG frame.
#[derive(Debug)]
pub struct SimCamera {
    id: String,
    behavior: Mutex<CaptureBehavior>,
    status: Mutex<DeviceStatus>,
    captures: AtomicUsize,
}

impl SimCamera {
    /// Create a ready camera that captures instantly.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            behavior: Mutex::new(CaptureBehavior::Instant),
            status: Mutex::new(DeviceStatus::Ready),
            captures: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: CaptureBehavior) {
        *self.behavior.lock().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    pub fn set_status(&self, status: DeviceStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Number of capture attempts started so far.
    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn capture(&self, quality: f32) -> Result<CameraFrame, StrideError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap_or_else(|e| e.into_inner());
        debug!(camera = %self.id, quality, ?behavior, "sim capture");
        match behavior {
            CaptureBehavior::Instant => {}
            CaptureBehavior::Delayed(delay) => tokio::time::sleep(delay).await,
            CaptureBehavior::Hang => std::future::pending::<()>().await,
            CaptureBehavior::Fail => {
                return Err(StrideError::HardwareFault {
                    component: self.id.clone(),
                    details: "simulated capture failure".to_string(),
                });
            }
        }
        Ok(CameraFrame {
            width: 1,
            height: 1,
            data: BLANK_JPEG.to_vec(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated location provider
// ────────────────────────────────────────────────────────────────────────────

/// A location provider whose fixes are pushed by hand via
/// [`SimLocation::push`].
#[derive(Debug, Default)]
pub struct SimLocation {
    permission_denied: AtomicBool,
    feed: Mutex<Option<LocationFeed>>,
    subscriptions: AtomicUsize,
}

impl SimLocation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the user revoking (or granting) location permission.
    pub fn set_permission_denied(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::SeqCst);
    }

    /// Deliver a fix to the active subscriber. Returns `false` when nobody is
    /// subscribed.
    pub fn push(&self, position: Position) -> bool {
        match self.feed.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(feed) => feed.push(position),
            None => false,
        }
    }

    /// `true` while a subscriber is attached and has not cancelled.
    pub fn has_subscriber(&self) -> bool {
        self.feed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|feed| !feed.is_closed())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl LocationProvider for SimLocation {
    fn subscribe(&self, options: LocationOptions) -> Result<LocationSubscription, StrideError> {
        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(StrideError::PermissionDenied(Sensor::Location));
        }
        debug!(?options, "sim location subscribe");
        let (feed, subscription) = LocationSubscription::channel();
        *self.feed.lock().unwrap_or_else(|e| e.into_inner()) = Some(feed);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(subscription)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated speech engine
// ────────────────────────────────────────────────────────────────────────────

/// A speech engine that records every utterance and logs it at `info`.
///
/// Utterances stay "audible" until the next `speak` or `stop` call.
#[derive(Debug, Default)]
pub struct SimSpeech {
    spoken: Mutex<Vec<String>>,
    speaking: AtomicBool,
    stops: AtomicUsize,
    fail: AtomicBool,
}

impl SimSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent `speak` call fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every utterance accepted so far, oldest first.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_spoken(&self) -> Option<String> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Number of `stop` calls received.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SpeechEngine for SimSpeech {
    fn speak(&self, text: &str, voice: &Voice) -> Result<(), StrideError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StrideError::SpeechSynthesis(
                "simulated engine failure".to_string(),
            ));
        }
        info!(text, rate = voice.rate, pitch = voice.pitch, "speaking");
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}
