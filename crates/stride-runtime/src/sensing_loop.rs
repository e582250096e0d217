//! [`SensingLoop`] – periodic camera sampling and hazard callouts.
//!
//! While enabled with a live [`SensingMode`], a timer task ticks on a fixed
//! interval (first tick one interval after start). Each tick runs at most
//! one capture → submit → speak cycle:
//!
//! ```text
//! tick ──▶ camera ready? ──▶ slot free? ──▶ capture (≤ capture_timeout)
//!                                               │
//!                            submit (≤ perception_deadline)
//!                                               │
//!   select message (not-ready markers discarded) ──▶ drop duplicates ──▶ hazard SpeechGate (forced)
//! ```
//!
//! A tick that finds the previous cycle still running, or the camera not
//! ready, is skipped. Nothing is queued and there is no catch-up burst.
//!
//! Deadline expiries are logged only. Other collaborator failures are
//! published once per failure streak as
//! [`ServiceFault`][stride_types::EventPayload::ServiceFault] events.
//!
//! [`disable`][SensingLoop::disable] aborts the timer and any running
//! cycle. Each start bumps a generation counter that is re-checked under
//! the gate lock, so a cycle from an earlier generation never speaks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stride_hal::camera::{CaptureDevice, DeviceStatus};
use stride_hal::speech::SpeechEngine;
use stride_kernel::{GatePolicy, GateStatus, InFlight, InFlightGuard, ServiceHealth, SpeechGate};
use stride_middleware::EventBus;
use stride_middleware::perception_client::PerceptionService;
use stride_perception::MessageSource;
use stride_types::{EventPayload, GatePurpose, RiskLevel, Sensor, StrideError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::recent::RecentMessages;

pub use stride_middleware::perception_client::SensingMode;

const SOURCE: &str = "stride-runtime::sensing_loop";
const CAMERA: &str = "camera";
const PERCEPTION: &str = "perception";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensingConfig {
    pub interval: Duration,
    pub capture_timeout: Duration,
    /// Upper bound on one perception submission.
    pub perception_deadline: Duration,
    /// A message forwarded within this window is not forwarded again.
    pub duplicate_window: Duration,
    /// JPEG quality passed to the capture device, `0.0..=1.0`.
    pub capture_quality: f32,
    pub speech: GatePolicy,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(8),
            capture_timeout: Duration::from_secs(7),
            perception_deadline: Duration::from_secs(25),
            duplicate_window: Duration::from_secs(5),
            capture_quality: 0.5,
            speech: GatePolicy::hazard(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes and status
// ─────────────────────────────────────────────────────────────────────────────

/// How one capture → submit → speak cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Spoken { text: String, risk: RiskLevel },
    /// The gate declined the message (engine failure).
    Suppressed,
    Duplicate,
    /// The backend answered with a not-ready marker only; nothing is said.
    Discarded,
    /// Not started: sensing off, camera not ready or a cycle in flight.
    Skipped,
    CaptureTimedOut,
    CaptureFailed,
    PerceptionTimedOut,
    PerceptionFailed,
    /// The loop was disabled or restarted while this cycle ran.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensingStatus {
    pub enabled: bool,
    pub mode: SensingMode,
    pub running: bool,
    pub cycle_in_flight: bool,
    pub gate: GateStatus,
    /// Components currently in a failure streak.
    pub failing: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

struct Shared {
    config: SensingConfig,
    camera: Arc<dyn CaptureDevice>,
    perception: Arc<dyn PerceptionService>,
    gate: Mutex<SpeechGate>,
    recent: Mutex<RecentMessages>,
    health: Mutex<ServiceHealth>,
    bus: EventBus,
    generation: AtomicU64,
    cycle: Mutex<Option<AbortHandle>>,
}

impl Shared {
    fn on_tick(self: &Arc<Self>, mode: SensingMode, generation: u64, slot: &InFlight) {
        let status = self.camera.status();
        if status != DeviceStatus::Ready {
            debug!(?status, "camera not ready; skipping tick");
            return;
        }
        let Some(guard) = slot.try_acquire() else {
            debug!("previous cycle still in flight; skipping tick");
            return;
        };
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let outcome = shared.run_cycle(mode, generation, guard).await;
            debug!(?outcome, "sensing cycle finished");
        });
        *self.cycle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.abort_handle());
    }

    /// One cycle. `_guard` holds the in-flight slot until this future
    /// completes or is dropped.
    async fn run_cycle(
        &self,
        mode: SensingMode,
        generation: u64,
        _guard: InFlightGuard,
    ) -> CycleOutcome {
        let capture = self.camera.capture(self.config.capture_quality);
        let frame = match tokio::time::timeout(self.config.capture_timeout, capture).await {
            Err(_) => {
                info!(
                    camera = self.camera.id(),
                    timeout_ms = self.config.capture_timeout.as_millis() as u64,
                    "capture timed out"
                );
                return CycleOutcome::CaptureTimedOut;
            }
            Ok(Err(e)) => {
                self.surface_fault(CAMERA, &e);
                return CycleOutcome::CaptureFailed;
            }
            Ok(Ok(frame)) => {
                self.record_success(CAMERA);
                frame
            }
        };

        let submit = self.perception.submit(&frame, mode);
        let response = match tokio::time::timeout(self.config.perception_deadline, submit).await {
            Err(_) => {
                info!(%mode, "perception deadline expired");
                return CycleOutcome::PerceptionTimedOut;
            }
            Ok(Err(e)) if e.is_timeout() => {
                info!(%mode, error = %e, "perception timed out");
                return CycleOutcome::PerceptionTimedOut;
            }
            Ok(Err(e)) => {
                self.surface_fault(PERCEPTION, &e);
                return CycleOutcome::PerceptionFailed;
            }
            Ok(Ok(response)) => {
                self.record_success(PERCEPTION);
                response
            }
        };

        let Some(selection) = response.select() else {
            debug!(
                frame_id = response.frame_id.as_deref().unwrap_or("-"),
                "response held only placeholders; discarded"
            );
            return CycleOutcome::Discarded;
        };
        let text = selection.message.text;
        let risk = selection.message.risk;
        debug!(
            frame_id = response.frame_id.as_deref().unwrap_or("-"),
            source = ?selection.source,
            %risk,
            "message selected"
        );

        let now = Instant::now();
        {
            let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
            if recent.is_duplicate(&text, now) {
                debug!(%text, "duplicate within window; dropped");
                return CycleOutcome::Duplicate;
            }
            recent.record(&text, now);
        }

        let spoken = {
            let mut gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());
            if self.generation.load(Ordering::SeqCst) != generation {
                return CycleOutcome::Stale;
            }
            gate.speak(&text, risk, true)
        };
        if !spoken {
            return CycleOutcome::Suppressed;
        }
        if selection.source == MessageSource::Detections {
            debug!(%text, "spoke guidance derived from detections");
        }
        self.bus.emit(
            SOURCE,
            EventPayload::GuidanceSpoken {
                purpose: GatePurpose::Hazard,
                text: text.clone(),
                risk,
            },
        );
        CycleOutcome::Spoken { text, risk }
    }

    fn surface_fault(&self, component: &str, error: &StrideError) {
        let first = self
            .health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_failure(component);
        if first {
            warn!(component, error = %error, "sensing collaborator failed");
            self.bus.emit(
                SOURCE,
                EventPayload::ServiceFault {
                    component: component.to_string(),
                    message: error.to_string(),
                },
            );
        } else {
            debug!(component, error = %error, "still failing");
        }
    }

    fn record_success(&self, component: &str) {
        self.health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_success(component);
    }

    /// Invalidate running cycles. Taking the gate lock orders this against
    /// a cycle that is about to speak.
    fn bump_generation(&self) -> u64 {
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn abort_cycle(&self) {
        if let Some(handle) = self.cycle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SensingLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct SensingLoop {
    shared: Arc<Shared>,
    enabled: bool,
    mode: SensingMode,
    timer: Option<JoinHandle<()>>,
    slot: InFlight,
}

impl SensingLoop {
    /// Create a disabled loop in [`SensingMode::Off`].
    pub fn new(
        config: SensingConfig,
        camera: Arc<dyn CaptureDevice>,
        perception: Arc<dyn PerceptionService>,
        speech: Arc<dyn SpeechEngine>,
        bus: EventBus,
    ) -> Self {
        let shared = Arc::new(Shared {
            gate: Mutex::new(SpeechGate::new(config.speech, speech)),
            recent: Mutex::new(RecentMessages::new(config.duplicate_window)),
            health: Mutex::new(ServiceHealth::new()),
            config,
            camera,
            perception,
            bus,
            generation: AtomicU64::new(0),
            cycle: Mutex::new(None),
        });
        Self {
            shared,
            enabled: false,
            mode: SensingMode::Off,
            timer: None,
            slot: InFlight::new(),
        }
    }

    pub fn mode(&self) -> SensingMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` while the timer task is active.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn config(&self) -> &SensingConfig {
        &self.shared.config
    }

    /// Enable sampling. Starts the timer when the mode is live.
    ///
    /// # Errors
    ///
    /// [`StrideError::PermissionDenied`] when the camera has no permission.
    /// The denial is announced and published; the loop stays disabled.
    pub fn enable(&mut self) -> Result<(), StrideError> {
        self.check_permission()?;
        self.enabled = true;
        self.sync();
        Ok(())
    }

    /// Stop sampling and abort any running cycle. Idempotent.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.halt();
    }

    /// Switch mode. [`SensingMode::Off`] stops sampling without disabling.
    ///
    /// # Errors
    ///
    /// As [`enable`][Self::enable] when switching an enabled loop to a live
    /// mode.
    pub fn set_mode(&mut self, mode: SensingMode) -> Result<(), StrideError> {
        if mode == self.mode {
            return Ok(());
        }
        if self.enabled && mode.is_live() {
            self.check_permission()?;
        }
        info!(from = %self.mode, to = %mode, "sensing mode changed");
        self.mode = mode;
        self.halt();
        self.sync();
        Ok(())
    }

    /// Run one cycle now, outside the timer. Skipped when the mode is off,
    /// the camera is not ready or a cycle is already in flight.
    pub async fn scan_once(&self) -> CycleOutcome {
        if !self.mode.is_live() || self.shared.camera.status() != DeviceStatus::Ready {
            return CycleOutcome::Skipped;
        }
        let Some(guard) = self.slot.try_acquire() else {
            return CycleOutcome::Skipped;
        };
        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.shared.run_cycle(self.mode, generation, guard).await
    }

    pub fn status(&self) -> SensingStatus {
        let gate = self
            .shared
            .gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .status();
        let failing = self
            .shared
            .health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failing();
        SensingStatus {
            enabled: self.enabled,
            mode: self.mode,
            running: self.is_running(),
            cycle_in_flight: self.slot.is_busy(),
            gate,
            failing,
        }
    }

    fn check_permission(&mut self) -> Result<(), StrideError> {
        if self.shared.camera.status() != DeviceStatus::PermissionDenied {
            return Ok(());
        }
        warn!(camera = self.shared.camera.id(), "camera permission denied");
        let spoken = self
            .shared
            .gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .speak(
                "Camera permission is needed for hazard scanning. Please enable it in settings.",
                RiskLevel::High,
                true,
            );
        if spoken {
            debug!("permission notice spoken");
        }
        self.shared
            .bus
            .emit(SOURCE, EventPayload::PermissionDenied(Sensor::Camera));
        self.enabled = false;
        Err(StrideError::PermissionDenied(Sensor::Camera))
    }

    /// Start the timer if it should run and is not running.
    fn sync(&mut self) {
        if !self.enabled || !self.mode.is_live() || self.timer.is_some() {
            return;
        }
        let generation = self.shared.bump_generation();
        let shared = Arc::clone(&self.shared);
        let slot = self.slot.clone();
        let mode = self.mode;
        let period = shared.config.interval;
        info!(%mode, interval_ms = period.as_millis() as u64, "sensing started");

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                shared.on_tick(mode, generation, &slot);
            }
        }));
    }

    fn halt(&mut self) {
        let was_running = self.timer.is_some();
        self.shared.bump_generation();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.shared.abort_cycle();
        // An aborted cycle releases its guard when the runtime drops it; the
        // next start must not wait for that.
        self.slot = InFlight::new();
        if was_running {
            info!("sensing stopped");
        }
    }
}

impl Drop for SensingLoop {
    fn drop(&mut self) {
        self.halt();
    }
}
