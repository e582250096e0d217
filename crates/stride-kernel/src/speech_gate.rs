//! [`SpeechGate`] – single interception point between guidance producers and
//! the speech engine.
//!
//! Every spoken message must pass through [`SpeechGate::speak`]. The gate
//! applies its rules in order:
//!
//! 1. **Force** – a forced message is always spoken.
//! 2. **Risk escalation** – a message whose risk strictly exceeds the last
//!    spoken risk is always spoken, regardless of cooldowns.
//! 3. **Dedupe** – the same (normalized) message inside the dedupe window is
//!    suppressed.
//! 4. **Cooldown** – any message inside the cooldown window is suppressed.
//! 5. Otherwise the message is spoken.
//!
//! Granting a message stops whatever is currently audible before the new
//! utterance starts, so at most one utterance plays at a time.
//!
//! One gate exists per [`GatePurpose`]. Navigation and hazard gates carry
//! different policies and never share state.
//!
//! # Example
//!
//! ```
//! use stride_hal::sim::SimSpeech;
//! use stride_kernel::{GatePolicy, SpeechGate};
//! use stride_types::RiskLevel;
//!
//! let speech = SimSpeech::new();
//! let mut gate = SpeechGate::new(GatePolicy::hazard(), speech.clone());
//!
//! assert!(gate.speak("Chair ahead", RiskLevel::Low, false));
//! // Same message again inside the window → suppressed.
//! assert!(!gate.speak("Chair ahead", RiskLevel::Low, false));
//! // Higher risk always gets through.
//! assert!(gate.speak("Stairs ahead", RiskLevel::High, false));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stride_hal::speech::{SpeechEngine, Voice};
use stride_types::{GatePurpose, RiskLevel};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Number of spoken messages kept for status reporting.
const MAX_HISTORY: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

/// Rate-limiting parameters for one gate purpose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatePolicy {
    pub purpose: GatePurpose,
    /// Minimum time between any two non-escalating messages.
    pub cooldown: Duration,
    /// Minimum time before the same message may be repeated.
    pub dedupe_window: Duration,
    pub voice: Voice,
}

impl GatePolicy {
    /// Turn-by-turn instructions: long dedupe so an instruction is not
    /// repeated while the user walks the same block.
    pub fn navigation() -> Self {
        Self {
            purpose: GatePurpose::Navigation,
            cooldown: Duration::from_secs(3),
            dedupe_window: Duration::from_secs(10),
            voice: Voice {
                rate: 0.95,
                pitch: 1.0,
            },
        }
    }

    /// Hazard callouts: short windows, slightly faster and higher voice so
    /// callouts are distinguishable from directions.
    pub fn hazard() -> Self {
        Self {
            purpose: GatePurpose::Hazard,
            cooldown: Duration::from_secs(2),
            dedupe_window: Duration::from_secs(5),
            voice: Voice {
                rate: 1.1,
                pitch: 1.05,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State and decisions
// ────────────────────────────────────────────────────────────────────────────

/// Mutable bookkeeping owned by exactly one gate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechGateState {
    /// Normalized text of the last spoken message.
    pub last_message_id: Option<String>,
    pub last_spoken_at: Option<Instant>,
    pub last_risk: RiskLevel,
}

/// Why the gate spoke or suppressed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forced,
    Escalation,
    Fresh,
    SuppressedEmpty,
    SuppressedDuplicate,
    SuppressedCooldown,
}

impl Decision {
    pub fn is_spoken(self) -> bool {
        matches!(self, Self::Forced | Self::Escalation | Self::Fresh)
    }
}

/// One granted utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpokenRecord {
    pub text: String,
    pub risk: RiskLevel,
    pub at: Instant,
}

/// Point-in-time view of a gate, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct GateStatus {
    pub purpose: GatePurpose,
    pub cooldown_active: bool,
    pub since_last: Option<Duration>,
    pub last_message: Option<String>,
    pub last_risk: RiskLevel,
    pub history_len: usize,
}

/// Case- and whitespace-insensitive identity of a message.
pub fn message_id(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ────────────────────────────────────────────────────────────────────────────
// SpeechGate
// ────────────────────────────────────────────────────────────────────────────

/// Rate-limiting, risk-aware front door to a [`SpeechEngine`].
pub struct SpeechGate {
    policy: GatePolicy,
    state: SpeechGateState,
    history: VecDeque<SpokenRecord>,
    engine: Arc<dyn SpeechEngine>,
}

impl fmt::Debug for SpeechGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechGate")
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl SpeechGate {
    pub fn new(policy: GatePolicy, engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            policy,
            state: SpeechGateState::default(),
            history: VecDeque::with_capacity(MAX_HISTORY),
            engine,
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn state(&self) -> &SpeechGateState {
        &self.state
    }

    /// Spoken messages, oldest first (at most ten).
    pub fn history(&self) -> impl Iterator<Item = &SpokenRecord> {
        self.history.iter()
    }

    /// Offer `message` for speaking. Returns `true` if it was handed to the
    /// engine.
    pub fn speak(&mut self, message: &str, risk: RiskLevel, force: bool) -> bool {
        self.speak_at(message, risk, force, Instant::now())
    }

    /// [`speak`][Self::speak] with an explicit clock reading.
    pub fn speak_at(&mut self, message: &str, risk: RiskLevel, force: bool, now: Instant) -> bool {
        let decision = self.decide(message, risk, force, now);
        debug!(
            purpose = ?self.policy.purpose,
            message,
            %risk,
            ?decision,
            "speech gate decision"
        );
        if !decision.is_spoken() {
            return false;
        }

        if self.engine.is_speaking() {
            self.engine.stop();
        }
        if let Err(e) = self.engine.speak(message, &self.policy.voice) {
            warn!(purpose = ?self.policy.purpose, error = %e, "speech engine rejected utterance");
            // Never leave the engine believing it is mid-utterance.
            self.engine.stop();
            return false;
        }

        self.state.last_message_id = Some(message_id(message));
        self.state.last_spoken_at = Some(now);
        self.state.last_risk = risk;
        self.history.push_back(SpokenRecord {
            text: message.to_string(),
            risk,
            at: now,
        });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        true
    }

    /// Apply the gate rules without side effects.
    pub fn decide(&self, message: &str, risk: RiskLevel, force: bool, now: Instant) -> Decision {
        if message.trim().is_empty() {
            return Decision::SuppressedEmpty;
        }
        if force {
            return Decision::Forced;
        }
        if risk > self.state.last_risk {
            return Decision::Escalation;
        }
        let elapsed = self
            .state
            .last_spoken_at
            .map(|at| now.saturating_duration_since(at));
        if let Some(elapsed) = elapsed {
            let same = self.state.last_message_id.as_deref() == Some(message_id(message).as_str());
            if same && elapsed < self.policy.dedupe_window {
                return Decision::SuppressedDuplicate;
            }
            if elapsed < self.policy.cooldown {
                return Decision::SuppressedCooldown;
            }
        }
        Decision::Fresh
    }

    /// Forget everything and silence the engine.
    pub fn reset(&mut self) {
        self.state = SpeechGateState::default();
        self.history.clear();
        self.engine.stop();
    }

    pub fn status(&self) -> GateStatus {
        let since_last = self.state.last_spoken_at.map(|at| at.elapsed());
        GateStatus {
            purpose: self.policy.purpose,
            cooldown_active: since_last.is_some_and(|d| d < self.policy.cooldown),
            since_last,
            last_message: self.history.back().map(|r| r.text.clone()),
            last_risk: self.state.last_risk,
            history_len: self.history.len(),
        }
    }
}
