//! Generic `SpeechEngine` trait for the device text-to-speech output.
//!
//! The engine is a single exclusive output channel. Nothing in the core calls
//! it directly; every utterance goes through a speech gate in
//! `stride-kernel`, which stops the current utterance before starting a new
//! one.

use stride_types::StrideError;

/// Voice parameters for one utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    /// Speaking rate multiplier; 1.0 is the platform default.
    pub rate: f32,
    /// Pitch multiplier; 1.0 is the platform default.
    pub pitch: f32,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// A text-to-speech engine.
pub trait SpeechEngine: Send + Sync {
    /// Start speaking `text`. Returns once the utterance has been queued; it
    /// keeps playing until it finishes or [`stop`][Self::stop] is called.
    ///
    /// # Errors
    ///
    /// Returns [`StrideError::SpeechSynthesis`] when the engine rejects the
    /// utterance.
    fn speak(&self, text: &str, voice: &Voice) -> Result<(), StrideError>;

    /// Cancel the current utterance, if any.
    fn stop(&self);

    /// `true` while an utterance is audible.
    fn is_speaking(&self) -> bool;
}
