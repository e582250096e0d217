//! `stride-hal` – device collaborators.
//!
//! The coordination core never touches platform APIs directly. It talks to
//! the traits in this crate, and the host application supplies the drivers.
//!
//! # Modules
//!
//! - [`camera`] – [`CaptureDevice`][camera::CaptureDevice]: async frame
//!   capture that may hang; callers wrap it in a deadline.
//! - [`location`] – [`LocationProvider`][location::LocationProvider] and the
//!   cancellable [`LocationSubscription`][location::LocationSubscription].
//! - [`speech`] – [`SpeechEngine`][speech::SpeechEngine]: the single
//!   exclusive audio output channel.
//! - [`sim`] – simulated drivers for every trait, used by tests and the CLI.

pub mod camera;
pub mod location;
pub mod sim;
pub mod speech;

pub use camera::{CameraFrame, CaptureDevice, DeviceStatus};
pub use location::{
    LocationAccuracy, LocationFeed, LocationOptions, LocationProvider, LocationSubscription,
};
pub use sim::{CaptureBehavior, SimCamera, SimLocation, SimSpeech};
pub use speech::{SpeechEngine, Voice};
