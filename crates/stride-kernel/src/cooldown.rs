//! [`Cooldown`] – a single rate-limit window.
//!
//! A cooldown remembers when it last fired. It is *ready* when it never
//! fired or when at least `window` has passed since the last firing.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use stride_kernel::cooldown::Cooldown;
//! use tokio::time::Instant;
//!
//! let mut cd = Cooldown::new(Duration::from_secs(10));
//! let t0 = Instant::now();
//! assert!(cd.ready(t0));
//! cd.mark(t0);
//! assert!(!cd.ready(t0 + Duration::from_secs(5)));
//! assert!(cd.ready(t0 + Duration::from_secs(10)));
//! ```

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    window: Duration,
    last: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    /// `true` when the window has elapsed at `now` (or never started).
    pub fn ready(&self, now: Instant) -> bool {
        match self.last {
            Some(at) => now.saturating_duration_since(at) >= self.window,
            None => true,
        }
    }

    /// Record a firing at `now`, restarting the window.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Fire if ready. Returns whether it fired.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.ready(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    /// Time left until ready; zero when already ready.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last
            .map(|at| self.window.saturating_sub(now.saturating_duration_since(at)))
            .unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cooldown_is_ready() {
        let cd = Cooldown::new(Duration::from_secs(10));
        assert!(cd.ready(Instant::now()));
        assert_eq!(cd.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn try_fire_blocks_until_window_passes() {
        let mut cd = Cooldown::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(cd.try_fire(t0));
        assert!(!cd.try_fire(t0 + Duration::from_secs(9)));
        assert_eq!(cd.remaining(t0 + Duration::from_secs(4)), Duration::from_secs(6));
        assert!(cd.try_fire(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn clock_going_backwards_is_not_ready() {
        let mut cd = Cooldown::new(Duration::from_secs(10));
        let t0 = Instant::now() + Duration::from_secs(60);
        cd.mark(t0);
        assert!(!cd.ready(t0 - Duration::from_secs(30)));
    }

    #[test]
    fn reset_makes_ready() {
        let mut cd = Cooldown::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cd.mark(t0);
        cd.reset();
        assert!(cd.ready(t0));
        assert!(cd.last().is_none());
    }
}
