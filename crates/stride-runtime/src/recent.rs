//! [`RecentMessages`] – short-window duplicate detector.
//!
//! Perception backends often describe the same scene on consecutive frames.
//! The sensing loop records every message it forwards and drops a new one
//! when the same (normalized) text was forwarded within the window.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use stride_runtime::recent::RecentMessages;
//! use tokio::time::Instant;
//!
//! let mut recent = RecentMessages::new(Duration::from_secs(5));
//! let t0 = Instant::now();
//!
//! assert!(!recent.is_duplicate("Chair ahead", t0));
//! recent.record("Chair ahead", t0);
//! assert!(recent.is_duplicate("chair  ahead", t0 + Duration::from_secs(2)));
//! assert!(!recent.is_duplicate("Chair ahead", t0 + Duration::from_secs(5)));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use stride_kernel::speech_gate::message_id;
use tokio::time::Instant;

/// Upper bound on remembered messages regardless of the window.
const MAX_ENTRIES: usize = 32;

#[derive(Debug)]
pub struct RecentMessages {
    window: Duration,
    history: VecDeque<(String, Instant)>,
}

impl RecentMessages {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            history: VecDeque::new(),
        }
    }

    /// `true` when `text` was recorded less than one window before `now`.
    pub fn is_duplicate(&self, text: &str, now: Instant) -> bool {
        let id = message_id(text);
        self.history
            .iter()
            .any(|(seen, at)| *seen == id && now.saturating_duration_since(*at) < self.window)
    }

    /// Remember that `text` was forwarded at `now`.
    pub fn record(&mut self, text: &str, now: Instant) {
        self.history.push_back((message_id(text), now));
        self.prune(now);
    }

    /// Drop entries that can no longer match.
    fn prune(&mut self, now: Instant) {
        while let Some((_, at)) = self.history.front() {
            if now.saturating_duration_since(*at) >= self.window || self.history.len() > MAX_ENTRIES {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_messages_are_not_duplicates() {
        let mut recent = RecentMessages::new(Duration::from_secs(5));
        let t0 = Instant::now();
        recent.record("Chair ahead", t0);
        assert!(!recent.is_duplicate("Table ahead", t0));
    }

    #[test]
    fn window_expiry() {
        let mut recent = RecentMessages::new(Duration::from_secs(5));
        let t0 = Instant::now();
        recent.record("Exit sign ahead", t0);
        assert!(recent.is_duplicate("Exit sign ahead", t0 + Duration::from_millis(4_999)));
        assert!(!recent.is_duplicate("Exit sign ahead", t0 + Duration::from_secs(5)));
    }

    #[test]
    fn old_entries_are_pruned_on_record() {
        let mut recent = RecentMessages::new(Duration::from_secs(5));
        let t0 = Instant::now();
        recent.record("a", t0);
        recent.record("b", t0 + Duration::from_secs(1));
        recent.record("c", t0 + Duration::from_secs(10));
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut recent = RecentMessages::new(Duration::from_secs(3600));
        let t0 = Instant::now();
        for i in 0..100 {
            recent.record(&format!("message {i}"), t0);
        }
        assert!(recent.len() <= MAX_ENTRIES);
        assert!(recent.is_duplicate("message 99", t0));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut recent = RecentMessages::new(Duration::from_secs(5));
        recent.record("a", Instant::now());
        recent.clear();
        assert!(recent.is_empty());
    }
}
