//! [`InFlight`] – single-slot admission for periodic work.
//!
//! A periodic task acquires the slot before starting a cycle. While the
//! returned [`InFlightGuard`] is alive every further acquisition fails, so a
//! slow or hung cycle makes later ticks skip instead of piling up. Dropping
//! the guard (normal completion, error, timeout, or task abort) releases the
//! slot.
//!
//! # Example
//!
//! ```
//! use stride_kernel::in_flight::InFlight;
//!
//! let slot = InFlight::new();
//! let guard = slot.try_acquire().expect("slot is free");
//! assert!(slot.try_acquire().is_none());
//! drop(guard);
//! assert!(slot.try_acquire().is_some());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared single-slot flag. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

/// Proof of holding the slot; releases it on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot, or `None` when another cycle holds it.
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_slot() {
        let slot = InFlight::new();
        let other = slot.clone();
        let _guard = slot.try_acquire().unwrap();
        assert!(other.is_busy());
        assert!(other.try_acquire().is_none());
    }

    #[tokio::test]
    async fn aborted_task_releases_slot() {
        let slot = InFlight::new();
        let guard = slot.try_acquire().unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        assert!(slot.is_busy());
        handle.abort();
        let _ = handle.await;
        assert!(!slot.is_busy());
    }
}
