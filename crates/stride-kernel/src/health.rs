//! [`ServiceHealth`] – failure bookkeeping for remote and device services.
//!
//! Components (the camera, the perception service, the routing service)
//! report every success and failure. The monitor tracks consecutive
//! failures per component and tells the caller when a failure is the
//! *first* of a streak, so a fault is surfaced to the user once rather than
//! on every retry.
//!
//! # Example
//!
//! ```
//! use stride_kernel::health::{ComponentHealth, ServiceHealth};
//!
//! let mut health = ServiceHealth::new();
//! assert!(health.record_failure("perception"));  // first failure → surface
//! assert!(!health.record_failure("perception")); // still failing → quiet
//! assert_eq!(health.health("perception"), ComponentHealth::Failing { consecutive: 2 });
//!
//! health.record_success("perception");
//! assert_eq!(health.health("perception"), ComponentHealth::Healthy);
//! ```

use std::collections::HashMap;

use tracing::info;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// No failure since the last success (or never reported).
    Healthy,
    /// The most recent `consecutive` reports were failures.
    Failing { consecutive: u32 },
}

// ────────────────────────────────────────────────────────────────────────────
// ServiceHealth
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ServiceHealth {
    failures: HashMap<String, u32>,
}

impl ServiceHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Returns `true` when this failure starts a new
    /// streak and should be surfaced.
    pub fn record_failure(&mut self, component: &str) -> bool {
        let count = self.failures.entry(component.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count == 1
    }

    /// Record a success, ending any failure streak.
    pub fn record_success(&mut self, component: &str) {
        if let Some(count) = self.failures.remove(component) {
            info!(component, failures = count, "component recovered");
        }
    }

    pub fn health(&self, component: &str) -> ComponentHealth {
        match self.failures.get(component) {
            Some(&consecutive) if consecutive > 0 => ComponentHealth::Failing { consecutive },
            _ => ComponentHealth::Healthy,
        }
    }

    /// IDs of every component currently in a failure streak. Order is
    /// unspecified.
    pub fn failing(&self) -> Vec<String> {
        self.failures.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.failures.clear();
    }
}
