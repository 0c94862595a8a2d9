//! In-flight submission guard
//!
//! Rejects a second trigger of the same workflow while the first is still
//! running, so a double click cannot create two records.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether a workflow is running
#[derive(Debug)]
pub struct SubmissionGuard {
    name: &'static str,
    busy: AtomicBool,
}

impl SubmissionGuard {
    /// Create an idle guard
    pub fn new(name: &'static str) -> Self {
        Self { name, busy: AtomicBool::new(false) }
    }

    /// Claim the guard, or `None` if a submission is already in flight
    pub fn try_begin(&self) -> Option<InFlight<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::warn!("Ignoring {} while a previous one is in flight", self.name);
            return None;
        }
        Some(InFlight { busy: &self.busy })
    }

    /// Whether a submission is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Name of the guarded workflow
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Held for the duration of a submission; releases the guard when dropped
#[derive(Debug)]
pub struct InFlight<'a> {
    busy: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
