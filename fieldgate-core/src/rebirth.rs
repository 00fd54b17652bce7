//! Rebirth batching.
//!
//! Schema announcement protocols of this family require a full metric
//! set to accompany every declaration. When a burst of events discovers
//! N new variables at once, announcing N times would be an O(N) storm;
//! the coordinator coalesces the burst into one announcement per scope
//! after a quiet period.
//!
//! State machine: Idle -> Pending -> (debounce expiry with no new
//! triggers) -> Idle. A request while Pending restarts the debounce
//! interval, so the emission is timed from the **last** trigger. There
//! is never more than one outstanding deadline; the bridge loop selects
//! on [`RebirthCoordinator::deadline`] and calls
//! [`RebirthCoordinator::fire`] when it elapses.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

/// Debounced coalescer for schema re-announcements.
#[derive(Debug)]
pub struct RebirthCoordinator {
    debounce: Duration,
    deadline: Option<Instant>,
    pending: BTreeSet<String>,
}

impl RebirthCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            pending: BTreeSet::new(),
        }
    }

    /// Request a rebirth for a scope.
    ///
    /// Idle -> Pending, or restarts the debounce interval when already
    /// Pending (cancel-and-reschedule).
    pub fn request(&mut self, scope: &str) {
        if self.pending.insert(scope.to_string()) {
            tracing::debug!(scope = %scope, "Scope queued for rebirth");
        }
        self.deadline = Some(Instant::now() + self.debounce);
    }

    /// The single outstanding deadline, when Pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a rebirth is pending for this scope. While true, the
    /// bridge must skip individual value publications for the scope:
    /// they would use a schema that has not been announced yet.
    pub fn is_pending(&self, scope: &str) -> bool {
        self.pending.contains(scope)
    }

    /// Consume the pending scope set and return to Idle. Called by the
    /// bridge loop once the deadline has elapsed.
    pub fn fire(&mut self) -> Vec<String> {
        self.deadline = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}
