//! Report-by-exception filtering.
//!
//! Per-variable deadband suppression with a staleness override. The
//! filter decides; it never publishes. Callers must call
//! [`ExceptionFilter::record_publish`] exactly once per value actually
//! forwarded, and never for suppressed values, so re-evaluating
//! `should_publish` without recording always yields the same answer.

use std::collections::HashMap;

use tokio::time::Instant;

use fieldgate_common::{FilterPolicy, VarValue};

/// Last-published state for one filtered key.
#[derive(Debug, Clone)]
struct FilterState {
    last_value: VarValue,
    last_published_at: Instant,
}

/// Exception filter with per-key last-published state.
#[derive(Debug, Default)]
pub struct ExceptionFilter {
    states: HashMap<String, FilterState>,
}

impl ExceptionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether this value should be forwarded now.
    ///
    /// Decision order, first match wins:
    /// 1. filtering disabled for the key: publish
    /// 2. no policy: publish
    /// 3. no prior state (first observation): publish
    /// 4. max interval elapsed since the last publish: publish
    /// 5. both values numeric: publish iff `|delta| > threshold`
    ///    (strict, so a threshold of 0 publishes on any literal change)
    /// 6. otherwise: publish iff the value differs structurally
    pub fn should_publish(
        &self,
        key: &str,
        value: &VarValue,
        policy: Option<&FilterPolicy>,
        disabled: bool,
        now: Instant,
    ) -> bool {
        if disabled {
            return true;
        }

        let Some(policy) = policy else {
            return true;
        };

        let Some(state) = self.states.get(key) else {
            return true;
        };

        if let Some(max_interval) = policy.max_interval() {
            if now.duration_since(state.last_published_at) >= max_interval {
                return true;
            }
        }

        match (value.as_number(), state.last_value.as_number()) {
            (Some(current), Some(last)) => (current - last).abs() > policy.threshold,
            _ => *value != state.last_value,
        }
    }

    /// Record a forwarded value, overwriting any previous state.
    pub fn record_publish(&mut self, key: &str, value: &VarValue, now: Instant) {
        self.states.insert(
            key.to_string(),
            FilterState {
                last_value: value.clone(),
                last_published_at: now,
            },
        );
    }

    /// Number of keys with recorded state.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}
