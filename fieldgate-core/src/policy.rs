//! Filter policy resolution and live updates.
//!
//! A deployment may supply a default policy and per-variable overrides,
//! either statically from configuration or via a live update channel.
//! Absence of any policy source is a valid mode meaning "all variables
//! enabled, no policy unless the event itself carries one".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use fieldgate_common::FilterPolicy;

/// Per-variable policy override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverride {
    /// When false, the variable's exception filter is bypassed entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<FilterPolicy>,
}

fn default_enabled() -> bool {
    true
}

impl Default for PolicyOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: None,
        }
    }
}

/// Policy resolved for one event: what the filter actually consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPolicy {
    pub policy: Option<FilterPolicy>,
    pub disabled: bool,
}

/// Lookup table of filter policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<FilterPolicy>,

    #[serde(default)]
    pub overrides: HashMap<String, PolicyOverride>,
}

impl PolicyTable {
    /// Resolve the effective policy for a variable.
    ///
    /// Precedence: the event's own policy beats the per-variable
    /// override, which beats the default. Filtering is disabled when the
    /// event says so or the override disables the variable.
    pub fn resolve(
        &self,
        variable: &str,
        event_policy: Option<FilterPolicy>,
        event_disabled: bool,
    ) -> ResolvedPolicy {
        let entry = self.overrides.get(variable);
        let disabled = event_disabled || entry.is_some_and(|o| !o.enabled);
        let policy = event_policy
            .or_else(|| entry.and_then(|o| o.policy))
            .or(self.default_policy);

        ResolvedPolicy { policy, disabled }
    }

    /// Apply a live update. Each update replaces its entry (or the whole
    /// table) atomically from the reader's point of view: the bridge
    /// task applies updates between event units, never mid-unit.
    pub fn apply(&mut self, update: PolicyUpdate) {
        match update {
            PolicyUpdate::Replace(table) => *self = table,
            PolicyUpdate::SetDefault { policy } => self.default_policy = policy,
            PolicyUpdate::SetOverride { variable, entry } => {
                self.overrides.insert(variable, entry);
            }
            PolicyUpdate::RemoveOverride { variable } => {
                self.overrides.remove(&variable);
            }
        }
    }
}

/// Live policy update, wholesale or per-entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyUpdate {
    Replace(PolicyTable),
    SetDefault {
        #[serde(default)]
        policy: Option<FilterPolicy>,
    },
    SetOverride {
        variable: String,
        entry: PolicyOverride,
    },
    RemoveOverride {
        variable: String,
    },
}
