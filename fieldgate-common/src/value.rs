//! Domain value model for module variables.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Declared kind of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Boolean,
    /// Accepts the legacy "string" spelling still emitted by older modules.
    #[serde(alias = "string")]
    Text,
    Structured,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "text",
            ValueKind::Structured => "structured",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A variable value as produced by an upstream module.
///
/// Structured values map member names to primitive values; nesting deeper
/// than one level is not part of the event contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Boolean(bool),
    Number(f64),
    Text(String),
    Structured(BTreeMap<String, VarValue>),
}

impl VarValue {
    /// The kind this literal value unambiguously carries.
    pub fn kind(&self) -> ValueKind {
        match self {
            VarValue::Number(_) => ValueKind::Number,
            VarValue::Boolean(_) => ValueKind::Boolean,
            VarValue::Text(_) => ValueKind::Text,
            VarValue::Structured(_) => ValueKind::Structured,
        }
    }

    /// Numeric view of this value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            VarValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&BTreeMap<String, VarValue>> {
        match self {
            VarValue::Structured(members) => Some(members),
            _ => None,
        }
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        VarValue::Number(v)
    }
}

impl From<bool> for VarValue {
    fn from(v: bool) -> Self {
        VarValue::Boolean(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        VarValue::Text(v.to_string())
    }
}

impl From<String> for VarValue {
    fn from(v: String) -> Self {
        VarValue::Text(v)
    }
}

/// Report-by-exception policy for a single variable.
///
/// A threshold of 0 still means "publish on any literal change" (the
/// comparison is strict greater-than), which is not the same intent as
/// having no policy at all even though the observable behavior matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Deadband: numeric deltas at or below this value are suppressed.
    pub threshold: f64,

    /// Staleness override: publish anyway once this much time has passed
    /// since the last forwarded value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_ms: Option<u64>,
}

impl FilterPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            max_interval_ms: None,
        }
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn max_interval(&self) -> Option<Duration> {
        self.max_interval_ms.map(Duration::from_millis)
    }
}

/// One member of a structure template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMember {
    pub name: String,
    pub kind: ValueKind,
}

/// Named, ordered member list defining the shape of a structured value.
///
/// Templates are registered once per name and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub members: Vec<TemplateMember>,
}

impl TemplateDef {
    pub fn member(&self, name: &str) -> Option<&TemplateMember> {
        self.members.iter().find(|m| m.name == name)
    }
}
