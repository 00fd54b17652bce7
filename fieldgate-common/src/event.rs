//! Boundary event model.
//!
//! Inbound payloads are duck-typed on the wire (single-value vs batch,
//! scalar vs composite). They are decoded exactly once at the boundary
//! into the tagged types here; everything past the boundary works with
//! explicit discriminants.

use serde::{Deserialize, Serialize};

use crate::metric::MetricValue;
use crate::value::{FilterPolicy, TemplateDef, ValueKind, VarValue};

/// A variable-update event from an upstream module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum VariableEvent {
    /// One variable changed.
    Single {
        /// Owning module, used for reverse command routing.
        module: String,
        variable: String,
        value: VarValue,
        declared_kind: ValueKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<FilterPolicy>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        filter_disabled: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<TemplateDef>,
    },
    /// Several variables sampled together under one device scope.
    Batch {
        module: String,
        scope: String,
        /// Unix epoch milliseconds for the whole sample.
        timestamp: i64,
        values: Vec<BatchValue>,
    },
}

/// One entry of a batch event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchValue {
    pub variable: String,
    pub value: VarValue,
    pub declared_kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<FilterPolicy>,
}

/// A reverse command received from the telemetry side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub scope: String,
    pub metrics: Vec<CommandMetric>,
}

/// One metric write within a reverse command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMetric {
    pub metric: String,
    pub value: MetricValue,
}

/// An outbound command addressed to a module's command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCommand {
    pub module: String,
    pub variable: String,

    /// Set when the command targets one member of a structured variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,

    pub value: VarValue,

    /// True when the target variable was never seen by the registry and
    /// the value conversion is best-effort.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unverified: bool,
}
