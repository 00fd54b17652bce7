//! Structured-value decomposition.
//!
//! A structured variable can be represented on the telemetry side in one
//! of two deployment-wide modes:
//!
//! - **Nested**: one composite metric whose payload is the ordered member
//!   list of the variable's structure template.
//! - **Flat**: N independent primitive metrics named
//!   `"{variable}/{member}"`, each registered and filtered on its own.
//!
//! The inverse direction splits a composite command payload back into
//! per-member domain values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fieldgate_common::{
    Metric, MetricMember, MetricValue, TemplateDef, ValueKind, VarValue, from_metric_value,
    member_to_metric, to_metric_value,
};

/// Deployment-level representation mode for structured values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredMode {
    #[default]
    Nested,
    Flat,
}

/// One flattened member of a structured value.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatMember {
    /// Registry key: `"{variable}/{member}"`.
    pub id: String,
    pub kind: ValueKind,
    pub value: VarValue,
}

/// Flatten a structured value into independent primitive members.
///
/// Member kinds come from the template when one is known, from the
/// literal values otherwise. Members absent from the value are skipped;
/// they simply have nothing to publish this cycle.
pub fn flatten(
    variable: &str,
    members: &BTreeMap<String, VarValue>,
    template: Option<&TemplateDef>,
) -> Vec<FlatMember> {
    match template {
        Some(def) => def
            .members
            .iter()
            .filter_map(|m| {
                members.get(&m.name).map(|value| FlatMember {
                    id: format!("{}/{}", variable, m.name),
                    kind: m.kind,
                    value: value.clone(),
                })
            })
            .collect(),
        None => members
            .iter()
            .map(|(name, value)| FlatMember {
                id: format!("{}/{}", variable, name),
                kind: value.kind(),
                value: value.clone(),
            })
            .collect(),
    }
}

/// Build the composite metric for a structured value in nested mode.
///
/// Members follow the template's declared order; members missing from
/// the value resolve to a null member value rather than erroring.
pub fn instance_metric(
    variable: &str,
    def: &TemplateDef,
    members: &BTreeMap<String, VarValue>,
) -> Metric {
    let member_values: Vec<MetricMember> = def
        .members
        .iter()
        .map(|m| member_to_metric(&m.name, m.kind, members.get(&m.name)))
        .collect();

    Metric::new(
        variable,
        ValueKind::Structured,
        MetricValue::Template(member_values),
    )
}

/// Build the one-time definition metric for a template: member stubs
/// with no values, carried in the next full schema announcement.
pub fn definition_metric(def: &TemplateDef) -> Metric {
    let stubs: Vec<MetricMember> = def
        .members
        .iter()
        .map(|m| MetricMember::stub(&m.name, m.kind))
        .collect();

    Metric::new(
        &def.name,
        ValueKind::Structured,
        MetricValue::Template(stubs),
    )
    .definition()
}

/// Split a composite command payload into per-member domain values.
///
/// Only members actually carried by the payload (with a non-null value)
/// produce a sub-command. Member kinds come from the template when the
/// member is declared there, from the payload member otherwise.
pub fn split_command(
    payload: &[MetricMember],
    template: Option<&TemplateDef>,
) -> Vec<(String, VarValue)> {
    payload
        .iter()
        .filter_map(|m| {
            let value = m.value.as_ref()?;
            let kind = template
                .and_then(|def| def.member(&m.name))
                .map(|tm| tm.kind)
                .unwrap_or(m.kind);
            from_metric_value(Some(kind), value).map(|v| (m.name.clone(), v))
        })
        .collect()
}

/// Build the primitive metric for a single flattened member.
pub fn flat_metric(member: &FlatMember) -> Metric {
    Metric::new(&member.id, member.kind, to_metric_value(&member.value))
}
