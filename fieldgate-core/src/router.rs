//! Reverse command routing.
//!
//! Commands arrive from the telemetry side addressed by metric name and
//! must reach the owning module's command channel, with protocol values
//! converted back to domain values. Routing never rejects a command for
//! an unknown variable: the best-effort converted value is forwarded
//! with an `unverified` flag instead.
//!
//! Successful routing writes the value back into the registry. That
//! write never triggers a publish: the command is applied to local
//! state awaiting the next observed status update from the module.

use fieldgate_common::{CommandMetric, ModuleCommand, VarValue, from_metric_value};

use crate::registry::Registry;
use crate::template;

/// Route one command metric, returning the outbound module commands.
///
/// Name resolution tries the exact id first, then strips one leading
/// `/`-delimited segment for backward-compatible flat-mode names
/// (`"folder/temp"` resolves to `"temp"`).
pub fn route(registry: &mut Registry, command: &CommandMetric) -> Vec<ModuleCommand> {
    let Some(id) = resolve_id(registry, &command.metric) else {
        return route_unknown(command);
    };

    let Some(variable) = registry.get(&id) else {
        return route_unknown(command);
    };
    let module = variable.module.clone();
    let kind = variable.kind;
    let template_name = variable.template.clone();

    // Composite payload against a structured variable: one sub-command
    // per carried member.
    if let Some(members) = command.value.as_members() {
        if kind == fieldgate_common::ValueKind::Structured {
            let def = template_name
                .as_deref()
                .and_then(|n| registry.template(n))
                .cloned();
            let parts = template::split_command(members, def.as_ref());

            if parts.is_empty() {
                tracing::warn!(metric = %command.metric, "Composite command carried no usable members");
                return Vec::new();
            }

            if let Some(VarValue::Structured(current)) =
                registry.get_mut(&id).map(|v| &mut v.value)
            {
                for (member, value) in &parts {
                    current.insert(member.clone(), value.clone());
                }
            }

            return parts
                .into_iter()
                .map(|(member, value)| ModuleCommand {
                    module: module.clone(),
                    variable: id.clone(),
                    member: Some(member),
                    value,
                    unverified: false,
                })
                .collect();
        }
    }

    // Scalar command: inverse conversion via the declared kind.
    let Some(value) = from_metric_value(Some(kind), &command.value) else {
        tracing::warn!(
            metric = %command.metric,
            kind = %kind,
            "Command value cannot target this variable, dropping"
        );
        return Vec::new();
    };

    if let Some(variable) = registry.get_mut(&id) {
        variable.value = value.clone();
    }

    vec![ModuleCommand {
        module,
        variable: id,
        member: None,
        value,
        unverified: false,
    }]
}

/// Exact id, then one stripped leading path segment.
fn resolve_id(registry: &Registry, metric: &str) -> Option<String> {
    if registry.get(metric).is_some() {
        return Some(metric.to_string());
    }

    let (_, stripped) = metric.split_once('/')?;
    registry.get(stripped).is_some().then(|| stripped.to_string())
}

/// Best-effort passthrough for a variable the registry has never seen.
///
/// The value is converted from the payload's own runtime shape. The
/// module is taken from the metric name's leading path segment when one
/// exists; otherwise the bare name doubles as both.
fn route_unknown(command: &CommandMetric) -> Vec<ModuleCommand> {
    let Some(value) = from_metric_value(None, &command.value) else {
        tracing::warn!(metric = %command.metric, "Unroutable command value for unknown variable");
        return Vec::new();
    };

    tracing::warn!(
        metric = %command.metric,
        "Command for unknown variable, forwarding unverified"
    );

    let (module, variable) = match command.metric.split_once('/') {
        Some((module, variable)) => (module.to_string(), variable.to_string()),
        None => (command.metric.clone(), command.metric.clone()),
    };

    vec![ModuleCommand {
        module,
        variable,
        member: None,
        value,
        unverified: true,
    }]
}
