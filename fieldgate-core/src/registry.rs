//! Variable registry.
//!
//! Tracks every discovered variable's current value, resolved kind,
//! filter policy and owning module, plus the table of structure
//! templates. Variables are created on first sight and mutated in place
//! afterwards; they are never deleted.

use std::collections::BTreeMap;

use fieldgate_common::{
    FilterPolicy, Metric, TemplateDef, ValueKind, VarValue, effective_kind, to_metric_value,
};

use crate::template::{self, StructuredMode};

/// One registered variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: String,
    /// Owning module, used for reverse command routing.
    pub module: String,
    /// Grouping key under which this variable's metrics are announced.
    pub scope: String,
    /// Resolved protocol-level kind (may differ from the declared kind
    /// when the literal value corrected it).
    pub kind: ValueKind,
    pub value: VarValue,
    pub policy: Option<FilterPolicy>,
    pub filter_disabled: bool,
    /// Template name, present only for structured variables.
    pub template: Option<String>,
}

/// Input to [`Registry::upsert`].
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub id: String,
    pub module: String,
    pub scope: String,
    pub declared_kind: ValueKind,
    pub value: VarValue,
    pub policy: Option<FilterPolicy>,
    pub filter_disabled: bool,
    pub template: Option<TemplateDef>,
}

/// Outcome of an upsert, consumed by the bridge loop's publication
/// decision. The registry itself never publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The id was previously unknown.
    pub is_new: bool,
    /// The variable existed but its resolved protocol representation
    /// differs from what is currently announced.
    pub schema_changed: bool,
}

impl UpsertOutcome {
    /// Either condition requires a schema re-announcement.
    pub fn needs_rebirth(&self) -> bool {
        self.is_new || self.schema_changed
    }
}

/// Registry of variables and structure templates.
///
/// Owned and mutated exclusively by the bridge loop's task; iteration
/// order is deterministic so schema announcements are stable.
#[derive(Debug, Default)]
pub struct Registry {
    variables: BTreeMap<String, Variable>,
    templates: BTreeMap<String, TemplateDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a variable.
    ///
    /// The kind is resolved from the declared kind and the literal value;
    /// a value whose own type is unambiguous wins over a wrong
    /// declaration. Value and policy are updated unconditionally, even
    /// when nothing about the schema changed.
    pub fn upsert(&mut self, request: UpsertRequest) -> UpsertOutcome {
        let resolved = effective_kind(request.declared_kind, &request.value);

        let template_name = match request.template {
            Some(def) => Some(self.register_template(def)),
            None => None,
        };

        match self.variables.get_mut(&request.id) {
            Some(existing) => {
                let schema_changed = existing.kind != resolved;
                if schema_changed {
                    tracing::debug!(
                        variable = %request.id,
                        from = %existing.kind,
                        to = %resolved,
                        "Variable kind corrected"
                    );
                }

                existing.kind = resolved;
                existing.value = request.value;
                existing.policy = request.policy;
                existing.filter_disabled = request.filter_disabled;
                existing.module = request.module;
                existing.scope = request.scope;
                if template_name.is_some() {
                    existing.template = template_name;
                }

                UpsertOutcome {
                    is_new: false,
                    schema_changed,
                }
            }
            None => {
                self.variables.insert(
                    request.id.clone(),
                    Variable {
                        id: request.id,
                        module: request.module,
                        scope: request.scope,
                        kind: resolved,
                        value: request.value,
                        policy: request.policy,
                        filter_disabled: request.filter_disabled,
                        template: template_name,
                    },
                );

                UpsertOutcome {
                    is_new: true,
                    schema_changed: false,
                }
            }
        }
    }

    /// Register a structure template, first registration wins.
    ///
    /// A later definition under an already-registered name is ignored;
    /// a differing one additionally logs a warning.
    pub fn register_template(&mut self, def: TemplateDef) -> String {
        let name = def.name.clone();
        match self.templates.get(&name) {
            Some(existing) => {
                if *existing != def {
                    tracing::warn!(
                        template = %name,
                        "Ignoring template redefinition; first registration wins"
                    );
                }
            }
            None => {
                tracing::debug!(template = %name, "Registered structure template");
                self.templates.insert(name.clone(), def);
            }
        }
        name
    }

    pub fn template(&self, name: &str) -> Option<&TemplateDef> {
        self.templates.get(name)
    }

    pub fn get(&self, id: &str) -> Option<&Variable> {
        self.variables.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Variable> {
        self.variables.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables belonging to a scope, in stable order.
    pub fn scope_variables(&self, scope: &str) -> impl Iterator<Item = &Variable> {
        self.variables.values().filter(move |v| v.scope == scope)
    }

    /// Build the full current metric set for a scope, as carried by a
    /// schema announcement. In nested mode each distinct template used
    /// within the scope contributes its definition metric ahead of the
    /// instances referencing it.
    pub fn metric_set(&self, scope: &str, mode: StructuredMode) -> Vec<Metric> {
        let mut definitions: Vec<Metric> = Vec::new();
        let mut metrics: Vec<Metric> = Vec::new();
        let mut seen_templates: Vec<&str> = Vec::new();

        for variable in self.scope_variables(scope) {
            match (&variable.value, mode) {
                (VarValue::Structured(members), StructuredMode::Nested) => {
                    let Some(def) = variable.template.as_deref().and_then(|n| self.template(n))
                    else {
                        tracing::warn!(
                            variable = %variable.id,
                            "Structured variable without a registered template, skipping"
                        );
                        continue;
                    };

                    if !seen_templates.contains(&def.name.as_str()) {
                        seen_templates.push(&def.name);
                        definitions.push(template::definition_metric(def));
                    }
                    metrics.push(template::instance_metric(&variable.id, def, members));
                }
                (VarValue::Structured(members), StructuredMode::Flat) => {
                    // Flat deployments upsert members as their own
                    // variables; a structured parent here can only come
                    // from a mode change mid-flight. Flatten it anyway.
                    let def = variable.template.as_deref().and_then(|n| self.template(n));
                    for member in template::flatten(&variable.id, members, def) {
                        metrics.push(template::flat_metric(&member));
                    }
                }
                (value, _) => {
                    metrics.push(Metric::new(
                        &variable.id,
                        variable.kind,
                        to_metric_value(value),
                    ));
                }
            }
        }

        definitions.extend(metrics);
        definitions
    }
}
