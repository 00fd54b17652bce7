//! The bridge loop.
//!
//! One task owns all mutable state (registry, filter, policies, rebirth
//! coordinator) and drives it from a `tokio::select!` over the inbound
//! event stream, the reverse command stream, the policy update stream
//! and the single rebirth debounce deadline. Events are processed
//! strictly in arrival order; each event's registry + filter + publish
//! sequence runs to completion before the next suspension point, so
//! shutdown always falls between units, never mid-unit.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use fieldgate_common::{
    CommandRequest, FilterPolicy, Metric, ModuleCommand, TemplateDef, ValueKind, VarValue,
    VariableEvent, timestamp_millis, to_metric_value,
};

use crate::error::Result;
use crate::filter::ExceptionFilter;
use crate::policy::{PolicyTable, PolicyUpdate};
use crate::rebirth::RebirthCoordinator;
use crate::registry::{Registry, UpsertRequest};
use crate::router;
use crate::template::{self, StructuredMode};

/// Telemetry publication collaborator.
///
/// The bridge hands over logical metric sets; wire encoding, session
/// handling and retry/backoff are entirely the collaborator's business.
#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    /// Announce the full current metric set for a scope.
    async fn publish_schema(&self, scope: &str, metrics: Vec<Metric>) -> Result<()>;

    /// Publish filtered value changes for a scope.
    async fn publish_values(&self, scope: &str, metrics: Vec<Metric>) -> Result<()>;
}

/// Reverse path collaborator: delivery to a module's command channel.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(&self, command: ModuleCommand) -> Result<()>;
}

/// Bridge behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    /// How structured values are represented on the telemetry side.
    pub structured_mode: StructuredMode,
    /// Quiet period before a batched schema announcement goes out.
    pub rebirth_debounce: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            structured_mode: StructuredMode::Nested,
            rebirth_debounce: Duration::from_millis(500),
        }
    }
}

/// Inbound channel bundle for [`Bridge::new`].
pub struct BridgeChannels {
    pub events: mpsc::Receiver<VariableEvent>,
    pub commands: mpsc::Receiver<CommandRequest>,
    pub policy_updates: mpsc::Receiver<PolicyUpdate>,
}

/// The variable registry & exception-filtering bridge.
pub struct Bridge<P, S> {
    options: BridgeOptions,
    registry: Registry,
    filter: ExceptionFilter,
    policies: PolicyTable,
    rebirth: RebirthCoordinator,
    publisher: P,
    sink: S,
    events: mpsc::Receiver<VariableEvent>,
    commands: mpsc::Receiver<CommandRequest>,
    policy_updates: mpsc::Receiver<PolicyUpdate>,
    commands_open: bool,
    policy_open: bool,
}

/// One variable update, normalized from either event shape.
struct Update {
    module: String,
    scope: String,
    variable: String,
    value: VarValue,
    declared_kind: ValueKind,
    policy: Option<FilterPolicy>,
    filter_disabled: bool,
    template: Option<TemplateDef>,
    timestamp: i64,
}

/// A metric that passed the filter, with the state to record once the
/// publish call actually succeeds.
struct Outgoing {
    key: String,
    value: VarValue,
    metric: Metric,
}

impl<P: TelemetryPublisher, S: CommandSink> Bridge<P, S> {
    pub fn new(
        options: BridgeOptions,
        policies: PolicyTable,
        publisher: P,
        sink: S,
        channels: BridgeChannels,
    ) -> Self {
        Self {
            rebirth: RebirthCoordinator::new(options.rebirth_debounce),
            options,
            registry: Registry::new(),
            filter: ExceptionFilter::new(),
            policies,
            publisher,
            sink,
            events: channels.events,
            commands: channels.commands,
            policy_updates: channels.policy_updates,
            commands_open: true,
            policy_open: true,
        }
    }

    /// Run until the event stream closes.
    pub async fn run(mut self) {
        tracing::info!(
            mode = ?self.options.structured_mode,
            debounce_ms = self.options.rebirth_debounce.as_millis() as u64,
            "Bridge loop started"
        );

        loop {
            let deadline = self.rebirth.deadline();

            tokio::select! {
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(far_future)),
                    if deadline.is_some() =>
                {
                    self.flush_rebirth().await;
                }
                maybe = self.events.recv() => match maybe {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                maybe = self.commands.recv(), if self.commands_open => match maybe {
                    Some(request) => self.handle_command(request).await,
                    None => self.commands_open = false,
                },
                maybe = self.policy_updates.recv(), if self.policy_open => match maybe {
                    Some(update) => self.policies.apply(update),
                    None => self.policy_open = false,
                },
            }
        }

        // Flush a still-pending announcement so a clean shutdown does not
        // swallow discovered schema.
        if self.rebirth.deadline().is_some() {
            self.flush_rebirth().await;
        }

        tracing::info!("Event stream closed, bridge loop exiting");
    }

    async fn handle_event(&mut self, event: VariableEvent) {
        match event {
            VariableEvent::Single {
                module,
                variable,
                value,
                declared_kind,
                policy,
                filter_disabled,
                template,
            } => {
                // The single-value shape carries no device scope; the
                // owning module doubles as the grouping key.
                let scope = module.clone();
                let outgoing = self.apply_update(Update {
                    module,
                    scope: scope.clone(),
                    variable,
                    value,
                    declared_kind,
                    policy,
                    filter_disabled,
                    template,
                    timestamp: timestamp_millis(),
                });
                self.publish(&scope, outgoing).await;
            }
            VariableEvent::Batch {
                module,
                scope,
                timestamp,
                values,
            } => {
                // One combined publish call for every value whose filter
                // passed; new variables go through the coordinator just
                // like the single-value path.
                let mut outgoing = Vec::new();
                for entry in values {
                    outgoing.extend(self.apply_update(Update {
                        module: module.clone(),
                        scope: scope.clone(),
                        variable: entry.variable,
                        value: entry.value,
                        declared_kind: entry.declared_kind,
                        policy: entry.policy,
                        filter_disabled: false,
                        template: None,
                        timestamp,
                    }));
                }
                self.publish(&scope, outgoing).await;
            }
        }
    }

    /// Registry + schema-change detection + filter for one update.
    /// Returns the metrics to forward; empty when suppressed or routed
    /// through the rebirth coordinator.
    fn apply_update(&mut self, mut update: Update) -> Vec<Outgoing> {
        // Flat mode decomposes a structured value before registration so
        // each member is keyed independently.
        if self.options.structured_mode == StructuredMode::Flat {
            if let VarValue::Structured(members) = &update.value {
                let def = match update.template.take() {
                    Some(d) => {
                        let name = self.registry.register_template(d);
                        self.registry.template(&name).cloned()
                    }
                    None => None,
                };

                let members = template::flatten(&update.variable, members, def.as_ref());
                let mut outgoing = Vec::new();
                for member in members {
                    outgoing.extend(self.apply_scalar(Update {
                        module: update.module.clone(),
                        scope: update.scope.clone(),
                        variable: member.id,
                        value: member.value,
                        declared_kind: member.kind,
                        policy: update.policy,
                        filter_disabled: update.filter_disabled,
                        template: None,
                        timestamp: update.timestamp,
                    }));
                }
                return outgoing;
            }
        }

        self.apply_scalar(update)
    }

    fn apply_scalar(&mut self, update: Update) -> Vec<Outgoing> {
        let resolved =
            self.policies
                .resolve(&update.variable, update.policy, update.filter_disabled);

        let outcome = self.registry.upsert(UpsertRequest {
            id: update.variable.clone(),
            module: update.module,
            scope: update.scope.clone(),
            declared_kind: update.declared_kind,
            value: update.value.clone(),
            policy: update.policy,
            filter_disabled: update.filter_disabled,
            template: update.template,
        });

        if outcome.needs_rebirth() {
            self.rebirth.request(&update.scope);
            return Vec::new();
        }

        // While a rebirth is pending for this scope, individual value
        // publications would use an unannounced schema. The registry is
        // already updated; the announcement carries the latest value.
        if self.rebirth.is_pending(&update.scope) {
            return Vec::new();
        }

        if !self.filter.should_publish(
            &update.variable,
            &update.value,
            resolved.policy.as_ref(),
            resolved.disabled,
            Instant::now(),
        ) {
            return Vec::new();
        }

        let Some(variable) = self.registry.get(&update.variable) else {
            return Vec::new();
        };

        let metric = match &variable.value {
            VarValue::Structured(members) => {
                let Some(def) = variable.template.as_deref().and_then(|n| self.registry.template(n))
                else {
                    tracing::warn!(
                        variable = %update.variable,
                        "Structured value without a registered template, cannot publish"
                    );
                    return Vec::new();
                };
                template::instance_metric(&variable.id, def, members)
            }
            value => Metric::new(&variable.id, variable.kind, to_metric_value(value)),
        }
        .at(update.timestamp);

        vec![Outgoing {
            key: update.variable,
            value: update.value,
            metric,
        }]
    }

    /// Forward filtered metrics in one publish call. Filter state is
    /// recorded only for values that were actually handed over; a
    /// publisher failure drops the attempt and the registry keeps the
    /// latest value for the next successful publish.
    async fn publish(&mut self, scope: &str, outgoing: Vec<Outgoing>) {
        if outgoing.is_empty() {
            return;
        }

        // A later entry of the same event may have queued a rebirth after
        // earlier entries already passed the filter. Their metrics would
        // use an unannounced schema; the announcement carries their
        // latest values instead.
        if self.rebirth.is_pending(scope) {
            tracing::debug!(
                scope = %scope,
                count = outgoing.len(),
                "Holding value publications for the pending announcement"
            );
            return;
        }

        let metrics: Vec<Metric> = outgoing.iter().map(|o| o.metric.clone()).collect();
        match self.publisher.publish_values(scope, metrics).await {
            Ok(()) => {
                let now = Instant::now();
                for item in &outgoing {
                    self.filter.record_publish(&item.key, &item.value, now);
                }
            }
            Err(e) => {
                tracing::warn!(
                    scope = %scope,
                    count = outgoing.len(),
                    error = %e,
                    "Dropping value publication"
                );
            }
        }
    }

    /// Debounce expiry: one full schema announcement per affected scope,
    /// reflecting registry state as of the end of the window.
    async fn flush_rebirth(&mut self) {
        for scope in self.rebirth.fire() {
            let metrics = self
                .registry
                .metric_set(&scope, self.options.structured_mode);

            tracing::info!(
                scope = %scope,
                metrics = metrics.len(),
                "Publishing schema announcement"
            );

            match self.publisher.publish_schema(&scope, metrics).await {
                Ok(()) => {
                    // The announcement carried every variable's latest
                    // value; deadband deltas are measured from here.
                    let now = Instant::now();
                    let published: Vec<(String, VarValue)> = self
                        .registry
                        .scope_variables(&scope)
                        .map(|v| (v.id.clone(), v.value.clone()))
                        .collect();
                    for (id, value) in published {
                        self.filter.record_publish(&id, &value, now);
                    }
                }
                Err(e) => {
                    tracing::warn!(scope = %scope, error = %e, "Dropping schema announcement");
                }
            }
        }
    }

    async fn handle_command(&mut self, request: CommandRequest) {
        for metric in request.metrics {
            for command in router::route(&mut self.registry, &metric) {
                if let Err(e) = self.sink.send(command).await {
                    tracing::warn!(
                        metric = %metric.metric,
                        error = %e,
                        "Failed to deliver module command"
                    );
                }
            }
        }
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400)
}
