//! End-to-end bridge loop tests with in-memory collaborators and
//! virtual time.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use fieldgate_common::{
    BatchValue, CommandMetric, CommandRequest, FilterPolicy, Metric, MetricValue, ModuleCommand,
    TemplateDef, TemplateMember, ValueKind, VarValue, VariableEvent,
};
use fieldgate_core::{
    Bridge, BridgeChannels, BridgeOptions, CommandSink, CoreError, PolicyTable, PolicyUpdate,
    StructuredMode, TelemetryPublisher,
};

#[derive(Default, Clone)]
struct MemoryPublisher {
    schemas: Arc<Mutex<Vec<(String, Vec<Metric>)>>>,
    values: Arc<Mutex<Vec<(String, Vec<Metric>)>>>,
    fail_values: Arc<Mutex<bool>>,
}

impl MemoryPublisher {
    fn schema_count(&self) -> usize {
        self.schemas.lock().unwrap().len()
    }

    fn value_batches(&self) -> Vec<(String, Vec<Metric>)> {
        self.values.lock().unwrap().clone()
    }

    fn set_failing(&self, failing: bool) {
        *self.fail_values.lock().unwrap() = failing;
    }
}

#[async_trait]
impl TelemetryPublisher for MemoryPublisher {
    async fn publish_schema(
        &self,
        scope: &str,
        metrics: Vec<Metric>,
    ) -> Result<(), CoreError> {
        self.schemas
            .lock()
            .unwrap()
            .push((scope.to_string(), metrics));
        Ok(())
    }

    async fn publish_values(
        &self,
        scope: &str,
        metrics: Vec<Metric>,
    ) -> Result<(), CoreError> {
        if *self.fail_values.lock().unwrap() {
            return Err(CoreError::publish(scope, "publisher unavailable"));
        }
        self.values
            .lock()
            .unwrap()
            .push((scope.to_string(), metrics));
        Ok(())
    }
}

#[derive(Default, Clone)]
struct MemorySink {
    commands: Arc<Mutex<Vec<ModuleCommand>>>,
}

#[async_trait]
impl CommandSink for MemorySink {
    async fn send(&self, command: ModuleCommand) -> Result<(), CoreError> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

struct Harness {
    events: mpsc::Sender<VariableEvent>,
    commands: mpsc::Sender<CommandRequest>,
    policy_updates: mpsc::Sender<PolicyUpdate>,
    publisher: MemoryPublisher,
    sink: MemorySink,
}

fn spawn_bridge(options: BridgeOptions) -> Harness {
    spawn_bridge_with_policies(options, PolicyTable::default())
}

fn spawn_bridge_with_policies(options: BridgeOptions, policies: PolicyTable) -> Harness {
    let publisher = MemoryPublisher::default();
    let sink = MemorySink::default();
    let (events_tx, events) = mpsc::channel(64);
    let (commands_tx, commands) = mpsc::channel(64);
    let (policy_tx, policy_updates) = mpsc::channel(64);

    let bridge = Bridge::new(
        options,
        policies,
        publisher.clone(),
        sink.clone(),
        BridgeChannels {
            events,
            commands,
            policy_updates,
        },
    );
    tokio::spawn(bridge.run());

    Harness {
        events: events_tx,
        commands: commands_tx,
        policy_updates: policy_tx,
        publisher,
        sink,
    }
}

fn options(debounce_ms: u64, mode: StructuredMode) -> BridgeOptions {
    BridgeOptions {
        structured_mode: mode,
        rebirth_debounce: Duration::from_millis(debounce_ms),
    }
}

fn single(variable: &str, value: VarValue) -> VariableEvent {
    VariableEvent::Single {
        module: "plc1".to_string(),
        variable: variable.to_string(),
        value,
        declared_kind: ValueKind::Number,
        policy: None,
        filter_disabled: false,
        template: None,
    }
}

fn single_with_policy(variable: &str, value: VarValue, policy: FilterPolicy) -> VariableEvent {
    VariableEvent::Single {
        module: "plc1".to_string(),
        variable: variable.to_string(),
        value,
        declared_kind: ValueKind::Number,
        policy: Some(policy),
        filter_disabled: false,
        template: None,
    }
}

fn motor_template() -> TemplateDef {
    TemplateDef {
        name: "motor".to_string(),
        version: None,
        members: vec![
            TemplateMember {
                name: "a".to_string(),
                kind: ValueKind::Number,
            },
            TemplateMember {
                name: "b".to_string(),
                kind: ValueKind::Boolean,
            },
        ],
    }
}

fn motor_value(a: f64, b: bool) -> VarValue {
    let mut members = BTreeMap::new();
    members.insert("a".to_string(), VarValue::Number(a));
    members.insert("b".to_string(), VarValue::Boolean(b));
    VarValue::Structured(members)
}

fn structured(variable: &str, value: VarValue) -> VariableEvent {
    structured_with_policy(variable, value, None)
}

fn structured_with_policy(
    variable: &str,
    value: VarValue,
    policy: Option<FilterPolicy>,
) -> VariableEvent {
    VariableEvent::Single {
        module: "plc1".to_string(),
        variable: variable.to_string(),
        value,
        declared_kind: ValueKind::Structured,
        policy,
        filter_disabled: false,
        template: Some(motor_template()),
    }
}

/// Let the bridge task drain its channels; with paused time this also
/// auto-advances past any armed debounce deadline.
async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

#[tokio::test(start_paused = true)]
async fn burst_of_discoveries_yields_one_announcement() {
    let h = spawn_bridge(options(500, StructuredMode::Nested));

    for i in 0..10 {
        h.events
            .send(single(&format!("var{:02}", i), VarValue::Number(i as f64)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    settle().await;

    assert_eq!(h.publisher.schema_count(), 1);
    let schemas = h.publisher.schemas.lock().unwrap();
    assert_eq!(schemas[0].0, "plc1");
    assert_eq!(schemas[0].1.len(), 10);
    // No individual data publications for the burst.
    assert!(h.publisher.value_batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn announcement_reflects_end_of_window_state() {
    let h = spawn_bridge(options(500, StructuredMode::Nested));

    h.events.send(single("temp", VarValue::Number(1.0))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Late-arriving update within the window for another variable.
    h.events.send(single("pressure", VarValue::Number(5.0))).await.unwrap();
    h.events.send(single("temp", VarValue::Number(2.0))).await.unwrap();
    settle().await;

    let schemas = h.publisher.schemas.lock().unwrap();
    assert_eq!(schemas.len(), 1);
    let temp = schemas[0].1.iter().find(|m| m.name == "temp").unwrap();
    assert_eq!(temp.value, MetricValue::Number(2.0));
    assert!(schemas[0].1.iter().any(|m| m.name == "pressure"));
}

#[tokio::test(start_paused = true)]
async fn deadband_suppression_through_the_loop() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));
    let policy = FilterPolicy::new(0.5);

    h.events
        .send(single_with_policy("temp", VarValue::Number(10.0), policy))
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.publisher.schema_count(), 1);

    // Within the deadband: suppressed.
    h.events
        .send(single_with_policy("temp", VarValue::Number(10.3), policy))
        .await
        .unwrap();
    settle().await;
    assert!(h.publisher.value_batches().is_empty());

    // Beyond it: published, measured against the announced value.
    h.events
        .send(single_with_policy("temp", VarValue::Number(10.6), policy))
        .await
        .unwrap();
    settle().await;

    let batches = h.publisher.value_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1[0].value, MetricValue::Number(10.6));
}

#[tokio::test(start_paused = true)]
async fn kind_correction_triggers_reannouncement() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events
        .send(VariableEvent::Single {
            module: "plc1".to_string(),
            variable: "mode".to_string(),
            value: VarValue::Text("auto".to_string()),
            declared_kind: ValueKind::Text,
            policy: None,
            filter_disabled: false,
            template: None,
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.publisher.schema_count(), 1);

    // Same declared kind, but the literal is numeric: the registry
    // corrects the kind and the scope is re-announced.
    h.events
        .send(VariableEvent::Single {
            module: "plc1".to_string(),
            variable: "mode".to_string(),
            value: VarValue::Number(42.0),
            declared_kind: ValueKind::Text,
            policy: None,
            filter_disabled: false,
            template: None,
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(h.publisher.schema_count(), 2);
    let schemas = h.publisher.schemas.lock().unwrap();
    assert_eq!(schemas[1].1[0].kind, ValueKind::Number);
    assert_eq!(schemas[1].1[0].value, MetricValue::Number(42.0));
}

#[tokio::test(start_paused = true)]
async fn nested_mode_announces_definition_and_instance() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events.send(structured("m1", motor_value(3.5, true))).await.unwrap();
    settle().await;

    let schemas = h.publisher.schemas.lock().unwrap();
    assert_eq!(schemas.len(), 1);
    let metrics = &schemas[0].1;
    assert_eq!(metrics.len(), 2);
    assert!(metrics[0].is_definition);
    assert_eq!(metrics[0].name, "motor");
    assert_eq!(metrics[1].name, "m1");
    let members = metrics[1].value.as_members().unwrap();
    assert_eq!(members[0].value, Some(MetricValue::Number(3.5)));
    assert_eq!(members[1].value, Some(MetricValue::Boolean(true)));
}

#[tokio::test(start_paused = true)]
async fn nested_structured_change_publishes_one_composite() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events.send(structured("m1", motor_value(3.5, true))).await.unwrap();
    settle().await;

    h.events.send(structured("m1", motor_value(4.0, true))).await.unwrap();
    settle().await;

    let batches = h.publisher.value_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1.len(), 1);
    let members = batches[0].1[0].value.as_members().unwrap();
    assert_eq!(members[0].value, Some(MetricValue::Number(4.0)));
}

#[tokio::test(start_paused = true)]
async fn flat_mode_splits_members_into_independent_metrics() {
    let h = spawn_bridge(options(100, StructuredMode::Flat));
    let change_only = Some(FilterPolicy::new(0.0));

    h.events
        .send(structured_with_policy(
            "m1",
            motor_value(3.5, true),
            change_only,
        ))
        .await
        .unwrap();
    settle().await;

    let schemas = h.publisher.schemas.lock().unwrap();
    assert_eq!(schemas.len(), 1);
    let names: Vec<&str> = schemas[0].1.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["m1/a", "m1/b"]);
    assert_eq!(schemas[0].1[0].value, MetricValue::Number(3.5));
    assert_eq!(schemas[0].1[1].value, MetricValue::Boolean(true));
    drop(schemas);

    // A change to one member republishes only that member.
    h.events
        .send(structured_with_policy(
            "m1",
            motor_value(9.9, true),
            change_only,
        ))
        .await
        .unwrap();
    settle().await;

    let batches = h.publisher.value_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1.len(), 1);
    assert_eq!(batches[0].1[0].name, "m1/a");
    assert_eq!(batches[0].1[0].value, MetricValue::Number(9.9));
}

#[tokio::test(start_paused = true)]
async fn batch_event_publishes_passing_values_together() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));
    let policy = FilterPolicy::new(0.5);

    h.events
        .send(VariableEvent::Batch {
            module: "plc1".to_string(),
            scope: "line2".to_string(),
            timestamp: 1_700_000_000_000,
            values: vec![
                BatchValue {
                    variable: "a".to_string(),
                    value: VarValue::Number(1.0),
                    declared_kind: ValueKind::Number,
                    policy: Some(policy),
                },
                BatchValue {
                    variable: "b".to_string(),
                    value: VarValue::Number(2.0),
                    declared_kind: ValueKind::Number,
                    policy: Some(policy),
                },
            ],
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.publisher.schema_count(), 1);

    // Second batch: one value passes the filter, one is suppressed;
    // the passing values share one combined publish call.
    h.events
        .send(VariableEvent::Batch {
            module: "plc1".to_string(),
            scope: "line2".to_string(),
            timestamp: 1_700_000_001_000,
            values: vec![
                BatchValue {
                    variable: "a".to_string(),
                    value: VarValue::Number(5.0),
                    declared_kind: ValueKind::Number,
                    policy: Some(policy),
                },
                BatchValue {
                    variable: "b".to_string(),
                    value: VarValue::Number(2.1),
                    declared_kind: ValueKind::Number,
                    policy: Some(policy),
                },
            ],
        })
        .await
        .unwrap();
    settle().await;

    let batches = h.publisher.value_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, "line2");
    assert_eq!(batches[0].1.len(), 1);
    assert_eq!(batches[0].1[0].name, "a");
    assert_eq!(batches[0].1[0].timestamp, 1_700_000_001_000);
}

#[tokio::test(start_paused = true)]
async fn batch_discovery_holds_earlier_passing_values() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));
    let policy = FilterPolicy::new(0.5);

    h.events
        .send(VariableEvent::Batch {
            module: "plc1".to_string(),
            scope: "line2".to_string(),
            timestamp: 1_700_000_000_000,
            values: vec![BatchValue {
                variable: "a".to_string(),
                value: VarValue::Number(1.0),
                declared_kind: ValueKind::Number,
                policy: Some(policy),
            }],
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.publisher.schema_count(), 1);

    // "a" passes the filter, but "b" later in the same batch is a new
    // variable that puts the scope back into a pending window; nothing
    // may go out as an individual value publication.
    h.events
        .send(VariableEvent::Batch {
            module: "plc1".to_string(),
            scope: "line2".to_string(),
            timestamp: 1_700_000_001_000,
            values: vec![
                BatchValue {
                    variable: "a".to_string(),
                    value: VarValue::Number(5.0),
                    declared_kind: ValueKind::Number,
                    policy: Some(policy),
                },
                BatchValue {
                    variable: "b".to_string(),
                    value: VarValue::Number(2.0),
                    declared_kind: ValueKind::Number,
                    policy: Some(policy),
                },
            ],
        })
        .await
        .unwrap();
    settle().await;

    assert!(h.publisher.value_batches().is_empty());

    // The second announcement carries both variables' latest values.
    let schemas = h.publisher.schemas.lock().unwrap();
    assert_eq!(schemas.len(), 2);
    let a = schemas[1].1.iter().find(|m| m.name == "a").unwrap();
    assert_eq!(a.value, MetricValue::Number(5.0));
    assert!(schemas[1].1.iter().any(|m| m.name == "b"));
}

#[tokio::test(start_paused = true)]
async fn command_fallback_strips_path_segment() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events.send(single("temp", VarValue::Number(20.0))).await.unwrap();
    settle().await;

    h.commands
        .send(CommandRequest {
            scope: "plc1".to_string(),
            metrics: vec![CommandMetric {
                metric: "folder/temp".to_string(),
                value: MetricValue::Number(25.0),
            }],
        })
        .await
        .unwrap();
    settle().await;

    let commands = h.sink.commands.lock().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].module, "plc1");
    assert_eq!(commands[0].variable, "temp");
    assert_eq!(commands[0].value, VarValue::Number(25.0));
    assert!(!commands[0].unverified);
}

#[tokio::test(start_paused = true)]
async fn unknown_command_forwards_unverified() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.commands
        .send(CommandRequest {
            scope: "plc1".to_string(),
            metrics: vec![CommandMetric {
                metric: "plc9/valve".to_string(),
                value: MetricValue::Boolean(true),
            }],
        })
        .await
        .unwrap();
    settle().await;

    let commands = h.sink.commands.lock().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].module, "plc9");
    assert_eq!(commands[0].value, VarValue::Boolean(true));
    assert!(commands[0].unverified);
}

#[tokio::test(start_paused = true)]
async fn command_write_back_does_not_republish() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events.send(single("setpoint", VarValue::Number(40.0))).await.unwrap();
    settle().await;
    let before = h.publisher.value_batches().len();

    h.commands
        .send(CommandRequest {
            scope: "plc1".to_string(),
            metrics: vec![CommandMetric {
                metric: "setpoint".to_string(),
                value: MetricValue::Number(55.0),
            }],
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(h.publisher.value_batches().len(), before);
    assert_eq!(h.sink.commands.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn publisher_failure_drops_attempt_but_keeps_state() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events.send(single("temp", VarValue::Number(10.0))).await.unwrap();
    settle().await;

    h.publisher.set_failing(true);
    h.events.send(single("temp", VarValue::Number(20.0))).await.unwrap();
    settle().await;
    assert!(h.publisher.value_batches().is_empty());

    // The next successful publish carries the latest value.
    h.publisher.set_failing(false);
    h.events.send(single("temp", VarValue::Number(30.0))).await.unwrap();
    settle().await;

    let batches = h.publisher.value_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1[0].value, MetricValue::Number(30.0));
}

#[tokio::test(start_paused = true)]
async fn live_policy_update_applies_to_later_events() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    h.events.send(single("temp", VarValue::Number(10.0))).await.unwrap();
    settle().await;

    // Install a wide deadband for this variable.
    h.policy_updates
        .send(PolicyUpdate::SetOverride {
            variable: "temp".to_string(),
            entry: fieldgate_core::PolicyOverride {
                enabled: true,
                policy: Some(FilterPolicy::new(100.0)),
            },
        })
        .await
        .unwrap();
    settle().await;

    h.events.send(single("temp", VarValue::Number(50.0))).await.unwrap();
    settle().await;
    assert!(h.publisher.value_batches().is_empty());

    h.events.send(single("temp", VarValue::Number(200.0))).await.unwrap();
    settle().await;
    assert_eq!(h.publisher.value_batches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn per_event_errors_do_not_stop_the_stream() {
    let h = spawn_bridge(options(100, StructuredMode::Nested));

    // A structured value without any template cannot be published in
    // nested mode, but the loop keeps going.
    h.events
        .send(VariableEvent::Single {
            module: "plc1".to_string(),
            variable: "broken".to_string(),
            value: motor_value(1.0, false),
            declared_kind: ValueKind::Structured,
            policy: None,
            filter_disabled: false,
            template: None,
        })
        .await
    .unwrap();
    settle().await;

    h.events.send(single("temp", VarValue::Number(1.0))).await.unwrap();
    settle().await;

    let schemas = h.publisher.schemas.lock().unwrap();
    assert!(schemas.iter().any(|(_, m)| m.iter().any(|x| x.name == "temp")));
}
