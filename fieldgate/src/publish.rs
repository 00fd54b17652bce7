//! Zenoh-backed telemetry publication and command delivery.

use async_trait::async_trait;
use serde::Serialize;
use zenoh::Session;

use fieldgate_common::{Format, KeyExprBuilder, Metric, ModuleCommand, encode, timestamp_millis};
use fieldgate_core::{CommandSink, CoreError, TelemetryPublisher};

/// A full schema announcement payload.
#[derive(Debug, Serialize)]
struct SchemaAnnouncement<'a> {
    scope: &'a str,
    timestamp: i64,
    metrics: &'a [Metric],
}

/// Publishes bridge output onto zenoh keys and delivers module commands
/// on their admin channels.
#[derive(Clone)]
pub struct ZenohPublisher {
    session: Session,
    keys: KeyExprBuilder,
    format: Format,
}

impl ZenohPublisher {
    pub fn new(session: Session, keys: KeyExprBuilder, format: Format) -> Self {
        Self {
            session,
            keys,
            format,
        }
    }

    async fn put<T: Serialize>(&self, key: &str, scope: &str, value: &T) -> Result<(), CoreError> {
        let payload =
            encode(value, self.format).map_err(|e| CoreError::publish(scope, e))?;
        self.session
            .put(key, payload)
            .await
            .map_err(|e| CoreError::publish(scope, e))
    }
}

#[async_trait]
impl TelemetryPublisher for ZenohPublisher {
    /// One atomic announcement per scope carrying the complete metric set.
    async fn publish_schema(&self, scope: &str, metrics: Vec<Metric>) -> Result<(), CoreError> {
        let key = self.keys.birth(scope);
        let announcement = SchemaAnnouncement {
            scope,
            timestamp: timestamp_millis(),
            metrics: &metrics,
        };

        self.put(&key, scope, &announcement).await?;
        tracing::debug!(key = %key, metrics = metrics.len(), "Published schema announcement");
        Ok(())
    }

    /// Each metric goes to its own key so consumers can subscribe to a
    /// single variable without decoding the rest of the scope.
    async fn publish_values(&self, scope: &str, metrics: Vec<Metric>) -> Result<(), CoreError> {
        for metric in &metrics {
            let key = self.keys.data(scope, &metric.name);
            self.put(&key, scope, metric).await?;
            tracing::trace!(key = %key, "Published value");
        }
        Ok(())
    }
}

#[async_trait]
impl CommandSink for ZenohPublisher {
    async fn send(&self, command: ModuleCommand) -> Result<(), CoreError> {
        let key = match &command.member {
            Some(member) => {
                self.keys
                    .module_member_command(&command.module, &command.variable, member)
            }
            None => self.keys.module_command(&command.module, &command.variable),
        };

        let payload = encode(&command, self.format)
            .map_err(|e| CoreError::command(format!("Failed to encode command: {}", e)))?;
        self.session.put(&key, payload).await.map_err(|e| {
            CoreError::command(format!("Failed to deliver command to '{}': {}", key, e))
        })?;

        tracing::debug!(
            key = %key,
            unverified = command.unverified,
            "Delivered module command"
        );
        Ok(())
    }
}
