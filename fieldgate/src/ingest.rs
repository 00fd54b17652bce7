//! Inbound variable event subscription.
//!
//! One task owns the zenoh subscriber on the module event wildcard and
//! feeds decoded events into the bridge loop's channel. Malformed
//! payloads are logged and dropped; they never reach the loop.

use tokio::sync::mpsc;
use zenoh::Session;

use fieldgate_common::{KeyExprBuilder, VariableEvent, decode_auto};

/// Subscribe to module variable events and forward them to the bridge.
///
/// Runs until the subscriber errors out or the bridge side of the
/// channel closes.
pub async fn run(
    session: Session,
    keys: KeyExprBuilder,
    events: mpsc::Sender<VariableEvent>,
) -> anyhow::Result<()> {
    let key_expr = keys.module_events_wildcard();
    let subscriber = session
        .declare_subscriber(&key_expr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to subscribe to '{}': {}", key_expr, e))?;

    tracing::info!(key = %key_expr, "Listening for module variable events");

    loop {
        let sample = match subscriber.recv_async().await {
            Ok(sample) => sample,
            Err(e) => {
                anyhow::bail!("Event subscriber closed: {}", e);
            }
        };

        let payload = sample.payload().to_bytes();
        match decode_auto::<VariableEvent>(&payload) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    tracing::info!("Bridge loop stopped, ending event ingest");
                    return Ok(());
                }
            }
            Err(e) => {
                tracing::warn!(
                    key = %sample.key_expr(),
                    error = %e,
                    "Dropping malformed variable event"
                );
            }
        }
    }
}
