//! Reverse command and live policy update subscriptions.
//!
//! Two admin channels feed the bridge loop:
//! - `{prefix}/{group}/{scope}/@/commands` carries write requests phrased
//!   in telemetry terms, routed back to the owning modules.
//! - `{prefix}/{group}/@/commands/policy` carries live filter policy
//!   updates applied between event units.

use tokio::sync::mpsc;
use zenoh::Session;

use fieldgate_common::{CommandRequest, KeyExprBuilder, command_scope, decode_auto};
use fieldgate_core::PolicyUpdate;

/// Subscribe to both admin channels and forward decoded messages.
pub async fn run(
    session: Session,
    keys: KeyExprBuilder,
    commands: mpsc::Sender<CommandRequest>,
    policy_updates: mpsc::Sender<PolicyUpdate>,
) -> anyhow::Result<()> {
    let command_key = keys.commands_wildcard();
    let command_sub = session
        .declare_subscriber(&command_key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to subscribe to '{}': {}", command_key, e))?;

    let policy_key = keys.policy_commands();
    let policy_sub = session
        .declare_subscriber(&policy_key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to subscribe to '{}': {}", policy_key, e))?;

    tracing::info!(
        commands = %command_key,
        policy = %policy_key,
        "Listening for reverse commands and policy updates"
    );

    loop {
        tokio::select! {
            sample = command_sub.recv_async() => {
                let sample = sample.map_err(|e| anyhow::anyhow!("Command subscriber closed: {}", e))?;
                let payload = sample.payload().to_bytes();
                match decode_auto::<CommandRequest>(&payload) {
                    Ok(mut request) => {
                        // The key is authoritative for the scope; the
                        // payload field is a convenience for test tools.
                        if let Some(scope) = command_scope(sample.key_expr().as_str()) {
                            request.scope = scope.to_string();
                        }
                        if commands.send(request).await.is_err() {
                            tracing::info!("Bridge loop stopped, ending command listener");
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            key = %sample.key_expr(),
                            error = %e,
                            "Dropping malformed command request"
                        );
                    }
                }
            }
            sample = policy_sub.recv_async() => {
                let sample = sample.map_err(|e| anyhow::anyhow!("Policy subscriber closed: {}", e))?;
                let payload = sample.payload().to_bytes();
                match decode_auto::<PolicyUpdate>(&payload) {
                    Ok(update) => {
                        tracing::info!(update = ?update, "Applying live policy update");
                        if policy_updates.send(update).await.is_err() {
                            tracing::info!("Bridge loop stopped, ending policy listener");
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping malformed policy update");
                    }
                }
            }
        }
    }
}
