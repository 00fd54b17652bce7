//! Fieldgate daemon.
//!
//! Bridges an unordered stream of module variable updates onto a
//! schema-declaring telemetry protocol: registry, exception filtering,
//! structured-value decomposition, debounced schema announcements and
//! reverse command routing.

mod args;
mod commands;
mod config;
mod ingest;
mod publish;

use anyhow::Result;
use tokio::sync::mpsc;

use fieldgate_common::KeyExprBuilder;
use fieldgate_core::{Bridge, BridgeChannels};

use args::FieldgateArgs;
use config::FieldgateConfig;
use publish::ZenohPublisher;

#[tokio::main]
async fn main() -> Result<()> {
    let args = FieldgateArgs::parse_with_default("fieldgate.json5");

    let mut config = FieldgateConfig::load_from_file(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    fieldgate_common::init_tracing(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(
        config = %args.config.display(),
        group = %config.bridge.group,
        mode = ?config.bridge.structured_mode,
        "Starting fieldgate"
    );

    let session = fieldgate_common::connect(&config.zenoh)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let keys = KeyExprBuilder::new(&config.bridge.key_prefix, &config.bridge.group);
    let capacity = config.bridge.channel_capacity;

    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (commands_tx, commands_rx) = mpsc::channel(capacity);
    let (policy_tx, policy_rx) = mpsc::channel(capacity);

    let publisher = ZenohPublisher::new(session.clone(), keys.clone(), config.serialization);
    let bridge = Bridge::new(
        config.bridge_options(),
        config.policy_table(),
        publisher.clone(),
        publisher,
        BridgeChannels {
            events: events_rx,
            commands: commands_rx,
            policy_updates: policy_rx,
        },
    );

    let ingest_task = tokio::spawn(ingest::run(session.clone(), keys.clone(), events_tx));
    let command_task = tokio::spawn(commands::run(
        session.clone(),
        keys,
        commands_tx,
        policy_tx,
    ));
    let mut bridge_task = tokio::spawn(bridge.run());

    // Run until Ctrl+C or until a task dies on its own.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        result = &mut bridge_task => {
            tracing::error!(result = ?result, "Bridge loop exited unexpectedly");
        }
    }

    // Stopping the ingest and command tasks drops the loop's senders;
    // the loop drains, flushes any pending announcement and exits.
    ingest_task.abort();
    command_task.abort();
    if !bridge_task.is_finished() {
        let _ = bridge_task.await;
    }

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close session: {}", e))?;

    tracing::info!("Fieldgate stopped");
    Ok(())
}
