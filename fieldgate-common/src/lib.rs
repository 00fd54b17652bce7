//! Fieldgate Common Library
//!
//! Shared types and utilities for the fieldgate telemetry bridge:
//!
//! - [`value`] - Domain value model (`VarValue`, `ValueKind`, policies, templates)
//! - [`metric`] - Logical protocol metric model (`Metric`, `MetricValue`)
//! - [`event`] - Boundary event model (variable events, reverse commands)
//! - [`convert`] - Pure type mapping between domain and protocol values
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Key expression builders
//! - [`error`] - Error types

pub mod config;
pub mod convert;
pub mod error;
pub mod event;
pub mod keyexpr;
pub mod metric;
pub mod serialization;
pub mod session;
pub mod value;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, ZenohConfig, load_config, parse_config};
pub use convert::{effective_kind, from_metric_value, member_to_metric, to_metric_value};
pub use error::{Error, Result};
pub use event::{BatchValue, CommandMetric, CommandRequest, ModuleCommand, VariableEvent};
pub use keyexpr::{KEY_PREFIX, KeyExprBuilder, command_scope};
pub use metric::{Metric, MetricMember, MetricValue, timestamp_millis};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;
pub use value::{FilterPolicy, TemplateDef, TemplateMember, ValueKind, VarValue};

/// Initialize tracing with the given configuration.
///
/// Output is either human-readable text (default) or JSON for log
/// aggregation, with `RUST_LOG` taking precedence over the configured
/// level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
