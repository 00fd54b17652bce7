//! Fieldgate Core
//!
//! The stateful reconciliation layer between an unordered, schema-less
//! stream of module variable updates and a telemetry protocol that
//! demands an explicitly declared metric schema, bandwidth-conscious
//! filtering and atomic schema-change announcements.
//!
//! Components:
//! - [`registry`] - Variable registry and structure template table
//! - [`filter`] - Report-by-exception filtering with deadband and
//!   staleness override
//! - [`policy`] - Filter policy defaults, overrides and live updates
//! - [`template`] - Structured-value decomposition (nested/flat)
//! - [`rebirth`] - Debounced schema re-announcement batching
//! - [`router`] - Reverse command routing back to owning modules
//! - [`bridge`] - The single-task loop wiring it all together
//!
//! This crate never touches the wire: the pub/sub transport is behind
//! the [`bridge::TelemetryPublisher`] and [`bridge::CommandSink`]
//! collaborator traits, implemented by the `fieldgate` binary.

pub mod bridge;
pub mod error;
pub mod filter;
pub mod policy;
pub mod rebirth;
pub mod registry;
pub mod router;
pub mod template;

pub use bridge::{Bridge, BridgeChannels, BridgeOptions, CommandSink, TelemetryPublisher};
pub use error::{CoreError, Result};
pub use filter::ExceptionFilter;
pub use policy::{PolicyOverride, PolicyTable, PolicyUpdate, ResolvedPolicy};
pub use rebirth::RebirthCoordinator;
pub use registry::{Registry, UpsertOutcome, UpsertRequest, Variable};
pub use template::StructuredMode;
