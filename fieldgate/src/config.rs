//! Fieldgate daemon configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fieldgate_common::{FilterPolicy, Format, KEY_PREFIX, LoggingConfig, ZenohConfig};
use fieldgate_core::{BridgeOptions, PolicyOverride, PolicyTable, StructuredMode};

/// Complete fieldgate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldgateConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Payload serialization for outbound publications.
    #[serde(default)]
    pub serialization: Format,

    /// Bridge behavior settings.
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bridge-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Key expression prefix for all publications and subscriptions.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Telemetry group name, the segment between the prefix and the
    /// scope in published keys.
    #[serde(default = "default_group")]
    pub group: String,

    /// How structured values are represented: "nested" or "flat".
    #[serde(default)]
    pub structured_mode: StructuredMode,

    /// Quiet period before a batched schema announcement goes out.
    #[serde(default = "default_rebirth_debounce_ms")]
    pub rebirth_debounce_ms: u64,

    /// Channel capacity between the ingest/command tasks and the loop.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Exception filter policies.
    #[serde(default)]
    pub filter: FilterSettings,
}

/// Exception filter configuration: one optional default policy plus
/// per-variable overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Policy applied to every variable without an override.
    #[serde(default)]
    pub default: Option<FilterPolicy>,

    /// Per-variable policy overrides, keyed by variable id.
    #[serde(default)]
    pub overrides: HashMap<String, PolicyOverride>,
}

fn default_key_prefix() -> String {
    KEY_PREFIX.to_string()
}

fn default_group() -> String {
    "edge".to_string()
}

fn default_rebirth_debounce_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            group: default_group(),
            structured_mode: StructuredMode::default(),
            rebirth_debounce_ms: default_rebirth_debounce_ms(),
            channel_capacity: default_channel_capacity(),
            filter: FilterSettings::default(),
        }
    }
}

impl FieldgateConfig {
    /// Load and validate a JSON5 configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = fieldgate_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bridge.key_prefix.is_empty() {
            anyhow::bail!("bridge.key_prefix must not be empty");
        }

        if self.bridge.group.is_empty() {
            anyhow::bail!("bridge.group must not be empty");
        }

        for segment in [&self.bridge.key_prefix, &self.bridge.group] {
            if segment.contains(['*', '$', '#', '?']) {
                anyhow::bail!("'{}' contains reserved key expression characters", segment);
            }
        }

        if self.bridge.group.contains('/') {
            anyhow::bail!("bridge.group must be a single key segment");
        }

        if self.bridge.channel_capacity == 0 {
            anyhow::bail!("bridge.channel_capacity must be at least 1");
        }

        for (variable, entry) in &self.bridge.filter.overrides {
            if variable.is_empty() {
                anyhow::bail!("filter override with empty variable id");
            }
            if let Some(policy) = &entry.policy {
                if policy.threshold < 0.0 || !policy.threshold.is_finite() {
                    anyhow::bail!(
                        "filter override for '{}' has invalid threshold {}",
                        variable,
                        policy.threshold
                    );
                }
            }
        }

        Ok(())
    }

    /// Loop options derived from the bridge settings.
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            structured_mode: self.bridge.structured_mode,
            rebirth_debounce: Duration::from_millis(self.bridge.rebirth_debounce_ms),
        }
    }

    /// Initial policy table from the filter settings.
    pub fn policy_table(&self) -> PolicyTable {
        PolicyTable {
            default_policy: self.bridge.filter.default,
            overrides: self.bridge.filter.overrides.clone(),
        }
    }
}

impl Default for FieldgateConfig {
    fn default() -> Self {
        Self {
            zenoh: ZenohConfig::default(),
            serialization: Format::default(),
            bridge: BridgeSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgate_common::parse_config;

    #[test]
    fn defaults() {
        let config: FieldgateConfig = parse_config("{}").unwrap();
        assert_eq!(config.bridge.key_prefix, "fieldgate");
        assert_eq!(config.bridge.group, "edge");
        assert_eq!(config.bridge.structured_mode, StructuredMode::Nested);
        assert_eq!(config.bridge.rebirth_debounce_ms, 500);
        assert!(config.bridge.filter.default.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_config_parses() {
        let json5 = r#"
        {
            zenoh: {
                mode: "client",
                connect: ["tcp/localhost:7447"],
            },
            serialization: "cbor",
            bridge: {
                group: "plant3",
                structured_mode: "flat",
                rebirth_debounce_ms: 250,
                filter: {
                    default: { threshold: 0.5 },
                    overrides: {
                        "plc1/temp": {
                            policy: { threshold: 1.0, max_interval_ms: 30000 },
                        },
                        "plc1/debug": { enabled: false },
                    },
                },
            },
        }
        "#;

        let config: FieldgateConfig = parse_config(json5).unwrap();
        assert_eq!(config.bridge.group, "plant3");
        assert_eq!(config.bridge.structured_mode, StructuredMode::Flat);
        assert_eq!(
            config.bridge.filter.default,
            Some(FilterPolicy::new(0.5))
        );
        assert!(!config.bridge.filter.overrides["plc1/debug"].enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_wildcard_group() {
        let mut config = FieldgateConfig::default();
        config.bridge.group = "a*b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut config = FieldgateConfig::default();
        config.bridge.filter.overrides.insert(
            "temp".to_string(),
            PolicyOverride {
                enabled: true,
                policy: Some(FilterPolicy::new(-1.0)),
            },
        );
        assert!(config.validate().is_err());
    }
}
