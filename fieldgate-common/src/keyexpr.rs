//! Key expression builders for the fieldgate topic layout.
//!
//! Layout:
//! - `{prefix}/modules/{module}/vars/**`: inbound variable events
//! - `{prefix}/modules/{module}/@/commands/{variable}[/{member}]`: outbound
//!   module commands
//! - `{prefix}/{group}/{scope}/birth`: full schema announcements
//! - `{prefix}/{group}/{scope}/data/{metric}`: filtered value publications
//! - `{prefix}/{group}/{scope}/@/commands`: inbound reverse commands
//! - `{prefix}/{group}/@/commands/policy`: live filter policy updates
//!
//! The `@` segment marks administrative/control channels, kept apart from
//! telemetry so data wildcards never match them.

/// Default key expression prefix.
pub const KEY_PREFIX: &str = "fieldgate";

/// Builder for fieldgate key expressions.
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
    group: String,
}

impl KeyExprBuilder {
    pub fn new(prefix: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            group: group.into(),
        }
    }

    /// Wildcard matching every inbound variable event.
    pub fn module_events_wildcard(&self) -> String {
        format!("{}/modules/**", self.prefix)
    }

    /// Command key for a scalar variable on a module.
    pub fn module_command(&self, module: &str, variable: &str) -> String {
        format!(
            "{}/modules/{}/@/commands/{}",
            self.prefix, module, variable
        )
    }

    /// Command key for one member of a structured variable.
    pub fn module_member_command(&self, module: &str, variable: &str, member: &str) -> String {
        format!(
            "{}/modules/{}/@/commands/{}/{}",
            self.prefix, module, variable, member
        )
    }

    /// Schema announcement key for a scope.
    pub fn birth(&self, scope: &str) -> String {
        format!("{}/{}/{}/birth", self.prefix, self.group, scope)
    }

    /// Value publication key for a metric within a scope.
    pub fn data(&self, scope: &str, metric: &str) -> String {
        format!("{}/{}/{}/data/{}", self.prefix, self.group, scope, metric)
    }

    /// Wildcard matching reverse commands for every scope of this group.
    pub fn commands_wildcard(&self) -> String {
        format!("{}/{}/*/@/commands", self.prefix, self.group)
    }

    /// Key carrying live filter policy updates for this group.
    pub fn policy_commands(&self) -> String {
        format!("{}/{}/@/commands/policy", self.prefix, self.group)
    }
}

/// Extract the scope segment from a reverse command key.
///
/// Expects keys of the `{prefix}/{group}/{scope}/@/commands` shape.
pub fn command_scope(key: &str) -> Option<&str> {
    let mut tail = key.strip_suffix("/@/commands")?;
    if let Some(idx) = tail.rfind('/') {
        tail = &tail[idx + 1..];
    }
    (!tail.is_empty()).then_some(tail)
}
