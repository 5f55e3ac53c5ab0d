//! Capability value objects and change detection.
//!
//! A capability is a named, versioned feature a provider offers (trend
//! ingestion, account search, ...). Capabilities live as an ordered list
//! inside a provider record; they have no identity beyond their `id` within
//! that list. Activation URLs use only the major version segment.

use serde::{Deserialize, Serialize};

/// A single declared capability.
///
/// `enabled` is an `Option` on purpose: a capability that never carried an
/// explicit enabled flag is distinct from one explicitly disabled, and only
/// the explicit form participates in remote activation calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Capability name, e.g. "trends" or "data_sharing"
    pub id: String,
    /// Dotted version string, e.g. "0.1" or "1.2.3"
    pub version: String,
    /// Whether this capability is enabled locally; absent if never toggled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Capability {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            enabled: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Enabled defaults to false when the flag was never recorded.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Major version segment: everything before the first `.`.
    pub fn major_version(&self) -> &str {
        self.version.split('.').next().unwrap_or(&self.version)
    }

    /// Relative path of the remote activation endpoint.
    pub fn activation_path(&self) -> String {
        format!("/capabilities/{}/{}/activation", self.id, self.major_version())
    }
}

/// Remote call implied by a capability change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityAction {
    /// `POST /capabilities/{id}/{major}/activation`
    Activate,
    /// `DELETE /capabilities/{id}/{major}/activation`
    Deactivate,
}

/// One capability whose enabled flag changed, with the call to issue
#[derive(Debug, Clone)]
pub struct CapabilityChange {
    pub capability: Capability,
    pub action: CapabilityAction,
}

/// Compute the minimal set of activation/deactivation calls implied by
/// replacing the persisted capability list `old` with `new`.
///
/// A capability in `new` produces a call only when all of these hold:
/// - an old counterpart with the same `id` exists (newly-introduced
///   capabilities never trigger a call, even if they arrive enabled),
/// - its serialized form differs from that counterpart,
/// - it carries an explicit enabled flag.
///
/// Diffing against the persisted prior list makes this idempotent:
/// reassigning the same list yields no changes.
pub fn diff_capabilities(old: &[Capability], new: &[Capability]) -> Vec<CapabilityChange> {
    new.iter()
        .filter_map(|cap| {
            let previous = old.iter().find(|c| c.id == cap.id)?;
            if previous == cap {
                return None;
            }
            let enabled = cap.enabled?;
            Some(CapabilityChange {
                capability: cap.clone(),
                action: if enabled {
                    CapabilityAction::Activate
                } else {
                    CapabilityAction::Deactivate
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_version() {
        assert_eq!(Capability::new("trends", "1.2").major_version(), "1");
        assert_eq!(Capability::new("trends", "0.1.5").major_version(), "0");
        assert_eq!(Capability::new("trends", "2").major_version(), "2");
    }

    #[test]
    fn test_activation_path_uses_major_only() {
        let cap = Capability::new("x", "1.2").with_enabled(true);
        assert_eq!(cap.activation_path(), "/capabilities/x/1/activation");
    }

    #[test]
    fn test_enabled_defaults_false() {
        assert!(!Capability::new("trends", "1.0").is_enabled());
        assert!(Capability::new("trends", "1.0").with_enabled(true).is_enabled());
    }

    #[test]
    fn test_diff_same_list_is_empty() {
        let list = vec![
            Capability::new("trends", "1.0").with_enabled(true),
            Capability::new("debug", "0.1"),
        ];
        assert!(diff_capabilities(&list, &list).is_empty());
    }

    #[test]
    fn test_diff_enable_triggers_activate() {
        let old = vec![Capability::new("x", "1.2").with_enabled(false)];
        let new = vec![Capability::new("x", "1.2").with_enabled(true)];
        let changes = diff_capabilities(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, CapabilityAction::Activate);
        assert_eq!(changes[0].capability.activation_path(), "/capabilities/x/1/activation");
    }

    #[test]
    fn test_diff_disable_triggers_deactivate() {
        let old = vec![Capability::new("x", "1.2").with_enabled(true)];
        let new = vec![Capability::new("x", "1.2").with_enabled(false)];
        let changes = diff_capabilities(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, CapabilityAction::Deactivate);
    }

    #[test]
    fn test_diff_skips_newly_added_even_if_enabled() {
        let old = vec![];
        let new = vec![Capability::new("x", "1.0").with_enabled(true)];
        assert!(diff_capabilities(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_skips_change_without_explicit_flag() {
        // Version bumped but no enabled key: nothing to send
        let old = vec![Capability::new("x", "1.0")];
        let new = vec![Capability::new("x", "2.0")];
        assert!(diff_capabilities(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_multiple_changes_preserve_order() {
        let old = vec![
            Capability::new("a", "1.0").with_enabled(false),
            Capability::new("b", "1.0").with_enabled(true),
        ];
        let new = vec![
            Capability::new("a", "1.0").with_enabled(true),
            Capability::new("b", "1.0").with_enabled(false),
        ];
        let changes = diff_capabilities(&old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].capability.id, "a");
        assert_eq!(changes[0].action, CapabilityAction::Activate);
        assert_eq!(changes[1].capability.id, "b");
        assert_eq!(changes[1].action, CapabilityAction::Deactivate);
    }
}
