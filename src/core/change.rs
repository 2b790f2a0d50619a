use serde::{Deserialize, Serialize};

use crate::config::FirewallRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Service,
    PasswordPolicy,
    Firewall,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Disabled,
    Configured,
    Enabled,
    RuleAdded,
}

/// One successfully applied change. Exactly one payload field is set,
/// except for `firewall`/`enabled` which may carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<FirewallRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

impl ChangeRecord {
    fn bare(kind: ChangeKind, action: ChangeAction) -> Self {
        Self {
            kind,
            action,
            service: None,
            policy: None,
            rule: None,
            profile: None,
            feature: None,
        }
    }

    pub fn service_disabled(name: impl Into<String>) -> Self {
        Self {
            service: Some(name.into()),
            ..Self::bare(ChangeKind::Service, ChangeAction::Disabled)
        }
    }

    pub fn policy_configured(policy: impl Into<String>) -> Self {
        Self {
            policy: Some(policy.into()),
            ..Self::bare(ChangeKind::PasswordPolicy, ChangeAction::Configured)
        }
    }

    pub fn firewall_rule_added(rule: FirewallRule) -> Self {
        Self {
            rule: Some(rule),
            ..Self::bare(ChangeKind::Firewall, ChangeAction::RuleAdded)
        }
    }

    pub fn firewall_enabled(profile: Option<String>) -> Self {
        Self {
            profile,
            ..Self::bare(ChangeKind::Firewall, ChangeAction::Enabled)
        }
    }

    pub fn security(action: ChangeAction, feature: impl Into<String>) -> Self {
        Self {
            feature: Some(feature.into()),
            ..Self::bare(ChangeKind::Security, action)
        }
    }
}
