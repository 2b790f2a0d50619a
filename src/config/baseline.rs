use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::Tier;

/// The declarative security baseline read from one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BaselineDocument {
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub services: Vec<ServiceRule>,
    #[serde(default)]
    pub password_policies: PasswordPolicies,
    #[serde(default)]
    pub firewall_rules: Vec<FirewallRule>,
    #[serde(default)]
    pub macos_settings: Option<MacosSettings>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceRule {
    pub name: String,
    #[serde(default)]
    pub disable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PasswordPolicies {
    #[serde(default)]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub lockout: Option<Lockout>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Complexity {
    pub min_length: u32,
    #[serde(default)]
    pub min_digits: u32,
    #[serde(default)]
    pub min_uppercase: u32,
    #[serde(default)]
    pub min_lowercase: u32,
    #[serde(default)]
    pub min_special: u32,
    #[serde(default)]
    pub history: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Lockout {
    pub attempts: u32,
    /// Minutes.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    #[serde(default)]
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Port>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

impl FirewallRule {
    pub fn is_outbound(&self) -> bool {
        self.direction.trim().eq_ignore_ascii_case("out")
    }
}

/// A single port or a range written as `6000:6007` or `6000-6007`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u16),
    Range(String),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Number(n) => write!(f, "{n}"),
            Port::Range(s) => f.write_str(s),
        }
    }
}

impl Port {
    /// Renders a range with the separator the target tool expects: `:` for ufw
    /// and pf, `-` for netsh. Anything that is not `<lo><sep><hi>` passes
    /// through unchanged.
    pub fn with_range_separator(&self, sep: char) -> String {
        let Port::Range(s) = self else {
            return self.to_string();
        };
        let s = s.trim();
        match s.split_once([':', '-']) {
            Some((lo, hi))
                if !lo.is_empty()
                    && !hi.is_empty()
                    && lo.bytes().all(|b| b.is_ascii_digit())
                    && hi.bytes().all(|b| b.is_ascii_digit()) =>
            {
                format!("{lo}{sep}{hi}")
            }
            _ => s.to_string(),
        }
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_direction() -> String {
    "in".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MacosSettings {
    #[serde(default)]
    pub enable_filevault: bool,
    #[serde(default = "enabled")]
    pub enable_gatekeeper: bool,
    #[serde(default = "enabled")]
    pub enable_sip: bool,
    #[serde(default)]
    pub additional_services: Vec<ServiceRule>,
    #[serde(default)]
    pub additional_security: AdditionalSecurity,
}

impl Default for MacosSettings {
    fn default() -> Self {
        Self {
            enable_filevault: false,
            enable_gatekeeper: true,
            enable_sip: true,
            additional_services: Vec::new(),
            additional_security: AdditionalSecurity::default(),
        }
    }
}

/// Toggles that only apply on the strict tier.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AdditionalSecurity {
    #[serde(default)]
    pub enable_secure_token: bool,
    #[serde(default)]
    pub secure_token_user: Option<String>,
    #[serde(default)]
    pub restrict_remote_login: bool,
    #[serde(default)]
    pub restrict_remote_management: bool,
}

fn enabled() -> bool {
    true
}

pub fn load_baseline(path: &Path) -> Result<BaselineDocument> {
    if !path.is_file() {
        bail!("configuration file not found: {}", path.display());
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file: {}", path.display()))?;
    parse_baseline(&s)
        .with_context(|| format!("invalid JSON in configuration file: {}", path.display()))
}

pub fn parse_baseline(s: &str) -> Result<BaselineDocument> {
    let doc: BaselineDocument = serde_json::from_str(s)?;
    Ok(doc)
}
