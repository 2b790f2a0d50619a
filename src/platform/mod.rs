use std::fmt;

use tracing::{debug, info};

use crate::config::{BaselineDocument, ServiceRule};
use crate::core::{ChangeRecord, Tier};

mod command;
mod linux;
mod macos;
mod windows;

pub use command::{
    CommandOutcome, CommandOutput, CommandRunner, SystemRunner, argv, run_command,
};
pub use linux::LinuxAdapter;
pub use macos::MacosAdapter;
pub use windows::WindowsAdapter;

#[cfg(test)]
pub(crate) use command::testing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Windows,
    MacOs,
    Unsupported(String),
}

impl OsFamily {
    pub fn detect() -> Self {
        Self::from_identifier(std::env::consts::OS)
    }

    pub fn from_identifier(id: &str) -> Self {
        let id = id.trim().to_ascii_lowercase();
        match id.as_str() {
            "linux" => OsFamily::Linux,
            "windows" => OsFamily::Windows,
            "macos" | "darwin" => OsFamily::MacOs,
            _ => OsFamily::Unsupported(id),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Windows => "windows",
            OsFamily::MacOs => "macos",
            OsFamily::Unsupported(id) => id,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Translates the baseline into commands for one OS family. Each method
/// returns the changes that succeeded, in the order they were attempted.
pub trait PlatformAdapter {
    fn family(&self) -> OsFamily;

    fn disable_services(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord>;

    fn apply_password_policy(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord>;

    fn configure_firewall(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord>;

    fn apply_platform_extras(
        &self,
        _doc: &BaselineDocument,
        _tier: Tier,
        _runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        Vec::new()
    }
}

pub fn adapter_for(family: &OsFamily) -> Box<dyn PlatformAdapter> {
    match family {
        OsFamily::Linux => Box::new(LinuxAdapter::default()),
        OsFamily::Windows => Box::new(WindowsAdapter),
        OsFamily::MacOs => Box::new(MacosAdapter::default()),
        OsFamily::Unsupported(id) => Box::new(UnsupportedAdapter { id: id.clone() }),
    }
}

/// Every stage is a no-op.
#[derive(Debug, Clone)]
pub struct UnsupportedAdapter {
    id: String,
}

impl UnsupportedAdapter {
    fn skip(&self, what: &str) -> Vec<ChangeRecord> {
        debug!("{what}: no adapter for os '{}', skipping", self.id);
        Vec::new()
    }
}

impl PlatformAdapter for UnsupportedAdapter {
    fn family(&self) -> OsFamily {
        OsFamily::Unsupported(self.id.clone())
    }

    fn disable_services(&self, _: &BaselineDocument, _: &mut dyn CommandRunner) -> Vec<ChangeRecord> {
        self.skip("services")
    }

    fn apply_password_policy(
        &self,
        _: &BaselineDocument,
        _: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        self.skip("password policy")
    }

    fn configure_firewall(&self, _: &BaselineDocument, _: &mut dyn CommandRunner) -> Vec<ChangeRecord> {
        self.skip("firewall")
    }
}

fn disable_each(
    rules: &[ServiceRule],
    runner: &mut dyn CommandRunner,
    command_for: impl Fn(&str) -> Vec<String>,
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    for rule in rules.iter().filter(|r| r.disable) {
        if runner.execute(&command_for(&rule.name)) {
            info!("Disabled service: {}", rule.name);
            changes.push(ChangeRecord::service_disabled(&rule.name));
        }
    }
    changes
}

pub fn is_elevated() -> Option<bool> {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        return Some(unsafe { libc::geteuid() } == 0);
    }

    #[cfg(not(unix))]
    {
        return None;
    }
}
