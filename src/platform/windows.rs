use tracing::info;

use crate::config::{BaselineDocument, FirewallRule};
use crate::core::ChangeRecord;
use crate::platform::{CommandRunner, OsFamily, PlatformAdapter, argv, disable_each};

pub const FIREWALL_PROFILES: [&str; 3] = ["Domain", "Private", "Public"];

const MAX_PASSWORD_AGE_DAYS: u32 = 90;
const MIN_PASSWORD_AGE_DAYS: u32 = 1;

/// sc.exe for services, `net accounts` for passwords, netsh for the firewall.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsAdapter;

impl PlatformAdapter for WindowsAdapter {
    fn family(&self) -> OsFamily {
        OsFamily::Windows
    }

    fn disable_services(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        disable_each(&doc.services, runner, |name| {
            argv(["sc.exe", "config", name, "start=", "disabled"])
        })
    }

    fn apply_password_policy(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        let Some(c) = &doc.password_policies.complexity else {
            return Vec::new();
        };

        let settings = [
            ("min_length", format!("/minpwlen:{}", c.min_length)),
            ("max_age", format!("/maxpwage:{MAX_PASSWORD_AGE_DAYS}")),
            ("min_age", format!("/minpwage:{MIN_PASSWORD_AGE_DAYS}")),
            ("history", format!("/uniquepw:{}", c.history)),
        ];

        let mut changes = Vec::new();
        for (policy, flag) in settings {
            if runner.execute(&argv(["net", "accounts", flag.as_str()])) {
                info!("Configured password policy {policy} ({flag})");
                changes.push(ChangeRecord::policy_configured(policy));
            }
        }
        changes
    }

    fn configure_firewall(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        let mut changes = Vec::new();

        for profile in FIREWALL_PROFILES {
            let target = format!("{}profile", profile.to_ascii_lowercase());
            if runner.execute(&argv(["netsh", "advfirewall", "set", target.as_str(), "state", "on"])) {
                info!("Enabled firewall profile {profile}");
                changes.push(ChangeRecord::firewall_enabled(Some(profile.to_string())));
            }
        }

        for rule in &doc.firewall_rules {
            if runner.execute(&netsh_rule(rule)) {
                info!("Added firewall rule: {}", rule.name);
                changes.push(ChangeRecord::firewall_rule_added(rule.clone()));
            }
        }

        changes
    }
}

fn netsh_rule(rule: &FirewallRule) -> Vec<String> {
    let mut cmd = argv(["netsh", "advfirewall", "firewall", "add", "rule"]);
    cmd.push(format!("name={}", rule.name));
    cmd.push(format!("dir={}", if rule.is_outbound() { "out" } else { "in" }));
    cmd.push(format!("action={}", if rule.allow { "allow" } else { "block" }));
    cmd.push(format!("protocol={}", rule.protocol.trim().to_ascii_uppercase()));
    if let Some(port) = &rule.port {
        // Outbound rules match on the destination port.
        let key = if rule.is_outbound() { "remoteport" } else { "localport" };
        cmd.push(format!("{key}={}", port.with_range_separator('-')));
    }
    cmd
}
