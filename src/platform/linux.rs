use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::{BaselineDocument, Complexity, FirewallRule};
use crate::core::ChangeRecord;
use crate::platform::{CommandRunner, OsFamily, PlatformAdapter, argv, disable_each};

pub const PWQUALITY_CONF: &str = "/etc/security/pwquality.conf";

/// systemd for services, pam_pwquality for passwords, ufw for the firewall.
#[derive(Debug, Clone)]
pub struct LinuxAdapter {
    pwquality_path: PathBuf,
}

impl Default for LinuxAdapter {
    fn default() -> Self {
        Self {
            pwquality_path: PathBuf::from(PWQUALITY_CONF),
        }
    }
}

impl LinuxAdapter {
    pub fn with_pwquality_path(path: impl Into<PathBuf>) -> Self {
        Self {
            pwquality_path: path.into(),
        }
    }
}

impl PlatformAdapter for LinuxAdapter {
    fn family(&self) -> OsFamily {
        OsFamily::Linux
    }

    fn disable_services(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        disable_each(&doc.services, runner, |name| {
            argv(["systemctl", "disable", name])
        })
    }

    fn apply_password_policy(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        let Some(complexity) = &doc.password_policies.complexity else {
            return Vec::new();
        };

        if runner.write(&self.pwquality_path, &pwquality_conf(complexity)) {
            info!(
                "Configured password complexity in {}",
                self.pwquality_path.display()
            );
            vec![ChangeRecord::policy_configured("complexity")]
        } else {
            Vec::new()
        }
    }

    fn configure_firewall(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        if !runner.execute(&argv(["which", "ufw"])) {
            error!("ufw is not installed; skipping firewall configuration");
            return Vec::new();
        }

        runner.execute(&argv(["ufw", "--force", "reset"]));
        runner.execute(&argv(["ufw", "default", "deny", "incoming"]));
        runner.execute(&argv(["ufw", "default", "allow", "outgoing"]));

        let mut changes = Vec::new();
        for rule in &doc.firewall_rules {
            let Some(cmd) = ufw_rule(rule) else {
                warn!("firewall rule '{}' has no port; skipping", rule.name);
                continue;
            };
            if runner.execute(&cmd) {
                info!("Added firewall rule: {}", rule.name);
                changes.push(ChangeRecord::firewall_rule_added(rule.clone()));
            }
        }

        if runner.execute(&argv(["ufw", "--force", "enable"])) {
            info!("Enabled ufw");
            changes.push(ChangeRecord::firewall_enabled(None));
        }

        changes
    }
}

/// Negative credits make pam_pwquality require at least that many characters
/// of the class.
fn pwquality_conf(c: &Complexity) -> String {
    let credit = |n: u32| -i64::from(n);
    format!(
        "# Managed by hardener\n\
         minlen = {}\n\
         dcredit = {}\n\
         ucredit = {}\n\
         lcredit = {}\n\
         ocredit = {}\n\
         retry = 3\n",
        c.min_length,
        credit(c.min_digits),
        credit(c.min_uppercase),
        credit(c.min_lowercase),
        credit(c.min_special),
    )
}

fn ufw_rule(rule: &FirewallRule) -> Option<Vec<String>> {
    let port = rule.port.as_ref()?;
    let verdict = if rule.allow { "allow" } else { "deny" };
    let direction = if rule.is_outbound() { "out" } else { "in" };
    let target = format!(
        "{}/{}",
        port.with_range_separator(':'),
        rule.protocol.trim().to_ascii_lowercase()
    );
    Some(argv(["ufw", verdict, direction, target.as_str()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_baseline;
    use crate::core::{ChangeAction, ChangeKind};
    use crate::platform::testing::ScriptedRunner;

    fn doc() -> BaselineDocument {
        parse_baseline(
            r#"{
                "services": [
                    {"name": "telnet", "disable": true},
                    {"name": "sshd", "disable": false},
                    {"name": "cups", "disable": true},
                    {"name": "avahi-daemon", "disable": true}
                ],
                "password_policies": {
                    "complexity": {"min_length": 14, "min_digits": 1, "min_uppercase": 1,
                                   "min_lowercase": 1, "min_special": 2, "history": 5},
                    "lockout": {"attempts": 5, "duration": 15}
                },
                "firewall_rules": [
                    {"name": "ssh", "allow": true, "port": 22},
                    {"name": "any"},
                    {"name": "dns-out", "allow": true, "port": 53, "protocol": "UDP", "direction": "out"},
                    {"name": "x11", "port": "6000-6007"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn disables_only_flagged_services_in_order() {
        let mut runner = ScriptedRunner::new().fail_on("disable cups");
        let changes = LinuxAdapter::default().disable_services(&doc(), &mut runner);

        assert_eq!(
            runner.calls,
            vec![
                "systemctl disable telnet",
                "systemctl disable cups",
                "systemctl disable avahi-daemon"
            ]
        );
        let names: Vec<_> = changes.iter().filter_map(|c| c.service.as_deref()).collect();
        assert_eq!(names, vec!["telnet", "avahi-daemon"]);
    }

    #[test]
    fn password_policy_is_one_file_write() {
        let adapter = LinuxAdapter::with_pwquality_path("/tmp/pwquality.conf");
        let mut runner = ScriptedRunner::new();
        let changes = adapter.apply_password_policy(&doc(), &mut runner);

        assert!(runner.calls.is_empty());
        assert_eq!(runner.writes.len(), 1);
        let (path, contents) = &runner.writes[0];
        assert_eq!(path, &PathBuf::from("/tmp/pwquality.conf"));
        assert!(contents.contains("minlen = 14\n"));
        assert!(contents.contains("dcredit = -1\n"));
        assert!(contents.contains("ocredit = -2\n"));
        assert!(contents.contains("retry = 3\n"));

        assert_eq!(changes, vec![ChangeRecord::policy_configured("complexity")]);
    }

    #[test]
    fn zero_minimums_are_written_as_zero_credit() {
        let c = Complexity {
            min_length: 8,
            min_digits: 0,
            min_uppercase: 0,
            min_lowercase: 0,
            min_special: 0,
            history: 0,
        };
        assert!(pwquality_conf(&c).contains("dcredit = 0\n"));
    }

    #[test]
    fn failed_policy_write_records_nothing() {
        let mut runner = ScriptedRunner::new().fail_writes();
        let changes = LinuxAdapter::default().apply_password_policy(&doc(), &mut runner);
        assert!(changes.is_empty());
    }

    #[test]
    fn no_complexity_block_means_no_write() {
        let mut runner = ScriptedRunner::new();
        let changes =
            LinuxAdapter::default().apply_password_policy(&BaselineDocument::default(), &mut runner);
        assert!(changes.is_empty());
        assert!(runner.writes.is_empty());
    }

    #[test]
    fn firewall_resets_then_applies_rules_then_enables() {
        let mut runner = ScriptedRunner::new();
        let changes = LinuxAdapter::default().configure_firewall(&doc(), &mut runner);

        assert_eq!(
            runner.calls,
            vec![
                "which ufw",
                "ufw --force reset",
                "ufw default deny incoming",
                "ufw default allow outgoing",
                "ufw allow in 22/tcp",
                "ufw allow out 53/udp",
                "ufw deny in 6000:6007/tcp",
                "ufw --force enable",
            ]
        );
        assert_eq!(changes.len(), 4);
        assert!(changes[..3]
            .iter()
            .all(|c| c.kind == ChangeKind::Firewall && c.action == ChangeAction::RuleAdded));
        assert_eq!(changes[0].rule.as_ref().map(|r| r.name.as_str()), Some("ssh"));
        assert_eq!(changes[3], ChangeRecord::firewall_enabled(None));
    }

    #[test]
    fn missing_ufw_skips_whole_firewall_stage() {
        let mut runner = ScriptedRunner::new().fail_on("which ufw");
        let changes = LinuxAdapter::default().configure_firewall(&doc(), &mut runner);
        assert!(changes.is_empty());
        assert_eq!(runner.calls, vec!["which ufw"]);
    }

    #[test]
    fn failed_rule_does_not_stop_enable() {
        let mut runner = ScriptedRunner::new()
            .fail_on("22/tcp")
            .fail_on("--force reset");
        let changes = LinuxAdapter::default().configure_firewall(&doc(), &mut runner);
        let names: Vec<_> = changes
            .iter()
            .filter_map(|c| c.rule.as_ref().map(|r| r.name.as_str()))
            .collect();
        assert_eq!(names, vec!["dns-out", "x11"]);
        assert_eq!(changes.last(), Some(&ChangeRecord::firewall_enabled(None)));
    }
}
