use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{BaselineDocument, FirewallRule, MacosSettings};
use crate::core::{ChangeAction, ChangeRecord, Tier};
use crate::platform::{CommandRunner, OsFamily, PlatformAdapter, argv, disable_each};

pub const LAUNCH_DAEMONS_DIR: &str = "/System/Library/LaunchDaemons";
pub const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";
pub const ARD_KICKSTART: &str =
    "/System/Library/CoreServices/RemoteManagement/ARDAgent.app/Contents/Resources/kickstart";
/// The stock pf.conf evaluates `com.apple/*`, so rules loaded here take effect
/// without editing the main ruleset. Each rule gets its own `-<n>` anchor.
pub const PF_ANCHOR: &str = "com.apple/hardener";
pub const PF_ANCHOR_FILE: &str = "/etc/pf.anchors/hardener";

/// launchd for services, pwpolicy for passwords, the application firewall
/// plus a pf anchor for port rules.
#[derive(Debug, Clone)]
pub struct MacosAdapter {
    anchor_file: PathBuf,
}

impl Default for MacosAdapter {
    fn default() -> Self {
        Self {
            anchor_file: PathBuf::from(PF_ANCHOR_FILE),
        }
    }
}

impl PlatformAdapter for MacosAdapter {
    fn family(&self) -> OsFamily {
        OsFamily::MacOs
    }

    fn disable_services(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        let unload = |name: &str| {
            let plist = format!("{LAUNCH_DAEMONS_DIR}/{name}.plist");
            argv(["launchctl", "unload", "-w", plist.as_str()])
        };

        let mut changes = disable_each(&doc.services, runner, unload);
        if let Some(settings) = &doc.macos_settings {
            changes.extend(disable_each(&settings.additional_services, runner, unload));
        }
        changes
    }

    fn apply_password_policy(
        &self,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        let policies = &doc.password_policies;
        let mut settings = Vec::new();

        if let Some(c) = &policies.complexity {
            let mixed_case = u32::from(c.min_uppercase > 0 || c.min_lowercase > 0);
            settings.extend([
                ("min_length", format!("minChars={}", c.min_length)),
                ("min_digits", format!("requiresNumeric={}", c.min_digits)),
                ("mixed_case", format!("requiresMixedCase={mixed_case}")),
                ("min_special", format!("requiresSymbol={}", c.min_special)),
                ("history", format!("usingHistory={}", c.history)),
            ]);
            if let Some(l) = &policies.lockout {
                settings.extend([
                    ("lockout_attempts", format!("maxFailedLoginAttempts={}", l.attempts)),
                    (
                        "lockout_duration",
                        format!("minutesUntilFailedLoginReset={}", l.duration),
                    ),
                ]);
            }
        }

        let mut changes = Vec::new();
        for (policy, setting) in settings {
            if runner.execute(&argv(["pwpolicy", "-setglobalpolicy", setting.as_str()])) {
                info!("Configured password policy {policy} ({setting})");
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

        if runner.execute(&argv([SOCKETFILTERFW, "--setglobalstate", "on"])) {
            info!("Enabled application firewall");
            changes.push(ChangeRecord::firewall_enabled(None));
        }

        if doc.firewall_rules.is_empty() {
            return changes;
        }

        for (n, rule) in doc.firewall_rules.iter().enumerate() {
            let mut file = self.anchor_file.clone().into_os_string();
            file.push(format!("-{n}"));
            let file = PathBuf::from(file);
            let anchor = format!("{PF_ANCHOR}-{n}");
            let file_arg = file.display().to_string();

            let loaded = runner.write(&file, &pf_anchor(rule))
                && runner.execute(&argv(["pfctl", "-a", anchor.as_str(), "-f", file_arg.as_str()]));
            if loaded {
                info!("Added firewall rule: {}", rule.name);
                changes.push(ChangeRecord::firewall_rule_added(rule.clone()));
            }
        }
        runner.execute(&argv(["pfctl", "-E"]));

        changes
    }

    fn apply_platform_extras(
        &self,
        doc: &BaselineDocument,
        tier: Tier,
        runner: &mut dyn CommandRunner,
    ) -> Vec<ChangeRecord> {
        let defaults = MacosSettings::default();
        let settings = doc.macos_settings.as_ref().unwrap_or(&defaults);
        let mut changes = Vec::new();

        let toggles = [
            (settings.enable_filevault, "filevault", argv(["fdesetup", "enable"])),
            (settings.enable_gatekeeper, "gatekeeper", argv(["spctl", "--master-enable"])),
            (settings.enable_sip, "sip", argv(["csrutil", "enable"])),
        ];
        for (wanted, feature, cmd) in toggles {
            if wanted && runner.execute(&cmd) {
                info!("Enabled {feature}");
                changes.push(ChangeRecord::security(ChangeAction::Enabled, feature));
            }
        }

        let extra = &settings.additional_security;
        if tier != Tier::Strict {
            if extra.enable_secure_token
                || extra.restrict_remote_login
                || extra.restrict_remote_management
            {
                info!("additional security settings require the strict tier (tier is {tier}); skipping");
            }
            return changes;
        }

        if extra.enable_secure_token {
            match extra.secure_token_user.as_deref() {
                Some(user) => {
                    let cmd = argv(["sysadminctl", "-secureTokenOn", user, "-password", "-"]);
                    if runner.execute(&cmd) {
                        info!("Enabled secure token for {user}");
                        changes.push(ChangeRecord::security(ChangeAction::Enabled, "secure_token"));
                    }
                }
                None => warn!("enable_secure_token is set but secure_token_user is missing; skipping"),
            }
        }

        if extra.restrict_remote_login
            && runner.execute(&argv(["systemsetup", "-f", "-setremotelogin", "off"]))
        {
            info!("Disabled remote login");
            changes.push(ChangeRecord::security(ChangeAction::Disabled, "remote_login"));
        }

        if extra.restrict_remote_management
            && runner.execute(&argv([ARD_KICKSTART, "-deactivate", "-stop"]))
        {
            info!("Disabled remote management");
            changes.push(ChangeRecord::security(ChangeAction::Disabled, "remote_management"));
        }

        changes
    }
}

fn pf_anchor(rule: &FirewallRule) -> String {
    let verdict = if rule.allow { "pass" } else { "block" };
    let direction = if rule.is_outbound() { "out" } else { "in" };
    let proto = rule.protocol.trim().to_ascii_lowercase();
    let mut out = format!(
        "# Managed by hardener: {}\n{verdict} {direction} proto {proto} from any to any",
        rule.name
    );
    if let Some(port) = &rule.port {
        out.push_str(&format!(" port {}", port.with_range_separator(':')));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_baseline;
    use crate::core::ChangeKind;
    use crate::platform::testing::ScriptedRunner;

    #[test]
    fn unloads_services_then_additional_services() {
        let doc = parse_baseline(
            r#"{
                "services": [{"name": "com.apple.screensharing", "disable": true}],
                "macos_settings": {
                    "additional_services": [
                        {"name": "com.apple.ftpd", "disable": true},
                        {"name": "com.apple.smbd", "disable": false}
                    ]
                }
            }"#,
        )
        .unwrap();
        let mut runner = ScriptedRunner::new();
        let changes = MacosAdapter::default().disable_services(&doc, &mut runner);

        assert_eq!(
            runner.calls,
            vec![
                "launchctl unload -w /System/Library/LaunchDaemons/com.apple.screensharing.plist",
                "launchctl unload -w /System/Library/LaunchDaemons/com.apple.ftpd.plist",
            ]
        );
        let names: Vec<_> = changes.iter().filter_map(|c| c.service.as_deref()).collect();
        assert_eq!(names, vec!["com.apple.screensharing", "com.apple.ftpd"]);
    }

    #[test]
    fn password_policy_consumes_lockout() {
        let doc = parse_baseline(
            r#"{"password_policies": {
                "complexity": {"min_length": 15, "min_digits": 1, "min_uppercase": 1, "history": 10},
                "lockout": {"attempts": 5, "duration": 30}
            }}"#,
        )
        .unwrap();
        let mut runner = ScriptedRunner::new().fail_on("requiresSymbol");
        let changes = MacosAdapter::default().apply_password_policy(&doc, &mut runner);

        assert_eq!(
            runner.calls,
            vec![
                "pwpolicy -setglobalpolicy minChars=15",
                "pwpolicy -setglobalpolicy requiresNumeric=1",
                "pwpolicy -setglobalpolicy requiresMixedCase=1",
                "pwpolicy -setglobalpolicy requiresSymbol=0",
                "pwpolicy -setglobalpolicy usingHistory=10",
                "pwpolicy -setglobalpolicy maxFailedLoginAttempts=5",
                "pwpolicy -setglobalpolicy minutesUntilFailedLoginReset=30",
            ]
        );
        let policies: Vec<_> = changes.iter().filter_map(|c| c.policy.as_deref()).collect();
        assert_eq!(
            policies,
            vec![
                "min_length",
                "min_digits",
                "mixed_case",
                "history",
                "lockout_attempts",
                "lockout_duration"
            ]
        );
    }

    #[test]
    fn each_firewall_rule_loads_into_its_own_anchor() {
        let doc = parse_baseline(
            r#"{"firewall_rules": [
                {"name": "ssh", "allow": true, "port": 22},
                {"name": "x11", "port": "6000-6007"}
            ]}"#,
        )
        .unwrap();
        let mut runner = ScriptedRunner::new();
        let changes = MacosAdapter::default().configure_firewall(&doc, &mut runner);

        assert_eq!(
            runner.calls,
            vec![
                "/usr/libexec/ApplicationFirewall/socketfilterfw --setglobalstate on",
                "pfctl -a com.apple/hardener-0 -f /etc/pf.anchors/hardener-0",
                "pfctl -a com.apple/hardener-1 -f /etc/pf.anchors/hardener-1",
                "pfctl -E",
            ]
        );
        assert_eq!(runner.writes[0].0, PathBuf::from("/etc/pf.anchors/hardener-0"));
        assert_eq!(
            runner.writes[0].1,
            "# Managed by hardener: ssh\npass in proto tcp from any to any port 22\n"
        );
        assert_eq!(
            runner.writes[1].1,
            "# Managed by hardener: x11\nblock in proto tcp from any to any port 6000:6007\n"
        );
        assert_eq!(changes[0], ChangeRecord::firewall_enabled(None));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn rejected_rule_does_not_block_the_others() {
        let doc = parse_baseline(
            r#"{"firewall_rules": [
                {"name": "ssh", "allow": true, "port": 22},
                {"name": "ping", "allow": true, "protocol": "icmp", "port": 7},
                {"name": "telnet", "port": 23}
            ]}"#,
        )
        .unwrap();
        let mut runner = ScriptedRunner::new().fail_on("hardener-1 -f");
        let changes = MacosAdapter::default().configure_firewall(&doc, &mut runner);

        let names: Vec<_> = changes
            .iter()
            .filter_map(|c| c.rule.as_ref().map(|r| r.name.as_str()))
            .collect();
        assert_eq!(names, vec!["ssh", "telnet"]);
        assert_eq!(runner.calls.last().map(String::as_str), Some("pfctl -E"));
    }

    #[test]
    fn failed_anchor_write_records_no_rule() {
        let doc = parse_baseline(r#"{"firewall_rules": [{"name": "ssh", "allow": true, "port": 22}]}"#)
            .unwrap();
        let mut runner = ScriptedRunner::new().fail_writes();
        let changes = MacosAdapter::default().configure_firewall(&doc, &mut runner);
        assert_eq!(changes, vec![ChangeRecord::firewall_enabled(None)]);
        assert!(!runner.calls.iter().any(|c| c.starts_with("pfctl -a")));
        assert_eq!(runner.calls.last().map(String::as_str), Some("pfctl -E"));
    }

    #[test]
    fn extras_default_to_gatekeeper_and_sip() {
        let mut runner = ScriptedRunner::new();
        let changes = MacosAdapter::default().apply_platform_extras(
            &BaselineDocument::default(),
            Tier::Standard,
            &mut runner,
        );
        assert_eq!(runner.calls, vec!["spctl --master-enable", "csrutil enable"]);
        let features: Vec<_> = changes.iter().filter_map(|c| c.feature.as_deref()).collect();
        assert_eq!(features, vec!["gatekeeper", "sip"]);
    }

    fn strict_doc() -> BaselineDocument {
        parse_baseline(
            r#"{"macos_settings": {
                "enable_filevault": true,
                "enable_gatekeeper": false,
                "enable_sip": false,
                "additional_security": {
                    "enable_secure_token": true,
                    "restrict_remote_login": true,
                    "restrict_remote_management": false
                }
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn strict_tier_unlocks_additional_security() {
        let mut runner = ScriptedRunner::new();
        let changes =
            MacosAdapter::default().apply_platform_extras(&strict_doc(), Tier::Strict, &mut runner);

        // secure token has no user configured, so it is skipped
        assert_eq!(
            runner.calls,
            vec!["fdesetup enable", "systemsetup -f -setremotelogin off"]
        );
        let remote: Vec<_> = changes
            .iter()
            .filter(|c| c.feature.as_deref() == Some("remote_login"))
            .collect();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].kind, ChangeKind::Security);
        assert_eq!(remote[0].action, ChangeAction::Disabled);
    }

    #[test]
    fn basic_tier_ignores_additional_security() {
        let mut runner = ScriptedRunner::new();
        let changes =
            MacosAdapter::default().apply_platform_extras(&strict_doc(), Tier::Basic, &mut runner);
        assert_eq!(runner.calls, vec!["fdesetup enable"]);
        assert!(changes.iter().all(|c| c.feature.as_deref() != Some("remote_login")));
    }

    #[test]
    fn secure_token_uses_configured_user() {
        let doc = parse_baseline(
            r#"{"macos_settings": {"enable_gatekeeper": false, "enable_sip": false,
                "additional_security": {"enable_secure_token": true, "secure_token_user": "admin"}}}"#,
        )
        .unwrap();
        let mut runner = ScriptedRunner::new();
        let changes = MacosAdapter::default().apply_platform_extras(&doc, Tier::Strict, &mut runner);
        assert_eq!(runner.calls, vec!["sysadminctl -secureTokenOn admin -password -"]);
        assert_eq!(
            changes,
            vec![ChangeRecord::security(ChangeAction::Enabled, "secure_token")]
        );
    }
}
