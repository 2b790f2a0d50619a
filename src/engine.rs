use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::config::BaselineDocument;
use crate::core::{ChangeLedger, RunReport, Tier};
use crate::platform::{self, CommandRunner, OsFamily, PlatformAdapter};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub os: OsFamily,
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Services,
    PasswordPolicy,
    Firewall,
    PlatformExtras,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Services,
        Stage::PasswordPolicy,
        Stage::Firewall,
        Stage::PlatformExtras,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Services => "services",
            Stage::PasswordPolicy => "password policy",
            Stage::Firewall => "firewall",
            Stage::PlatformExtras => "platform extras",
        }
    }
}

/// Runs the four stages in order against one adapter, selected once.
pub struct Engine {
    opts: EngineOptions,
    adapter: Box<dyn PlatformAdapter>,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        let adapter = platform::adapter_for(&opts.os);
        Self { opts, adapter }
    }

    /// Every stage is attempted even when earlier commands failed; failures
    /// only show up in the log and as missing records.
    pub fn run(&self, doc: &BaselineDocument, runner: &mut dyn CommandRunner) -> RunReport {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        info!(
            "Starting security hardening process (os={} tier={})",
            self.opts.os, self.opts.tier
        );

        let mut ledger = ChangeLedger::new();
        for stage in Stage::ALL {
            let before = ledger.len();
            ledger.extend(self.run_stage(stage, doc, runner));
            info!(
                "{}: {} change(s) applied",
                stage.as_str(),
                ledger.len() - before
            );
        }

        info!("All stages finished: {} change(s) recorded", ledger.len());

        RunReport::new(
            timestamp,
            self.opts.os.identifier().to_string(),
            self.opts.tier,
            ledger.into_vec(),
        )
    }

    fn run_stage(
        &self,
        stage: Stage,
        doc: &BaselineDocument,
        runner: &mut dyn CommandRunner,
    ) -> Vec<crate::core::ChangeRecord> {
        let adapter = self.adapter.as_ref();
        match stage {
            Stage::Services => adapter.disable_services(doc, runner),
            Stage::PasswordPolicy => adapter.apply_password_policy(doc, runner),
            Stage::Firewall => adapter.configure_firewall(doc, runner),
            Stage::PlatformExtras if self.opts.os == OsFamily::MacOs => {
                adapter.apply_platform_extras(doc, self.opts.tier, runner)
            }
            Stage::PlatformExtras => Vec::new(),
        }
    }
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
                "tier": "standard",
                "services": [{"name": "telnet", "disable": true}, {"name": "cups", "disable": true}],
                "password_policies": {"complexity": {"min_length": 12}},
                "firewall_rules": [{"name": "ssh", "allow": true, "port": 22}]
            }"#,
        )
        .unwrap()
    }

    fn engine(os: OsFamily, tier: Tier) -> Engine {
        Engine::new(EngineOptions { os, tier })
    }

    #[test]
    fn linux_run_orders_changes_by_stage() {
        let mut runner = ScriptedRunner::new();
        let report = engine(OsFamily::Linux, Tier::Standard).run(&doc(), &mut runner);

        let kinds: Vec<_> = report.changes.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Service,
                ChangeKind::Service,
                ChangeKind::PasswordPolicy,
                ChangeKind::Firewall,
                ChangeKind::Firewall,
            ]
        );
        assert_eq!(report.os_type, "linux");
        assert_eq!(report.tier, Tier::Standard);
        assert_eq!(report.schema_version, "1.0");
    }

    #[test]
    fn failures_do_not_stop_later_stages() {
        let mut runner = ScriptedRunner::new()
            .fail_on("systemctl")
            .fail_writes()
            .fail_on("which ufw");
        let report = engine(OsFamily::Linux, Tier::Standard).run(&doc(), &mut runner);

        assert!(report.changes.is_empty());
        assert!(runner.calls.iter().any(|c| c == "systemctl disable cups"));
        assert_eq!(runner.writes.len(), 1);
        assert_eq!(runner.calls.last().map(String::as_str), Some("which ufw"));
    }

    #[test]
    fn extras_only_run_on_macos() {
        let mut runner = ScriptedRunner::new();
        let report = engine(OsFamily::Linux, Tier::Strict).run(&doc(), &mut runner);
        assert!(report.changes.iter().all(|c| c.kind != ChangeKind::Security));

        let mut runner = ScriptedRunner::new();
        let report = engine(OsFamily::MacOs, Tier::Strict).run(&doc(), &mut runner);
        let last = report.changes.last().expect("a change");
        assert_eq!(last.kind, ChangeKind::Security);
        assert_eq!(last.action, ChangeAction::Enabled);
    }

    #[test]
    fn unsupported_os_still_produces_a_report() {
        let mut runner = ScriptedRunner::new();
        let report =
            engine(OsFamily::from_identifier("haiku"), Tier::Basic).run(&doc(), &mut runner);
        assert!(report.changes.is_empty());
        assert!(runner.calls.is_empty());
        assert_eq!(report.os_type, "haiku");
    }

    #[test]
    fn runs_are_independent() {
        let e = engine(OsFamily::Linux, Tier::Standard);

        let mut first = ScriptedRunner::new();
        let a = e.run(&doc(), &mut first);

        let mut second = ScriptedRunner::new().fail_on("telnet");
        let b = e.run(&doc(), &mut second);

        assert_eq!(first.calls, second.calls);
        assert_eq!(a.changes.len(), b.changes.len() + 1);
    }
}
