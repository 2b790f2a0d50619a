use anyhow::Error;
use std::io::{self, Write};
use std::path::Path;

use crate::core::{ChangeAction, ChangeKind, ChangeRecord, RunReport};

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(
        stderr,
        "  - no changes were applied if this happened before the run started"
    );
    let _ = writeln!(stderr, "  - see `hardener --help` for arguments and options");
}

pub fn print_summary(report: &RunReport, report_path: &Path) {
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "summary: os={} tier={} changes={}",
        report.os_type,
        report.tier,
        report.changes.len()
    );
    for change in &report.changes {
        let _ = writeln!(out, "- {}", describe(change));
    }
    let _ = writeln!(out, "report: {}", report_path.display());
}

pub fn describe(change: &ChangeRecord) -> String {
    let kind = match change.kind {
        ChangeKind::Service => "service",
        ChangeKind::PasswordPolicy => "password policy",
        ChangeKind::Firewall => "firewall",
        ChangeKind::Security => "security",
    };
    let action = match change.action {
        ChangeAction::Disabled => "disabled",
        ChangeAction::Configured => "configured",
        ChangeAction::Enabled => "enabled",
        ChangeAction::RuleAdded => "rule added",
    };
    let subject = change
        .service
        .clone()
        .or_else(|| change.policy.clone())
        .or_else(|| change.rule.as_ref().map(|r| r.name.clone()))
        .or_else(|| change.profile.clone())
        .or_else(|| change.feature.clone());

    match subject {
        Some(subject) => format!("{kind} {action}: {subject}"),
        None => format!("{kind} {action}"),
    }
}
