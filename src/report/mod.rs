use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::core::{RunReport, Tier};

pub const REPORT_PREFIX: &str = "security_hardening_report";

pub fn report_file_name(tier: Tier, at: OffsetDateTime) -> Result<String> {
    let stamp = at
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .context("failed to format report timestamp")?;
    Ok(format!("{REPORT_PREFIX}_{tier}_{stamp}.json"))
}

/// Writes the report as pretty JSON in a single write and returns its path.
pub fn write_report(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    write_report_at(dir, report, OffsetDateTime::now_utc())
}

pub fn write_report_at(dir: &Path, report: &RunReport, at: OffsetDateTime) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory: {}", dir.display()))?;

    let path = unique_path(dir, &report_file_name(report.tier, at)?);
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}-{n}.json"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
