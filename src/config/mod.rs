use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

mod baseline;

pub use baseline::{
    AdditionalSecurity, BaselineDocument, Complexity, FirewallRule, Lockout, MacosSettings,
    PasswordPolicies, Port, ServiceRule, load_baseline, parse_baseline,
};

pub const DEFAULT_SETTINGS_FILE: &str = "hardener.toml";
pub const DEFAULT_LOG_FILE: &str = "security_hardening.log";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Tool settings, as opposed to the baseline document that says what to apply.
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: PathsSettings,
    pub run: RunSettings,
    pub settings_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PathsSettings {
    pub config_dir: PathBuf,
    pub report_dir: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathsSettings {
                config_dir: PathBuf::from("."),
                report_dir: PathBuf::from("."),
                log_file: PathBuf::from(DEFAULT_LOG_FILE),
            },
            run: RunSettings {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            settings_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    paths: Option<RawPathsSettings>,
    run: Option<RawRunSettings>,
}

#[derive(Debug, Deserialize)]
struct RawPathsSettings {
    config_dir: Option<PathBuf>,
    report_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawRunSettings {
    timeout_secs: Option<u64>,
}

pub fn load(settings_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let path = settings_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        apply_toml(&mut settings, &s)
            .with_context(|| format!("failed to parse settings file: {}", path.display()))?;
        settings.settings_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut settings)?;

    Ok(settings)
}

fn apply_toml(settings: &mut Settings, s: &str) -> Result<()> {
    let raw: RawSettings = toml::from_str(s).context("settings file is not valid TOML")?;
    apply_raw_settings(settings, raw)
}

fn apply_raw_settings(settings: &mut Settings, raw: RawSettings) -> Result<()> {
    if let Some(paths) = raw.paths {
        if let Some(config_dir) = paths.config_dir {
            settings.paths.config_dir = config_dir;
        }
        if let Some(report_dir) = paths.report_dir {
            settings.paths.report_dir = report_dir;
        }
        if let Some(log_file) = paths.log_file {
            settings.paths.log_file = log_file;
        }
    }

    if let Some(run) = raw.run {
        if let Some(timeout_secs) = run.timeout_secs {
            settings.run.timeout_secs = validate_timeout(timeout_secs)?;
        }
    }

    Ok(())
}

fn apply_env_overrides(settings: &mut Settings) -> Result<()> {
    if let Some(v) = non_empty_env("HARDENER_CONFIG_DIR") {
        settings.paths.config_dir = PathBuf::from(v);
    }
    if let Some(v) = non_empty_env("HARDENER_REPORT_DIR") {
        settings.paths.report_dir = PathBuf::from(v);
    }
    if let Some(v) = non_empty_env("HARDENER_LOG_FILE") {
        settings.paths.log_file = PathBuf::from(v);
    }
    if let Some(v) = non_empty_env("HARDENER_TIMEOUT_SECS") {
        let secs = v
            .parse::<u64>()
            .with_context(|| "HARDENER_TIMEOUT_SECS")?;
        settings.run.timeout_secs = validate_timeout(secs).with_context(|| "HARDENER_TIMEOUT_SECS")?;
    }

    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    let v = std::env::var(key).ok()?;
    let v = v.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

pub fn validate_timeout(secs: u64) -> Result<u64> {
    if secs == 0 {
        anyhow::bail!("timeout must be at least 1 second");
    }
    Ok(secs)
}
