use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, load_baseline, validate_timeout};
use crate::core::{RunReport, Tier};
use crate::engine::{Engine, EngineOptions};
use crate::logging::LogOptions;
use crate::platform::{OsFamily, SystemRunner};

#[derive(Debug, Parser)]
#[command(
    name = "hardener",
    version,
    about = "Apply a security baseline (services, password policy, firewall) and write a JSON report of the changes"
)]
pub struct Cli {
    /// Configuration file, or a tier keyword (basic|standard|strict) selecting config_<tier>.json
    pub target: Option<String>,
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Per-command timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Override the detected OS family (linux|windows|macos)
    #[arg(long)]
    pub os: Option<String>,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub verbose: bool,
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Default,
    Tier(Tier),
    Path(PathBuf),
}

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

impl Target {
    pub fn config_path(&self, config_dir: &Path) -> PathBuf {
        match self {
            Target::Default => config_dir.join(DEFAULT_CONFIG_FILE),
            Target::Tier(tier) => config_dir.join(format!("config_{tier}.json")),
            Target::Path(path) => path.clone(),
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            Target::Tier(tier) => Some(*tier),
            _ => None,
        }
    }
}

/// Tier keywords win over paths; anything that is neither a keyword nor
/// recognizably a path is rejected as an unknown tier.
pub fn resolve_target(arg: Option<&str>) -> Result<Target> {
    let Some(arg) = arg else {
        return Ok(Target::Default);
    };
    if let Ok(tier) = arg.parse::<Tier>() {
        return Ok(Target::Tier(tier));
    }
    let path = PathBuf::from(arg);
    if looks_like_path(arg) || path.is_file() {
        return Ok(Target::Path(path));
    }
    Err(crate::exit::invalid_args(format!(
        "invalid tier: {arg} (expected one of {}, or a path to a .json file)",
        Tier::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("|")
    )))
}

fn looks_like_path(s: &str) -> bool {
    s.contains('/') || s.contains('\\') || s.to_ascii_lowercase().ends_with(".json")
}

pub fn select_tier(requested: Option<Tier>, declared: Option<Tier>) -> Tier {
    match (requested, declared) {
        (Some(requested), Some(declared)) if requested != declared => {
            warn!("tier {requested} was requested but the configuration declares {declared}; using {requested}");
            requested
        }
        (Some(tier), _) | (None, Some(tier)) => tier,
        (None, None) => Tier::default(),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let target = resolve_target(cli.target.as_deref())?;

    let env_settings = std::env::var_os("HARDENER_SETTINGS").map(PathBuf::from);
    let mut settings = crate::config::load(cli.settings.as_deref().or(env_settings.as_deref()))
        .map_err(crate::exit::invalid_args_err)?;
    apply_cli_overrides(&mut settings, &cli).map_err(crate::exit::invalid_args_err)?;

    crate::logging::init(&LogOptions {
        log_file: settings.paths.log_file.clone(),
        verbose: cli.verbose,
        quiet: cli.quiet,
        console_ansi: std::io::stderr().is_terminal(),
    })?;

    if let Some(path) = &settings.settings_path {
        debug!("settings loaded from {path}");
    }
    if crate::platform::is_elevated() == Some(false) {
        warn!("not running as root; most changes are expected to fail");
    }

    let config_path = target.config_path(&settings.paths.config_dir);
    let doc = load_baseline(&config_path).map_err(|err| {
        error!("{err:#}");
        crate::exit::config_err(err)
    })?;
    info!("Loaded configuration from {}", config_path.display());

    let tier = select_tier(target.tier(), doc.tier);
    let os = cli
        .os
        .as_deref()
        .map(OsFamily::from_identifier)
        .unwrap_or_else(OsFamily::detect);

    let engine = Engine::new(EngineOptions { os, tier });
    let mut runner = SystemRunner::new(Duration::from_secs(settings.run.timeout_secs));
    let report = engine.run(&doc, &mut runner);

    let path = crate::report::write_report(&settings.paths.report_dir, &report).map_err(|err| {
        error!("{err:#}");
        crate::exit::report_err(err)
    })?;
    info!("Report generated: {}", path.display());

    if cli.json {
        write_json(&report)?;
    } else if !cli.quiet {
        crate::ui::print_summary(&report, &path);
    }

    info!("Security hardening process completed.");
    Ok(())
}

fn apply_cli_overrides(settings: &mut Settings, cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.config_dir {
        settings.paths.config_dir = dir.clone();
    }
    if let Some(dir) = &cli.report_dir {
        settings.paths.report_dir = dir.clone();
    }
    if let Some(file) = &cli.log_file {
        settings.paths.log_file = file.clone();
    }
    if let Some(secs) = cli.timeout {
        settings.run.timeout_secs = validate_timeout(secs)?;
    }
    Ok(())
}

fn write_json(report: &RunReport) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(report)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}
