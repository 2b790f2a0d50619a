use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub log_file: PathBuf,
    pub verbose: bool,
    pub quiet: bool,
    pub console_ansi: bool,
}

/// Installs the process-wide subscriber: every event goes to the append-only
/// run log, and also to stderr unless `quiet` is set.
pub fn init(opts: &LogOptions) -> Result<()> {
    if let Some(parent) = opts.log_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory: {}", parent.display())
            })?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&opts.log_file)
        .with_context(|| format!("failed to open log file: {}", opts.log_file.display()))?;

    let level = if opts.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    let console_layer = (!opts.quiet).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(opts.console_ansi)
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}
