use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stderr: String,
}

/// Result of one attempted operation. Callers only branch on `succeeded()`;
/// the variants exist so the diagnostic can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded,
    Failed { exit_code: i32, stderr: String },
    LaunchError { message: String },
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Succeeded => f.write_str("ok"),
            CommandOutcome::Failed { exit_code, stderr } => {
                write!(f, "exit code {exit_code}: {stderr}")
            }
            CommandOutcome::LaunchError { message } => f.write_str(message),
        }
    }
}

pub trait CommandRunner {
    fn run(&mut self, argv: &[String]) -> CommandOutcome;

    /// Replaces the file content.
    fn write_file(&mut self, path: &Path, contents: &str) -> CommandOutcome;

    fn execute(&mut self, argv: &[String]) -> bool {
        let outcome = self.run(argv);
        log_outcome(&argv.join(" "), &outcome);
        outcome.succeeded()
    }

    fn write(&mut self, path: &Path, contents: &str) -> bool {
        let outcome = self.write_file(path, contents);
        log_outcome(&format!("write {}", path.display()), &outcome);
        outcome.succeeded()
    }
}

fn log_outcome(what: &str, outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Succeeded => debug!("command succeeded: {what}"),
        CommandOutcome::Failed { exit_code, stderr } => {
            error!("command failed: {what} (exit code {exit_code})\nError: {stderr}")
        }
        CommandOutcome::LaunchError { message } => {
            error!("error launching command {what}: {message}")
        }
    }
}

pub fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Runs commands on the host, one at a time, each bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, argv: &[String]) -> CommandOutcome {
        let Some((program, args)) = argv.split_first() else {
            return CommandOutcome::LaunchError {
                message: "empty command".to_string(),
            };
        };
        debug!("running: {}", argv.join(" "));

        match run_command(program, args, self.timeout) {
            Ok(output) if output.exit_code == 0 => CommandOutcome::Succeeded,
            Ok(output) => CommandOutcome::Failed {
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            },
            Err(err) => CommandOutcome::LaunchError {
                message: format!("{err:#}"),
            },
        }
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> CommandOutcome {
        match std::fs::write(path, contents) {
            Ok(()) => CommandOutcome::Succeeded,
            Err(err) => CommandOutcome::LaunchError {
                message: err.to_string(),
            },
        }
    }
}

/// Stdout is discarded. Stderr is drained on its own thread so a chatty child
/// cannot fill the pipe and stall until the timeout.
pub fn run_command(cmd: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start process: {cmd}"))?;

    let stderr_reader = child.stderr.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {timeout:?}: {cmd}"));
        }
    };

    let stderr = stderr_reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stderr,
    })
}
