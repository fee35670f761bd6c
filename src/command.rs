//! Helpers for running external tools.

use std::{process::Output, sync::LazyLock};

use regex::Regex;
use tokio::process::Command;

use crate::prelude::*;

/// Matches the traceback header that Python prints for an uncaught exception.
pub static PYTHON_TRACEBACK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Traceback \(most recent call last\):")
        .expect("failed to compile regex")
});

/// Run `command` to completion, capturing its output.
///
/// Only failure to launch is an error here. Use [`check_for_command_failure`]
/// to inspect the exit status.
#[instrument(level = "debug", skip(command))]
pub async fn run_captured(command_name: &str, mut command: Command) -> Result<Output> {
    command.kill_on_drop(true);
    command
        .output()
        .await
        .with_context(|| format!("cannot run {}", command_name))
}

/// Report any command failures, and include any error output.
///
/// The output of standard error and standard output will be logged at
/// appropriate levels. And standard error may be optionally checked against a
/// regex to determine if the command failed.
pub fn check_for_command_failure(
    command_name: &str,
    output: &Output,
    error_regex: Option<&Regex>,
) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %stdout,
        "Standard output from command"
    );
    if !stderr.trim().is_empty() {
        debug!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command",
        );
    }

    if output.status.success() {
        if let Some(regex) = error_regex {
            if regex.is_match(&stderr) {
                return Err(anyhow!(
                    "{} printed error output:\n{}",
                    command_name,
                    stderr,
                ));
            }
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}
