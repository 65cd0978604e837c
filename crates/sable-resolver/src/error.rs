use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving a value.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A substituted command could not be launched or exited unsuccessfully.
  #[error("command `{command}` failed: {source}")]
  SubstitutionFailed {
    command: String,
    #[source]
    source: CommandError,
  },

  /// A substituted command did not finish in time and was killed.
  #[error("command `{command}` timed out after {timeout:?}")]
  Timeout { command: String, timeout: Duration },
}

/// Why a single substituted command failed.
#[derive(Debug, Error)]
pub enum CommandError {
  /// The program could not be started or its output could not be read.
  #[error("failed to run: {0}")]
  Launch(#[from] std::io::Error),

  /// The program ran and exited unsuccessfully.
  #[error("{status}{}", stderr_suffix(.stderr))]
  Exit { status: ExitStatus, stderr: String },
}

fn stderr_suffix(stderr: &str) -> String {
  let stderr = stderr.trim();
  if stderr.is_empty() {
    String::new()
  } else {
    format!(": {stderr}")
  }
}
