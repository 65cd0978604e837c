use std::fmt;

use serde::{Deserialize, Serialize};

use crate::liveness::{Liveness, ProcessTable};

/// Identifier of the process that owns a run.
///
/// [`Pid::NOT_RUNNING`] marks a run with no owning process. It renders as an
/// empty string and is never running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(i32);

impl Pid {
  /// Sentinel for "no process".
  pub const NOT_RUNNING: Pid = Pid(-1);

  pub const fn from_raw(raw: i32) -> Self {
    Self(raw)
  }

  /// The identifier of the calling process.
  pub fn current() -> Self {
    i32::try_from(std::process::id())
      .map(Self)
      .unwrap_or(Self::NOT_RUNNING)
  }

  pub const fn as_raw(self) -> i32 {
    self.0
  }

  /// Whether this is the "no process" sentinel.
  pub const fn is_none(self) -> bool {
    self.0 == Self::NOT_RUNNING.0
  }

  /// Whether a live process with this identifier exists.
  ///
  /// This is a best-effort check against the OS process table. If the
  /// original process exited and the identifier was reused by an unrelated
  /// process, this reports `true`.
  pub fn is_running(self) -> bool {
    !self.is_none() && ProcessTable.is_alive(self)
  }
}

impl Default for Pid {
  fn default() -> Self {
    Self::NOT_RUNNING
  }
}

impl From<i32> for Pid {
  fn from(raw: i32) -> Self {
    Self(raw)
  }
}

impl fmt::Display for Pid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_none() {
      Ok(())
    } else {
      write!(f, "{}", self.0)
    }
  }
}
