//! Crash-recovery correction of loaded run statuses.
//!
//! A status persisted while a run was in progress still reads "running"
//! after the owning process dies with its host or is killed. Nothing
//! heartbeats a run, so the owner's liveness decides: a running status whose
//! owner is gone is an orphan and becomes an error. A reused process id keeps
//! an orphan looking alive; that case is not detected.

use tracing::warn;

use crate::liveness::{Liveness, ProcessTable};
use crate::status::{RunState, RunStatus};

impl RunStatus {
  /// Correct an orphaned running status using the OS process table.
  ///
  /// See [`RunStatus::correct_running_status_with`].
  pub fn correct_running_status(&mut self) {
    self.correct_running_status_with(&ProcessTable);
  }

  /// Correct an orphaned running status.
  ///
  /// If the run claims to be running and `liveness` reports its owner dead,
  /// the run becomes [`RunState::Error`]. Any other state is left untouched.
  /// Applying this more than once has no further effect.
  pub fn correct_running_status_with<L>(&mut self, liveness: &L)
  where
    L: Liveness + ?Sized,
  {
    if self.status != RunState::Running {
      return;
    }
    if !self.pid.is_none() && liveness.is_alive(self.pid) {
      return;
    }

    warn!(
      workflow = %self.name,
      request_id = %self.request_id,
      pid = %self.pid,
      "owning process is gone, marking running status as error"
    );
    self.status = RunState::Error;
  }
}
