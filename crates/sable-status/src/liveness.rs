//! Process liveness probing.
//!
//! Liveness is the only oracle used to decide whether a run that claims to be
//! running still has an owner. It is approximate: a reused process id reads
//! as alive. Alternative oracles (heartbeat files, lock files, a supervisor
//! registry) plug in by implementing [`Liveness`].

use crate::pid::Pid;

/// Answers whether the process behind a [`Pid`] is alive.
pub trait Liveness {
  fn is_alive(&self, pid: Pid) -> bool;
}

impl<F> Liveness for F
where
  F: Fn(Pid) -> bool,
{
  fn is_alive(&self, pid: Pid) -> bool {
    self(pid)
  }
}

/// Liveness backed by the operating system's process table.
///
/// On Unix a process exists if signal 0 can be delivered to it (or delivery
/// is refused with `EPERM`). On Linux, zombie and dead entries in `/proc`
/// are not alive. Other platforms report every process as not alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTable;

impl Liveness for ProcessTable {
  fn is_alive(&self, pid: Pid) -> bool {
    let raw = pid.as_raw();
    // 0 and negative values address process groups, not a single process.
    if raw <= 0 {
      return false;
    }
    process_exists(raw) && !is_defunct(raw)
  }
}

#[cfg(unix)]
fn process_exists(raw: i32) -> bool {
  use nix::errno::Errno;
  use nix::sys::signal::kill;
  use nix::unistd::Pid as OsPid;

  match kill(OsPid::from_raw(raw), None) {
    Ok(()) | Err(Errno::EPERM) => true,
    Err(_) => false,
  }
}

#[cfg(not(unix))]
fn process_exists(_raw: i32) -> bool {
  false
}

#[cfg(target_os = "linux")]
fn is_defunct(raw: i32) -> bool {
  let Ok(stat) = std::fs::read_to_string(format!("/proc/{raw}/stat")) else {
    return false;
  };
  // The state field follows the command name, which is wrapped in parens and
  // may itself contain ')'.
  stat
    .rsplit_once(')')
    .and_then(|(_, rest)| rest.trim_start().chars().next())
    .is_some_and(|state| state == 'Z' || state == 'X')
}

#[cfg(not(target_os = "linux"))]
fn is_defunct(_raw: i32) -> bool {
  false
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_closure_liveness() {
    let liveness = |pid: Pid| pid.as_raw() == 7;
    assert!(liveness.is_alive(Pid::from_raw(7)));
    assert!(!liveness.is_alive(Pid::from_raw(8)));
  }

  #[test]
  fn test_process_table_rejects_groups() {
    assert!(!ProcessTable.is_alive(Pid::from_raw(0)));
    assert!(!ProcessTable.is_alive(Pid::NOT_RUNNING));
  }

  #[cfg(unix)]
  #[test]
  fn test_process_table_sees_self() {
    assert!(ProcessTable.is_alive(Pid::current()));
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn test_exited_child_is_not_alive() {
    use std::time::{Duration, Instant};

    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = Pid::from_raw(child.id() as i32);

    // Until reaped the child lingers as a zombie, which must not count.
    let deadline = Instant::now() + Duration::from_secs(5);
    while ProcessTable.is_alive(pid) && Instant::now() < deadline {
      std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!ProcessTable.is_alive(pid));

    child.wait().unwrap();
    assert!(!ProcessTable.is_alive(pid));
  }
}
