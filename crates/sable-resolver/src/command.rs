use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{CommandError, ResolveError};

/// Runs a substituted command and returns its standard output.
pub trait CommandRunner {
  fn run(&self, program: &str, args: &[&str]) -> Result<String, ResolveError>;
}

/// Runs commands as child processes of the current process.
///
/// The child is always reaped before `run` returns. Without a timeout a hung
/// command blocks the caller indefinitely.
///
/// When a timeout kills the child, its output readers are detached rather
/// than joined. A reader exits once every writer of its pipe is closed, so a
/// background process the command left holding the pipe keeps that reader
/// thread alive until the background process exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
  timeout: Option<Duration>,
}

impl SystemRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Kill commands that run longer than `timeout`.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self {
      timeout: Some(timeout),
    }
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }
}

impl CommandRunner for SystemRunner {
  fn run(&self, program: &str, args: &[&str]) -> Result<String, ResolveError> {
    let command_line = display_command(program, args);
    let failed = |source: CommandError| ResolveError::SubstitutionFailed {
      command: command_line.clone(),
      source,
    };

    let mut child = Command::new(program)
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| failed(e.into()))?;

    // Drain both pipes on their own threads so a chatty child never blocks
    // on a full pipe while we wait for it.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match self.timeout {
      None => child.wait(),
      Some(timeout) => match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => Ok(status),
        Ok(None) => {
          debug!(command = %command_line, "detaching output readers of timed out command");
          return Err(ResolveError::Timeout {
            command: command_line.clone(),
            timeout,
          });
        }
        Err(e) => Err(e),
      },
    }
    .map_err(|e| failed(e.into()))?;

    let stdout = join(stdout).map_err(|e| failed(e.into()))?;
    let stderr = join(stderr).unwrap_or_default();

    if !status.success() {
      return Err(failed(CommandError::Exit {
        status,
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
      }));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
  }
}

type Drain = Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R>(pipe: Option<R>) -> Drain
where
  R: Read + Send + 'static,
{
  pipe.map(|mut pipe| {
    thread::spawn(move || {
      let mut buf = Vec::new();
      pipe.read_to_end(&mut buf)?;
      Ok(buf)
    })
  })
}

fn join(handle: Drain) -> std::io::Result<Vec<u8>> {
  match handle {
    Some(handle) => handle
      .join()
      .unwrap_or_else(|_| Err(std::io::Error::other("output reader panicked"))),
    None => Ok(Vec::new()),
  }
}

/// Wait for `child` up to `timeout`. On expiry the child is killed, reaped,
/// and `None` is returned.
fn wait_with_deadline(
  child: &mut Child,
  timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
  let deadline = Instant::now() + timeout;
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    let now = Instant::now();
    if now >= deadline {
      // The child may exit between try_wait and kill.
      let _ = child.kill();
      child.wait()?;
      return Ok(None);
    }
    thread::sleep((deadline - now).min(Duration::from_millis(10)));
  }
}

fn display_command(program: &str, args: &[&str]) -> String {
  std::iter::once(program)
    .chain(args.iter().copied())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Split a command line into a program and its arguments.
///
/// The program ends at the first whitespace. The rest is split on single
/// spaces; there is no quoting, so `echo "a b"` passes `"a` and `b"`.
pub fn split_command(command: &str) -> (&str, Vec<&str>) {
  match command.split_once(char::is_whitespace) {
    Some((program, rest)) => (program, rest.split(' ').collect()),
    None => (command, Vec::new()),
  }
}

static BACKTICK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"`[^`]+`").expect("backtick pattern is valid"));

/// Execute every backtick span in `value` and substitute its output.
///
/// Spans are found left to right without overlap. Each distinct span is
/// executed once and all of its occurrences receive that single output,
/// trimmed of surrounding whitespace. Output is not scanned again, so
/// backticks it contains are left alone. A value with no spans is returned
/// unchanged. The first failing command fails the whole call.
pub fn substitute_commands<R>(value: &str, runner: &R) -> Result<String, ResolveError>
where
  R: CommandRunner + ?Sized,
{
  let mut outputs: HashMap<&str, String> = HashMap::new();
  for span in BACKTICK.find_iter(value) {
    let span = span.as_str();
    if outputs.contains_key(span) {
      continue;
    }

    let command = span.trim_matches('`').trim();
    let (program, args) = split_command(command);
    debug!(command, "substituting command output");

    let output = runner.run(program, &args)?;
    outputs.insert(span, output.trim().to_string());
  }

  if outputs.is_empty() {
    return Ok(value.to_string());
  }

  Ok(
    BACKTICK
      .replace_all(value, |caps: &Captures| {
        outputs.get(&caps[0]).cloned().unwrap_or_default()
      })
      .into_owned(),
  )
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;

  /// Echoes its arguments and records every invocation.
  #[derive(Default)]
  struct Recording {
    calls: RefCell<Vec<String>>,
  }

  impl CommandRunner for Recording {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ResolveError> {
      self.calls.borrow_mut().push(display_command(program, args));
      Ok(format!("  {}\n", args.join(" ")))
    }
  }

  /// Returns the same output for every command.
  struct Fixed {
    output: &'static str,
    calls: RefCell<usize>,
  }

  impl CommandRunner for Fixed {
    fn run(&self, _program: &str, _args: &[&str]) -> Result<String, ResolveError> {
      *self.calls.borrow_mut() += 1;
      Ok(self.output.to_string())
    }
  }

  struct Failing;

  impl CommandRunner for Failing {
    fn run(&self, program: &str, _args: &[&str]) -> Result<String, ResolveError> {
      Err(ResolveError::SubstitutionFailed {
        command: program.to_string(),
        source: CommandError::Launch(std::io::Error::from(std::io::ErrorKind::NotFound)),
      })
    }
  }

  #[test]
  fn test_split_command() {
    assert_eq!(split_command("echo"), ("echo", vec![]));
    assert_eq!(split_command("echo 1"), ("echo", vec!["1"]));
    assert_eq!(split_command("date +%Y -u"), ("date", vec!["+%Y", "-u"]));
    assert_eq!(split_command("echo  a"), ("echo", vec!["", "a"]));
    assert_eq!(split_command("echo \"a b\""), ("echo", vec!["\"a", "b\""]));
  }

  #[test]
  fn test_no_spans_is_unchanged() {
    let runner = Recording::default();
    assert_eq!(substitute_commands("echo hi", &runner).unwrap(), "echo hi");
    assert_eq!(substitute_commands("  padded  ", &runner).unwrap(), "  padded  ");
    assert_eq!(substitute_commands("lone ` tick", &runner).unwrap(), "lone ` tick");
    assert!(runner.calls.borrow().is_empty());
  }

  #[test]
  fn test_output_is_trimmed_and_substituted() {
    let runner = Recording::default();
    let out = substitute_commands("v=`echo 1`!", &runner).unwrap();
    assert_eq!(out, "v=1!");
    assert_eq!(*runner.calls.borrow(), vec!["echo 1"]);
  }

  #[test]
  fn test_spans_run_left_to_right() {
    let runner = Recording::default();
    let out = substitute_commands("`echo a`-`echo b`", &runner).unwrap();
    assert_eq!(out, "a-b");
    assert_eq!(*runner.calls.borrow(), vec!["echo a", "echo b"]);
  }

  #[test]
  fn test_duplicate_span_runs_once() {
    let runner = Recording::default();
    let out = substitute_commands("`echo x`/`echo x`/`echo y`", &runner).unwrap();
    assert_eq!(out, "x/x/y");
    assert_eq!(*runner.calls.borrow(), vec!["echo x", "echo y"]);
  }

  #[test]
  fn test_output_is_not_rescanned() {
    let runner = Fixed {
      output: "`rm -rf /`",
      calls: RefCell::new(0),
    };
    let out = substitute_commands("a=`first` b=`second`", &runner).unwrap();
    assert_eq!(out, "a=`rm -rf /` b=`rm -rf /`");
    assert_eq!(*runner.calls.borrow(), 2);
  }

  #[test]
  fn test_failure_fails_whole_value() {
    let err = substitute_commands("ok `missing-binary`", &Failing).unwrap_err();
    assert!(matches!(
      err,
      ResolveError::SubstitutionFailed { ref command, .. } if command == "missing-binary"
    ));
  }
}
