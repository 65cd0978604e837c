use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StoreError;
use crate::liveness::{Liveness, ProcessTable};
use crate::status::RunStatus;

/// A status file holding one JSON record per line.
///
/// Each checkpoint of a run appends a full snapshot; the last line is the
/// current status.
/// ```text
/// {"request_id":"...","name":"etl","status":"running",...}
/// {"request_id":"...","name":"etl","status":"success",...}
/// ```
#[derive(Debug, Clone)]
pub struct StatusFile {
  path: PathBuf,
}

impl StatusFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// The status file of workflow `name` under `data_dir`:
  /// `<data_dir>/status/<name>.jsonl`, with `name` made safe by
  /// [`valid_filename`].
  pub fn for_workflow(data_dir: impl AsRef<Path>, name: &str) -> Self {
    let file_name = format!("{}.jsonl", valid_filename(name, "_"));
    Self::new(data_dir.as_ref().join("status").join(file_name))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Append a snapshot, creating the file and its parent directories.
  pub async fn append(&self, status: &RunStatus) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).await?;
    }

    let mut line = status.to_json()?;
    line.push('\n');

    let mut file = fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    debug!(path = %self.path.display(), status = %status.status, "status snapshot written");
    Ok(())
  }

  /// Read the most recent snapshot as stored, without correction.
  ///
  /// Returns `None` if the file does not exist or holds no records.
  pub async fn read_latest(&self) -> Result<Option<RunStatus>, StoreError> {
    let content = match fs::read(&self.path).await {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let latest = content
      .split(|b| *b == b'\n')
      .rev()
      .find(|line| line.iter().any(|b| !b.is_ascii_whitespace()));

    match latest {
      Some(line) => Ok(Some(crate::codec::deserialize(line)?)),
      None => Ok(None),
    }
  }
}

static RESERVED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("reserved character pattern is valid")
});

static RESERVED_NAMES: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])$").expect("reserved name pattern is valid")
});

/// Make `name` usable as a single file name component.
///
/// Path separators, characters reserved on Windows, control characters and
/// spaces are replaced with `replacement`, as is a whole name that is a
/// Windows device name (`con`, `nul`, `com1`, ...).
pub fn valid_filename(name: &str, replacement: &str) -> String {
  let name = RESERVED_CHARS.replace_all(name, replacement);
  let name = RESERVED_NAMES.replace_all(&name, replacement);
  name.replace(' ', replacement)
}

/// Load the latest status from `path` and correct it against the OS
/// process table.
pub async fn load_status(path: impl AsRef<Path>) -> Result<Option<RunStatus>, StoreError> {
  load_status_with(path, &ProcessTable).await
}

/// Load the latest status from `path` and correct it against `liveness`.
///
/// The correction runs exactly once, before the status is returned.
pub async fn load_status_with<L>(
  path: impl AsRef<Path>,
  liveness: &L,
) -> Result<Option<RunStatus>, StoreError>
where
  L: Liveness + ?Sized,
{
  let file = StatusFile::new(path.as_ref());
  let Some(mut status) = file.read_latest().await? else {
    return Ok(None);
  };
  status.correct_running_status_with(liveness);
  Ok(Some(status))
}

#[cfg(test)]
mod tests {
  use sable_config::{StepDef, WorkflowDef};

  use super::*;
  use crate::pid::Pid;
  use crate::status::RunState;

  fn status(state: RunState) -> RunStatus {
    let def = WorkflowDef {
      name: "store".to_string(),
      steps: vec![StepDef::new("1", "echo 1")],
      ..Default::default()
    };
    RunStatus::new(&def, None, state, Pid::from_raw(10000), None, None)
  }

  #[test]
  fn test_valid_filename() {
    assert_eq!(valid_filename("etl", "_"), "etl");
    assert_eq!(valid_filename("nightly etl", "_"), "nightly_etl");
    assert_eq!(valid_filename(r#"a<b>c:d"e/f\g|h?i*j"#, "_"), "a_b_c_d_e_f_g_h_i_j");
    assert_eq!(valid_filename("tab\there", "_"), "tab_here");
    assert_eq!(valid_filename("CON", "_"), "_");
    assert_eq!(valid_filename("lpt1", "-"), "-");
    assert_eq!(valid_filename("console", "_"), "console");
  }

  #[test]
  fn test_workflow_file_stays_in_data_dir() {
    let file = StatusFile::for_workflow("/var/sable", "../../escaped");
    assert_eq!(file.path(), Path::new("/var/sable/status/.._.._escaped.jsonl"));
    assert_eq!(file.path().parent(), Some(Path::new("/var/sable/status")));
  }

  #[tokio::test]
  async fn test_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let file = StatusFile::new(dir.path().join("absent.jsonl"));
    assert!(file.read_latest().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_latest_line_wins() {
    let dir = tempfile::tempdir().unwrap();
    let file = StatusFile::new(dir.path().join("nested/dir/store.jsonl"));

    file.append(&status(RunState::Running)).await.unwrap();
    file.append(&status(RunState::Success)).await.unwrap();

    let latest = file.read_latest().await.unwrap().unwrap();
    assert_eq!(latest.status, RunState::Success);
  }

  #[tokio::test]
  async fn test_blank_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.jsonl");
    tokio::fs::write(&path, "\n  \n").await.unwrap();
    assert!(StatusFile::new(&path).read_latest().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_corrupt_latest_line_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let file = StatusFile::new(dir.path().join("corrupt.jsonl"));
    file.append(&status(RunState::Success)).await.unwrap();

    let mut content = tokio::fs::read_to_string(file.path()).await.unwrap();
    content.push_str("{\"name\": \"store\", \"nod\n");
    tokio::fs::write(file.path(), content).await.unwrap();

    let err = file.read_latest().await.unwrap_err();
    assert!(err.is_malformed());
  }

  #[tokio::test]
  async fn test_load_corrects_orphaned_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orphan.jsonl");
    StatusFile::new(&path)
      .append(&status(RunState::Running))
      .await
      .unwrap();

    let dead = |_: Pid| false;
    let loaded = load_status_with(&path, &dead).await.unwrap().unwrap();
    assert_eq!(loaded.status, RunState::Error);

    // The stored record itself is left as written.
    let stored = StatusFile::new(&path).read_latest().await.unwrap().unwrap();
    assert_eq!(stored.status, RunState::Running);
  }

  #[tokio::test]
  async fn test_load_keeps_live_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.jsonl");
    StatusFile::new(&path)
      .append(&status(RunState::Running))
      .await
      .unwrap();

    let alive = |_: Pid| true;
    let loaded = load_status_with(&path, &alive).await.unwrap().unwrap();
    assert_eq!(loaded.status, RunState::Running);
  }
}
