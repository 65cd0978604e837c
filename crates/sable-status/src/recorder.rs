//! Single-writer status recording.
//!
//! The `StatusRecorder` owns the run status for the duration of a run. The
//! execution engine reports progress through cloned [`RecorderHandle`]s;
//! the recorder applies each update in arrival order and appends a snapshot
//! to the status file after every one.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::node::NodeState;
use crate::pid::Pid;
use crate::status::{RunState, RunStatus};
use crate::store::StatusFile;

/// A change to apply to the recorded status.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
  /// The run started in process `pid`, which now owns it.
  RunStarted { pid: Pid, at: DateTime<Utc> },

  /// The node at `index` started.
  NodeStarted { index: usize, at: DateTime<Utc> },

  /// The node at `index` reached `state`.
  NodeFinished {
    index: usize,
    state: NodeState,
    at: DateTime<Utc>,
  },

  /// The node at `index` failed.
  NodeFailed {
    index: usize,
    at: DateTime<Utc>,
    error: String,
  },

  /// The run reached `state`.
  RunFinished { state: RunState, at: DateTime<Utc> },
}

/// Sender side of a recorder. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
  sender: mpsc::UnboundedSender<StatusUpdate>,
}

impl RecorderHandle {
  /// Send an update. Returns `false` if the recorder has stopped.
  pub fn send(&self, update: StatusUpdate) -> bool {
    self.sender.send(update).is_ok()
  }
}

/// Owner of a run status while the run is in progress.
///
/// # Usage
///
/// ```ignore
/// let (recorder, handle) = StatusRecorder::new(status, StatusFile::new(path));
/// let task = tokio::spawn(recorder.run(CancellationToken::new()));
///
/// handle.send(StatusUpdate::NodeStarted { index: 0, at: Utc::now() });
/// drop(handle);
///
/// let final_status = task.await??;
/// ```
pub struct StatusRecorder {
  status: RunStatus,
  file: StatusFile,
  receiver: mpsc::UnboundedReceiver<StatusUpdate>,
}

impl StatusRecorder {
  /// Create a recorder owning `status` and the handle that feeds it.
  pub fn new(status: RunStatus, file: StatusFile) -> (Self, RecorderHandle) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let recorder = Self {
      status,
      file,
      receiver,
    };
    (recorder, RecorderHandle { sender })
  }

  /// The status as recorded so far.
  pub fn status(&self) -> &RunStatus {
    &self.status
  }

  /// Apply updates until every handle is dropped or `cancel` fires.
  ///
  /// On cancellation the channel is closed and updates already queued are
  /// still applied, so the last snapshot reflects everything that was sent
  /// before `send` started failing. Returns the final status. A failed
  /// write stops recording.
  pub async fn run(mut self, cancel: CancellationToken) -> Result<RunStatus, StoreError> {
    info!(
      workflow = %self.status.name,
      request_id = %self.status.request_id,
      path = %self.file.path().display(),
      "starting status recorder"
    );

    self.file.append(&self.status).await?;

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              let drained = self.drain().await?;
              info!(request_id = %self.status.request_id, drained, "status recorder cancelled");
              break;
          }
          update = self.receiver.recv() => {
              match update {
                  Some(update) => {
                      if self.apply(update) {
                          self.file.append(&self.status).await?;
                      }
                  }
                  None => break,
              }
          }
      }
    }

    Ok(self.status)
  }

  /// Close the channel and record every update still queued. Returns how
  /// many were drained.
  async fn drain(&mut self) -> Result<usize, StoreError> {
    self.receiver.close();
    let mut drained = 0;
    while let Ok(update) = self.receiver.try_recv() {
      drained += 1;
      if self.apply(update) {
        self.file.append(&self.status).await?;
      }
    }
    Ok(drained)
  }

  /// Apply one update. Returns `false` if the update was ignored.
  fn apply(&mut self, update: StatusUpdate) -> bool {
    match update {
      StatusUpdate::RunStarted { pid, at } => self.status.start(pid, at),
      StatusUpdate::RunFinished { state, at } => self.status.finish(state, at),
      StatusUpdate::NodeStarted { index, at } => match self.status.nodes.get_mut(index) {
        Some(node) => node.start(at),
        None => return self.unknown_node(index),
      },
      StatusUpdate::NodeFinished { index, state, at } => match self.status.nodes.get_mut(index) {
        Some(node) => node.finish(state, at),
        None => return self.unknown_node(index),
      },
      StatusUpdate::NodeFailed { index, at, error } => match self.status.nodes.get_mut(index) {
        Some(node) => node.fail(at, error),
        None => return self.unknown_node(index),
      },
    }
    true
  }

  fn unknown_node(&self, index: usize) -> bool {
    warn!(
      request_id = %self.status.request_id,
      index,
      nodes = self.status.nodes.len(),
      "ignoring update for unknown node"
    );
    false
  }
}
