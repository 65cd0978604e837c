use std::fmt;

use chrono::{DateTime, Utc};
use sable_config::StepDef;
use serde::{Deserialize, Serialize};

/// Execution state of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  #[default]
  NotStarted,
  Running,
  Error,
  Cancelled,
  Success,
  Skipped,
}

impl NodeState {
  /// Whether the step has reached a final state.
  pub fn is_finished(self) -> bool {
    matches!(
      self,
      NodeState::Error | NodeState::Cancelled | NodeState::Success | NodeState::Skipped
    )
  }
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      NodeState::NotStarted => "not started",
      NodeState::Running => "running",
      NodeState::Error => "failed",
      NodeState::Cancelled => "canceled",
      NodeState::Success => "finished",
      NodeState::Skipped => "skipped",
    };
    f.write_str(text)
  }
}

/// Execution record of one step within a run.
///
/// The step definition is flattened into the record so a persisted status
/// can be displayed without the workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
  #[serde(flatten)]
  pub step: StepDef,
  #[serde(rename = "status")]
  pub state: NodeState,
  #[serde(with = "crate::codec::optional_time")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(with = "crate::codec::optional_time")]
  pub finished_at: Option<DateTime<Utc>>,
  /// Error text captured when the step failed. Empty if none.
  #[serde(default)]
  pub error: String,
  /// Path of the step's log file. Empty if unknown.
  #[serde(default)]
  pub log: String,
  #[serde(default)]
  pub retry_count: u32,
  #[serde(default)]
  pub done_count: u32,
}

impl NodeStatus {
  /// A not-yet-started record for the given step.
  pub fn new(step: StepDef) -> Self {
    Self {
      step,
      state: NodeState::NotStarted,
      started_at: None,
      finished_at: None,
      error: String::new(),
      log: String::new(),
      retry_count: 0,
      done_count: 0,
    }
  }

  pub fn name(&self) -> &str {
    &self.step.name
  }

  /// Mark the step as running from `at`.
  pub fn start(&mut self, at: DateTime<Utc>) {
    self.state = NodeState::Running;
    self.started_at = Some(at);
    self.finished_at = None;
  }

  /// Mark the step as finished in `state`.
  ///
  /// The finish time is never earlier than the start time.
  pub fn finish(&mut self, state: NodeState, at: DateTime<Utc>) {
    self.state = state;
    self.finished_at = Some(not_before(self.started_at, at));
    self.done_count += 1;
  }

  /// Mark the step as failed with the given error text.
  pub fn fail(&mut self, at: DateTime<Utc>, error: impl fmt::Display) {
    self.finish(NodeState::Error, at);
    self.error = error.to_string();
  }

  /// Reset the step for another attempt.
  pub fn retry(&mut self) {
    self.state = NodeState::NotStarted;
    self.started_at = None;
    self.finished_at = None;
    self.error.clear();
    self.retry_count += 1;
  }
}

/// Clamp `at` so it is not before `start`.
pub(crate) fn not_before(start: Option<DateTime<Utc>>, at: DateTime<Utc>) -> DateTime<Utc> {
  match start {
    Some(start) if at < start => start,
    _ => at,
  }
}
