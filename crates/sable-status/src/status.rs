use std::fmt;

use chrono::{DateTime, Utc};
use sable_config::{StepDef, WorkflowDef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::{NodeStatus, not_before};
use crate::pid::Pid;

/// Overall state of a workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  #[default]
  NotStarted,
  Running,
  Error,
  Cancelled,
  Success,
  /// Finished with some steps failed but the workflow allowed to continue.
  PartialSuccess,
}

impl RunState {
  pub fn is_finished(self) -> bool {
    !matches!(self, RunState::NotStarted | RunState::Running)
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      RunState::NotStarted => "not started",
      RunState::Running => "running",
      RunState::Error => "failed",
      RunState::Cancelled => "canceled",
      RunState::Success => "finished",
      RunState::PartialSuccess => "partially finished",
    };
    f.write_str(text)
  }
}

/// Execution record of one workflow run attempt.
///
/// `nodes` pairs index for index with the definition's steps. The record is a
/// plain value: it has one owner at a time and no internal locking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
  #[serde(default)]
  pub request_id: String,
  pub name: String,
  pub nodes: Vec<NodeStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_exit: Option<NodeStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_success: Option<NodeStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_failure: Option<NodeStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_cancel: Option<NodeStatus>,
  /// The process that owns this run.
  pub pid: Pid,
  pub status: RunState,
  /// Read position in the run's log.
  #[serde(default)]
  pub log_offset: u64,
  #[serde(with = "crate::codec::optional_time")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(with = "crate::codec::optional_time")]
  pub finished_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub params: String,
}

impl RunStatus {
  /// Build a fresh status for a run of `definition`.
  ///
  /// Every node starts out not started, whatever `prior` recorded. `prior`
  /// only carries the run parameters forward; without it the definition's
  /// default parameters are used.
  pub fn new(
    definition: &WorkflowDef,
    prior: Option<&RunStatus>,
    status: RunState,
    pid: Pid,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
  ) -> Self {
    let handler = |step: &Option<StepDef>| step.clone().map(NodeStatus::new);
    let params = match prior {
      Some(prior) => prior.params.clone(),
      None => definition.default_params.clone(),
    };

    Self {
      request_id: Uuid::new_v4().to_string(),
      name: definition.name.clone(),
      nodes: definition
        .steps
        .iter()
        .cloned()
        .map(NodeStatus::new)
        .collect(),
      on_exit: handler(&definition.handler_on.exit),
      on_success: handler(&definition.handler_on.success),
      on_failure: handler(&definition.handler_on.failure),
      on_cancel: handler(&definition.handler_on.cancel),
      pid,
      status,
      log_offset: 0,
      started_at,
      finished_at: finished_at.map(|at| not_before(started_at, at)),
      params,
    }
  }

  pub fn with_log_offset(mut self, log_offset: u64) -> Self {
    self.log_offset = log_offset;
    self
  }

  /// Get a node by step name.
  pub fn node(&self, name: &str) -> Option<&NodeStatus> {
    self.nodes.iter().find(|n| n.name() == name)
  }

  /// Get a mutable node by step name.
  pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeStatus> {
    self.nodes.iter_mut().find(|n| n.name() == name)
  }

  /// Handler nodes that are defined, in exit, success, failure, cancel order.
  pub fn handler_nodes(&self) -> impl Iterator<Item = &NodeStatus> {
    [
      &self.on_exit,
      &self.on_success,
      &self.on_failure,
      &self.on_cancel,
    ]
    .into_iter()
    .flatten()
  }

  /// Step nodes followed by the defined handler nodes, mutably.
  pub fn all_nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeStatus> {
    let handlers = [
      &mut self.on_exit,
      &mut self.on_success,
      &mut self.on_failure,
      &mut self.on_cancel,
    ];
    self.nodes.iter_mut().chain(handlers.into_iter().flatten())
  }

  /// Mark the run as started by `pid` at `at`.
  pub fn start(&mut self, pid: Pid, at: DateTime<Utc>) {
    self.pid = pid;
    self.status = RunState::Running;
    self.started_at = Some(at);
    self.finished_at = None;
  }

  /// Mark the run as finished in `status`.
  ///
  /// The finish time is never earlier than the start time.
  pub fn finish(&mut self, status: RunState, at: DateTime<Utc>) {
    self.status = status;
    self.finished_at = Some(not_before(self.started_at, at));
  }

  pub fn is_running(&self) -> bool {
    self.status == RunState::Running
  }
}
