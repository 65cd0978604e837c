use serde::{Deserialize, Serialize};

use crate::step::StepDef;

/// Steps run after the main DAG reaches a terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerOn {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exit: Option<StepDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub success: Option<StepDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure: Option<StepDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cancel: Option<StepDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Steps in definition order. Node statuses are paired with these by index.
  #[serde(default)]
  pub steps: Vec<StepDef>,
  #[serde(default)]
  pub handler_on: HandlerOn,
  /// Parameters used when a run is started without explicit ones.
  #[serde(default)]
  pub default_params: String,
}

impl WorkflowDef {
  /// Get a step by name.
  pub fn get_step(&self, name: &str) -> Option<&StepDef> {
    self.steps.iter().find(|s| s.name == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_definition() {
    let def: WorkflowDef = serde_json::from_str(r#"{"name": "backup"}"#).unwrap();
    assert_eq!(def.name, "backup");
    assert!(def.steps.is_empty());
    assert_eq!(def.handler_on, HandlerOn::default());
  }

  #[test]
  fn test_steps_keep_order() {
    let def: WorkflowDef = serde_json::from_str(
      r#"{
        "name": "etl",
        "steps": [
          {"name": "extract", "command": "extract.sh"},
          {"name": "transform", "command": "transform.sh", "depends": ["extract"]},
          {"name": "load", "command": "load.sh", "args": ["--fast"], "depends": ["transform"]}
        ],
        "handler_on": {"failure": {"name": "notify", "command": "notify.sh"}}
      }"#,
    )
    .unwrap();

    let names: Vec<_> = def.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["extract", "transform", "load"]);
    assert_eq!(def.get_step("load").unwrap().args, vec!["--fast"]);
    assert_eq!(def.handler_on.failure.as_ref().unwrap().name, "notify");
    assert!(def.handler_on.exit.is_none());
  }

  #[test]
  fn test_step_requires_name() {
    let result: Result<StepDef, _> = serde_json::from_str(r#"{"command": "echo 1"}"#);
    assert!(result.is_err());
  }
}
