use serde::{Deserialize, Serialize};

/// A single step of a workflow definition.
///
/// Only the static fields needed to run and display a step live here.
/// Command strings may contain `$VAR` references and backtick substitutions
/// which are expanded by the resolver at run time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDef {
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Working directory for the step's process.
  #[serde(default)]
  pub dir: String,
  #[serde(default)]
  pub command: String,
  #[serde(default)]
  pub args: Vec<String>,
  /// Names of steps that must finish before this one starts.
  #[serde(default)]
  pub depends: Vec<String>,
  /// Variable name the step's output is captured into.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
}

impl StepDef {
  /// Create a step with just a name and a command.
  pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      command: command.into(),
      ..Default::default()
    }
  }
}
