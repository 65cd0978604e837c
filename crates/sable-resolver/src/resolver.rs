use sable_config::StepDef;
use tracing::instrument;

use crate::command::{CommandRunner, SystemRunner, substitute_commands};
use crate::env::{Environment, ProcessEnv, expand_environment};
use crate::error::ResolveError;

/// Resolver materializes a raw configuration value.
pub trait Resolver {
  /// Resolve a raw value.
  ///
  /// This process:
  /// 1. Expands environment references
  /// 2. Runs every backtick span and substitutes its output
  fn resolve(&self, raw: &str) -> Result<String, ResolveError>;

  /// Resolve the run-time fields of a step: command, arguments and
  /// working directory.
  fn resolve_step(&self, step: &StepDef) -> Result<StepDef, ResolveError> {
    Ok(StepDef {
      command: self.resolve(&step.command)?,
      args: step
        .args
        .iter()
        .map(|arg| self.resolve(arg))
        .collect::<Result<_, _>>()?,
      dir: self.resolve(&step.dir)?,
      ..step.clone()
    })
  }
}

/// Standard resolver over an injected environment and command runner.
#[derive(Debug, Clone, Default)]
pub struct StandardResolver<E = ProcessEnv, R = SystemRunner> {
  env: E,
  runner: R,
}

impl StandardResolver {
  /// A resolver over the process environment and real subprocesses.
  pub fn system() -> Self {
    Self::default()
  }
}

impl<E: Environment, R: CommandRunner> StandardResolver<E, R> {
  /// Create a new resolver with the given environment and runner.
  pub fn new(env: E, runner: R) -> Self {
    Self { env, runner }
  }

  pub fn env(&self) -> &E {
    &self.env
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }
}

impl<E: Environment, R: CommandRunner> Resolver for StandardResolver<E, R> {
  #[instrument(name = "resolve_variable", skip(self), err)]
  fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
    let expanded = expand_environment(raw, &self.env);
    substitute_commands(&expanded, &self.runner)
  }
}

/// Resolve `raw` against the process environment, running substitutions as
/// real subprocesses without a timeout.
pub fn resolve_variable(raw: &str) -> Result<String, ResolveError> {
  StandardResolver::<ProcessEnv, SystemRunner>::system().resolve(raw)
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  /// Echoes the arguments of `echo`; anything else fails.
  struct EchoOnly;

  impl CommandRunner for EchoOnly {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ResolveError> {
      if program == "echo" {
        Ok(format!("{}\n", args.join(" ")))
      } else {
        Err(ResolveError::SubstitutionFailed {
          command: program.to_string(),
          source: crate::error::CommandError::Launch(std::io::Error::from(
            std::io::ErrorKind::NotFound,
          )),
        })
      }
    }
  }

  fn resolver() -> StandardResolver<HashMap<String, String>, EchoOnly> {
    let env = HashMap::from([
      ("NAME".to_string(), "world".to_string()),
      ("CMD".to_string(), "`echo injected`".to_string()),
    ]);
    StandardResolver::new(env, EchoOnly)
  }

  #[test]
  fn test_plain_value_is_unchanged() {
    assert_eq!(resolver().resolve("echo hi").unwrap(), "echo hi");
  }

  #[test]
  fn test_environment_then_commands() {
    assert_eq!(
      resolver().resolve("`echo hello $NAME`").unwrap(),
      "hello world"
    );
  }

  #[test]
  fn test_environment_values_are_substituted() {
    // Expansion happens first, so backticks from the environment run too.
    assert_eq!(resolver().resolve("x=$CMD").unwrap(), "x=injected");
  }

  #[test]
  fn test_failure_returns_no_partial_value() {
    let result = resolver().resolve("`echo ok` `false`");
    assert!(matches!(
      result,
      Err(ResolveError::SubstitutionFailed { ref command, .. }) if command == "false"
    ));
  }

  #[test]
  fn test_resolve_step() {
    let step = StepDef {
      name: "greet".to_string(),
      dir: "/tmp/$NAME".to_string(),
      command: "`echo printf`".to_string(),
      args: vec!["hello".to_string(), "$NAME".to_string()],
      depends: vec!["setup".to_string()],
      ..Default::default()
    };

    let resolved = resolver().resolve_step(&step).unwrap();
    assert_eq!(resolved.name, "greet");
    assert_eq!(resolved.dir, "/tmp/world");
    assert_eq!(resolved.command, "printf");
    assert_eq!(resolved.args, vec!["hello", "world"]);
    assert_eq!(resolved.depends, vec!["setup"]);
  }

  #[test]
  fn test_resolve_step_propagates_errors() {
    let step = StepDef::new("bad", "`missing-binary`");
    assert!(resolver().resolve_step(&step).is_err());
  }
}
