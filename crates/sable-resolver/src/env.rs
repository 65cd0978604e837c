use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Source of environment variables for expansion.
pub trait Environment {
  fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
  fn var(&self, name: &str) -> Option<String> {
    std::env::var(name).ok()
  }
}

impl Environment for HashMap<String, String> {
  fn var(&self, name: &str) -> Option<String> {
    self.get(name).cloned()
  }
}

impl<F> Environment for F
where
  F: Fn(&str) -> Option<String>,
{
  fn var(&self, name: &str) -> Option<String> {
    self(name)
  }
}

// A `$` reference follows shell rules: `${...}` up to the first `}`, a single
// special parameter or digit, or a run of alphanumerics. `${}` and an
// unterminated `${` are malformed and dropped.
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\$(?:\{([^}]*)\}|\{|([*#$@!?\-0-9])|([A-Za-z0-9_]+))")
    .expect("variable pattern is valid")
});

/// Replace `$` references with values from `env`.
///
/// Braced names may contain any character but `}`. After a bare `$`, one of
/// `*#$@!?-` or a digit is a one-character name; otherwise the name is the
/// longest run of letters, digits and `_`. Unset variables expand to an
/// empty string. A `$` followed by anything else, or at the end of the
/// value, is kept as is.
pub fn expand_environment<E>(value: &str, env: &E) -> String
where
  E: Environment + ?Sized,
{
  VARIABLE
    .replace_all(value, |caps: &Captures| {
      let name = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str());
      if name.is_empty() {
        return String::new();
      }
      env.var(name).unwrap_or_default()
    })
    .into_owned()
}
