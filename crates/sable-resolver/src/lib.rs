//! Sable Resolver
//!
//! Materializes configuration strings at run time. Resolution happens in two
//! passes:
//!
//! 1. Environment expansion: `${NAME}` and `$NAME` are replaced with the
//!    variable's value, or with nothing when it is unset.
//! 2. Command substitution: every `` `program args...` `` span is executed
//!    and replaced with its trimmed standard output.
//!
//! ```text
//! "build-`date +%Y`-$USER"  ->  "build-2024-ci"
//! ```
//!
//! Commands are split on spaces without any shell quoting, and run without a
//! timeout unless the runner is given one.

mod command;
mod env;
mod error;
mod resolver;

pub use command::{CommandRunner, SystemRunner, split_command, substitute_commands};
pub use env::{Environment, ProcessEnv, expand_environment};
pub use error::{CommandError, ResolveError};
pub use resolver::{Resolver, StandardResolver, resolve_variable};
