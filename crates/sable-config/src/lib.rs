//! Sable Config
//!
//! This crate contains the serializable workflow definition types for Sable.
//! A definition is an ordered list of steps plus the handler steps that run
//! when a workflow exits, succeeds, fails or is cancelled.
//!
//! Definitions are produced by an external loader (JSON here, YAML elsewhere)
//! and consumed by:
//! - `sable-status`, which builds one node status per step, in step order
//! - `sable-resolver`, which materializes the step's command strings

mod step;
mod workflow;

pub use step::StepDef;
pub use workflow::{HandlerOn, WorkflowDef};
