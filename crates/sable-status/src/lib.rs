//! Sable Status
//!
//! This crate provides the run status model for Sable workflow executions:
//!
//! - [`Pid`]: the owning process of a run, with a "not running" sentinel
//! - [`NodeStatus`]: the execution record of one step
//! - [`RunStatus`]: the execution record of one workflow run attempt
//!
//! A run status is a passive value. The execution engine owns it while a run
//! is in progress (directly, or through a [`StatusRecorder`]), snapshots are
//! appended to a [`StatusFile`] as JSON lines, and after a restart
//! [`load_status`] reads the latest snapshot back and reconciles any run that
//! still claims to be running against the liveness of its owning process.

mod codec;
mod error;
mod liveness;
mod node;
mod pid;
mod recorder;
mod recovery;
mod status;
mod store;

pub use codec::{TIME_EMPTY, TIME_FORMAT, deserialize, format_time, parse_time, serialize};
pub use error::{StatusError, StoreError};
pub use liveness::{Liveness, ProcessTable};
pub use node::{NodeState, NodeStatus};
pub use pid::Pid;
pub use recorder::{RecorderHandle, StatusRecorder, StatusUpdate};
pub use status::{RunState, RunStatus};
pub use store::{StatusFile, load_status, load_status_with, valid_filename};
