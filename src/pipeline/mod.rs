//! Ordered stage execution for one request.
//!
//! A [`Bolt`] walks a validated [`Stack`] of stage identifiers, resolving each
//! through the [`StageRegistry`] and recording results in an
//! [`ExecutionContext`]. The first stage to end the stack writes the error
//! response; reaching the end runs the terminal handler.

pub mod bolt;
pub mod context;
pub mod request;
pub mod stage;

pub use bolt::{Bolt, BoltState, OnDone};
pub use context::{ExecutionContext, StageResult};
pub use request::PipelineRequest;
pub use stage::{Flow, Stack, StackError, Stage, StageError, StageId, StageInput, StageRegistry};
