use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{ApiError, StoreError};
use crate::middleware::response::PipelineResponse;
use crate::pipeline::context::{ExecutionContext, StageResult};
use crate::pipeline::request::PipelineRequest;

/// Closed set of stage identifiers. Names match the ones used in stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Device,
    Headers,
    Authenticate,
    RateLimit,
    Authorize,
}

impl StageId {
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Device => "__device",
            StageId::Headers => "__headers",
            StageId::Authenticate => "__authenticate",
            StageId::RateLimit => "__rateLimit",
            StageId::Authorize => "__authorize",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a stage asks the dispatcher to do next
#[derive(Debug, Clone)]
pub enum Flow {
    /// Record `result` and move forward `advance_by` positions
    Next { result: StageResult, advance_by: usize },
    /// Stop the stack and emit an error response (default "Unexpected Failure")
    End(Option<ApiError>),
}

impl Flow {
    pub fn next(result: StageResult) -> Self {
        Flow::Next {
            result,
            advance_by: 1,
        }
    }

    pub fn skip(result: StageResult, advance_by: usize) -> Self {
        Flow::Next { result, advance_by }
    }

    pub fn end(error: ApiError) -> Self {
        Flow::End(Some(error))
    }
}

/// Unexpected stage failure; the dispatcher turns it into a 500
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

/// Everything a stage may look at while it runs
pub struct StageInput<'a> {
    pub request: &'a PipelineRequest,
    pub response: &'a mut PipelineResponse,
    pub results: &'a ExecutionContext,
}

/// One named unit of request-pipeline work
#[async_trait]
pub trait Stage: Send + Sync {
    async fn execute(&self, input: StageInput<'_>) -> Result<Flow, StageError>;
}

/// Maps stage identifiers to their implementations
#[derive(Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: StageId, stage: impl Stage + 'static) -> Self {
        self.stages.insert(id, Arc::new(stage));
        self
    }

    pub fn resolve(&self, id: StageId) -> Option<Arc<dyn Stage>> {
        self.stages.get(&id).cloned()
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.stages.keys().map(StageId::name).collect();
        ids.sort_unstable();
        f.debug_struct("StageRegistry").field("stages", &ids).finish()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("stage stack is empty")]
    Empty,

    #[error("stage {0} appears more than once in the stack")]
    Duplicate(StageId),
}

/// Ordered, validated list of stages for one route class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack(Arc<[StageId]>);

impl Stack {
    pub fn new(stages: impl IntoIterator<Item = StageId>) -> Result<Self, StackError> {
        let stages: Vec<StageId> = stages.into_iter().collect();
        if stages.is_empty() {
            return Err(StackError::Empty);
        }
        for (i, id) in stages.iter().enumerate() {
            if stages[..i].contains(id) {
                return Err(StackError::Duplicate(*id));
            }
        }
        Ok(Self(stages.into()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<StageId> {
        self.0.get(index).copied()
    }

    pub fn ids(&self) -> &[StageId] {
        &self.0
    }
}
