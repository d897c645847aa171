use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::response::{PipelineResponse, ResponseDispatcher};
use crate::pipeline::context::{ExecutionContext, StageResult};
use crate::pipeline::request::PipelineRequest;
use crate::pipeline::stage::{Flow, Stack, StageInput, StageRegistry};

/// Terminal callback invoked once the whole stack has advanced
pub type OnDone = Box<
    dyn FnOnce(&PipelineRequest, &ExecutionContext) -> BoxFuture<'static, Result<Value, ApiError>>
        + Send,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoltState {
    Pending,
    Done,
    Errored,
}

/// Dispatcher that threads one request through a stack of stages.
///
/// States are `pending(index)`, `done` and `errored`; nothing leaves the two
/// terminal states. [`run`](Bolt::run) drives the loop, while
/// [`next`](Bolt::next) and [`end`](Bolt::end) are the only transitions.
pub struct Bolt {
    stack: Stack,
    registry: Arc<StageRegistry>,
    index: usize,
    state: BoltState,
    context: ExecutionContext,
    request: PipelineRequest,
    response: PipelineResponse,
    on_done: Option<OnDone>,
}

impl Bolt {
    pub fn new(stack: Stack, registry: Arc<StageRegistry>, request: PipelineRequest) -> Self {
        Self {
            stack,
            registry,
            index: 0,
            state: BoltState::Pending,
            context: ExecutionContext::new(),
            request,
            response: PipelineResponse::new(),
            on_done: None,
        }
    }

    pub fn on_done<F>(mut self, on_done: F) -> Self
    where
        F: FnOnce(&PipelineRequest, &ExecutionContext) -> BoxFuture<'static, Result<Value, ApiError>>
            + Send
            + 'static,
    {
        self.on_done = Some(Box::new(on_done));
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> BoltState {
        self.state
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn request(&self) -> &PipelineRequest {
        &self.request
    }

    pub fn response(&self) -> &PipelineResponse {
        &self.response
    }

    pub fn into_response(self) -> PipelineResponse {
        self.response
    }

    /// Execute stages until the stack is done or a stage ends it
    pub async fn run(&mut self) {
        while self.state == BoltState::Pending {
            let Some(id) = self.stack.get(self.index) else {
                self.finish().await;
                break;
            };

            let Some(stage) = self.registry.resolve(id) else {
                tracing::error!("Stage {} is in the stack but not registered", id);
                self.end(Some(ApiError::StageNotFound(id.name().to_string())));
                continue;
            };

            tracing::debug!("Running stage {} ({}/{})", id, self.index + 1, self.stack.len());

            let input = StageInput {
                request: &self.request,
                response: &mut self.response,
                results: &self.context,
            };
            let outcome = AssertUnwindSafe(stage.execute(input)).catch_unwind().await;

            match outcome {
                Ok(Ok(Flow::Next { result, advance_by })) => self.next(result, advance_by).await,
                Ok(Ok(Flow::End(error))) => self.end(error),
                Ok(Err(error)) => {
                    tracing::error!("Stage {} failed: {}", id, error);
                    self.end(Some(ApiError::execution_failed(error.to_string())));
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!("Stage {} panicked: {}", id, message);
                    self.end(Some(ApiError::execution_failed(message)));
                }
            }
        }
    }

    /// Record the current stage's result and advance. Passing the end of the
    /// stack completes the request through the `on_done` callback.
    pub async fn next(&mut self, result: StageResult, advance_by: usize) {
        if self.state != BoltState::Pending {
            tracing::warn!("next() ignored in terminal state {:?}", self.state);
            return;
        }

        if let Some(id) = self.stack.get(self.index) {
            self.context.record(id, result);
        }
        self.index += advance_by.max(1);

        if self.index >= self.stack.len() {
            self.finish().await;
        }
    }

    /// Terminate the stack with an error response
    pub fn end(&mut self, error: Option<ApiError>) {
        if self.state != BoltState::Pending {
            tracing::debug!("end() ignored in terminal state {:?}", self.state);
            return;
        }

        let error = error.unwrap_or(ApiError::UnexpectedFailure);
        tracing::debug!(
            "Stack ended at index {} for {} {}: {}",
            self.index,
            self.request.method,
            self.request.path,
            error
        );

        self.request.stack_error = Some(error.message());
        self.index += 1;
        self.state = BoltState::Errored;

        if !ResponseDispatcher::dispatch_error(&mut self.response, &error) {
            tracing::debug!("Response already sent, dropping error: {}", error);
        }
    }

    async fn finish(&mut self) {
        self.state = BoltState::Done;

        let outcome = match self.on_done.take() {
            Some(on_done) => on_done(&self.request, &self.context).await,
            None => Ok(Value::Null),
        };

        match outcome {
            Ok(data) => ResponseDispatcher::dispatch_ok(&mut self.response, data),
            Err(error) => ResponseDispatcher::dispatch_error(&mut self.response, &error),
        };
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".to_string()
    }
}
