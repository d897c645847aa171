use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ApiError, StoreError};
use crate::middleware::response::PipelineResponse;
use crate::pipeline::{Flow, PipelineRequest, Stage, StageError, StageInput, StageResult};
use crate::store::{CounterStore, WindowCount};

/// Rate limit header names
pub mod headers {
    use axum::http::HeaderName;

    /// Maximum requests allowed in the window
    pub const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
    /// Remaining requests in the current window
    pub const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
    /// Unix timestamp when the window resets
    pub const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
    /// Seconds to wait before retrying (on 429)
    pub const RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");
}

/// Recorded by the rate-limit stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Counted {
        limit: u64,
        remaining: u64,
        reset_at: i64,
    },
    /// The counter store failed and the request was let through
    Uncapped,
}

/// Fixed-window limit per caller ip, method and path
pub struct RateLimitStage {
    store: Arc<dyn CounterStore>,
    max_requests: u64,
    window: Duration,
}

impl RateLimitStage {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u64, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    pub fn key(ip: &str, request: &PipelineRequest) -> String {
        format!("ratelimit:{}:{}:{}", ip, request.method, request.path)
    }

    async fn check(
        &self,
        key: &str,
        response: &mut PipelineResponse,
    ) -> Result<Result<RateLimitOutcome, ApiError>, StoreError> {
        let current = self.store.get(key).await?;

        if let Some(window) = current.filter(|w| w.count >= self.max_requests) {
            let retry_after_secs = ceil_secs(window.resets_in).max(1);
            self.write_headers(response, 0, &window);
            response.set_header(headers::RETRY_AFTER, retry_after_secs);
            return Ok(Err(ApiError::RateLimitExceeded { retry_after_secs }));
        }

        let window = self.store.increment(key, self.window).await?;
        let remaining = self.max_requests.saturating_sub(window.count);
        let reset_at = self.write_headers(response, remaining, &window);

        Ok(Ok(RateLimitOutcome::Counted {
            limit: self.max_requests,
            remaining,
            reset_at,
        }))
    }

    fn write_headers(&self, response: &mut PipelineResponse, remaining: u64, window: &WindowCount) -> i64 {
        let reset_at = Utc::now().timestamp() + ceil_secs(window.resets_in) as i64;
        response.set_header(headers::LIMIT, self.max_requests);
        response.set_header(headers::REMAINING, remaining);
        response.set_header(headers::RESET, reset_at);
        reset_at
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    async fn execute(&self, input: StageInput<'_>) -> Result<Flow, StageError> {
        let ip = input.results.device().map(|d| d.ip.as_str()).unwrap_or("unknown");
        let key = Self::key(ip, input.request);

        match self.check(&key, input.response).await {
            Ok(Ok(outcome)) => Ok(Flow::next(StageResult::RateLimit(outcome))),
            Ok(Err(limited)) => {
                tracing::warn!("Rate limit exceeded for {}", key);
                Ok(Flow::end(limited))
            }
            Err(e) => {
                tracing::warn!("Rate limiting unavailable for {}, allowing request: {}", key, e);
                Ok(Flow::next(StageResult::RateLimit(RateLimitOutcome::Uncapped)))
            }
        }
    }
}
