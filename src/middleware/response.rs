use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Response under construction while a request moves through the stack.
///
/// Stages may set headers at any point; the body is written exactly once,
/// by [`ResponseDispatcher`].
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
    sent: bool,
}

impl PipelineResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            sent: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn set_header(&mut self, name: HeaderName, value: impl ToString) {
        match HeaderValue::from_str(&value.to_string()) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => tracing::warn!("Dropping invalid value for header {}: {}", name, e),
        }
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for PipelineResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for PipelineResponse {
    fn into_response(self) -> Response {
        let body = self.body.unwrap_or_else(|| ApiError::UnexpectedFailure.to_json());
        let status = if self.sent {
            self.status
        } else {
            tracing::error!("Pipeline finished without writing a response");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, self.headers, Json(body)).into_response()
    }
}

/// Writes terminal envelopes onto a [`PipelineResponse`].
///
/// Success: `{ "ok": true, "data": ... }`. Errors use [`ApiError::to_json`].
/// Both return `false` without touching the response if it was already sent.
pub struct ResponseDispatcher;

impl ResponseDispatcher {
    pub fn dispatch_ok(res: &mut PipelineResponse, data: Value) -> bool {
        Self::write(res, StatusCode::OK, json!({ "ok": true, "data": data }))
    }

    pub fn dispatch_error(res: &mut PipelineResponse, error: &ApiError) -> bool {
        let status = StatusCode::from_u16(error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::write(res, status, error.to_json())
    }

    fn write(res: &mut PipelineResponse, status: StatusCode, body: Value) -> bool {
        if res.sent {
            return false;
        }
        res.status = status;
        res.body = Some(body);
        res.sent = true;
        true
    }
}
