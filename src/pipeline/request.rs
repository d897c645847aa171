use axum::http::{HeaderMap, Method};
use serde_json::{Map, Value};
use std::net::IpAddr;

/// Transport-neutral view of one `/api/:moduleName/:fnName` call
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub method: Method,
    pub path: String,
    pub module: String,
    pub function: String,
    pub headers: HeaderMap,
    pub query: Map<String, Value>,
    pub body: Value,
    /// Parse error of a non-empty body that was not JSON. The stack still
    /// runs; the request is rejected only once it reaches a handler.
    pub body_error: Option<String>,
    pub remote_addr: Option<IpAddr>,
    /// Message of the error that terminated the stack, if any
    pub stack_error: Option<String>,
}

impl PipelineRequest {
    pub fn new(method: Method, module: impl Into<String>, function: impl Into<String>) -> Self {
        let module = module.into();
        let function = function.into();
        let path = format!("/api/{}/{}", module, function);

        Self {
            method,
            path,
            module,
            function,
            headers: HeaderMap::new(),
            query: Map::new(),
            body: Value::Null,
            body_error: None,
            remote_addr: None,
            stack_error: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_malformed_body(mut self, error: impl Into<String>) -> Self {
        self.body = Value::Null;
        self.body_error = Some(error.into());
        self
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Look up a request parameter, body first, then query string.
    /// Blank values (`null`, `false`, whitespace-only strings) count as absent.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.body
            .get(name)
            .filter(|v| is_present(v))
            .or_else(|| self.query.get(name).filter(|v| is_present(v)))
    }

    /// Body and query merged into one object; present body values win
    pub fn params(&self) -> Map<String, Value> {
        let mut merged = self.query.clone();
        if let Value::Object(body) = &self.body {
            for (key, value) in body {
                if is_present(value) || !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}
