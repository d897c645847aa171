//! Terminal handlers reached once the stage stack has passed.
//!
//! Handlers are thin: authorization already happened in the pipeline, so
//! they validate their own inputs, confirm that the records they touch sit
//! inside the authorized school, and talk to the directory.

pub mod auth;
pub mod classroom;
pub mod school;
pub mod student;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::auth::{PasswordHasher, Sha256PasswordHasher, TokenService};
use crate::authz::ResourceScope;
use crate::error::ApiError;
use crate::store::MemoryDirectory;
use crate::types::EntityId;

/// Input handed to a handler after the stack completes
#[derive(Debug, Clone, Default)]
pub struct HandlerCall {
    /// School the caller was confined to; `None` for superadmins and public routes
    pub scope: Option<ResourceScope>,
    /// Query string merged with the JSON body (body wins)
    pub params: Map<String, Value>,
}

impl HandlerCall {
    pub fn new(params: Map<String, Value>) -> Self {
        Self {
            scope: None,
            params,
        }
    }

    pub fn with_scope(mut self, scope: Option<ResourceScope>) -> Self {
        self.scope = scope;
        self
    }

    /// A record owned by `school` may only be touched when it lies inside
    /// the authorized scope
    pub fn ensure_in_scope(&self, school: &EntityId) -> Result<(), ApiError> {
        match &self.scope {
            Some(scope) if scope.school != *school => {
                tracing::warn!(
                    "Record of school {} is outside the authorized scope {}",
                    school,
                    scope
                );
                Err(ApiError::denied("Insufficient permissions for this school"))
            }
            _ => Ok(()),
        }
    }

    pub fn id(&self, name: &str) -> Option<EntityId> {
        self.params.get(name).and_then(EntityId::from_value)
    }

    pub fn required_id(&self, name: &str) -> Result<EntityId, ApiError> {
        self.id(name)
            .ok_or_else(|| ApiError::bad_request(format!("{} is required", name)))
    }

    pub fn required_str(&self, name: &str) -> Result<String, ApiError> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request(format!("{} is required", name)))
    }
}

/// Serialize a record for the success envelope
pub(crate) fn to_data<T: Serialize>(record: T) -> Result<Value, ApiError> {
    serde_json::to_value(record).map_err(|e| {
        tracing::error!("Failed to serialize handler result: {}", e);
        ApiError::UnexpectedFailure
    })
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError>;
}

/// `(module, function)` to handler
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every shipped handler, backed by one directory
    pub fn with_directory(directory: Arc<MemoryDirectory>, tokens: Arc<dyn TokenService>) -> Self {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Sha256PasswordHasher);
        Self::new()
            .register(
                "auth",
                "register",
                auth::Register::new(directory.clone(), tokens.clone(), hasher.clone()),
            )
            .register("auth", "login", auth::Login::new(directory.clone(), tokens, hasher))
            .register("school", "createSchool", school::CreateSchool::new(directory.clone()))
            .register("school", "getSchool", school::GetSchool::new(directory.clone()))
            .register("classroom", "createClassroom", classroom::CreateClassroom::new(directory.clone()))
            .register("classroom", "getClassroom", classroom::GetClassroom::new(directory.clone()))
            .register("student", "createStudent", student::CreateStudent::new(directory.clone()))
            .register("student", "getStudent", student::GetStudent::new(directory))
    }

    pub fn register(
        mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Self {
        self.handlers
            .insert((module.into(), function.into()), Arc::new(handler));
        self
    }

    pub fn resolve(&self, module: &str, function: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .get(&(module.to_string(), function.to_string()))
            .cloned()
    }

    /// Resolve and invoke; unknown functions are a 404
    pub async fn dispatch(&self, module: &str, function: &str, call: HandlerCall) -> Result<Value, ApiError> {
        match self.resolve(module, function) {
            Some(handler) => handler.call(call).await,
            None => Err(ApiError::not_found("Handler not found")),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self
            .handlers
            .keys()
            .map(|(m, func)| format!("{}.{}", m, func))
            .collect();
        routes.sort_unstable();
        f.debug_struct("HandlerRegistry").field("routes", &routes).finish()
    }
}
