use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{to_data, Handler, HandlerCall};
use crate::error::ApiError;
use crate::store::MemoryDirectory;

/// POST /api/school/createSchool
pub struct CreateSchool {
    directory: Arc<MemoryDirectory>,
}

impl CreateSchool {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Handler for CreateSchool {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let name = call.required_str("name")?;
        let school = self.directory.add_school(name).await;
        tracing::info!("Created school {} ({})", school.id, school.name);
        to_data(school)
    }
}

/// GET /api/school/getSchool
pub struct GetSchool {
    directory: Arc<MemoryDirectory>,
}

impl GetSchool {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Handler for GetSchool {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let id = call.required_id("schoolId")?;
        match self.directory.school(&id).await {
            Some(school) => {
                call.ensure_in_scope(&school.id)?;
                to_data(school)
            }
            None => Err(ApiError::not_found("School not found")),
        }
    }
}
