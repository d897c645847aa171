use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{to_data, Handler, HandlerCall};
use crate::error::ApiError;
use crate::store::MemoryDirectory;

/// POST /api/classroom/createClassroom
pub struct CreateClassroom {
    directory: Arc<MemoryDirectory>,
}

impl CreateClassroom {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Handler for CreateClassroom {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let school_id = call.required_id("schoolId")?;
        let name = call.required_str("name")?;
        call.ensure_in_scope(&school_id)?;

        let classroom = self.directory.add_classroom(&school_id, name).await?;
        tracing::info!("Created classroom {} in school {}", classroom.id, school_id);
        to_data(classroom)
    }
}

/// GET /api/classroom/getClassroom
pub struct GetClassroom {
    directory: Arc<MemoryDirectory>,
}

impl GetClassroom {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Handler for GetClassroom {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let id = call.required_id("classroomId")?;
        let classroom = self
            .directory
            .classroom(&id)
            .await
            .ok_or_else(|| ApiError::not_found("Classroom not found"))?;
        call.ensure_in_scope(&classroom.school_id)?;
        to_data(classroom)
    }
}
