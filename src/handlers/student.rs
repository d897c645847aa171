use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{to_data, Handler, HandlerCall};
use crate::error::ApiError;
use crate::store::MemoryDirectory;

/// POST /api/student/createStudent
///
/// Takes `schoolId` and/or `classroomId`; when a classroom is given the
/// student is enrolled in that classroom's school.
pub struct CreateStudent {
    directory: Arc<MemoryDirectory>,
}

impl CreateStudent {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Handler for CreateStudent {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let school_id = call.id("schoolId");
        let classroom_id = call.id("classroomId");
        let first_name = call.required_str("firstName")?;
        let last_name = call.required_str("lastName")?;

        if let Some(school_id) = &school_id {
            call.ensure_in_scope(school_id)?;
        }
        if let Some(id) = &classroom_id {
            if let Some(classroom) = self.directory.classroom(id).await {
                call.ensure_in_scope(&classroom.school_id)?;
            }
        }

        let student = self
            .directory
            .add_student(school_id.as_ref(), classroom_id.as_ref(), first_name, last_name)
            .await?;
        tracing::info!("Enrolled student {} in school {}", student.id, student.school_id);
        to_data(student)
    }
}

/// GET /api/student/getStudent
pub struct GetStudent {
    directory: Arc<MemoryDirectory>,
}

impl GetStudent {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Handler for GetStudent {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let id = call.required_id("studentId")?;
        let student = self
            .directory
            .student(&id)
            .await
            .ok_or_else(|| ApiError::not_found("Student not found"))?;
        call.ensure_in_scope(&student.school_id)?;
        to_data(student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{ResourceScope, ScopeParams};
    use crate::types::{EntityId, ResourceModule};
    use serde_json::json;

    fn call(params: Value) -> HandlerCall {
        HandlerCall::new(params.as_object().cloned().unwrap())
    }

    fn confined_to(school: &EntityId) -> Option<ResourceScope> {
        Some(ResourceScope::new(
            ResourceModule::Student,
            school.clone(),
            &ScopeParams::default(),
        ))
    }

    #[tokio::test]
    async fn enrolment_follows_the_classroom() {
        let dir = Arc::new(MemoryDirectory::new());
        let school = dir.add_school("North").await;
        let classroom = dir.add_classroom(&school.id, "1A").await.unwrap();

        let created = CreateStudent::new(dir.clone())
            .call(call(json!({
                "classroomId": classroom.id,
                "firstName": "Ada",
                "lastName": "Lovelace"
            })))
            .await
            .unwrap();
        assert_eq!(created["schoolId"], school.id.as_str());

        let fetched = GetStudent::new(dir)
            .call(call(json!({ "studentId": created["_id"] })))
            .await
            .unwrap();
        assert_eq!(fetched["firstName"], "Ada");
    }

    #[tokio::test]
    async fn placement_errors_are_bad_requests() {
        let dir = Arc::new(MemoryDirectory::new());
        let handler = CreateStudent::new(dir);

        let err = handler
            .call(call(json!({ "firstName": "Ada", "lastName": "Lovelace" })))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = handler
            .call(call(json!({ "schoolId": "s1" })))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::bad_request("firstName is required"));
    }

    #[tokio::test]
    async fn records_of_other_schools_stay_hidden() {
        let dir = Arc::new(MemoryDirectory::new());
        let north = dir.add_school("North").await;
        let south = dir.add_school("South").await;
        let classroom = dir.add_classroom(&north.id, "1A").await.unwrap();
        let student = dir
            .add_student(None, Some(&classroom.id), "Ada", "Lovelace")
            .await
            .unwrap();

        // Own schoolId next to a foreign studentId
        let err = GetStudent::new(dir.clone())
            .call(
                call(json!({ "schoolId": south.id, "studentId": student.id }))
                    .with_scope(confined_to(&south.id)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = CreateStudent::new(dir.clone())
            .call(
                call(json!({
                    "classroomId": classroom.id,
                    "firstName": "Grace",
                    "lastName": "Hopper"
                }))
                .with_scope(confined_to(&south.id)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let fetched = GetStudent::new(dir)
            .call(call(json!({ "studentId": student.id })).with_scope(confined_to(&north.id)))
            .await
            .unwrap();
        assert_eq!(fetched["schoolId"], north.id.as_str());
    }
}
