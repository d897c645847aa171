use axum::http::Method;
use serde::Serialize;
use std::fmt;

use crate::pipeline::PipelineRequest;
use crate::types::{EntityId, ResourceModule};

/// Verb-level action being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD => Some(Action::Read),
            Method::POST => Some(Action::Create),
            Method::PUT | Method::PATCH => Some(Action::Update),
            Method::DELETE => Some(Action::Delete),
            _ => None,
        }
    }
}

/// Scope identifiers supplied by the caller, normalized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeParams {
    pub school_id: Option<EntityId>,
    pub classroom_id: Option<EntityId>,
    pub student_id: Option<EntityId>,
}

impl ScopeParams {
    pub fn from_request(request: &PipelineRequest) -> Self {
        let id = |name: &str| request.param(name).and_then(EntityId::from_value);
        Self {
            school_id: id("schoolId"),
            classroom_id: id("classroomId"),
            student_id: id("studentId"),
        }
    }
}

/// What a request acts upon: `school[.classroom[.student]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceScope {
    pub module: ResourceModule,
    pub school: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<EntityId>,
}

impl ResourceScope {
    pub fn new(module: ResourceModule, school: EntityId, params: &ScopeParams) -> Self {
        Self {
            module,
            school,
            classroom: params.classroom_id.clone(),
            student: params.student_id.clone(),
        }
    }

    /// Hierarchy layer of the target module
    pub fn layer(&self) -> &'static str {
        match self.module {
            ResourceModule::School => "school",
            ResourceModule::Classroom => "school.classroom",
            ResourceModule::Student => "school.classroom.student",
        }
    }

    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.school)?;
        if let Some(classroom) = &self.classroom {
            write!(f, ".{}", classroom)?;
        }
        if let Some(student) = &self.student {
            write!(f, ".{}", student)?;
        }
        Ok(())
    }
}
