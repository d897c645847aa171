//! School-scoped authorization.
//!
//! Permission is always anchored at the school: classroom and student
//! requests inherit the school's ownership check. When the caller does not
//! name the school directly, it is derived from the classroom (preferred)
//! or the student, with at most one lookup per request. Every path that
//! cannot establish the scope denies.

pub mod policy;
pub mod scope;

use async_trait::async_trait;
use axum::http::Method;
use std::sync::Arc;

use crate::error::{ApiError, StoreError};
use crate::pipeline::PipelineRequest;
use crate::types::{EntityId, Principal, ResourceModule};

pub use policy::{PermissionService, SchoolScopePolicy};
pub use scope::{Action, ResourceScope, ScopeParams};

/// Finds the school that owns a child resource
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    async fn school_of_classroom(&self, classroom_id: &EntityId)
        -> Result<Option<EntityId>, StoreError>;

    async fn school_of_student(&self, student_id: &EntityId) -> Result<Option<EntityId>, StoreError>;
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Forbidden(String),
    ScopeUnresolved(String),
}

impl Denial {
    pub fn reason(&self) -> &str {
        match self {
            Denial::Forbidden(reason) | Denial::ScopeUnresolved(reason) => reason,
        }
    }

    pub fn to_error(&self) -> ApiError {
        match self {
            Denial::Forbidden(reason) => ApiError::denied(reason.as_str()),
            Denial::ScopeUnresolved(reason) => ApiError::scope_unresolved(reason.as_str()),
        }
    }
}

/// Outcome of one authorization check; never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub authorized: bool,
    pub scope: Option<ResourceScope>,
    pub denial: Option<Denial>,
}

impl AuthorizationDecision {
    pub fn allow(scope: Option<ResourceScope>) -> Self {
        Self {
            authorized: true,
            scope,
            denial: None,
        }
    }

    pub fn deny(denial: Denial) -> Self {
        Self {
            authorized: false,
            scope: None,
            denial: Some(denial),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        self.denial.as_ref().map(Denial::reason)
    }
}

/// The target of a request, as seen by the resolver
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub module: String,
    pub method: Method,
    pub params: ScopeParams,
}

impl AccessRequest {
    pub fn new(module: impl Into<String>, method: Method, params: ScopeParams) -> Self {
        Self {
            module: module.into(),
            method,
            params,
        }
    }

    pub fn from_request(request: &PipelineRequest) -> Self {
        Self::new(
            request.module.clone(),
            request.method.clone(),
            ScopeParams::from_request(request),
        )
    }
}

pub struct AuthorizationResolver {
    lookup: Arc<dyn ResourceLookup>,
    permissions: Arc<dyn PermissionService>,
}

impl AuthorizationResolver {
    pub fn new(lookup: Arc<dyn ResourceLookup>, permissions: Arc<dyn PermissionService>) -> Self {
        Self {
            lookup,
            permissions,
        }
    }

    pub async fn resolve(&self, principal: &Principal, request: &AccessRequest) -> AuthorizationDecision {
        if principal.is_superadmin() {
            return AuthorizationDecision::allow(None);
        }

        let Some(own_school) = principal.school_id() else {
            return AuthorizationDecision::deny(Denial::Forbidden(
                "School administrator is not assigned to a school".to_string(),
            ));
        };

        let Some(module) = ResourceModule::parse(&request.module) else {
            return AuthorizationDecision::deny(Denial::Forbidden(format!(
                "Unknown resource module '{}'",
                request.module
            )));
        };

        let Some(action) = Action::from_method(&request.method) else {
            return AuthorizationDecision::deny(Denial::Forbidden(format!(
                "Method {} is not permitted",
                request.method
            )));
        };

        let requested_school = match self.requested_school(&request.params).await {
            Ok(school) => school,
            Err(denial) => return AuthorizationDecision::deny(denial),
        };

        if requested_school != *own_school {
            tracing::warn!(
                "User {} of school {} denied access to school {}",
                principal.user_id(),
                own_school,
                requested_school
            );
            return AuthorizationDecision::deny(Denial::Forbidden(
                "Insufficient permissions for this school".to_string(),
            ));
        }

        let scope = ResourceScope::new(module, requested_school, &request.params);
        if !self.permissions.is_granted(principal, &scope, action).await {
            tracing::warn!(
                "User {} denied {:?} on {} ({})",
                principal.user_id(),
                action,
                scope,
                scope.layer()
            );
            return AuthorizationDecision::deny(Denial::Forbidden(
                "Insufficient permissions for this operation".to_string(),
            ));
        }

        AuthorizationDecision::allow(Some(scope))
    }

    /// School the request targets: explicit `schoolId`, else the owner of
    /// `classroomId`, else the owner of `studentId`
    async fn requested_school(&self, params: &ScopeParams) -> Result<EntityId, Denial> {
        if let Some(school_id) = &params.school_id {
            return Ok(school_id.clone());
        }

        if let Some(classroom_id) = &params.classroom_id {
            let found = self.lookup.school_of_classroom(classroom_id).await;
            return owning_school("Classroom", classroom_id, found);
        }

        if let Some(student_id) = &params.student_id {
            let found = self.lookup.school_of_student(student_id).await;
            return owning_school("Student", student_id, found);
        }

        Err(Denial::Forbidden("No school scope in request".to_string()))
    }
}

fn owning_school(
    kind: &str,
    id: &EntityId,
    found: Result<Option<EntityId>, StoreError>,
) -> Result<EntityId, Denial> {
    match found {
        Ok(Some(school)) => Ok(school),
        Ok(None) => Err(Denial::ScopeUnresolved(format!("{} {} not found", kind, id))),
        Err(e) => {
            tracing::warn!("{} lookup for {} failed, denying: {}", kind, id, e);
            Err(Denial::ScopeUnresolved(format!("{} scope could not be resolved", kind)))
        }
    }
}
