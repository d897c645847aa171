use async_trait::async_trait;
use std::sync::Arc;

use crate::authz::{AccessRequest, AuthorizationDecision, AuthorizationResolver};
use crate::error::ApiError;
use crate::middleware::authenticate::AuthOutcome;
use crate::pipeline::{Flow, Stage, StageError, StageInput, StageResult};

/// Runs the authorization resolver against the authenticated principal
pub struct AuthorizeStage {
    resolver: Arc<AuthorizationResolver>,
}

impl AuthorizeStage {
    pub fn new(resolver: Arc<AuthorizationResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for AuthorizeStage {
    async fn execute(&self, input: StageInput<'_>) -> Result<Flow, StageError> {
        let principal = match input.results.authentication() {
            Some(AuthOutcome::Principal(principal)) => principal,
            Some(AuthOutcome::PublicRoute) => {
                return Ok(Flow::next(StageResult::Authorized(AuthorizationDecision::allow(None))));
            }
            None => return Ok(Flow::end(ApiError::AuthenticationRequired)),
        };

        let access = AccessRequest::from_request(input.request);
        let decision = self.resolver.resolve(principal, &access).await;

        match &decision.denial {
            None => {
                tracing::debug!(
                    "Authorized {} {} for {}",
                    access.method,
                    input.request.path,
                    principal.user_id()
                );
                Ok(Flow::next(StageResult::Authorized(decision)))
            }
            Some(denial) => Ok(Flow::end(denial.to_error())),
        }
    }
}
