use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::{TokenError, TokenService};
use crate::error::ApiError;
use crate::pipeline::{Flow, Stage, StageError, StageInput, StageResult};
use crate::store::AccountStore;
use crate::types::Principal;

/// Routes served without a bearer token, as `(module, function)`
pub const PUBLIC_ROUTES: &[(&str, &str)] = &[("auth", "register"), ("auth", "login")];

pub fn is_public_route(module: &str, function: &str) -> bool {
    PUBLIC_ROUTES
        .iter()
        .any(|(m, f)| *m == module && *f == function)
}

/// Recorded by the authentication stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Principal(Principal),
    /// The route needs no credentials
    PublicRoute,
}

/// Resolves the bearer token to a principal
pub struct AuthenticateStage {
    tokens: Arc<dyn TokenService>,
    accounts: Arc<dyn AccountStore>,
}

impl AuthenticateStage {
    pub fn new(tokens: Arc<dyn TokenService>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { tokens, accounts }
    }
}

#[async_trait]
impl Stage for AuthenticateStage {
    async fn execute(&self, input: StageInput<'_>) -> Result<Flow, StageError> {
        let request = input.request;

        if is_public_route(&request.module, &request.function) {
            tracing::debug!("{} is public, skipping authentication", request.path);
            return Ok(Flow::next(StageResult::Authenticated(AuthOutcome::PublicRoute)));
        }

        let header = match input.results.headers() {
            Some(snapshot) => snapshot.get("authorization"),
            None => request.header_str("authorization"),
        };

        let Some(token) = header.and_then(bearer_token) else {
            return Ok(Flow::end(ApiError::AuthHeaderMissing));
        };

        let claims = match self.tokens.verify(token).await {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                tracing::debug!("Rejected expired token on {}", request.path);
                return Ok(Flow::end(ApiError::TokenExpired));
            }
            Err(e) => {
                tracing::debug!("Rejected token on {}: {}", request.path, e);
                return Ok(Flow::end(ApiError::TokenInvalid));
            }
        };

        let Some(principal) = self.accounts.find_principal(&claims.user_id).await? else {
            tracing::warn!("Token for unknown user {} ({})", claims.user_id, claims.user_key);
            return Ok(Flow::end(ApiError::PrincipalNotFound));
        };

        tracing::debug!(
            "Authenticated {} as {} on {}",
            claims.user_key,
            principal.role(),
            request.path
        );
        Ok(Flow::next(StageResult::Authenticated(AuthOutcome::Principal(principal))))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
