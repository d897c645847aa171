//! Public account endpoints: `auth.register` and `auth.login`.
//!
//! Both run on the public stack and answer with a long token for the
//! protected routes.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{Handler, HandlerCall};
use crate::auth::{PasswordHasher, TokenService};
use crate::error::ApiError;
use crate::store::{AccountProfile, MemoryDirectory, NewAccount};
use crate::types::{EntityId, Role};

fn issue_long_token(tokens: &dyn TokenService, profile: &AccountProfile) -> Result<String, ApiError> {
    tokens.issue(&profile.id, &profile.username).map_err(|e| {
        tracing::error!("Failed to issue token for {}: {}", profile.id, e);
        ApiError::UnexpectedFailure
    })
}

/// POST /api/auth/register
///
/// Takes `username`, `password`, `email`, `role` and, for a `schoolAdmin`,
/// the `schoolId` of an existing school. Only the first superadmin can be
/// registered this way.
pub struct Register {
    directory: Arc<MemoryDirectory>,
    tokens: Arc<dyn TokenService>,
    hasher: Arc<dyn PasswordHasher>,
}

impl Register {
    pub fn new(
        directory: Arc<MemoryDirectory>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            directory,
            tokens,
            hasher,
        }
    }
}

#[async_trait]
impl Handler for Register {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let username = call.required_str("username")?;
        let password = call.required_str("password")?;
        let email = call.required_str("email")?;
        let role = match call.required_str("role")?.as_str() {
            "superadmin" => Role::Superadmin,
            "schoolAdmin" => Role::SchoolAdmin,
            _ => return Err(ApiError::bad_request("Invalid role")),
        };
        let school_id: Option<EntityId> = match role {
            Role::SchoolAdmin => call.id("schoolId"),
            Role::Superadmin => None,
        };

        let profile = self
            .directory
            .register_account(NewAccount {
                username,
                email,
                password_hash: self.hasher.hash(&password),
                role,
                school_id,
            })
            .await?;
        tracing::info!("Registered {} '{}' ({})", profile.role, profile.username, profile.id);

        let long_token = issue_long_token(self.tokens.as_ref(), &profile)?;
        Ok(json!({
            "message": "User registered successfully",
            "user": profile,
            "longToken": long_token,
        }))
    }
}

/// POST /api/auth/login
pub struct Login {
    directory: Arc<MemoryDirectory>,
    tokens: Arc<dyn TokenService>,
    hasher: Arc<dyn PasswordHasher>,
}

impl Login {
    pub fn new(
        directory: Arc<MemoryDirectory>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            directory,
            tokens,
            hasher,
        }
    }
}

#[async_trait]
impl Handler for Login {
    async fn call(&self, call: HandlerCall) -> Result<Value, ApiError> {
        let username = call.required_str("username")?;
        let password = call.required_str("password")?;

        // Unknown user and wrong password answer the same way
        let credentials = match self.directory.credentials(&username).await {
            Some(credentials) if self.hasher.verify(&password, &credentials.password_hash) => {
                credentials
            }
            _ => {
                tracing::warn!("Failed login for '{}'", username);
                return Err(ApiError::InvalidCredentials);
            }
        };

        let long_token = issue_long_token(self.tokens.as_ref(), &credentials.profile)?;
        Ok(json!({
            "message": "Login successful",
            "user": credentials.profile,
            "longToken": long_token,
        }))
    }
}
