/// Per-request access gate.
///
/// `Unchecked -> {Public, Verified, Rejected}`. The routing layer decides
/// whether an operation is public and passes that in; the guard never looks
/// anything up beyond verifying the bearer token.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::BearerVerifier;
use crate::error::AuthError;

/// Declared by the routing layer for each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Protected,
}

/// Identity attached to a verified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Public operation, no identity attached.
    Public,
    Verified(AuthenticatedUser),
}

#[derive(Clone)]
pub struct AccessGuard {
    verifier: Arc<dyn BearerVerifier>,
}

impl AccessGuard {
    pub fn new(verifier: Arc<dyn BearerVerifier>) -> Self {
        Self { verifier }
    }

    /// Decide a request from its declared access and `Authorization` header.
    ///
    /// Every rejection is `Unauthenticated`; the underlying reason is only logged.
    pub fn check(
        &self,
        access: RouteAccess,
        authorization: Option<&str>,
    ) -> Result<GuardDecision, AuthError> {
        if access == RouteAccess::Public {
            return Ok(GuardDecision::Public);
        }

        let token = authorization
            .and_then(|header| self.verifier.extract_token(header))
            .ok_or_else(|| {
                tracing::debug!(reason = "missing_bearer_token", "Request rejected");
                AuthError::Unauthenticated
            })?;

        let user_id = self.authorize(token)?;
        Ok(GuardDecision::Verified(AuthenticatedUser { user_id }))
    }

    /// Verify a bare access token and return its identity.
    pub fn authorize(&self, token: &str) -> Result<Uuid, AuthError> {
        self.verifier.verify_token(token).map_err(|e| {
            let reason = match e {
                AuthError::TokenExpired => "token_expired",
                _ => "token_invalid",
            };
            tracing::debug!(reason = reason, "Request rejected");
            AuthError::Unauthenticated
        })
    }
}
