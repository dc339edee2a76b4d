/// Authentication module
///
/// Password hashing, access token signing and verification, refresh token
/// rotation, login/registration and the per-request access guard.

mod claims;
mod clock;
mod guard;
mod issuer;
mod jwt;
mod password;
mod refresh_token;

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::configuration::{HashingSettings, JwtSettings};
use crate::error::AppError;
use crate::store::UserStore;

pub use claims::Claims;
pub use clock::{Clock, ManualClock, SystemClock};
pub use guard::{AccessGuard, AuthenticatedUser, GuardDecision, RouteAccess};
pub use issuer::{FederatedProfile, TokenIssuer};
pub use jwt::{AccessTokenCodec, BearerVerifier};
pub use password::CredentialHasher;
pub use refresh_token::{generate_refresh_token, hash_token, RefreshRotator};

/// Access token plus single-use refresh secret, handed to the caller once.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user_id: Uuid,
}

impl TokenPair {
    pub fn new(user_id: Uuid, access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            user_id,
        }
    }
}

/// The wired-up authentication core, shared by every request handler.
#[derive(Clone)]
pub struct AuthServices {
    pub issuer: Arc<TokenIssuer>,
    pub rotator: Arc<RefreshRotator>,
    pub guard: AccessGuard,
    pub store: Arc<dyn UserStore>,
}

impl AuthServices {
    /// # Errors
    /// `Hashing` if the configured bcrypt cost is rejected
    pub fn new(
        jwt: &JwtSettings,
        hashing: &HashingSettings,
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let codec = Arc::new(AccessTokenCodec::new(jwt, clock.clone()));
        let rotator = Arc::new(RefreshRotator::new(
            store.clone(),
            codec.clone(),
            clock,
            jwt.refresh_token_expiry,
        ));
        let hasher = CredentialHasher::new(hashing.cost)?;
        let issuer = Arc::new(TokenIssuer::new(store.clone(), hasher, rotator.clone()));

        Ok(Self {
            issuer,
            rotator,
            guard: AccessGuard::new(codec),
            store,
        })
    }
}
