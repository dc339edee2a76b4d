/// JWT Claims structure
///
/// Payload of an access token. Never persisted; only the signature, issuer and
/// expiry are needed to trust it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity ID as UUID string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create claims for `user_id`, issued at `issued_at` and valid for `expiry_seconds`.
    pub fn new(user_id: Uuid, issued_at: i64, expiry_seconds: i64, issuer: String) -> Self {
        Self {
            sub: user_id.to_string(),
            exp: issued_at + expiry_seconds,
            iat: issued_at,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// `TokenInvalid` if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }

    /// Expired from the instant `exp` is reached
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}
