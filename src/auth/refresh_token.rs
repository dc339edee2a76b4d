/// Refresh Token Management
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character strings
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: every refresh rotates the secret
/// - Bound to one active session per identity
///
/// Presenting anything but the current secret is treated as theft: the whole
/// session is revoked and the identity has to log in again. Losing a rotation
/// race is indistinguishable from that and handled the same way.

use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::jwt::AccessTokenCodec;
use crate::auth::TokenPair;
use crate::error::{AppError, AuthError};
use crate::store::{RefreshSession, SessionState, UserStore};

const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new cryptographically secure refresh token
///
/// The token is returned in plaintext (this is what the client stores).
/// The server stores only the SHA-256 hash.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Validates presented refresh secrets and rotates them.
pub struct RefreshRotator {
    store: Arc<dyn UserStore>,
    codec: Arc<AccessTokenCodec>,
    clock: Arc<dyn Clock>,
    validity: Duration,
}

impl RefreshRotator {
    pub fn new(
        store: Arc<dyn UserStore>,
        codec: Arc<AccessTokenCodec>,
        clock: Arc<dyn Clock>,
        validity_seconds: i64,
    ) -> Self {
        Self {
            store,
            codec,
            clock,
            validity: Duration::seconds(validity_seconds),
        }
    }

    /// A fresh secret and the session record that will accept it.
    fn mint_session(&self) -> (String, RefreshSession) {
        let secret = generate_refresh_token();
        let session = RefreshSession {
            refresh_token_hash: hash_token(&secret),
            refresh_token_expires_at: self.clock.now() + self.validity,
        };
        (secret, session)
    }

    fn token_pair(&self, user_id: Uuid, refresh_token: String) -> Result<TokenPair, AppError> {
        Ok(TokenPair::new(
            user_id,
            self.codec.issue(user_id)?,
            refresh_token,
            self.codec.ttl_seconds(),
        ))
    }

    /// Start a new session after a successful login, replacing any prior one.
    pub async fn start_session(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let (secret, session) = self.mint_session();
        self.store
            .store_session(user_id, &SessionState::Active(session))
            .await?;

        tracing::debug!(user_id = %user_id, "Refresh session started");
        self.token_pair(user_id, secret)
    }

    /// Exchange the current refresh secret for a new token pair.
    ///
    /// # Errors
    /// - `NoActiveSession` if the identity has no session
    /// - `SessionExpired` if the session outlived its validity (it is cleared)
    /// - `RefreshTokenReused` if the secret is not the current one, the session
    ///   was already revoked, or a concurrent rotation won (the session is revoked)
    pub async fn rotate(&self, user_id: Uuid, presented: &str) -> Result<TokenPair, AppError> {
        let current = self.store.load_session(user_id).await?;

        let session = match &current {
            SessionState::Absent => return Err(AuthError::NoActiveSession.into()),
            SessionState::Revoked { .. } => {
                tracing::warn!(
                    user_id = %user_id,
                    reason = "session_revoked",
                    "Refresh attempted on revoked session"
                );
                return Err(AuthError::RefreshTokenReused.into());
            }
            SessionState::Active(session) => session,
        };

        if session.refresh_token_expires_at <= self.clock.now() {
            // Only clear the record we looked at; a concurrent login must survive
            self.store
                .cas_session(user_id, &current, &SessionState::Absent)
                .await?;
            tracing::info!(user_id = %user_id, "Refresh session expired");
            return Err(AuthError::SessionExpired.into());
        }

        let presented_hash = hash_token(presented);
        if !constant_time_eq(
            presented_hash.as_bytes(),
            session.refresh_token_hash.as_bytes(),
        ) {
            return Err(self.revoke_for_reuse(user_id, "secret_mismatch").await);
        }

        let (secret, next) = self.mint_session();
        let swapped = self
            .store
            .cas_session(user_id, &current, &SessionState::Active(next))
            .await?;
        if !swapped {
            return Err(self.revoke_for_reuse(user_id, "lost_rotation_race").await);
        }

        tracing::info!(user_id = %user_id, "Refresh token rotated");
        self.token_pair(user_id, secret)
    }

    /// End the session (logout). Idempotent.
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store
            .store_session(user_id, &SessionState::Absent)
            .await?;
        tracing::info!(user_id = %user_id, "Refresh session revoked");
        Ok(())
    }

    /// Revoke the whole session and produce the error to return.
    async fn revoke_for_reuse(&self, user_id: Uuid, reason: &'static str) -> AppError {
        let revoked = SessionState::Revoked {
            revoked_at: self.clock.now(),
        };

        match self.store.store_session(user_id, &revoked).await {
            Ok(()) => {
                tracing::warn!(
                    user_id = %user_id,
                    reason = reason,
                    "Refresh token reuse detected, session revoked"
                );
                AuthError::RefreshTokenReused.into()
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    reason = reason,
                    error = %e,
                    "Failed to revoke session after refresh token reuse"
                );
                e
            }
        }
    }
}
