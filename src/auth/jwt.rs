/// JWT Token Generation and Validation
///
/// `AccessTokenCodec` signs and verifies short-lived HS256 access tokens.
/// Verification is stateless: signature, issuer and expiry only.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";

/// What the access guard needs from a token verifier.
pub trait BearerVerifier: Send + Sync {
    /// Pull the token out of an `Authorization` header value.
    fn extract_token<'a>(&self, authorization: &'a str) -> Option<&'a str> {
        authorization
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    fn verify_token(&self, token: &str) -> Result<Uuid, AuthError>;
}

/// Signs and verifies access tokens with the process-wide secret.
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl AccessTokenCodec {
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked against our own clock with no leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            ttl_seconds: config.access_token_expiry,
            clock,
        }
    }

    /// Access token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue an access token with the configured lifetime.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        self.issue_with_ttl(user_id, self.ttl_seconds)
    }

    /// Issue an access token valid for `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue_with_ttl(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String, AppError> {
        let claims = Claims::new(
            user_id,
            self.clock.now().timestamp(),
            ttl_seconds,
            self.issuer.clone(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    /// - `TokenExpired` for a well-formed, correctly signed token past `exp`
    /// - `TokenInvalid` for anything else
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!(error = %e, "JWT validation error");
                    AuthError::TokenInvalid
                }
            })?;

        if claims.is_expired_at(self.clock.now().timestamp()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

impl BearerVerifier for AccessTokenCodec {
    fn verify_token(&self, token: &str) -> Result<Uuid, AuthError> {
        self.verify(token)?.user_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::{ManualClock, SystemClock};
    use chrono::{Duration, TimeZone, Utc};

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn codec() -> AccessTokenCodec {
        AccessTokenCodec::new(&get_test_config(), Arc::new(SystemClock))
    }

    #[test]
    fn test_generate_and_validate_token() {
        let codec = codec();
        let user_id = Uuid::new_v4();

        let token = codec.issue(user_id).expect("Failed to generate token");
        let claims = codec.verify(&token).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(codec.verify_token(&token), Ok(user_id));
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(
            codec().verify("invalid.token.here"),
            Err(AuthError::TokenInvalid)
        );
    }

    #[test]
    fn test_tampered_token() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).expect("Failed to generate token");

        let tampered = format!("{}X", token);
        assert_eq!(codec.verify(&tampered), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_secret() {
        let token = codec().issue(Uuid::new_v4()).expect("Failed to generate token");

        let mut other = get_test_config();
        other.secret = "another-secret-key-at-least-32-characters".to_string();
        let other = AccessTokenCodec::new(&other, Arc::new(SystemClock));

        assert_eq!(other.verify(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = codec().issue(Uuid::new_v4()).expect("Failed to generate token");

        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let other = AccessTokenCodec::new(&config, Arc::new(SystemClock));

        assert_eq!(other.verify(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_expiry_is_exact_and_distinguishable() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let codec = AccessTokenCodec::new(&get_test_config(), clock.clone());
        let user_id = Uuid::new_v4();

        let token = codec.issue_with_ttl(user_id, 60).expect("Failed to generate token");

        clock.set(start + Duration::seconds(59));
        assert_eq!(codec.verify_token(&token), Ok(user_id));

        clock.set(start + Duration::seconds(60));
        assert_eq!(codec.verify_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let config = get_test_config();
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            exp: Utc::now().timestamp() + 600,
            iat: Utc::now().timestamp(),
            iss: config.issuer.clone(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec().verify_token(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_extract_bearer_token() {
        let codec = codec();

        assert_eq!(codec.extract_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(codec.extract_token("Bearer "), None);
        assert_eq!(codec.extract_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(codec.extract_token("abc.def.ghi"), None);
    }
}
