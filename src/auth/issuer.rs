/// Login and registration.
///
/// Verifies credentials and hands off to the rotator to start a session.

use std::sync::Arc;

use crate::auth::password::CredentialHasher;
use crate::auth::refresh_token::RefreshRotator;
use crate::auth::TokenPair;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{normalize_email, AuthProvider, Identity, NewIdentity, UserStore};

/// An identity already verified by an external provider.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Provider tag, e.g. "google"
    pub provider: String,
}

pub struct TokenIssuer {
    store: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    rotator: Arc<RefreshRotator>,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: CredentialHasher,
        rotator: Arc<RefreshRotator>,
    ) -> Self {
        Self {
            store,
            hasher,
            rotator,
        }
    }

    /// Password login.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email, an account without a
    /// password, or a wrong password. The three cases are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let identity = self.store.find_by_email(&normalize_email(email)).await?;

        let verified = match identity
            .as_ref()
            .and_then(|i| i.password_hash.as_deref().map(|digest| (i, digest)))
        {
            Some((identity, digest)) => self
                .hasher
                .verify(password, digest)?
                .then_some(identity.id),
            None => {
                self.hasher.dummy_verify(password);
                None
            }
        };

        let Some(user_id) = verified else {
            tracing::warn!(reason = "invalid_credentials", "Login rejected");
            return Err(AuthError::InvalidCredentials.into());
        };

        let pair = self.rotator.start_session(user_id).await?;
        tracing::info!(user_id = %user_id, "User logged in");
        Ok(pair)
    }

    /// Login for an identity vouched for by an external provider.
    ///
    /// The identity is created on first sight, without a password.
    ///
    /// # Errors
    /// `Validation` if the provider tag is empty or the reserved `"local"` tag
    pub async fn login_federated(&self, profile: FederatedProfile) -> Result<TokenPair, AppError> {
        let provider = profile.provider.trim();
        if provider.is_empty() || provider.eq_ignore_ascii_case(AuthProvider::Local.as_str()) {
            return Err(ValidationError::InvalidFormat("provider").into());
        }

        let identity = match self.store.find_by_email(&profile.email).await? {
            Some(identity) => identity,
            None => self.create_federated(&profile).await?,
        };

        let pair = self.rotator.start_session(identity.id).await?;
        tracing::info!(
            user_id = %identity.id,
            provider = %profile.provider,
            "User logged in via external provider"
        );
        Ok(pair)
    }

    async fn create_federated(&self, profile: &FederatedProfile) -> Result<Identity, AppError> {
        let created = self
            .store
            .create(NewIdentity {
                email: profile.email.clone(),
                first_name: profile.first_name.clone(),
                last_name: profile.last_name.clone(),
                provider: AuthProvider::Federated(profile.provider.trim().to_string()),
                password_hash: None,
            })
            .await;

        match created {
            // Someone created it between our lookup and insert
            Err(AppError::Auth(AuthError::EmailAlreadyRegistered)) => self
                .store
                .find_by_email(&profile.email)
                .await?
                .ok_or_else(|| AppError::Internal("Identity vanished after conflict".to_string())),
            other => other,
        }
    }

    /// Create a local identity and log it in.
    ///
    /// # Errors
    /// `EmailAlreadyRegistered` if the email is taken
    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered.into());
        }

        let password_hash = self.hasher.hash(password)?;
        let identity = self
            .store
            .create(NewIdentity {
                email,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                provider: AuthProvider::Local,
                password_hash: Some(password_hash),
            })
            .await?;

        let pair = self.rotator.start_session(identity.id).await?;
        tracing::info!(user_id = %identity.id, "User registered");
        Ok(pair)
    }
}
