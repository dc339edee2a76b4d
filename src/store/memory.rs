use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{normalize_email, Identity, NewIdentity, SessionState};
use super::UserStore;
use crate::error::{AppError, AuthError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, Identity>,
    by_email: HashMap<String, Uuid>,
    sessions: HashMap<Uuid, SessionState>,
}

/// Process-local user store.
///
/// Every session compare-and-swap runs under the write lock, so at most one
/// of several concurrent swaps from the same expected state can succeed.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity, AppError> {
        let email = normalize_email(&identity.email);
        let mut inner = self.inner.write().await;

        if inner.by_email.contains_key(&email) {
            return Err(AuthError::EmailAlreadyRegistered.into());
        }

        let created = Identity {
            id: Uuid::new_v4(),
            email: email.clone(),
            first_name: identity.first_name,
            last_name: identity.last_name,
            provider: identity.provider,
            password_hash: identity.password_hash,
            created_at: Utc::now(),
        };
        inner.by_email.insert(email, created.id);
        inner.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn load_session(&self, id: Uuid) -> Result<SessionState, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn cas_session(
        &self,
        id: Uuid,
        expected: &SessionState,
        new: &SessionState,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Ok(false);
        }

        let current = inner.sessions.entry(id).or_default();
        if current != expected {
            return Ok(false);
        }
        *current = new.clone();
        Ok(true)
    }

    async fn store_session(&self, id: Uuid, new: &SessionState) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&id) {
            inner.sessions.insert(id, new.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AuthProvider, RefreshSession};

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity {
            email: email.to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            provider: AuthProvider::Local,
            password_hash: Some("$2b$04$placeholder".to_string()),
        }
    }

    fn active(hash: &str) -> SessionState {
        SessionState::Active(RefreshSession {
            refresh_token_hash: hash.to_string(),
            refresh_token_expires_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_identity("John@Example.com")).await.unwrap();

        let found = store.find_by_email("john@EXAMPLE.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
        assert_eq!(created.email, "john@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        store.create(new_identity("a@x.com")).await.unwrap();

        let err = store.create(new_identity("A@X.COM")).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn test_cas_requires_expected_state() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_identity("a@x.com")).await.unwrap();

        let first = active("hash-1");
        assert!(store
            .cas_session(user.id, &SessionState::Absent, &first)
            .await
            .unwrap());

        // Stale expectation loses
        assert!(!store
            .cas_session(user.id, &SessionState::Absent, &active("hash-2"))
            .await
            .unwrap());
        assert_eq!(store.load_session(user.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_unknown_identity_has_no_session() {
        let store = InMemoryUserStore::new();
        let id = Uuid::new_v4();

        assert_eq!(store.load_session(id).await.unwrap(), SessionState::Absent);
        assert!(!store
            .cas_session(id, &SessionState::Absent, &active("hash"))
            .await
            .unwrap());
        store.store_session(id, &active("hash")).await.unwrap();
        assert_eq!(store.load_session(id).await.unwrap(), SessionState::Absent);
    }
}
