/// User store
///
/// The persistence contract the authentication core depends on, and its two
/// implementations: an in-memory store and a Postgres store.

mod memory;
mod models;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryUserStore;
pub use models::{
    normalize_email, AuthProvider, Identity, NewIdentity, RefreshSession, SessionState,
};
pub use postgres::PostgresUserStore;

/// Identity lookup and per-identity session state.
///
/// `cas_session` must be a single atomic conditional write at the storage
/// boundary: it succeeds only if the stored state still equals `expected`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    /// Fails with `AuthError::EmailAlreadyRegistered` if the email is taken.
    async fn create(&self, identity: NewIdentity) -> Result<Identity, AppError>;

    /// Unknown identities report `SessionState::Absent`.
    async fn load_session(&self, id: Uuid) -> Result<SessionState, AppError>;

    /// Replace the session with `new` only if it still equals `expected`.
    async fn cas_session(
        &self,
        id: Uuid,
        expected: &SessionState,
        new: &SessionState,
    ) -> Result<bool, AppError>;

    /// Unconditionally overwrite the session.
    async fn store_session(&self, id: Uuid, new: &SessionState) -> Result<(), AppError>;
}
