/// Postgres-backed user store.
///
/// Session state lives in three nullable columns of the `users` row:
/// - active:  `refresh_token_hash` and `refresh_token_expires_at` set
/// - revoked: only `refresh_token_revoked_at` set
/// - absent:  all three null
///
/// The compare-and-swap is one conditional `UPDATE`; `rows_affected() == 1`
/// means this caller won.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    normalize_email, AuthProvider, Identity, NewIdentity, RefreshSession, SessionState,
};
use super::UserStore;
use crate::error::{AppError, AuthError};

const UNIQUE_VIOLATION: &str = "23505";

type IdentityRow = (Uuid, String, String, String, String, Option<String>, DateTime<Utc>);
type SessionColumns = (Option<String>, Option<DateTime<Utc>>, Option<DateTime<Utc>>);

pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: IdentityRow) -> Identity {
    let (id, email, first_name, last_name, provider, password_hash, created_at) = row;
    Identity {
        id,
        email,
        first_name,
        last_name,
        provider: AuthProvider::from_tag(&provider),
        password_hash,
        created_at,
    }
}

fn session_from_columns(columns: SessionColumns) -> SessionState {
    match columns {
        (Some(refresh_token_hash), Some(refresh_token_expires_at), _) => {
            SessionState::Active(RefreshSession {
                refresh_token_hash,
                refresh_token_expires_at,
            })
        }
        (_, _, Some(revoked_at)) => SessionState::Revoked { revoked_at },
        _ => SessionState::Absent,
    }
}

fn session_to_columns(state: &SessionState) -> SessionColumns {
    match state {
        SessionState::Absent => (None, None, None),
        SessionState::Active(session) => (
            Some(session.refresh_token_hash.clone()),
            Some(session.refresh_token_expires_at),
            None,
        ),
        SessionState::Revoked { revoked_at } => (None, None, Some(*revoked_at)),
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, first_name, last_name, provider, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(identity_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, first_name, last_name, provider, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(identity_from_row))
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity, AppError> {
        let created = Identity {
            id: Uuid::new_v4(),
            email: normalize_email(&identity.email),
            first_name: identity.first_name,
            last_name: identity.last_name,
            provider: identity.provider,
            password_hash: identity.password_hash,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, provider, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(created.id)
        .bind(&created.email)
        .bind(&created.first_name)
        .bind(&created.last_name)
        .bind(created.provider.as_str())
        .bind(&created.password_hash)
        .bind(created.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                AppError::Auth(AuthError::EmailAlreadyRegistered)
            }
            _ => AppError::from(e),
        })?;

        Ok(created)
    }

    async fn load_session(&self, id: Uuid) -> Result<SessionState, AppError> {
        let columns = sqlx::query_as::<_, SessionColumns>(
            r#"
            SELECT refresh_token_hash, refresh_token_expires_at, refresh_token_revoked_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(columns.map(session_from_columns).unwrap_or_default())
    }

    async fn cas_session(
        &self,
        id: Uuid,
        expected: &SessionState,
        new: &SessionState,
    ) -> Result<bool, AppError> {
        let (old_hash, old_expires_at, old_revoked_at) = session_to_columns(expected);
        let (new_hash, new_expires_at, new_revoked_at) = session_to_columns(new);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2,
                refresh_token_expires_at = $3,
                refresh_token_revoked_at = $4
            WHERE id = $1
              AND refresh_token_hash IS NOT DISTINCT FROM $5
              AND refresh_token_expires_at IS NOT DISTINCT FROM $6
              AND refresh_token_revoked_at IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(id)
        .bind(new_hash)
        .bind(new_expires_at)
        .bind(new_revoked_at)
        .bind(old_hash)
        .bind(old_expires_at)
        .bind(old_revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn store_session(&self, id: Uuid, new: &SessionState) -> Result<(), AppError> {
        let (hash, expires_at, revoked_at) = session_to_columns(new);

        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2,
                refresh_token_expires_at = $3,
                refresh_token_revoked_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .bind(revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_columns_round_trip() {
        let now = Utc::now();
        let states = [
            SessionState::Absent,
            SessionState::Active(RefreshSession {
                refresh_token_hash: "abc".to_string(),
                refresh_token_expires_at: now,
            }),
            SessionState::Revoked { revoked_at: now },
        ];

        for state in states {
            assert_eq!(session_from_columns(session_to_columns(&state)), state);
        }
    }

    #[test]
    fn test_identity_row_maps_provider() {
        let row: IdentityRow = (
            Uuid::new_v4(),
            "a@x.com".to_string(),
            "Ann".to_string(),
            "Lee".to_string(),
            "google".to_string(),
            None,
            Utc::now(),
        );
        let identity = identity_from_row(row);
        assert_eq!(identity.provider, AuthProvider::Federated("google".to_string()));
        assert!(identity.password_hash.is_none());
    }
}
