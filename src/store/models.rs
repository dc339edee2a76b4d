/// Identity and session records owned by the user store.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Which authority vouched for the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProvider {
    Local,
    /// External provider tag, e.g. "google".
    Federated(String),
}

impl AuthProvider {
    pub fn as_str(&self) -> &str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Federated(name) => name,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "local" => AuthProvider::Local,
            other => AuthProvider::Federated(other.to_string()),
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    /// Always stored normalized, see [`normalize_email`].
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: AuthProvider,
    /// bcrypt digest; only local identities carry one.
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to persist a new identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: AuthProvider,
    pub password_hash: Option<String>,
}

/// The current refresh secret's hash and its absolute expiry.
///
/// Both fields are always written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSession {
    pub refresh_token_hash: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Per-identity session state as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Never logged in, logged out, or expired.
    #[default]
    Absent,
    Active(RefreshSession),
    /// Revoked after a reuse signal; only a fresh login leaves this state.
    Revoked { revoked_at: DateTime<Utc> },
}

/// Lower-cased, trimmed email used for lookups and uniqueness.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
