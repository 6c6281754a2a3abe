//! Session handling: the `AuthClient` seam, a local email/password
//! implementation backed by `app_users`, and the axum glue around it.

pub mod handlers;
pub mod local;
pub mod middleware;
pub mod password;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::data::DataError;

pub use local::LocalAuthClient;
pub use middleware::{extract_token, require_auth, AUTH_COOKIE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub email: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Please enter both email and password")]
    MissingCredentials,
    #[error("{0}")]
    WeakPassword(String),
    #[error("Invalid token: {0}")]
    Token(String),
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// The live session for a token, or `None` when it is expired, revoked or
    /// not ours.
    async fn current_session(&self, token: &str) -> Result<Option<Session>, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
