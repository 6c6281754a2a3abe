use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use super::{AuthClient, AuthError, Session, SessionEvent, SessionEventKind, SessionUser};
use crate::core::config::AuthSettings;
use crate::core::data::{row_id, DataClient, Query, Row, Table};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    exp: i64,
    iat: i64,
    jti: String,
}

/// Email/password sign-in against `app_users`, issuing HS256 tokens.
/// Signed-out tokens are remembered until they expire.
pub struct LocalAuthClient {
    data: Arc<dyn DataClient>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_hours: i64,
    /// jti -> exp of signed-out tokens
    revoked: RwLock<HashMap<String, i64>>,
    events: broadcast::Sender<SessionEvent>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_from_row(row: &Row) -> Option<SessionUser> {
    Some(SessionUser {
        id: row_id(row)?,
        email: row.get("email")?.as_str()?.to_string(),
        display_name: row
            .get("display_name")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

impl LocalAuthClient {
    pub fn new(data: Arc<dyn DataClient>, settings: &AuthSettings) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            data,
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            session_hours: settings.session_hours,
            revoked: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Creates the user, or resets the password of an existing one.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SessionUser, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let mut row = Row::new();
        row.insert("email".into(), Value::from(email.clone()));
        row.insert("password_hash".into(), Value::from(hash_password(password)?));
        row.insert(
            "display_name".into(),
            display_name.map_or(Value::Null, Value::from),
        );
        let stored = self.data.upsert(Table::AppUsers, row).await?;
        info!("Saved user {email}");
        user_from_row(&stored).ok_or_else(|| AuthError::Token("stored user has no id".into()))
    }

    fn issue(&self, user: SessionUser) -> Result<Session, AuthError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.session_hours);
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))?;
        Ok(Session {
            token,
            user,
            expires_at,
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    fn emit(&self, kind: SessionEventKind, email: String) {
        // nobody listening is fine
        let _ = self.events.send(SessionEvent {
            kind,
            email,
            at: Utc::now(),
        });
    }
}

#[async_trait]
impl AuthClient for LocalAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let rows = self
            .data
            .select(Table::AppUsers, Query::new().eq("email", email.clone()).limit(1))
            .await?;
        let Some(row) = rows.first() else {
            warn!("Sign-in for unknown user {email}");
            return Err(AuthError::InvalidCredentials);
        };
        let hash = row
            .get("password_hash")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !verify_password(password, hash)? {
            warn!("Wrong password for {email}");
            return Err(AuthError::InvalidCredentials);
        }
        let user = user_from_row(row).ok_or(AuthError::InvalidCredentials)?;

        let session = self.issue(user)?;
        info!("User {email} signed in");
        self.emit(SessionEventKind::SignedIn, email);
        Ok(session)
    }

    async fn current_session(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let claims = match self.decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejected token: {e}");
                return Ok(None);
            }
        };
        if self.revoked.read().await.contains_key(&claims.jti) {
            return Ok(None);
        }
        let Ok(id) = claims.sub.parse::<i64>() else {
            return Ok(None);
        };
        let Some(expires_at) = Utc.timestamp_opt(claims.exp, 0).single() else {
            return Ok(None);
        };
        Ok(Some(Session {
            token: token.to_string(),
            user: SessionUser {
                id,
                email: claims.email,
                display_name: claims.name,
            },
            expires_at,
        }))
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.decode_claims(token)?;
        {
            let now = Utc::now().timestamp();
            let mut revoked = self.revoked.write().await;
            revoked.retain(|_, exp| *exp > now);
            revoked.insert(claims.jti, claims.exp);
        }
        info!("User {} signed out", claims.email);
        self.emit(SessionEventKind::SignedOut, claims.email);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::MemoryDataClient;

    fn client() -> LocalAuthClient {
        let settings = AuthSettings {
            jwt_secret: "test-secret-with-enough-length-0123456789".into(),
            session_hours: 1,
        };
        LocalAuthClient::new(Arc::new(MemoryDataClient::new()), &settings)
    }

    #[tokio::test]
    async fn test_sign_in_session_sign_out() {
        let auth = client();
        let mut events = auth.subscribe();
        auth.create_user("Site.Engineer@Example.com ", "pour-schedule-1", Some("Site Engineer"))
            .await
            .expect("user");

        let session = auth
            .sign_in("site.engineer@example.com", "pour-schedule-1")
            .await
            .expect("sign in");
        assert_eq!(session.user.email, "site.engineer@example.com");
        assert_eq!(events.recv().await.expect("event").kind, SessionEventKind::SignedIn);

        let current = auth
            .current_session(&session.token)
            .await
            .expect("lookup")
            .expect("live session");
        assert_eq!(current.user.display_name.as_deref(), Some("Site Engineer"));

        auth.sign_out(&session.token).await.expect("sign out");
        assert_eq!(events.recv().await.expect("event").kind, SessionEventKind::SignedOut);
        assert!(auth.current_session(&session.token).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let auth = client();
        auth.create_user("pm@example.com", "correct-horse", None)
            .await
            .expect("user");
        assert!(matches!(
            auth.sign_in("pm@example.com", "wrong-horse").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.sign_in("nobody@example.com", "correct-horse").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.sign_in("  ", "").await,
            Err(AuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_foreign_token_has_no_session() {
        let auth = client();
        assert!(auth.current_session("not.a.jwt").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_create_user_twice_resets_password() {
        let auth = client();
        auth.create_user("qa@example.com", "first-password", None)
            .await
            .expect("first");
        auth.create_user("qa@example.com", "second-password", None)
            .await
            .expect("second");
        assert!(auth.sign_in("qa@example.com", "first-password").await.is_err());
        assert!(auth.sign_in("qa@example.com", "second-password").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_forgets_expired_revocations() {
        let auth = client();
        auth.create_user("foreman@example.com", "rebar-check-7", None)
            .await
            .expect("user");
        auth.revoked
            .write()
            .await
            .insert("long-gone".to_string(), Utc::now().timestamp() - 60);

        let session = auth
            .sign_in("foreman@example.com", "rebar-check-7")
            .await
            .expect("sign in");
        auth.sign_out(&session.token).await.expect("sign out");

        let revoked = auth.revoked.read().await;
        assert_eq!(revoked.len(), 1);
        assert!(!revoked.contains_key("long-gone"));
        drop(revoked);
        assert!(auth.current_session(&session.token).await.expect("lookup").is_none());
    }
}
