use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tower_cookies::Cookies;
use tracing::warn;

use super::middleware::{clear_session_cookie, extract_token, session_cookie};
use super::{AuthError, Session};
use crate::core::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidCredentials | Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::MissingCredentials | Self::WeakPassword(_) => StatusCode::BAD_REQUEST,
            Self::Hash(_) | Self::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Session>, AuthError> {
    let session = state.auth.sign_in(&body.email, &body.password).await?;
    cookies.add(session_cookie(&session.token, state.config.auth.session_hours));
    Ok(Json(session))
}

pub async fn handle_session(Extension(session): Extension<Session>) -> Json<Session> {
    Json(session)
}

pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    if let Some(token) = extract_token(&headers, &cookies) {
        state.auth.sign_out(&token).await?;
    }
    clear_session_cookie(&cookies);
    Ok(StatusCode::NO_CONTENT)
}

/// Sign-in / sign-out notifications as server-sent events.
pub async fn handle_session_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.auth.subscribe()).filter_map(|item| match item {
        Ok(event) => Event::default()
            .event("session")
            .json_data(&event)
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!("Session event subscriber lagged by {n}");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
