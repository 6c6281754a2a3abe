use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::error;

use crate::core::shared::state::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    (scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty()).then(|| token.trim().to_string())
}

/// Token from the `Authorization: Bearer` header, falling back to the
/// session cookie.
pub fn extract_token(headers: &HeaderMap, cookies: &Cookies) -> Option<String> {
    bearer_token(headers).or_else(|| cookies.get(AUTH_COOKIE).map(|c| c.value().to_string()))
}

pub fn session_cookie(token: &str, hours: i64) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(hours))
        .build()
}

pub fn clear_session_cookie(cookies: &Cookies) {
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
}

fn is_public_path(path: &str) -> bool {
    matches!(path, "/login" | "/health" | "/api/health" | "/api/auth/login" | "/favicon.ico")
}

/// Lets requests with a live session through and stores the session in the
/// request extensions. Pages redirect to `/login`, API calls get 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_public_path(&path) {
        return next.run(request).await;
    }

    let session = match extract_token(request.headers(), &cookies) {
        Some(token) => match state.auth.current_session(&token).await {
            Ok(session) => session,
            Err(e) => {
                error!("Session lookup failed: {e}");
                None
            }
        },
        None => None,
    };

    match session {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None if path.starts_with("/api/") => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Authentication required" })),
        )
            .into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/login"));
        assert!(is_public_path("/api/auth/login"));
        assert!(!is_public_path("/api/records/hindrances"));
        assert!(!is_public_path("/"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 24);
        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
