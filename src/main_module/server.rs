//! HTTP server initialization and routing

use axum::{http::HeaderValue, middleware, routing::get, Router};
use log::{error, info, warn};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{configure_api_routes, configure_ui_routes};
use crate::auth::require_auth;
use crate::core::shared::state::AppState;

use super::{health_check, health_check_simple, shutdown_signal};

pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        info!("Creating CORS layer with development defaults (no origins configured)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {o}");
                None
            }
        })
        .collect();
    info!("Creating CORS layer with {} configured origins", parsed.len());
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Full application router. Everything except the public paths goes through
/// `require_auth`.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(&app_state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health_check_simple))
        .route("/api/health", get(health_check))
        .merge(configure_api_routes())
        .merge(configure_ui_routes())
        // last added runs first: cookies, then auth
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {addr}: {e} - is another instance running?");
            return Err(e);
        }
    };
    info!("HTTP server listening on {addr}");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)?;
    info!("Server stopped");
    Ok(())
}
