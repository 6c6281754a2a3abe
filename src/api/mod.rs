//! HTTP surface: JSON record and summary endpoints, the realtime feed and
//! the HTML pages.

pub mod error;
pub mod realtime;
pub mod records;
pub mod summary;
pub mod ui;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::auth::handlers::{handle_login, handle_logout, handle_session, handle_session_events};
use crate::core::shared::state::AppState;

pub use error::ApiError;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/records/:table",
            get(records::handle_list_records)
                .post(records::handle_create_record)
                .put(records::handle_upsert_record),
        )
        .route(
            "/api/records/:table/:id",
            get(records::handle_get_record)
                .put(records::handle_update_record)
                .delete(records::handle_delete_record),
        )
        .route("/api/summary/finish-dates", get(summary::handle_finish_dates))
        .route("/api/summary/steel-stock", get(summary::handle_steel_stock))
        .route("/api/summary/:kind", get(summary::handle_plan_actual_summary))
        .route("/api/summary/:kind/cumulative", get(summary::handle_cumulative))
        .route("/api/dashboard", get(summary::handle_dashboard))
        .route("/api/realtime", get(realtime::handle_realtime))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/session", get(handle_session))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/events", get(handle_session_events))
}

pub fn configure_ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(ui::handle_dashboard_page))
        .route("/login", get(ui::handle_login_page).post(ui::handle_login_form))
        .route("/logout", get(ui::handle_logout_page))
        .route("/tables/:table", get(ui::handle_table_fragment))
}
