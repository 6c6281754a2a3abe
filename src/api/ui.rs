use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use log::warn;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower_cookies::Cookies;

use super::error::ApiError;
use super::records::{build_query, parse_table, with_record};
use crate::aggregate::{load_dashboard, PlanActualSummary};
use crate::auth::handlers::LoginRequest;
use crate::auth::middleware::{clear_session_cookie, session_cookie};
use crate::auth::{extract_token, Session};
use crate::core::data::{DataClient, Table};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::html_escape;
use crate::page::{paginate, Page, PageRequest};
use crate::records::{
    Approval, CashflowActual, CashflowPlan, ConcreteActual, ConcretePlan, CriticalIssue, Drawing,
    Hindrance, ManpowerActual, ManpowerPlan, NonNegotiable, OtherInput, Record, SteelStockRecord,
    TableClient, TowerFinishDate,
};

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\
        <html lang=\"en\">\
        <head><meta charset=\"utf-8\"><title>{title}</title>\
        <script src=\"https://unpkg.com/htmx.org@1.9.12\"></script></head>\
        <body>{body}</body>\
        </html>",
        title = html_escape(title),
        body = body,
    ))
}

fn render_login(error: Option<&str>) -> Html<String> {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>", html_escape(e)))
        .unwrap_or_default();
    layout(
        "Sign in",
        &format!(
            "<main class=\"login\">\
                <h1>Site Progress</h1>\
                {error}\
                <form method=\"post\" action=\"/login\">\
                    <label>Email <input type=\"email\" name=\"email\" required></label>\
                    <label>Password <input type=\"password\" name=\"password\" required></label>\
                    <button type=\"submit\">Sign in</button>\
                </form>\
            </main>"
        ),
    )
}

pub async fn handle_login_page() -> Html<String> {
    render_login(None)
}

pub async fn handle_login_form(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Form(form): Form<LoginRequest>,
) -> Response {
    match state.auth.sign_in(&form.email, &form.password).await {
        Ok(session) => {
            cookies.add(session_cookie(&session.token, state.config.auth.session_hours));
            Redirect::to("/").into_response()
        }
        Err(e) => {
            warn!("Login form rejected: {e}");
            render_login(Some(&e.to_string())).into_response()
        }
    }
}

pub async fn handle_logout_page(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Redirect {
    if let Some(token) = extract_token(&headers, &cookies) {
        if let Err(e) = state.auth.sign_out(&token).await {
            warn!("Sign-out failed: {e}");
        }
    }
    clear_session_cookie(&cookies);
    Redirect::to("/login")
}

fn render_plan_actual(title: &str, summary: &PlanActualSummary) -> String {
    let rows: String = summary
        .months
        .iter()
        .map(|m| {
            format!(
                "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td></tr>",
                m.month, m.planned, m.actual, m.cumulative_planned, m.cumulative_actual
            )
        })
        .collect();
    let achievement = summary
        .achievement
        .map(|a| format!("{:.1}%", a * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "<section class=\"summary\">\
            <h2>{title}</h2>\
            <p>Planned {planned:.2} / Actual {actual:.2} ({achievement})</p>\
            <table><thead><tr><th>Month</th><th>Planned</th><th>Actual</th>\
            <th>Cum. planned</th><th>Cum. actual</th></tr></thead>\
            <tbody>{rows}</tbody></table>\
        </section>",
        title = html_escape(title),
        planned = summary.total_planned,
        actual = summary.total_actual,
    )
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct DashboardParams {
    pub year: Option<i32>,
}

pub async fn handle_dashboard_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<DashboardParams>,
) -> Result<Html<String>, ApiError> {
    let dashboard = load_dashboard(&state.data, params.year).await?;

    let finish_rows: String = dashboard
        .finish_dates
        .iter()
        .map(|f| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&f.tower),
                f.planned_finish.map(|d| d.to_string()).unwrap_or_default(),
                f.projected_finish.map(|d| d.to_string()).unwrap_or_default(),
                f.variance_days.map(|d| d.to_string()).unwrap_or_default(),
                f.status.map(|s| s.label()).unwrap_or("-"),
            )
        })
        .collect();

    let links: String = Table::ALL
        .iter()
        .filter(|t| t.is_public())
        .map(|t| {
            format!(
                "<li><a href=\"#\" hx-get=\"/tables/{name}\" hx-target=\"#table-view\">{name}</a></li>",
                name = t.name()
            )
        })
        .collect();

    let user = session
        .user
        .display_name
        .as_deref()
        .unwrap_or(&session.user.email)
        .to_string();

    let body = format!(
        "<header><h1>Site Progress</h1><span>{user}</span> <a href=\"/logout\">Sign out</a></header>\
        <section class=\"counts\">\
            <p>Unresolved hindrances: {hindrances}</p>\
            <p>Critical issues: {issues}</p>\
            <p>Approvals pending {pending}, approved {approved}, rejected {rejected}</p>\
            <p>Steel received {received:.2} t, at site {at_site:.2} t, consumed {consumed:.2} t</p>\
        </section>\
        {concrete}{manpower}{cashflow}\
        <section class=\"finish-dates\"><h2>Tower finish dates</h2>\
            <table><thead><tr><th>Tower</th><th>Planned</th><th>Projected</th>\
            <th>Variance (days)</th><th>Status</th></tr></thead><tbody>{finish_rows}</tbody></table>\
        </section>\
        <nav><ul>{links}</ul></nav>\
        <section id=\"table-view\"></section>",
        user = html_escape(&user),
        hindrances = dashboard.unresolved_hindrances,
        issues = dashboard.critical_issues,
        pending = dashboard.approvals.pending,
        approved = dashboard.approvals.approved,
        rejected = dashboard.approvals.rejected,
        received = dashboard.steel.total_received,
        at_site = dashboard.steel.stock_at_site,
        consumed = dashboard.steel.consumed,
        concrete = render_plan_actual("Concrete (m³)", &dashboard.concrete),
        manpower = render_plan_actual("Manpower", &dashboard.manpower),
        cashflow = render_plan_actual("Cashflow", &dashboard.cashflow),
    );
    Ok(layout("Site Progress", &body))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => html_escape(s),
        Some(Value::Bool(b)) => (if *b { "✓" } else { "" }).to_string(),
        Some(other) => html_escape(&other.to_string()),
    }
}

fn render_table(table: Table, page: &Page<Value>) -> String {
    let columns = table.spec().columns;
    let header: String = columns
        .iter()
        .map(|c| format!("<th>{}</th>", html_escape(c.name)))
        .collect();
    let body: String = if page.items.is_empty() {
        format!(
            "<tr><td colspan=\"{}\" class=\"empty\">No records found</td></tr>",
            columns.len() + 1
        )
    } else {
        page.items
            .iter()
            .map(|row| {
                let id = row.get("id").and_then(Value::as_i64).unwrap_or_default();
                let cells: String = columns
                    .iter()
                    .map(|c| format!("<td>{}</td>", cell(row.get(c.name))))
                    .collect();
                format!(
                    "<tr data-id=\"{id}\">{cells}<td>\
                        <button hx-delete=\"/api/records/{name}/{id}?confirm=true\" \
                        hx-confirm=\"Delete this record?\" hx-swap=\"none\">×</button>\
                    </td></tr>",
                    name = table.name()
                )
            })
            .collect()
    };
    format!(
        "<table class=\"records\" data-table=\"{name}\">\
            <thead><tr>{header}<th></th></tr></thead>\
            <tbody>{body}</tbody>\
        </table>\
        <p class=\"pager\">Page {page_no} of {pages} ({total} records)</p>",
        name = table.name(),
        page_no = page.page,
        pages = page.total_pages.max(1),
        total = page.total_items,
    )
}

async fn rows_as<R: Record>(
    data: Arc<dyn DataClient>,
    query: crate::core::data::Query,
) -> Result<Vec<Value>, ApiError> {
    let rows = TableClient::<R>::new(data).list(query).await?;
    rows.iter()
        .map(|r| serde_json::to_value(r).map_err(|e| ApiError::Internal(e.to_string())))
        .collect()
}

pub async fn handle_table_fragment(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, ApiError> {
    let table = parse_table(&table)?;
    let query = build_query(table, &params)?;
    let request = PageRequest {
        search: params.get("search").cloned(),
        page: params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1),
        ..PageRequest::default()
    };
    let data = Arc::clone(&state.data);
    let rows = with_record!(table, R => rows_as::<R>(data, query).await)?;
    Ok(Html(render_table(table, &paginate(&rows, &request))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_fragment_escapes_and_marks_empty() {
        let empty = paginate(&Vec::<Value>::new(), &PageRequest::default());
        assert!(render_table(Table::CriticalIssues, &empty).contains("No records found"));

        let rows = vec![json!({"id": 3, "description": "<script>", "category": null})];
        let html = render_table(Table::CriticalIssues, &paginate(&rows, &PageRequest::default()));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("/api/records/critical_issues/3?confirm=true"));
    }

    #[test]
    fn test_login_page_shows_error() {
        let Html(page) = render_login(Some("Invalid email or password"));
        assert!(page.contains("Invalid email or password"));
        assert!(page.contains("action=\"/login\""));
    }
}
