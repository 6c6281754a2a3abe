//! `/api/records/{table}`: list, read, create, overwrite, edit and delete rows
//! of any public table through the typed record layer.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::ApiError;
use crate::core::data::{self, DataClient, Table};
use crate::core::shared::state::AppState;
use crate::forms::{self, SubmitMode, SubmitOutcome};
use crate::page::{paginate, PageRequest};
use crate::records::{
    Approval, ApprovalStatus, CashflowActual, CashflowPlan, ConcreteActual, ConcretePlan, CriticalIssue, Drawing,
    Hindrance, ManpowerActual, ManpowerPlan, NonNegotiable, OtherInput, Record, SteelStockRecord,
    TableClient, TowerFinishDate,
};

const INT_FILTERS: [&str; 3] = ["year", "month", "week"];
const TEXT_FILTERS: [&str; 3] = ["tower", "category", "status"];

/// Runs `$body` with `$r` bound to the record type stored in `$table`.
macro_rules! with_record {
    ($table:expr, $r:ident => $body:expr) => {
        match $table {
            Table::Hindrances => { type $r = Hindrance; $body }
            Table::OtherInputs => { type $r = OtherInput; $body }
            Table::Drawings => { type $r = Drawing; $body }
            Table::Approvals => { type $r = Approval; $body }
            Table::ConcretePlan => { type $r = ConcretePlan; $body }
            Table::ConcreteActual => { type $r = ConcreteActual; $body }
            Table::ManpowerPlan => { type $r = ManpowerPlan; $body }
            Table::ManpowerActual => { type $r = ManpowerActual; $body }
            Table::CashflowPlan => { type $r = CashflowPlan; $body }
            Table::CashflowActual => { type $r = CashflowActual; $body }
            Table::TowerFinishDates => { type $r = TowerFinishDate; $body }
            Table::SteelStock => { type $r = SteelStockRecord; $body }
            Table::NonNegotiables => { type $r = NonNegotiable; $body }
            Table::CriticalIssues => { type $r = CriticalIssue; $body }
            Table::AppUsers => Err(ApiError::NotFound("Unknown table: app_users".into())),
        }
    };
}

pub(crate) use with_record;

pub fn parse_table(name: &str) -> Result<Table, ApiError> {
    name.parse::<Table>()
        .ok()
        .filter(|t| t.is_public())
        .ok_or_else(|| ApiError::NotFound(format!("Unknown table: {name}")))
}

/// Equality filters from query parameters. Parameters naming a column the
/// table lacks are ignored.
pub fn build_query(table: Table, params: &HashMap<String, String>) -> Result<data::Query, ApiError> {
    let mut query = data::Query::new();
    for column in INT_FILTERS {
        if let Some(raw) = params.get(column).filter(|v| !v.trim().is_empty()) {
            if !table.has_column(column) {
                continue;
            }
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("{column} must be a number, got {raw}")))?;
            query = query.eq(column, value);
        }
    }
    for column in TEXT_FILTERS {
        if let Some(raw) = params.get(column).filter(|v| !v.trim().is_empty()) {
            if !table.has_column(column) {
                continue;
            }
            if table == Table::Approvals && column == "status" {
                let status: ApprovalStatus = raw.parse().map_err(ApiError::BadRequest)?;
                query = query.eq(column, status.as_str());
            } else {
                query = query.eq(column, raw.trim());
            }
        }
    }
    Ok(query)
}

fn page_request(params: &HashMap<String, String>) -> Result<PageRequest, ApiError> {
    let mut request = PageRequest {
        search: params.get("search").cloned(),
        ..PageRequest::default()
    };
    if let Some(page) = params.get("page") {
        request.page = page
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("page must be a number, got {page}")))?;
    }
    if let Some(per_page) = params.get("per_page") {
        request.per_page = per_page
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("per_page must be a number, got {per_page}")))?;
    }
    Ok(request)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

fn parse_record<R: Record>(body: Value) -> Result<R, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Validation(format!("Invalid form data: {e}")))
}

async fn list_as<R: Record>(
    data: Arc<dyn DataClient>,
    query: data::Query,
    request: PageRequest,
) -> Result<Value, ApiError> {
    let rows = TableClient::<R>::new(data).list(query).await?;
    to_json(&paginate(&rows, &request))
}

async fn get_as<R: Record>(data: Arc<dyn DataClient>, id: i64) -> Result<Value, ApiError> {
    match TableClient::<R>::new(data).get(id).await? {
        Some(record) => to_json(&record),
        None => Err(ApiError::NotFound(format!("{} id {id}", R::TABLE))),
    }
}

async fn submit_as<R: Record>(
    data: Arc<dyn DataClient>,
    body: Value,
    mode: SubmitMode,
) -> Result<(StatusCode, Value), ApiError> {
    let record = parse_record::<R>(body)?;
    match forms::submit(&TableClient::<R>::new(data), record, mode).await? {
        SubmitOutcome::Duplicate { existing } => Err(ApiError::Duplicate(to_json(&existing)?)),
        SubmitOutcome::Created { record } => Ok((StatusCode::CREATED, to_json(&record)?)),
        SubmitOutcome::Updated { record } | SubmitOutcome::Upserted { record } => {
            Ok((StatusCode::OK, to_json(&record)?))
        }
    }
}

async fn delete_as<R: Record>(data: Arc<dyn DataClient>, id: i64) -> Result<(), ApiError> {
    forms::delete(&TableClient::<R>::new(data), id).await?;
    Ok(())
}

pub async fn handle_list_records(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let table = parse_table(&table)?;
    let query = build_query(table, &params)?;
    let request = page_request(&params)?;
    debug!("list {table} filters={:?}", query.filters);
    let data = Arc::clone(&state.data);
    let page = with_record!(table, R => list_as::<R>(data, query, request).await)?;
    Ok(Json(page))
}

pub async fn handle_get_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    let table = parse_table(&table)?;
    let data = Arc::clone(&state.data);
    let record = with_record!(table, R => get_as::<R>(data, id).await)?;
    Ok(Json(record))
}

pub async fn handle_create_record(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let table = parse_table(&table)?;
    let data = Arc::clone(&state.data);
    let (status, record) = with_record!(table, R => submit_as::<R>(data, body, SubmitMode::Create).await)?;
    Ok((status, Json(record)))
}

/// Explicit overwrite through the table's natural key.
pub async fn handle_upsert_record(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let table = parse_table(&table)?;
    let data = Arc::clone(&state.data);
    let (status, record) =
        with_record!(table, R => submit_as::<R>(data, body, SubmitMode::Overwrite).await)?;
    Ok((status, Json(record)))
}

pub async fn handle_update_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let table = parse_table(&table)?;
    let data = Arc::clone(&state.data);
    let (status, record) =
        with_record!(table, R => submit_as::<R>(data, body, SubmitMode::Edit(id)).await)?;
    Ok((status, Json(record)))
}

#[derive(Debug, serde::Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn handle_delete_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, i64)>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    let table = parse_table(&table)?;
    if !params.confirm {
        return Err(ApiError::ConfirmationRequired);
    }
    let data = Arc::clone(&state.data);
    with_record!(table, R => delete_as::<R>(data, id).await)?;
    Ok(StatusCode::NO_CONTENT)
}
