use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::aggregate::{
    self, finish_date_statuses, load_dashboard, load_summary, steel_totals, Dashboard,
    FinishDateStatus, PlanActualSummary, SteelTotals, SummaryKind,
};
use crate::core::data::Query as DataQuery;
use crate::core::shared::state::AppState;
use crate::records::{SteelStockRecord, TableClient, TowerFinishDate};

#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    pub year: Option<i32>,
    pub tower: Option<String>,
}

impl SummaryParams {
    /// Tower filter, with a blank value meaning every tower.
    pub fn tower(&self) -> Option<&str> {
        self.tower.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

pub async fn handle_plan_actual_summary(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<PlanActualSummary>, ApiError> {
    let kind: SummaryKind = kind.parse().map_err(ApiError::NotFound)?;
    let summary = load_summary(&state.data, kind, params.year, params.tower()).await?;
    Ok(Json(summary))
}

pub async fn handle_finish_dates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FinishDateStatus>>, ApiError> {
    let rows = TableClient::<TowerFinishDate>::new(Arc::clone(&state.data))
        .list(DataQuery::new())
        .await?;
    Ok(Json(finish_date_statuses(&rows)))
}

#[derive(Debug, Serialize)]
pub struct SteelStockSummary {
    pub items: Vec<SteelStockRecord>,
    pub totals: SteelTotals,
}

pub async fn handle_steel_stock(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SteelStockSummary>, ApiError> {
    let items = TableClient::<SteelStockRecord>::new(Arc::clone(&state.data))
        .list(DataQuery::new())
        .await?;
    let totals = steel_totals(&items);
    Ok(Json(SteelStockSummary { items, totals }))
}

pub async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<Dashboard>, ApiError> {
    let dashboard = load_dashboard(&state.data, params.year).await?;
    Ok(Json(dashboard))
}

/// Cumulative series only, for charting.
pub async fn handle_cumulative(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind: SummaryKind = kind.parse().map_err(ApiError::NotFound)?;
    let summary = load_summary(&state.data, kind, params.year, params.tower()).await?;
    let planned: Vec<f64> = summary.months.iter().map(|m| m.cumulative_planned).collect();
    let actual: Vec<f64> = summary.months.iter().map(|m| m.cumulative_actual).collect();
    Ok(Json(serde_json::json!({
        "kind": kind,
        "year": params.year,
        "months": aggregate::MONTHS,
        "planned": planned,
        "actual": actual,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_tower_means_all_towers() {
        let params = |tower: Option<&str>| SummaryParams {
            year: Some(2025),
            tower: tower.map(str::to_string),
        };
        assert_eq!(params(None).tower(), None);
        assert_eq!(params(Some("")).tower(), None);
        assert_eq!(params(Some("   ")).tower(), None);
        assert_eq!(params(Some(" T1 ")).tower(), Some("T1"));
    }
}
