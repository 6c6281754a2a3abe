use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    approval_counts, completion_by_tower, finish_date_statuses, steel_totals, summarize,
    unresolved_hindrances, ApprovalCounts, FinishDateStatus, PlanActualSummary, SteelTotals,
    TowerCompletion,
};
use crate::core::data::{DataClient, DataError, Query};
use crate::records::{
    Approval, CashflowActual, CashflowPlan, ConcreteActual, ConcretePlan, CriticalIssue, Hindrance,
    ManpowerActual, ManpowerPlan, NonNegotiable, PeriodFigure, Record, SteelStockRecord,
    TableClient, TowerFinishDate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Concrete,
    Manpower,
    Cashflow,
}

impl FromStr for SummaryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concrete" => Ok(Self::Concrete),
            "manpower" => Ok(Self::Manpower),
            "cashflow" => Ok(Self::Cashflow),
            other => Err(format!("Unknown summary: {other}")),
        }
    }
}

async fn load<R: Record>(client: &Arc<dyn DataClient>, year: Option<i32>) -> Result<Vec<R>, DataError> {
    let query = match year {
        Some(y) if R::TABLE.has_column("year") => Query::new().eq("year", y),
        _ => Query::new(),
    };
    TableClient::<R>::new(Arc::clone(client)).list(query).await
}

async fn plan_vs_actual<P, A>(
    client: &Arc<dyn DataClient>,
    year: Option<i32>,
    tower: Option<&str>,
) -> Result<PlanActualSummary, DataError>
where
    P: Record + PeriodFigure,
    A: Record + PeriodFigure,
{
    let (plan, actual) = tokio::try_join!(load::<P>(client, year), load::<A>(client, year))?;
    Ok(summarize(&plan, &actual, year, tower))
}

pub async fn load_summary(
    client: &Arc<dyn DataClient>,
    kind: SummaryKind,
    year: Option<i32>,
    tower: Option<&str>,
) -> Result<PlanActualSummary, DataError> {
    match kind {
        SummaryKind::Concrete => plan_vs_actual::<ConcretePlan, ConcreteActual>(client, year, tower).await,
        SummaryKind::Manpower => plan_vs_actual::<ManpowerPlan, ManpowerActual>(client, year, tower).await,
        // cashflow is project-wide
        SummaryKind::Cashflow => plan_vs_actual::<CashflowPlan, CashflowActual>(client, year, None).await,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub year: Option<i32>,
    pub concrete: PlanActualSummary,
    pub manpower: PlanActualSummary,
    pub cashflow: PlanActualSummary,
    pub finish_dates: Vec<FinishDateStatus>,
    pub steel: SteelTotals,
    pub non_negotiables: Vec<TowerCompletion>,
    pub approvals: ApprovalCounts,
    pub unresolved_hindrances: usize,
    pub critical_issues: usize,
}

pub async fn load_dashboard(client: &Arc<dyn DataClient>, year: Option<i32>) -> Result<Dashboard, DataError> {
    let (concrete, manpower, cashflow) = tokio::try_join!(
        load_summary(client, SummaryKind::Concrete, year, None),
        load_summary(client, SummaryKind::Manpower, year, None),
        load_summary(client, SummaryKind::Cashflow, year, None),
    )?;
    let (finish, steel, tasks, approvals, hindrances, issues) = tokio::try_join!(
        load::<TowerFinishDate>(client, None),
        load::<SteelStockRecord>(client, None),
        load::<NonNegotiable>(client, None),
        load::<Approval>(client, None),
        load::<Hindrance>(client, None),
        load::<CriticalIssue>(client, None),
    )?;

    Ok(Dashboard {
        year,
        concrete,
        manpower,
        cashflow,
        finish_dates: finish_date_statuses(&finish),
        steel: steel_totals(&steel),
        non_negotiables: completion_by_tower(&tasks),
        approvals: approval_counts(&approvals),
        unresolved_hindrances: unresolved_hindrances(&hindrances),
        critical_issues: issues.len(),
    })
}
