//! Plan-versus-actual roll-ups and the small register summaries shown on the
//! dashboard. Everything here is a pure function over loaded rows.

pub mod dashboard;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::records::{
    Approval, ApprovalStatus, Hindrance, NonNegotiable, PeriodFigure, SteelStockRecord,
    TowerFinishDate, VarianceClass,
};

pub use dashboard::{load_dashboard, load_summary, Dashboard, SummaryKind};

pub const MONTHS: usize = 12;

fn in_scope<T: PeriodFigure>(row: &T, year: Option<i32>, tower: Option<&str>) -> bool {
    let year_ok = year.map_or(true, |y| row.year() == Some(y));
    let tower_ok = tower.map_or(true, |t| row.tower().is_some_and(|rt| rt.eq_ignore_ascii_case(t)));
    year_ok && tower_ok
}

/// Per-month sums, index 0 = January. Rows without a valid month are skipped.
pub fn monthly_totals<T: PeriodFigure>(rows: &[T], year: Option<i32>, tower: Option<&str>) -> [f64; MONTHS] {
    let mut totals = [0.0; MONTHS];
    for row in rows.iter().filter(|r| in_scope(*r, year, tower)) {
        if let Some(month) = row.month().filter(|m| (1..=12).contains(m)) {
            totals[month as usize - 1] += row.figure();
        }
    }
    totals
}

/// Running totals from month 1 by sequential accumulation.
pub fn cumulative(monthly: &[f64; MONTHS]) -> [f64; MONTHS] {
    let mut running = 0.0;
    let mut out = [0.0; MONTHS];
    for (slot, value) in out.iter_mut().zip(monthly) {
        running += value;
        *slot = running;
    }
    out
}

pub fn tower_totals<T: PeriodFigure>(rows: &[T], year: Option<i32>) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for row in rows.iter().filter(|r| in_scope(*r, year, None)) {
        if let Some(tower) = row.tower() {
            *totals.entry(tower.to_string()).or_insert(0.0) += row.figure();
        }
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthFigures {
    pub month: u32,
    pub planned: f64,
    pub actual: f64,
    pub cumulative_planned: f64,
    pub cumulative_actual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerFigures {
    pub tower: String,
    pub planned: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanActualSummary {
    pub year: Option<i32>,
    pub tower: Option<String>,
    pub months: Vec<MonthFigures>,
    pub by_tower: Vec<TowerFigures>,
    pub total_planned: f64,
    pub total_actual: f64,
    /// Actual over planned, absent when nothing is planned.
    pub achievement: Option<f64>,
}

pub fn summarize<P, A>(plan: &[P], actual: &[A], year: Option<i32>, tower: Option<&str>) -> PlanActualSummary
where
    P: PeriodFigure,
    A: PeriodFigure,
{
    let planned = monthly_totals(plan, year, tower);
    let actuals = monthly_totals(actual, year, tower);
    let cum_planned = cumulative(&planned);
    let cum_actual = cumulative(&actuals);

    let months = (0..MONTHS)
        .map(|i| MonthFigures {
            month: i as u32 + 1,
            planned: planned[i],
            actual: actuals[i],
            cumulative_planned: cum_planned[i],
            cumulative_actual: cum_actual[i],
        })
        .collect();

    let mut towers: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for (name, value) in tower_totals(plan, year) {
        towers.entry(name).or_default().0 = value;
    }
    for (name, value) in tower_totals(actual, year) {
        towers.entry(name).or_default().1 = value;
    }
    let by_tower = towers
        .into_iter()
        .filter(|(name, _)| tower.map_or(true, |t| name.eq_ignore_ascii_case(t)))
        .map(|(tower, (planned, actual))| TowerFigures {
            tower,
            planned,
            actual,
        })
        .collect();

    let total_planned = cum_planned[MONTHS - 1];
    let total_actual = cum_actual[MONTHS - 1];
    PlanActualSummary {
        year,
        tower: tower.map(str::to_string),
        months,
        by_tower,
        total_planned,
        total_actual,
        achievement: (total_planned > 0.0).then(|| total_actual / total_planned),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishDateStatus {
    pub tower: String,
    pub planned_finish: Option<chrono::NaiveDate>,
    pub projected_finish: Option<chrono::NaiveDate>,
    pub variance_days: Option<i64>,
    pub status: Option<VarianceClass>,
}

pub fn finish_date_statuses(rows: &[TowerFinishDate]) -> Vec<FinishDateStatus> {
    rows.iter()
        .map(|row| FinishDateStatus {
            tower: row.tower.clone(),
            planned_finish: row.planned_finish,
            projected_finish: row.projected_finish,
            variance_days: row.variance(),
            status: row.variance_class(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SteelTotals {
    pub total_received: f64,
    pub stock_at_site: f64,
    pub consumed: f64,
}

pub fn steel_totals(rows: &[SteelStockRecord]) -> SteelTotals {
    rows.iter().fold(SteelTotals::default(), |mut acc, row| {
        let received = row.total_received.unwrap_or(0.0);
        let stock = row.stock_at_site.unwrap_or(0.0);
        acc.total_received += received;
        acc.stock_at_site += stock;
        acc.consumed += row.consumed.unwrap_or(received - stock);
        acc
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerCompletion {
    pub tower: String,
    pub completed: usize,
    pub total: usize,
    pub ratio: f64,
}

pub fn completion_by_tower(rows: &[NonNegotiable]) -> Vec<TowerCompletion> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = counts.entry(row.tower.as_str()).or_default();
        entry.1 += 1;
        if row.completed {
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(tower, (completed, total))| TowerCompletion {
            tower: tower.to_string(),
            completed,
            total,
            ratio: completed as f64 / total as f64,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApprovalCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

pub fn approval_counts(rows: &[Approval]) -> ApprovalCounts {
    rows.iter().fold(ApprovalCounts::default(), |mut acc, row| {
        match row.status {
            ApprovalStatus::Pending => acc.pending += 1,
            ApprovalStatus::Approved => acc.approved += 1,
            ApprovalStatus::Rejected => acc.rejected += 1,
        }
        acc
    })
}

pub fn unresolved_hindrances(rows: &[Hindrance]) -> usize {
    rows.iter().filter(|h| !h.is_resolved()).count()
}
