use serde::{Deserialize, Serialize};

use super::{check_month, require, PeriodFigure, Record};
use crate::core::data::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub planned_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowActual {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub actual_amount: Option<f64>,
}

impl Record for CashflowPlan {
    const TABLE: Table = Table::CashflowPlan;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("year", self.year.is_some()),
            ("month", self.month.is_some()),
            ("planned amount", self.planned_amount.is_some()),
        ])?;
        check_month(self.month)
    }
}

impl Record for CashflowActual {
    const TABLE: Table = Table::CashflowActual;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("year", self.year.is_some()),
            ("month", self.month.is_some()),
            ("actual amount", self.actual_amount.is_some()),
        ])?;
        check_month(self.month)
    }
}

impl PeriodFigure for CashflowPlan {
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn month(&self) -> Option<u32> {
        self.month
    }
    fn figure(&self) -> f64 {
        self.planned_amount.unwrap_or(0.0)
    }
}

impl PeriodFigure for CashflowActual {
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn month(&self) -> Option<u32> {
        self.month
    }
    fn figure(&self) -> f64 {
        self.actual_amount.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cashflow_month_out_of_range() {
        let plan = CashflowPlan {
            id: None,
            year: Some(2025),
            month: Some(0),
            planned_amount: Some(10.0),
        };
        assert_eq!(
            plan.validate(),
            Err("Month must be between 1 and 12, got 0".to_string())
        );
    }
}
