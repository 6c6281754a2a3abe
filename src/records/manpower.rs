use serde::{Deserialize, Serialize};

use super::{validate_weekly, PeriodFigure, Record};
use crate::core::data::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManpowerPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub week: Option<u32>,
    #[serde(default)]
    pub tower: String,
    pub planned_count: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManpowerActual {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub week: Option<u32>,
    #[serde(default)]
    pub tower: String,
    pub actual_count: Option<i32>,
}

fn check_headcount(count: Option<i32>) -> Result<(), String> {
    match count {
        Some(c) if c < 0 => Err("Headcount cannot be negative".to_string()),
        _ => Ok(()),
    }
}

impl Record for ManpowerPlan {
    const TABLE: Table = Table::ManpowerPlan;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        validate_weekly(
            self.year,
            self.month,
            self.week,
            &self.tower,
            ("planned manpower", self.planned_count.is_some()),
        )?;
        check_headcount(self.planned_count)
    }

    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
    }
}

impl Record for ManpowerActual {
    const TABLE: Table = Table::ManpowerActual;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        validate_weekly(
            self.year,
            self.month,
            self.week,
            &self.tower,
            ("actual manpower", self.actual_count.is_some()),
        )?;
        check_headcount(self.actual_count)
    }

    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
    }
}

impl PeriodFigure for ManpowerPlan {
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn month(&self) -> Option<u32> {
        self.month
    }
    fn tower(&self) -> Option<&str> {
        Some(&self.tower)
    }
    fn figure(&self) -> f64 {
        f64::from(self.planned_count.unwrap_or(0))
    }
}

impl PeriodFigure for ManpowerActual {
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn month(&self) -> Option<u32> {
        self.month
    }
    fn tower(&self) -> Option<&str> {
        Some(&self.tower)
    }
    fn figure(&self) -> f64 {
        f64::from(self.actual_count.unwrap_or(0))
    }
}
