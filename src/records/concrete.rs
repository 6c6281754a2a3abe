use serde::{Deserialize, Serialize};

use super::{validate_weekly, PeriodFigure, Record};
use crate::core::data::Table;

/// Planned pour volume (m³) for one tower in one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcretePlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub week: Option<u32>,
    #[serde(default)]
    pub tower: String,
    pub planned_volume: Option<f64>,
}

/// Poured volume (m³) for one tower in one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteActual {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub week: Option<u32>,
    #[serde(default)]
    pub tower: String,
    pub actual_volume: Option<f64>,
}

impl Record for ConcretePlan {
    const TABLE: Table = Table::ConcretePlan;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        validate_weekly(
            self.year,
            self.month,
            self.week,
            &self.tower,
            ("planned volume", self.planned_volume.is_some()),
        )?;
        match self.planned_volume {
            Some(v) if v < 0.0 => Err("Planned volume cannot be negative".to_string()),
            _ => Ok(()),
        }
    }

    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
    }
}

impl Record for ConcreteActual {
    const TABLE: Table = Table::ConcreteActual;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        validate_weekly(
            self.year,
            self.month,
            self.week,
            &self.tower,
            ("actual volume", self.actual_volume.is_some()),
        )?;
        match self.actual_volume {
            Some(v) if v < 0.0 => Err("Actual volume cannot be negative".to_string()),
            _ => Ok(()),
        }
    }

    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
    }
}

impl PeriodFigure for ConcretePlan {
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
        self.planned_volume.unwrap_or(0.0)
    }
}

impl PeriodFigure for ConcreteActual {
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
        self.actual_volume.unwrap_or(0.0)
    }
}
