use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{present, require, Record};
use crate::core::data::Table;

/// Planned and projected completion for one tower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerFinishDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub tower: String,
    pub planned_finish: Option<NaiveDate>,
    pub projected_finish: Option<NaiveDate>,
    pub variance_days: Option<i32>,
}

/// Days the projection lies after the plan. Positive means late.
pub fn variance_days(planned: NaiveDate, projected: NaiveDate) -> i64 {
    (projected - planned).num_days()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceClass {
    BehindSchedule,
    OnSchedule,
    AheadOfSchedule,
}

impl VarianceClass {
    pub fn classify(variance_days: i64) -> Self {
        match variance_days {
            d if d > 0 => Self::BehindSchedule,
            d if d < 0 => Self::AheadOfSchedule,
            _ => Self::OnSchedule,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BehindSchedule => "Behind schedule",
            Self::OnSchedule => "On schedule",
            Self::AheadOfSchedule => "Ahead of schedule",
        }
    }
}

impl TowerFinishDate {
    pub fn variance(&self) -> Option<i64> {
        Some(variance_days(self.planned_finish?, self.projected_finish?))
    }

    pub fn variance_class(&self) -> Option<VarianceClass> {
        self.variance().map(VarianceClass::classify)
    }
}

impl Record for TowerFinishDate {
    const TABLE: Table = Table::TowerFinishDates;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("tower", present(&self.tower)),
            ("planned finish", self.planned_finish.is_some()),
        ])
    }

    /// Any hand-entered variance is replaced by the value the dates imply.
    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
        self.variance_days = self.variance().and_then(|d| i32::try_from(d).ok());
    }
}
