use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{present, require, Record};
use crate::core::data::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub serial_no: Option<i32>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub record_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const ALL: [ApprovalStatus; 3] = [Self::Pending, Self::Approved, Self::Rejected];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown approval status: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub serial_no: Option<i32>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub record_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ApprovalStatus,
}

impl Record for Drawing {
    const TABLE: Table = Table::Drawings;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("category", present(&self.category)),
            ("description", present(&self.description)),
        ])
    }

    fn normalize(&mut self) {
        self.category = self.category.trim().to_string();
    }

    fn serial_no(&self) -> Option<i32> {
        self.serial_no
    }

    fn set_serial_no(&mut self, serial: i32) {
        self.serial_no = Some(serial);
    }
}

impl Record for Approval {
    const TABLE: Table = Table::Approvals;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("category", present(&self.category)),
            ("description", present(&self.description)),
        ])
    }

    fn normalize(&mut self) {
        self.category = self.category.trim().to_string();
    }

    fn serial_no(&self) -> Option<i32> {
        self.serial_no
    }

    fn set_serial_no(&mut self, serial: i32) {
        self.serial_no = Some(serial);
    }
}
