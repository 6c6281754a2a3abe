use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{present, require, Record};
use crate::core::data::Table;

/// Something blocking work on a tower, open until `resolved_date` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hindrance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub tower: String,
    pub serial_no: Option<i32>,
    #[serde(default)]
    pub item_description: String,
    pub start_date: Option<NaiveDate>,
    pub resolved_date: Option<NaiveDate>,
    pub period_days: Option<i32>,
    pub reason: Option<String>,
    pub remarks: Option<String>,
}

impl Hindrance {
    pub fn is_resolved(&self) -> bool {
        self.resolved_date.is_some()
    }
}

impl Record for Hindrance {
    const TABLE: Table = Table::Hindrances;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("tower", present(&self.tower)),
            ("item description", present(&self.item_description)),
            ("start date", self.start_date.is_some()),
        ])?;
        match (self.start_date, self.resolved_date) {
            (Some(start), Some(resolved)) if resolved < start => {
                Err("Resolved date cannot be before the start date".to_string())
            }
            _ => Ok(()),
        }
    }

    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
        self.period_days = match (self.start_date, self.resolved_date) {
            (Some(start), Some(resolved)) => {
                i32::try_from((resolved - start).num_days()).ok()
            }
            _ => None,
        };
        self.reason = self.reason.take().filter(|s| present(s));
        self.remarks = self.remarks.take().filter(|s| present(s));
    }

    fn serial_no(&self) -> Option<i32> {
        self.serial_no
    }

    fn set_serial_no(&mut self, serial: i32) {
        self.serial_no = Some(serial);
    }
}

/// Free-form note shown under the hindrance register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub serial_no: Option<i32>,
    #[serde(default)]
    pub content: String,
}

impl Record for OtherInput {
    const TABLE: Table = Table::OtherInputs;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[("content", present(&self.content))])
    }

    fn serial_no(&self) -> Option<i32> {
        self.serial_no
    }

    fn set_serial_no(&mut self, serial: i32) {
        self.serial_no = Some(serial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn hindrance() -> Hindrance {
        Hindrance {
            id: None,
            tower: "T2".into(),
            serial_no: None,
            item_description: "Shuttering material short".into(),
            start_date: date(2025, 3, 1),
            resolved_date: None,
            period_days: Some(99),
            reason: Some("  ".into()),
            remarks: None,
        }
    }

    #[test]
    fn test_missing_description_is_rejected() {
        let mut h = hindrance();
        h.item_description = "   ".into();
        assert_eq!(
            h.validate(),
            Err("Please fill in the required field: item description".to_string())
        );
    }

    #[test]
    fn test_period_days_follows_dates() {
        let mut h = hindrance();
        h.normalize();
        assert_eq!(h.period_days, None);
        assert_eq!(h.reason, None);
        assert!(!h.is_resolved());

        h.resolved_date = date(2025, 3, 15);
        h.normalize();
        assert_eq!(h.period_days, Some(14));
        assert!(h.is_resolved());
    }

    #[test]
    fn test_resolved_before_start_is_rejected() {
        let mut h = hindrance();
        h.resolved_date = date(2025, 2, 1);
        assert!(h.validate().is_err());
    }
}
