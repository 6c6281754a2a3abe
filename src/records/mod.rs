//! Typed rows for every dashboard table and a typed wrapper over the
//! JSON-row data client.

pub mod cashflow;
pub mod concrete;
pub mod finish_dates;
pub mod hindrances;
pub mod issues;
pub mod manpower;
pub mod project_records;
pub mod steel_stock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::data::{row_id, DataClient, DataError, Query, Row, Table};

pub use cashflow::{CashflowActual, CashflowPlan};
pub use concrete::{ConcreteActual, ConcretePlan};
pub use finish_dates::{variance_days, TowerFinishDate, VarianceClass};
pub use hindrances::{Hindrance, OtherInput};
pub use issues::{CriticalIssue, NonNegotiable};
pub use manpower::{ManpowerActual, ManpowerPlan};
pub use project_records::{Approval, ApprovalStatus, Drawing};
pub use steel_stock::SteelStockRecord;

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    fn id(&self) -> Option<i64>;

    /// Required-field check run before any backend call. The error is the
    /// message shown to the user.
    fn validate(&self) -> Result<(), String>;

    /// Fills derived columns before the row is written.
    fn normalize(&mut self) {}

    fn serial_no(&self) -> Option<i32> {
        None
    }

    fn set_serial_no(&mut self, _serial: i32) {}
}

/// Figures that roll up by month (and optionally tower) for plan/actual
/// summaries.
pub trait PeriodFigure {
    fn year(&self) -> Option<i32>;
    fn month(&self) -> Option<u32>;
    fn tower(&self) -> Option<&str> {
        None
    }
    fn figure(&self) -> f64;
}

/// Returns the first missing field as a user-facing message.
pub fn require(fields: &[(&str, bool)]) -> Result<(), String> {
    match fields.iter().find(|(_, present)| !present) {
        Some((name, _)) => Err(format!("Please fill in the required field: {name}")),
        None => Ok(()),
    }
}

pub fn present(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn check_month(month: Option<u32>) -> Result<(), String> {
    match month {
        Some(m) if !(1..=12).contains(&m) => Err(format!("Month must be between 1 and 12, got {m}")),
        _ => Ok(()),
    }
}

pub fn check_week(week: Option<u32>) -> Result<(), String> {
    match week {
        Some(w) if !(1..=5).contains(&w) => Err(format!("Week must be between 1 and 5, got {w}")),
        _ => Ok(()),
    }
}

/// Shared checks for the weekly plan/actual tables.
pub fn validate_weekly(
    year: Option<i32>,
    month: Option<u32>,
    week: Option<u32>,
    tower: &str,
    value: (&str, bool),
) -> Result<(), String> {
    require(&[
        ("year", year.is_some()),
        ("month", month.is_some()),
        ("week", week.is_some()),
        ("tower", present(tower)),
        value,
    ])?;
    check_month(month)?;
    check_week(week)
}

pub fn to_row<R: Serialize>(record: &R) -> Result<Row, DataError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut row)) => {
            row.remove("id");
            Ok(row)
        }
        Ok(other) => Err(DataError::InvalidValue(format!("record is not an object: {other}"))),
        Err(e) => Err(DataError::InvalidValue(e.to_string())),
    }
}

pub fn from_row<R: DeserializeOwned>(row: Row) -> Result<R, DataError> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| DataError::Backend(format!("Unexpected row shape: {e}")))
}

/// Typed access to one table through the injected data client.
pub struct TableClient<R> {
    client: Arc<dyn DataClient>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for TableClient<R> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            _record: PhantomData,
        }
    }
}

impl<R: Record> TableClient<R> {
    pub fn new(client: Arc<dyn DataClient>) -> Self {
        Self {
            client,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> Table {
        R::TABLE
    }

    pub fn data_client(&self) -> &Arc<dyn DataClient> {
        &self.client
    }

    pub async fn list(&self, query: Query) -> Result<Vec<R>, DataError> {
        let rows = self
            .client
            .select(R::TABLE, query.with_default_order(R::TABLE))
            .await?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<R>, DataError> {
        let mut rows = self
            .client
            .select(R::TABLE, Query::new().eq("id", id).limit(1))
            .await?;
        rows.pop().map(from_row).transpose()
    }

    /// Looks up a stored row sharing the record's natural key.
    pub async fn find_duplicate(&self, record: &R) -> Result<Option<R>, DataError> {
        let key = R::TABLE.spec().natural_key;
        if key.is_empty() {
            return Ok(None);
        }
        let row = to_row(record)?;
        let mut query = Query::new();
        for column in key {
            match row.get(*column) {
                Some(value) if !value.is_null() => query = query.eq(column, value.clone()),
                _ => return Ok(None),
            }
        }
        let existing = self.client.select(R::TABLE, query.limit(1)).await?;
        existing
            .into_iter()
            .find(|r| record.id().is_none() || row_id(r) != record.id())
            .map(from_row)
            .transpose()
    }

    pub async fn insert(&self, record: &R) -> Result<R, DataError> {
        let row = self.client.insert(R::TABLE, to_row(record)?).await?;
        from_row(row)
    }

    pub async fn update(&self, id: i64, record: &R) -> Result<R, DataError> {
        let row = self.client.update(R::TABLE, id, to_row(record)?).await?;
        from_row(row)
    }

    pub async fn upsert(&self, record: &R) -> Result<R, DataError> {
        let row = self.client.upsert(R::TABLE, to_row(record)?).await?;
        from_row(row)
    }

    pub async fn delete(&self, id: i64) -> Result<u64, DataError> {
        self.client.delete(R::TABLE, id).await
    }

    /// `max(serial_no) + 1`, or 1 for an empty table.
    pub async fn next_serial(&self) -> Result<i32, DataError> {
        let last = self
            .client
            .select(R::TABLE, Query::new().order_desc("serial_no").limit(1))
            .await?;
        let max = last
            .first()
            .and_then(|r| r.get("serial_no"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(i32::try_from(max + 1).unwrap_or(i32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::MemoryDataClient;

    #[test]
    fn test_require_reports_first_missing_field() {
        assert_eq!(
            require(&[("tower", true), ("item description", false), ("start date", false)]),
            Err("Please fill in the required field: item description".to_string())
        );
        assert!(require(&[("tower", true)]).is_ok());
    }

    #[test]
    fn test_month_and_week_bounds() {
        assert!(check_month(Some(12)).is_ok());
        assert!(check_month(Some(13)).is_err());
        assert!(check_month(None).is_ok());
        assert!(check_week(Some(0)).is_err());
        assert!(check_week(Some(5)).is_ok());
    }

    #[test]
    fn test_to_row_drops_id() {
        let issue = CriticalIssue {
            id: Some(4),
            description: "Crane down".into(),
            category: None,
        };
        let row = to_row(&issue).expect("row");
        assert!(!row.contains_key("id"));
        assert_eq!(row["description"], "Crane down");
    }

    #[tokio::test]
    async fn test_next_serial_and_duplicate_lookup() {
        let client: Arc<dyn DataClient> = Arc::new(MemoryDataClient::new());
        let drawings = TableClient::<Drawing>::new(Arc::clone(&client));
        assert_eq!(drawings.next_serial().await.expect("serial"), 1);

        let mut drawing = Drawing {
            id: None,
            serial_no: Some(7),
            category: "Structural".into(),
            description: "Raft layout".into(),
            record_date: None,
        };
        drawing.normalize();
        drawings.insert(&drawing).await.expect("insert");
        assert_eq!(drawings.next_serial().await.expect("serial"), 8);

        let plans = TableClient::<ConcretePlan>::new(client);
        let plan = ConcretePlan {
            id: None,
            year: Some(2025),
            month: Some(1),
            week: Some(2),
            tower: "T1".into(),
            planned_volume: Some(30.0),
        };
        assert!(plans.find_duplicate(&plan).await.expect("lookup").is_none());
        let stored = plans.insert(&plan).await.expect("insert");
        let found = plans.find_duplicate(&plan).await.expect("lookup");
        assert_eq!(found.and_then(|p| p.id), stored.id);
    }
}
