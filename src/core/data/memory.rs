use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, RwLock};

use super::{
    compare_values, project_columns, row_id, values_equal, ChangeEvent, ChangeFeed, ChangeKind,
    DataClient, DataError, Direction, Query, Row, Table,
};

/// In-process backend with the same uniqueness and not-null rules the
/// Postgres schema enforces. Used by `DATA_BACKEND=memory` and by tests.
#[derive(Debug)]
pub struct MemoryDataClient {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    next_id: AtomicI64,
    calls: AtomicUsize,
    feed: ChangeFeed,
}

impl MemoryDataClient {
    pub fn new() -> Self {
        Self::with_feed(ChangeFeed::default())
    }

    pub fn with_feed(feed: ChangeFeed) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            calls: AtomicUsize::new(0),
            feed,
        }
    }

    /// Number of backend operations issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn row_count(&self, table: Table) -> usize {
        self.tables
            .read()
            .await
            .get(&table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_not_null(table: Table, row: &Row) -> Result<(), DataError> {
        for column in table.spec().columns {
            let missing = row.get(column.name).map_or(true, Value::is_null);
            if !column.nullable && missing {
                return Err(DataError::InvalidValue(format!(
                    "null value in column \"{}\" of relation \"{}\"",
                    column.name,
                    table.name()
                )));
            }
        }
        Ok(())
    }

    fn same_natural_key(table: Table, a: &Row, b: &Row) -> bool {
        let key = table.spec().natural_key;
        !key.is_empty()
            && key.iter().all(|column| match (a.get(*column), b.get(*column)) {
                (Some(x), Some(y)) => values_equal(x, y),
                _ => false,
            })
    }

    fn check_unique(table: Table, rows: &[Row], candidate: &Row, skip_id: Option<i64>) -> Result<(), DataError> {
        let clash = rows
            .iter()
            .filter(|r| skip_id.is_none() || row_id(r) != skip_id)
            .any(|r| Self::same_natural_key(table, r, candidate));
        if clash {
            return Err(DataError::Conflict(format!(
                "duplicate key value violates unique constraint on {} ({})",
                table.name(),
                table.spec().natural_key.join(", ")
            )));
        }
        Ok(())
    }

    fn insert_locked(&self, table: Table, rows: &mut Vec<Row>, row: &Row) -> Result<Row, DataError> {
        let mut stored = project_columns(table, row);
        for column in table.spec().columns {
            stored.entry(column.name.to_string()).or_insert(Value::Null);
        }
        Self::check_not_null(table, &stored)?;
        Self::check_unique(table, rows, &stored, None)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        stored.insert("id".to_string(), Value::from(id));
        rows.push(stored.clone());
        Ok(stored)
    }

    fn update_locked(table: Table, rows: &mut [Row], id: i64, patch: &Row) -> Result<Row, DataError> {
        let position = rows
            .iter()
            .position(|r| row_id(r) == Some(id))
            .ok_or_else(|| DataError::NotFound(format!("{} id {id}", table.name())))?;

        let mut merged = rows[position].clone();
        for (column, value) in project_columns(table, patch) {
            merged.insert(column, value);
        }
        Self::check_not_null(table, &merged)?;
        Self::check_unique(table, rows, &merged, Some(id))?;
        rows[position] = merged.clone();
        Ok(merged)
    }
}

impl Default for MemoryDataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataClient for MemoryDataClient {
    async fn select(&self, table: Table, query: Query) -> Result<Vec<Row>, DataError> {
        self.record_call();
        query.validate(table)?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query.filters.iter().all(|(column, wanted)| {
                            row.get(column).is_some_and(|v| values_equal(v, wanted))
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        rows.sort_by(|a, b| {
            for order in &query.order {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = match order.direction {
                    Direction::Asc => compare_values(left, right),
                    Direction::Desc => compare_values(right, left),
                };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });

        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, DataError> {
        self.record_call();
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let stored = self.insert_locked(table, rows, &row)?;
        drop(tables);

        self.feed
            .publish(ChangeEvent::new(table, ChangeKind::Insert, stored.clone()));
        Ok(stored)
    }

    async fn update(&self, table: Table, id: i64, patch: Row) -> Result<Row, DataError> {
        self.record_call();
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let stored = Self::update_locked(table, rows, id, &patch)?;
        drop(tables);

        self.feed
            .publish(ChangeEvent::new(table, ChangeKind::Update, stored.clone()));
        Ok(stored)
    }

    async fn upsert(&self, table: Table, row: Row) -> Result<Row, DataError> {
        self.record_call();
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();

        let existing = rows
            .iter()
            .find(|r| Self::same_natural_key(table, r, &row))
            .and_then(row_id);

        let (kind, stored) = match existing {
            Some(id) => (
                ChangeKind::Update,
                Self::update_locked(table, rows, id, &row)?,
            ),
            None => (ChangeKind::Insert, self.insert_locked(table, rows, &row)?),
        };
        drop(tables);

        self.feed
            .publish(ChangeEvent::new(table, kind, stored.clone()));
        Ok(stored)
    }

    async fn delete(&self, table: Table, id: i64) -> Result<u64, DataError> {
        self.record_call();
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let mut removed = Vec::new();
        rows.retain(|r| {
            if row_id(r) == Some(id) {
                removed.push(r.clone());
                false
            } else {
                true
            }
        });
        drop(tables);

        for row in &removed {
            self.feed
                .publish(ChangeEvent::new(table, ChangeKind::Delete, row.clone()));
        }
        Ok(removed.len() as u64)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    fn plan(month: i64, week: i64, tower: &str, volume: f64) -> Row {
        row(json!({
            "year": 2025, "month": month, "week": week,
            "tower": tower, "planned_volume": volume
        }))
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_enforces_natural_key() {
        let client = MemoryDataClient::new();
        let first = client
            .insert(Table::ConcretePlan, plan(1, 1, "T1", 10.0))
            .await
            .expect("insert");
        assert_eq!(row_id(&first), Some(1));

        let err = client
            .insert(Table::ConcretePlan, plan(1, 1, "T1", 12.0))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, DataError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_latest_value() {
        let client = MemoryDataClient::new();
        client
            .upsert(Table::ConcretePlan, plan(3, 2, "T2", 40.0))
            .await
            .expect("first");
        client
            .upsert(Table::ConcretePlan, plan(3, 2, "T2", 55.5))
            .await
            .expect("second");

        let rows = client
            .select(Table::ConcretePlan, Query::new())
            .await
            .expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["planned_volume"], json!(55.5));
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_required_column() {
        let client = MemoryDataClient::new();
        let err = client
            .insert(Table::CriticalIssues, row(json!({ "category": "safety" })))
            .await
            .expect_err("not null");
        assert!(matches!(err, DataError::InvalidValue(_)));
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let client = MemoryDataClient::new();
        for (month, tower) in [(2, "T1"), (1, "T1"), (1, "T2")] {
            client
                .insert(Table::ConcretePlan, plan(month, 1, tower, 1.0))
                .await
                .expect("insert");
        }
        let rows = client
            .select(
                Table::ConcretePlan,
                Query::new().eq("tower", "T1").order_asc("month"),
            )
            .await
            .expect("select");
        let months: Vec<_> = rows.iter().map(|r| r["month"].clone()).collect();
        assert_eq!(months, vec![json!(1), json!(2)]);

        let limited = client
            .select(Table::ConcretePlan, Query::new().order_desc("month").limit(1))
            .await
            .expect("select");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0]["month"], json!(2));
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_row_and_publishes() {
        let client = MemoryDataClient::new();
        let mut rx = client.subscribe();
        let a = client
            .insert(Table::CashflowPlan, row(json!({ "year": 2025, "month": 1, "planned_amount": 5.0 })))
            .await
            .expect("insert");
        client
            .insert(Table::CashflowPlan, row(json!({ "year": 2025, "month": 2, "planned_amount": 6.0 })))
            .await
            .expect("insert");

        let removed = client
            .delete(Table::CashflowPlan, row_id(&a).unwrap_or_default())
            .await
            .expect("delete");
        assert_eq!(removed, 1);
        assert_eq!(client.row_count(Table::CashflowPlan).await, 1);

        let kinds: Vec<ChangeKind> = (0..3)
            .map(|_| rx.try_recv().expect("event").kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Insert, ChangeKind::Insert, ChangeKind::Delete]
        );
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let client = MemoryDataClient::new();
        let err = client
            .update(Table::Drawings, 99, Row::new())
            .await
            .expect_err("missing");
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
