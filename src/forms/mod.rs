//! Form submission: validate, fill derived columns, then update, refuse on a
//! natural-key duplicate, or insert/upsert.

use log::{info, warn};
use serde::Serialize;

use crate::core::data::DataError;
use crate::records::{Record, TableClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// New record. Tables with duplicate detection refuse an existing key.
    Create,
    /// Edit of the row with this id.
    Edit(i64),
    /// Explicit overwrite through the table's conflict target.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome<R> {
    Created { record: R },
    Updated { record: R },
    Upserted { record: R },
    Duplicate { existing: R },
}

impl<R> SubmitOutcome<R> {
    pub fn record(&self) -> &R {
        match self {
            Self::Created { record } | Self::Updated { record } | Self::Upserted { record } => {
                record
            }
            Self::Duplicate { existing } => existing,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

pub async fn submit<R: Record>(
    client: &TableClient<R>,
    mut record: R,
    mode: SubmitMode,
) -> Result<SubmitOutcome<R>, FormError> {
    let table = client.table();
    record.validate().map_err(FormError::Validation)?;
    record.normalize();

    match mode {
        SubmitMode::Edit(id) => {
            if table.has_column("serial_no") && record.serial_no().is_none() {
                let current = client
                    .get(id)
                    .await?
                    .ok_or_else(|| DataError::NotFound(format!("{table} id {id}")))?;
                if let Some(serial) = current.serial_no() {
                    record.set_serial_no(serial);
                }
            }
            let stored = client.update(id, &record).await?;
            info!("Updated {table} id {id}");
            Ok(SubmitOutcome::Updated { record: stored })
        }
        SubmitMode::Overwrite => {
            assign_serial(client, &mut record).await?;
            let stored = client.upsert(&record).await?;
            info!("Upserted {table} id {:?}", stored.id());
            Ok(SubmitOutcome::Upserted { record: stored })
        }
        SubmitMode::Create => {
            if table.spec().detect_duplicates {
                if let Some(existing) = client.find_duplicate(&record).await? {
                    warn!(
                        "Refusing to create {table}: id {:?} already holds this key",
                        existing.id()
                    );
                    return Ok(SubmitOutcome::Duplicate { existing });
                }
            }
            assign_serial(client, &mut record).await?;
            // Tables with a conflict target but no duplicate prompt are pure upserts.
            let stored = if table.spec().natural_key.is_empty() {
                client.insert(&record).await?
            } else {
                client.upsert(&record).await?
            };
            info!("Created {table} id {:?}", stored.id());
            Ok(SubmitOutcome::Created { record: stored })
        }
    }
}

async fn assign_serial<R: Record>(client: &TableClient<R>, record: &mut R) -> Result<(), DataError> {
    if client.table().has_column("serial_no") && record.serial_no().is_none() {
        let serial = client.next_serial().await?;
        record.set_serial_no(serial);
    }
    Ok(())
}

/// Removes one row by id. Deleting an id that no longer exists is an error.
pub async fn delete<R: Record>(client: &TableClient<R>, id: i64) -> Result<(), FormError> {
    let table = client.table();
    match client.delete(id).await? {
        0 => Err(DataError::NotFound(format!("{table} id {id}")).into()),
        n => {
            info!("Deleted {n} row(s) from {table} (id {id})");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{DataClient, MemoryDataClient, Query, Table};
    use crate::records::{ConcretePlan, Drawing, Hindrance, TowerFinishDate};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn plan(volume: f64) -> ConcretePlan {
        ConcretePlan {
            id: None,
            year: Some(2025),
            month: Some(3),
            week: Some(2),
            tower: "T1".into(),
            planned_volume: Some(volume),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_backend_call() {
        let memory = Arc::new(MemoryDataClient::new());
        let client = TableClient::<Hindrance>::new(memory.clone());
        let empty = Hindrance {
            id: None,
            tower: "T1".into(),
            serial_no: None,
            item_description: String::new(),
            start_date: None,
            resolved_date: None,
            period_days: None,
            reason: None,
            remarks: None,
        };
        let err = submit(&client, empty, SubmitMode::Create)
            .await
            .expect_err("validation");
        assert!(matches!(err, FormError::Validation(_)));
        assert_eq!(memory.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_reports_duplicate_instead_of_overwriting() {
        let memory = Arc::new(MemoryDataClient::new());
        let client = TableClient::<ConcretePlan>::new(memory.clone());

        let first = submit(&client, plan(30.0), SubmitMode::Create)
            .await
            .expect("create");
        assert!(matches!(first, SubmitOutcome::Created { .. }));

        let second = submit(&client, plan(45.0), SubmitMode::Create)
            .await
            .expect("duplicate");
        match second {
            SubmitOutcome::Duplicate { existing } => {
                assert_eq!(existing.planned_volume, Some(30.0));
                assert_eq!(existing.id, first.record().id);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(memory.row_count(Table::ConcretePlan).await, 1);
    }

    #[tokio::test]
    async fn test_overwrite_twice_leaves_latest_value() {
        let memory = Arc::new(MemoryDataClient::new());
        let client = TableClient::<ConcretePlan>::new(memory.clone());
        submit(&client, plan(10.0), SubmitMode::Overwrite)
            .await
            .expect("first");
        submit(&client, plan(12.5), SubmitMode::Overwrite)
            .await
            .expect("second");

        let rows = client.list(Query::new()).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].planned_volume, Some(12.5));
    }

    #[tokio::test]
    async fn test_edit_keeps_serial_and_updates_by_id() {
        let memory = Arc::new(MemoryDataClient::new());
        let client = TableClient::<Drawing>::new(memory.clone());
        let drawing = Drawing {
            id: None,
            serial_no: None,
            category: "Structural".into(),
            description: "Raft".into(),
            record_date: None,
        };
        let created = submit(&client, drawing.clone(), SubmitMode::Create)
            .await
            .expect("create");
        let id = created.record().id.expect("id");
        assert_eq!(created.record().serial_no, Some(1));

        let edited = Drawing {
            description: "Raft rev B".into(),
            ..drawing
        };
        let updated = submit(&client, edited, SubmitMode::Edit(id))
            .await
            .expect("edit");
        assert_eq!(updated.record().serial_no, Some(1));
        assert_eq!(updated.record().description, "Raft rev B");
        assert_eq!(memory.row_count(Table::Drawings).await, 1);
    }

    #[tokio::test]
    async fn test_finish_date_create_is_pure_upsert_with_derived_variance() {
        let memory: Arc<dyn DataClient> = Arc::new(MemoryDataClient::new());
        let client = TableClient::<TowerFinishDate>::new(memory);
        let mut finish = TowerFinishDate {
            id: None,
            tower: "T4".into(),
            planned_finish: NaiveDate::from_ymd_opt(2026, 1, 31),
            projected_finish: NaiveDate::from_ymd_opt(2026, 2, 10),
            variance_days: Some(0),
        };
        submit(&client, finish.clone(), SubmitMode::Create)
            .await
            .expect("first");
        finish.projected_finish = NaiveDate::from_ymd_opt(2026, 1, 21);
        let second = submit(&client, finish, SubmitMode::Create)
            .await
            .expect("second");
        assert_eq!(second.record().variance_days, Some(-10));
        assert_eq!(client.list(Query::new()).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_row() {
        let memory = Arc::new(MemoryDataClient::new());
        let client = TableClient::<ConcretePlan>::new(memory.clone());
        let mut ids = Vec::new();
        for week in 1..=3 {
            let mut p = plan(5.0);
            p.week = Some(week);
            let created = submit(&client, p, SubmitMode::Create).await.expect("create");
            ids.push(created.record().id.expect("id"));
        }

        delete(&client, ids[1]).await.expect("delete");
        let remaining: Vec<_> = client
            .list(Query::new())
            .await
            .expect("list")
            .into_iter()
            .filter_map(|p| p.id)
            .collect();
        assert_eq!(remaining, vec![ids[0], ids[2]]);

        let err = delete(&client, ids[1]).await.expect_err("gone");
        assert!(matches!(err, FormError::Data(DataError::NotFound(_))));
    }
}
