use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change, published after the write succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row: Row,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, row: Row) -> Self {
        Self {
            table,
            kind,
            row,
            at: Utc::now(),
        }
    }

    pub fn year(&self) -> Option<i64> {
        self.row.get("year").and_then(Value::as_i64)
    }
}

/// Which changes a subscriber cares about. An empty table list matches every
/// table; a year only matches rows carrying that year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub tables: Vec<Table>,
    pub year: Option<i32>,
}

impl ChangeFilter {
    pub fn tables(tables: &[Table]) -> Self {
        Self {
            tables: tables.to_vec(),
            year: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.tables.is_empty() && !self.tables.contains(&event.table) {
            return false;
        }
        match (self.year, event.year()) {
            (Some(wanted), Some(year)) => i64::from(wanted) == year,
            // deletes of rows without a year column still pass
            (Some(_), None) => true,
            (None, _) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        if !event.table.spec().realtime {
            return;
        }
        log::debug!("change {:?} on {}", event.kind, event.table);
        // no receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}
