//! Per-table page state: the loaded rows, the active filter, the form/delete
//! mode and the notices raised along the way.

pub mod paginate;

use log::{debug, error};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::core::data::{ChangeEvent, ChangeFilter, Query};
use crate::forms::{self, FormError, SubmitMode, SubmitOutcome};
use crate::records::{Record, TableClient};

pub use paginate::{matches_search, paginate, Page, PageRequest};

pub const DUPLICATE_PROMPT: &str = "A record with these details already exists. Edit it instead?";

#[derive(Debug, Clone, PartialEq)]
pub enum Mode<R> {
    Viewing,
    Editing(i64),
    DuplicateFound(R),
    ConfirmingDelete(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

pub struct PageController<R: Record> {
    client: TableClient<R>,
    filter: Query,
    rows: Vec<R>,
    mode: Mode<R>,
    notices: Vec<Notice>,
}

impl<R: Record> PageController<R> {
    pub fn new(client: TableClient<R>) -> Self {
        Self {
            client,
            filter: Query::new(),
            rows: Vec::new(),
            mode: Mode::Viewing,
            notices: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn mode(&self) -> &Mode<R> {
        &self.mode
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn filter(&self) -> &Query {
        &self.filter
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice::new(level, message));
    }

    /// Re-reads the table. On failure the previous rows stay in place.
    pub async fn load(&mut self) -> bool {
        match self.client.list(self.filter.clone()).await {
            Ok(rows) => {
                debug!("Loaded {} rows from {}", rows.len(), self.client.table());
                self.rows = rows;
                true
            }
            Err(e) => {
                error!("Failed to load {}: {e}", self.client.table());
                self.notify(NoticeLevel::Error, format!("Failed to load data: {e}"));
                false
            }
        }
    }

    /// Replaces the filter and reloads. Filters on columns the table lacks
    /// are dropped.
    pub async fn set_filter(&mut self, filter: Query) -> bool {
        let table = self.client.table();
        let mut kept = Query::new();
        for (column, value) in filter.filters {
            if table.has_column(&column) && !value.is_null() {
                kept = kept.eq(&column, value);
            }
        }
        kept.order = filter.order;
        kept.limit = filter.limit;
        self.filter = kept;
        self.load().await
    }

    pub fn begin_edit(&mut self, id: i64) -> Option<&R> {
        let position = self.rows.iter().position(|r| r.id() == Some(id))?;
        self.mode = Mode::Editing(id);
        self.rows.get(position)
    }

    pub fn cancel(&mut self) {
        self.mode = Mode::Viewing;
    }

    /// Submits the form. An edit in progress updates by id, otherwise a new
    /// record is created unless its key is already taken.
    pub async fn submit(&mut self, record: R) -> bool {
        let mode = match self.mode {
            Mode::Editing(id) => SubmitMode::Edit(id),
            _ => SubmitMode::Create,
        };
        match forms::submit(&self.client, record, mode).await {
            Ok(SubmitOutcome::Duplicate { existing }) => {
                self.notify(NoticeLevel::Info, DUPLICATE_PROMPT);
                self.mode = Mode::DuplicateFound(existing);
                false
            }
            Ok(outcome) => {
                let verb = match outcome {
                    SubmitOutcome::Updated { .. } => "updated",
                    _ => "saved",
                };
                self.notify(NoticeLevel::Success, format!("Record {verb} successfully"));
                self.mode = Mode::Viewing;
                self.load().await;
                true
            }
            Err(FormError::Validation(message)) => {
                self.notify(NoticeLevel::Error, message);
                false
            }
            Err(FormError::Data(e)) => {
                error!("Submit to {} failed: {e}", self.client.table());
                self.notify(NoticeLevel::Error, e.to_string());
                false
            }
        }
    }

    /// Switches from the duplicate prompt to editing the stored row.
    pub fn edit_existing(&mut self) -> Option<R> {
        match std::mem::replace(&mut self.mode, Mode::Viewing) {
            Mode::DuplicateFound(existing) => {
                if let Some(id) = existing.id() {
                    self.mode = Mode::Editing(id);
                }
                Some(existing)
            }
            other => {
                self.mode = other;
                None
            }
        }
    }

    pub fn request_delete(&mut self, id: i64) {
        self.mode = Mode::ConfirmingDelete(id);
    }

    pub async fn confirm_delete(&mut self) -> bool {
        let Mode::ConfirmingDelete(id) = self.mode else {
            return false;
        };
        self.mode = Mode::Viewing;
        match forms::delete(&self.client, id).await {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Record deleted successfully");
                self.load().await;
                true
            }
            Err(e) => {
                error!("Delete from {} failed: {e}", self.client.table());
                self.notify(NoticeLevel::Error, e.to_string());
                false
            }
        }
    }

    /// Events this page reloads on: its own table, scoped to the filtered year.
    pub fn change_filter(&self) -> ChangeFilter {
        let filter = ChangeFilter::tables(&[self.client.table()]);
        match self
            .filter
            .filter_value("year")
            .and_then(Value::as_i64)
            .and_then(|year| i32::try_from(year).ok())
        {
            Some(year) => filter.with_year(year),
            None => filter,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.client.data_client().subscribe()
    }

    /// Reloads when the event concerns this page. Returns whether it did.
    pub async fn on_change(&mut self, event: &ChangeEvent) -> bool {
        if !self.change_filter().matches(event) {
            return false;
        }
        self.load().await
    }
}
