use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use log::{info, warn};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

use super::error::ApiError;
use crate::core::data::{ChangeEvent, ChangeFilter, Table};
use crate::core::shared::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RealtimeParams {
    /// Comma-separated table names; every realtime table when absent.
    pub tables: Option<String>,
    pub year: Option<i32>,
}

pub fn parse_filter(params: &RealtimeParams) -> Result<ChangeFilter, ApiError> {
    let tables: Vec<Table> = match params.tables.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                let table = name.parse::<Table>().map_err(ApiError::BadRequest)?;
                if table.spec().realtime {
                    Ok(table)
                } else {
                    Err(ApiError::BadRequest(format!("{table} has no change feed")))
                }
            })
            .collect::<Result<_, _>>()?,
        None => Table::ALL.into_iter().filter(|t| t.spec().realtime).collect(),
    };
    let filter = ChangeFilter::tables(&tables);
    Ok(match params.year {
        Some(year) => filter.with_year(year),
        None => filter,
    })
}

/// What a realtime subscriber is sent.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The subscriber fell behind by this many events and should reload.
    Resync(u64),
}

impl FeedMessage {
    fn into_event(self) -> Option<Event> {
        match self {
            Self::Change(change) => Event::default().event("change").json_data(&change).ok(),
            Self::Resync(missed) => Some(Event::default().event("resync").data(missed.to_string())),
        }
    }
}

/// Changes matching `filter`, with lag turned into a resync message.
pub fn feed_messages(
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
) -> impl Stream<Item = FeedMessage> {
    BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) if filter.matches(&event) => Some(FeedMessage::Change(event)),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!("Realtime subscriber lagged by {n} events");
            Some(FeedMessage::Resync(n))
        }
    })
}

/// Row changes as server-sent events. A `resync` event tells a lagging
/// client that it missed changes and should reload.
pub async fn handle_realtime(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RealtimeParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = parse_filter(&params)?;
    info!("Realtime subscriber for {:?} (year {:?})", filter.tables, filter.year);

    let stream = feed_messages(state.data.subscribe(), filter)
        .filter_map(|message| message.into_event().map(Ok));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{ChangeFeed, ChangeKind};

    #[test]
    fn test_default_filter_covers_realtime_tables() {
        let filter = parse_filter(&RealtimeParams::default()).expect("filter");
        assert_eq!(filter.tables.len(), 6);
        assert!(filter.tables.contains(&Table::CashflowActual));
    }

    #[test]
    fn test_non_realtime_table_rejected() {
        let params = RealtimeParams {
            tables: Some("concrete_plan, hindrances".into()),
            year: Some(2025),
        };
        assert!(matches!(parse_filter(&params), Err(ApiError::BadRequest(_))));

        let params = RealtimeParams {
            tables: Some("concrete-plan,concrete_actual".into()),
            year: Some(2025),
        };
        let filter = parse_filter(&params).expect("filter");
        assert_eq!(filter.tables, vec![Table::ConcretePlan, Table::ConcreteActual]);
        assert_eq!(filter.year, Some(2025));
    }

    fn change(table: Table, year: i64) -> ChangeEvent {
        let row = serde_json::json!({ "id": year, "year": year })
            .as_object()
            .cloned()
            .unwrap_or_default();
        ChangeEvent::new(table, ChangeKind::Insert, row)
    }

    #[tokio::test]
    async fn test_lagging_subscriber_gets_resync_then_filtered_changes() {
        let feed = ChangeFeed::new(2);
        let filter = ChangeFilter::tables(&[Table::ConcretePlan]).with_year(2025);
        let messages = feed_messages(feed.subscribe(), filter);

        for year in [2025, 2025, 2025, 2024, 2025] {
            feed.publish(change(Table::ConcretePlan, year));
        }
        drop(feed);

        let received: Vec<FeedMessage> = messages.collect().await;
        assert_eq!(received.len(), 2, "{received:?}");
        assert!(matches!(received[0], FeedMessage::Resync(3)));
        match &received[1] {
            FeedMessage::Change(event) => assert_eq!(event.year(), Some(2025)),
            other => panic!("expected a change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_tables_are_filtered_out() {
        let feed = ChangeFeed::new(8);
        let messages = feed_messages(feed.subscribe(), ChangeFilter::tables(&[Table::CashflowActual]));
        feed.publish(change(Table::CashflowPlan, 2025));
        feed.publish(change(Table::CashflowActual, 2025));
        drop(feed);

        let received: Vec<FeedMessage> = messages.collect().await;
        assert_eq!(received.len(), 1);
        assert!(matches!(&received[0], FeedMessage::Change(e) if e.table == Table::CashflowActual));
        assert!(FeedMessage::Resync(1).into_event().is_some());
    }
}
