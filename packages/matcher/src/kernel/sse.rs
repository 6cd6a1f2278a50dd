//! SSE endpoint streaming assignment lifecycle events to subscribers.
//!
//! Each frame's SSE `id:` carries the event sequence number, so a
//! reconnecting client can resume via the standard `Last-Event-ID` header
//! (or a `last_event_id` query parameter): the missed backlog is replayed
//! first, then the live stream continues. Duplicates across the seam are
//! possible (at-least-once); clients drop by sequence number.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::domains::dispatch::events::AssignmentEvent;
use crate::kernel::service::MatcherService;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub last_event_id: Option<u64>,
}

/// Build the router for the assignment event stream.
pub fn router(service: MatcherService) -> Router {
    Router::new()
        .route("/api/assignments/stream", get(stream_handler))
        .with_state(service)
}

/// SSE handler — replays from the client's last-seen sequence, then streams
/// live events.
async fn stream_handler(
    State(service): State<MatcherService>,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> impl IntoResponse {
    let last_event_id = params.last_event_id.or_else(|| {
        headers
            .get("last-event-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    });

    let (backlog, rx) = service.subscribe_assignments(last_event_id).await;

    let backlog = tokio_stream::iter(backlog.into_iter().map(sse_frame));
    let live = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(sse_frame(event)),
        // A lagged subscriber missed events; tell it so it can reconnect
        // with its last-seen id and replay.
        Err(BroadcastStreamRecvError::Lagged(_)) => {
            Some(Ok(Event::default().event("lagged").data("{}")))
        }
    });

    Sse::new(backlog.chain(live)).keep_alive(KeepAlive::default())
}

fn sse_frame(event: AssignmentEvent) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default()
        .id(event.sequence.to_string())
        .event(event.kind.as_str())
        .data(data))
}
