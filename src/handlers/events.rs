//! Conversational transport boundary.
//!
//! The chat transport posts one inbound event per user turn and
//! delivers the returned replies (text plus inline controls). All
//! routing happens in the dialogue controller; this handler only
//! validates and counts.

use crate::dialogue::{self, InboundEvent, Reply};
use crate::error::Result;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub user_id: i64,
    pub event: InboundEvent,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub replies: Vec<Reply>,
}

/// POST /events - Route one chat event through the dialogue controller.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventResponse>> {
    let started = std::time::Instant::now();

    let replies = dialogue::handle_event(&state, request.user_id, request.event).await;

    metrics::counter!("events_requests_total").increment(1);
    metrics::histogram!("event_latency_ms").record(started.elapsed().as_millis() as f64);

    Ok(Json(EventResponse { replies }))
}
