use axum::{extract::State, Json};

use crate::http::server::AppState;
use crate::net::TrackerSnapshot;

/// Snapshot of the request counters and the live address table.
pub async fn status(State(state): State<AppState>) -> Json<TrackerSnapshot> {
    Json(state.tracker.snapshot())
}
