//! Object-notification intake endpoint

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use castpipe_common::events::NotificationBatch;
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

/// Acknowledgment returned once a batch has been fully processed
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always "processed"; errors surface as error responses instead
    pub status: String,
    /// Number of notifications in the batch
    pub records: usize,
}

/// POST /events
///
/// Accepts one notification batch and processes it to completion before
/// responding. The feed has been republished by the time 200 is returned.
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(batch): Json<NotificationBatch>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let records = batch.len();
    state.orchestrator.handle_batch(&batch).await?;
    Ok((
        StatusCode::OK,
        Json(IngestResponse {
            status: "processed".to_string(),
            records,
        }),
    ))
}

/// Build event intake routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", post(ingest_events))
}
