use axum::{extract::State, Json};
use serde::Serialize;

use super::{ApiError, AppState};
use crate::stream;
use crate::transaction::Transaction;

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub transaction: Option<Transaction>,
    pub stream_length: usize,
}

/// GET /api/stream/latest - Newest raw transaction, before any processing
pub async fn get_latest(State(mut state): State<AppState>) -> Result<Json<LatestResponse>, ApiError> {
    let transaction = stream::latest(&mut state.redis, &state.stream_key).await?;
    let stream_length = stream::length(&mut state.redis, &state.stream_key).await?;

    Ok(Json(LatestResponse {
        transaction,
        stream_length,
    }))
}
