use axum::{extract::State, response::IntoResponse, Json};

use super::{ApiError, AppState};
use crate::status;

/// GET /api/status - Which UI tabs are unlocked
pub async fn get_status(State(mut state): State<AppState>) -> impl IntoResponse {
    Json(status::unlock_status(&mut state.redis).await)
}

/// GET /api/debug - Raw key counts behind the transactions tab
pub async fn get_debug(State(mut state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let info = status::debug_info(&mut state.redis).await?;
    Ok(Json(info))
}
