use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::AppState;
use crate::error::Result;
use crate::modules::spending_over_time::{self, TimeRange, DEFAULT_BUCKET_MS};

/// `?from=&to=&bucket_ms=`, epoch milliseconds
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub bucket_ms: Option<u64>,
}

impl From<RangeQuery> for TimeRange {
    fn from(query: RangeQuery) -> Self {
        TimeRange {
            from: query.from,
            to: query.to,
            bucket_ms: query.bucket_ms.unwrap_or(DEFAULT_BUCKET_MS).max(1),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpendingPoint {
    pub timestamp: i64,
    pub amount: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct SpendingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub points: Vec<SpendingPoint>,
    pub bucket_ms: u64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SpendingResponse {
    fn build(category: Option<String>, range: TimeRange, samples: Result<Vec<(i64, f64)>>) -> Self {
        match samples {
            Ok(samples) => {
                let points: Vec<SpendingPoint> = samples
                    .into_iter()
                    .map(|(timestamp, amount)| SpendingPoint { timestamp, amount })
                    .collect();

                Self {
                    category,
                    count: points.len(),
                    points,
                    bucket_ms: range.bucket_ms,
                    error: None,
                }
            }
            Err(e) => {
                error!("Error reading spending time series: {e}");
                Self {
                    category,
                    bucket_ms: range.bucket_ms,
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}

/// GET /api/timeseries/spending - Total spending per bucket
pub async fn get_spending(
    State(mut state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range = TimeRange::from(query);
    let samples = spending_over_time::get_spending(&mut state.redis, range).await;

    Json(SpendingResponse::build(None, range, samples))
}

/// GET /api/timeseries/spending/:category - One category's spending per bucket
pub async fn get_category_spending(
    State(mut state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range = TimeRange::from(query);
    let samples = spending_over_time::get_category_spending(&mut state.redis, &category, range).await;

    Json(SpendingResponse::build(Some(category), range, samples))
}
