use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::error;

use super::{ApiError, AppState, LimitQuery, DEFAULT_LIMIT_TRANSACTIONS};
use crate::error::Result;
use crate::modules::{ordered_transactions, store_transaction};
use crate::transaction::Transaction;

#[derive(Debug, Default, Serialize)]
pub struct RecentTransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/transactions/recent - Newest first, full documents
///
/// Two Redis calls: LRANGE for the ids, one JSON.MGET for the documents.
pub async fn get_recent_transactions(
    State(mut state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = query.resolve(DEFAULT_LIMIT_TRANSACTIONS);

    match recent_transactions(&mut state.redis, limit).await {
        Ok(transactions) => Json(RecentTransactionsResponse {
            count: transactions.len(),
            transactions,
            error: None,
        }),
        Err(e) => {
            error!("Error getting recent transactions: {e}");
            Json(RecentTransactionsResponse {
                error: Some(e.to_string()),
                ..Default::default()
            })
        }
    }
}

async fn recent_transactions(conn: &mut ConnectionManager, limit: usize) -> Result<Vec<Transaction>> {
    let ids = ordered_transactions::get_recent_transactions(conn, limit).await?;
    store_transaction::get_transactions_by_ids(conn, &ids).await
}

/// GET /api/transactions/:transaction_id - Single document
pub async fn get_transaction(
    State(mut state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    store_transaction::get_transaction(&mut state.redis, &transaction_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Transaction not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_field_only_on_failure() {
        let ok = serde_json::to_value(RecentTransactionsResponse::default()).unwrap();
        assert!(ok.get("error").is_none());
        assert_eq!(ok["count"], 0);

        let failed = serde_json::to_value(RecentTransactionsResponse {
            error: Some("connection refused".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(failed["error"], "connection refused");
        assert_eq!(failed["transactions"], serde_json::json!([]));
    }
}
