use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{resolve_limit, ApiError, AppState, DEFAULT_LIMIT_TOP};
use crate::modules::search::{self, SearchHit};

const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub count: usize,
    pub total: i64,
    pub search_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trimmed query text, rejected when shorter than two characters
fn validate_query(query: &SearchQuery) -> Result<&str, ApiError> {
    let text = query.q.as_deref().map(str::trim).unwrap_or_default();

    if text.chars().count() < MIN_QUERY_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Query must be at least {MIN_QUERY_CHARS} characters"
        )));
    }

    Ok(text)
}

/// GET /api/search?q= - Full-text search over merchant, category and location
pub async fn search_transactions(
    State(mut state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let text = validate_query(&query)?;
    let limit = resolve_limit(query.limit, DEFAULT_LIMIT_TOP);

    let response = match search::search_transactions(&mut state.redis, text, limit).await {
        Ok(outcome) => SearchResponse {
            count: outcome.hits.len(),
            results: outcome.hits,
            total: outcome.total,
            search_ms: outcome.search_ms,
            error: None,
        },
        Err(e) => {
            error!("Search for {text:?} failed: {e}");
            SearchResponse {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MAX_LIMIT;

    fn query(q: Option<&str>) -> SearchQuery {
        SearchQuery {
            q: q.map(str::to_string),
            limit: None,
        }
    }

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query(&query(Some("  coffee  "))).unwrap(), "coffee");
        assert!(validate_query(&query(Some("a"))).is_err());
        assert!(validate_query(&query(Some("   "))).is_err());
        assert!(validate_query(&query(None)).is_err());
        assert_eq!(validate_query(&query(Some("éé"))).unwrap(), "éé");
    }

    #[test]
    fn test_search_limit_clamped() {
        let uri: axum::http::Uri = "/api/search?q=coffee&limit=-5".parse().unwrap();
        let Query(query) = Query::<SearchQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(resolve_limit(query.limit, DEFAULT_LIMIT_TOP), 0);

        let uri: axum::http::Uri = "/api/search?q=coffee&limit=9000".parse().unwrap();
        let Query(query) = Query::<SearchQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(resolve_limit(query.limit, DEFAULT_LIMIT_TOP), MAX_LIMIT);
    }
}
