use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::error;

use super::{AppState, LimitQuery, DEFAULT_LIMIT_TOP};
use crate::modules::spending_categories;

#[derive(Debug, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_spent: f64,
}

#[derive(Debug, Serialize)]
pub struct MerchantTotal {
    pub merchant: String,
    pub amount: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct TopCategoriesResponse {
    pub categories: Vec<CategoryTotal>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct TopMerchantsResponse {
    pub category: String,
    pub merchants: Vec<MerchantTotal>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/categories/top - Categories ranked by total spent
pub async fn get_top_categories(
    State(mut state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = query.resolve(DEFAULT_LIMIT_TOP);

    match spending_categories::get_top_categories(&mut state.redis, limit).await {
        Ok(top) => {
            let categories: Vec<CategoryTotal> = top
                .into_iter()
                .map(|(category, total_spent)| CategoryTotal { category, total_spent })
                .collect();

            Json(TopCategoriesResponse {
                count: categories.len(),
                categories,
                error: None,
            })
        }
        Err(e) => {
            error!("Error getting top categories: {e}");
            Json(TopCategoriesResponse {
                error: Some(e.to_string()),
                ..Default::default()
            })
        }
    }
}

/// GET /api/categories/:category/top - Merchants ranked within one category
pub async fn get_top_merchants(
    State(mut state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = query.resolve(DEFAULT_LIMIT_TOP);

    match spending_categories::get_top_merchants_in_category(&mut state.redis, &category, limit).await {
        Ok(top) => {
            let merchants: Vec<MerchantTotal> = top
                .into_iter()
                .map(|(merchant, amount)| MerchantTotal { merchant, amount })
                .collect();

            Json(TopMerchantsResponse {
                category,
                count: merchants.len(),
                merchants,
                error: None,
            })
        }
        Err(e) => {
            error!("Error getting top merchants for {category}: {e}");
            Json(TopMerchantsResponse {
                category,
                error: Some(e.to_string()),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_payload_shape() {
        let json = serde_json::to_value(TopCategoriesResponse {
            categories: vec![CategoryTotal {
                category: "travel".into(),
                total_spent: 1250.75,
            }],
            count: 1,
            error: None,
        })
        .unwrap();

        assert_eq!(json["categories"][0]["category"], "travel");
        assert_eq!(json["categories"][0]["total_spent"], 1250.75);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_merchant_payload_keeps_category_on_error() {
        let json = serde_json::to_value(TopMerchantsResponse {
            category: "coffee".into(),
            error: Some("WRONGTYPE".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(json["category"], "coffee");
        assert_eq!(json["merchants"], serde_json::json!([]));
        assert_eq!(json["error"], "WRONGTYPE");
    }
}
