// Banking Workshop - REST API
//
// Read-only views over the Redis structures the processor maintains.
// Every handler does one or two module calls; Redis does the real work.

mod categories;
mod error;
mod status;
mod stream;
mod timeseries;
mod transactions;
mod search;

use std::path::Path;
use std::time::Duration;

use axum::{response::IntoResponse, routing::get, Json, Router};
use redis::aio::ConnectionManager;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;

pub use error::ApiError;

pub const DEFAULT_LIMIT_TRANSACTIONS: usize = 20;
pub const DEFAULT_LIMIT_TOP: usize = 10;
pub const MAX_LIMIT: usize = 500;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub redis: ConnectionManager,
    pub stream_key: String,
}

impl AppState {
    pub fn new(redis: ConnectionManager, config: &Config) -> Self {
        Self {
            redis,
            stream_key: config.stream_key.clone(),
        }
    }
}

/// `?limit=` shared by the list endpoints; negative values clamp to 0
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn resolve(&self, default: usize) -> usize {
        resolve_limit(self.limit, default)
    }
}

/// Requested limit clamped to `[0, MAX_LIMIT]`
pub fn resolve_limit(limit: Option<i64>, default: usize) -> usize {
    match limit {
        Some(limit) => limit.clamp(0, MAX_LIMIT as i64) as usize,
        None => default.min(MAX_LIMIT),
    }
}

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Routes that need no Redis access
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Routes under /api
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status::get_status))
        .route("/debug", get(status::get_debug))
        .route("/transactions/recent", get(transactions::get_recent_transactions))
        .route("/transactions/:transaction_id", get(transactions::get_transaction))
        .route("/categories/top", get(categories::get_top_categories))
        .route("/categories/:category/top", get(categories::get_top_merchants))
        .route("/timeseries/spending", get(timeseries::get_spending))
        .route("/timeseries/spending/:category", get(timeseries::get_category_spending))
        .route("/search", get(search::search_transactions))
        .route("/stream/latest", get(stream::get_latest))
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60))
}

/// Full application: health, API, and the static UI when its directory exists
pub fn router(state: AppState, ui_dir: &str) -> Router {
    let mut app = health_routes().nest("/api", api_routes(state));

    if Path::new(ui_dir).is_dir() {
        info!("Serving UI from {ui_dir}");
        app = app.fallback_service(ServeDir::new(ui_dir));
    }

    app.layer(cors()).layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(config: &Config, redis: ConnectionManager) -> anyhow::Result<()> {
    let state = AppState::new(redis, config);
    let app = router(state, &config.ui_dir);

    let address = config.api_address();
    let listener = TcpListener::bind(&address).await?;
    info!("🚀 API listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::Query;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let response = health_routes()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = health_routes()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_limit_resolution() {
        assert_eq!(LimitQuery { limit: None }.resolve(20), 20);
        assert_eq!(LimitQuery { limit: Some(5) }.resolve(20), 5);
        assert_eq!(LimitQuery { limit: Some(0) }.resolve(20), 0);
        assert_eq!(LimitQuery { limit: Some(10_000) }.resolve(20), MAX_LIMIT);
        assert_eq!(LimitQuery { limit: Some(-1) }.resolve(20), 0);
        assert_eq!(LimitQuery { limit: Some(i64::MIN) }.resolve(20), 0);
    }

    #[test]
    fn test_negative_limit_is_accepted_by_extractor() {
        let uri: axum::http::Uri = "/api/transactions/recent?limit=-1".parse().unwrap();
        let Query(query) = Query::<LimitQuery>::try_from_uri(&uri).unwrap();

        assert_eq!(query.limit, Some(-1));
        assert_eq!(query.resolve(DEFAULT_LIMIT_TRANSACTIONS), 0);
    }
}
