use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use storefront_core::domain::catalog::ProductWithVariants;
use storefront_core::domain::ranking::RankedItem;
use storefront_core::error::AggregationFailure;
use storefront_core::listings::{
    self, DEFAULT_MOST_REVIEWED_LIMIT, DEFAULT_NEW_ARRIVALS_LIMIT,
};
use storefront_core::ranking::BestSellersRanker;
use storefront_core::storage::CatalogStore;

#[derive(Clone)]
pub struct AppState {
    /// `None` when the API started without a database.
    pub store: Option<Arc<dyn CatalogStore>>,
    pub best_sellers_limit: usize,
    pub max_limit: usize,
}

impl AppState {
    fn store(&self) -> Result<&Arc<dyn CatalogStore>, ApiError> {
        self.store.as_ref().ok_or_else(|| ApiError {
            code: StatusCode::SERVICE_UNAVAILABLE,
            message: "catalog store unavailable".to_string(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/products/best-sellers", get(get_best_sellers))
        .route("/products/new-arrivals", get(get_new_arrivals))
        .route("/products/most-reviewed", get(get_most_reviewed))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<String>,
}

impl LimitParams {
    /// Absent → `default`; above `max` → `max`; anything but a positive integer is rejected.
    fn resolve(&self, default: usize, max: usize) -> Result<NonZeroUsize, ApiError> {
        let requested = match self.limit.as_deref().map(str::trim) {
            None | Some("") => default,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| ApiError {
                    code: StatusCode::BAD_REQUEST,
                    message: format!("limit must be a positive integer (got {raw:?})"),
                })?,
        };

        NonZeroUsize::new(requested.min(max)).ok_or_else(|| ApiError {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "invalid limit configuration".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ListResponse<T> {
    status: &'static str,
    results: usize,
    data: Vec<T>,
}

impl<T> ListResponse<T> {
    fn success(data: Vec<T>) -> Json<Self> {
        Json(Self {
            status: "success",
            results: data.len(),
            data,
        })
    }
}

#[derive(Debug)]
struct ApiError {
    code: StatusCode,
    message: String,
}

impl ApiError {
    fn aggregation(what: &'static str, err: AggregationFailure) -> Self {
        let err = anyhow::Error::new(err);
        sentry_anyhow::capture_anyhow(&err);
        let detail = format!("{err:#}");
        tracing::error!(error = %detail, what, "listing query failed");
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Failed to fetch {what}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 4xx are the caller's fault ("fail"), everything else is ours ("error").
        let status = if self.code.is_client_error() {
            "fail"
        } else {
            "error"
        };
        (
            self.code,
            Json(serde_json::json!({ "status": status, "message": self.message })),
        )
            .into_response()
    }
}

async fn get_best_sellers(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ListResponse<RankedItem>>, ApiError> {
    let limit = params.resolve(state.best_sellers_limit, state.max_limit)?;
    let ranker = BestSellersRanker::new(state.store()?.clone());

    let items = ranker
        .rank(limit)
        .await
        .map_err(|e| ApiError::aggregation("best sellers", e))?;

    Ok(ListResponse::success(items))
}

async fn get_new_arrivals(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ListResponse<ProductWithVariants>>, ApiError> {
    let limit = params.resolve(DEFAULT_NEW_ARRIVALS_LIMIT, state.max_limit)?;
    let store = state.store()?;

    let items = listings::list_new_arrivals(&**store, limit)
        .await
        .map_err(|e| ApiError::aggregation("new arrivals", e))?;

    Ok(ListResponse::success(items))
}

async fn get_most_reviewed(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ListResponse<ProductWithVariants>>, ApiError> {
    let limit = params.resolve(DEFAULT_MOST_REVIEWED_LIMIT, state.max_limit)?;
    let store = state.store()?;

    let items = listings::list_most_reviewed(&**store, limit)
        .await
        .map_err(|e| ApiError::aggregation("most reviewed products", e))?;

    Ok(ListResponse::success(items))
}
