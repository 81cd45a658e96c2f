//! HTTP surface over `PriceService`.
//!
//! Every endpoint except `/health` answers with the `ApiResponse` envelope.
//! Not-found kinds map to 404 with the endpoint's own error code, a refresh
//! conflict to 409 and a chain failure to 502.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::error;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{ErrorCode, FeedError};
use crate::price_service::{HealthReport, PriceService};
use crate::round_codec::FeedFailure;
use crate::types::conversions::now_iso;

pub type ApiState = Arc<PriceService>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_iso(),
            block_number: None,
        }
    }

    fn at_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number.to_string());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRefreshResponse {
    pub refreshed: bool,
    pub total_feeds: usize,
    pub successful_feeds: usize,
    pub errors: Vec<FeedFailure>,
    /// Milliseconds.
    pub duration: u64,
    pub block_number: String,
}

/// A `FeedError` rendered for one endpoint.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// `not_found` replaces the code of every not-found kind.
    fn from_feed(err: FeedError, not_found: ErrorCode, message: String) -> Self {
        if err.is_not_found() {
            return Self {
                status: StatusCode::NOT_FOUND,
                code: not_found,
                message,
            };
        }
        let status = match err {
            FeedError::RefreshInProgress => StatusCode::CONFLICT,
            FeedError::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::CONFLICT {
            error!("request failed: {}", err);
        }
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }

    fn feed(err: FeedError, symbol: &str) -> Self {
        Self::from_feed(
            err,
            ErrorCode::FeedNotFound,
            format!("Feed with symbol '{}' not found", symbol),
        )
    }

    fn price(err: FeedError, symbol: &str) -> Self {
        Self::from_feed(
            err,
            ErrorCode::PriceNotFound,
            format!("Price for symbol '{}' not found", symbol),
        )
    }

    fn reserve(err: FeedError, symbol: &str) -> Self {
        Self::from_feed(
            err,
            ErrorCode::ReserveNotFound,
            format!("Proof of Reserve data for symbol '{}' not found", symbol),
        )
    }

    fn round(err: FeedError, symbol: &str, round_id: &str) -> Self {
        Self::from_feed(
            err,
            ErrorCode::RoundNotFound,
            format!("Round {} not found for symbol '{}'", round_id, symbol),
        )
    }

    fn other(err: FeedError) -> Self {
        let message = err.to_string();
        Self::from_feed(err, ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code,
                message: self.message,
            }),
            timestamp: now_iso(),
            block_number: None,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/feeds", get(get_feeds))
        .route("/feeds/:symbol", get(get_feed))
        .route("/feeds/:symbol/description", get(get_feed_description))
        .route("/feeds/:symbol/version", get(get_feed_version))
        .route("/feeds/:symbol/decimals", get(get_feed_decimals))
        .route("/feeds/:symbol/rounds/:round_id", get(get_round))
        .route("/prices", get(get_prices))
        .route("/prices/refresh", post(refresh_prices))
        .route("/prices/reserves", get(get_reserves))
        .route("/prices/reserves/:symbol", get(get_reserve))
        .route("/prices/:symbol", get(get_price))
        .with_state(state)
}

async fn health_check(State(service): State<ApiState>) -> Json<HealthReport> {
    Json(service.health().await)
}

async fn get_feeds(State(service): State<ApiState>) -> ApiResult<Vec<crate::types::FeedDescriptor>> {
    Ok(Json(ApiResponse::ok(service.feeds().to_vec())))
}

async fn get_feed(
    State(service): State<ApiState>,
    Path(symbol): Path<String>,
) -> ApiResult<crate::types::FeedDescriptor> {
    let feed = service.feed(&symbol).map_err(|e| ApiError::feed(e, &symbol))?;
    Ok(Json(ApiResponse::ok(feed.clone())))
}

async fn get_feed_description(
    State(service): State<ApiState>,
    Path(symbol): Path<String>,
) -> ApiResult<crate::types::FeedDescription> {
    let description = service
        .describe(&symbol)
        .await
        .map_err(|e| ApiError::feed(e, &symbol))?;
    Ok(Json(ApiResponse::ok(description)))
}

async fn get_feed_version(
    State(service): State<ApiState>,
    Path(symbol): Path<String>,
) -> ApiResult<crate::types::FeedVersion> {
    let version = service
        .version(&symbol)
        .await
        .map_err(|e| ApiError::feed(e, &symbol))?;
    Ok(Json(ApiResponse::ok(version)))
}

async fn get_feed_decimals(
    State(service): State<ApiState>,
    Path(symbol): Path<String>,
) -> ApiResult<crate::types::FeedDecimals> {
    let decimals = service
        .decimals_of(&symbol)
        .await
        .map_err(|e| ApiError::feed(e, &symbol))?;
    Ok(Json(ApiResponse::ok(decimals)))
}

async fn get_round(
    State(service): State<ApiState>,
    Path((symbol, round_id)): Path<(String, String)>,
) -> ApiResult<crate::types::RoundData> {
    let round = service
        .round_data(&symbol, &round_id)
        .await
        .map_err(|e| ApiError::round(e, &symbol, &round_id))?;
    Ok(Json(ApiResponse::ok(round)))
}

async fn get_prices(State(service): State<ApiState>) -> ApiResult<Vec<crate::types::PriceEntry>> {
    let snapshot = service.prices_or_refresh().await.map_err(ApiError::other)?;
    Ok(Json(
        ApiResponse::ok(snapshot.entries.clone()).at_block(snapshot.block_number),
    ))
}

async fn get_price(
    State(service): State<ApiState>,
    Path(symbol): Path<String>,
) -> ApiResult<crate::types::PriceEntry> {
    let price = service.price(&symbol).map_err(|e| ApiError::price(e, &symbol))?;
    Ok(Json(ApiResponse::ok(price)))
}

async fn refresh_prices(State(service): State<ApiState>) -> ApiResult<PriceRefreshResponse> {
    let outcome = service.refresh().await.map_err(ApiError::other)?;
    let block_number = outcome.block_number;
    Ok(Json(
        ApiResponse::ok(PriceRefreshResponse {
            refreshed: true,
            total_feeds: outcome.total_feeds,
            successful_feeds: outcome.success_count,
            errors: outcome.failures,
            duration: outcome.duration_ms,
            block_number: block_number.to_string(),
        })
        .at_block(block_number),
    ))
}

async fn get_reserves(
    State(service): State<ApiState>,
) -> ApiResult<crate::snapshot_store::ReservesSnapshot> {
    let snapshot = service.reserves_snapshot().await.map_err(ApiError::other)?;
    let block_number = snapshot.block_number;
    Ok(Json(ApiResponse::ok((*snapshot).clone()).at_block(block_number)))
}

async fn get_reserve(
    State(service): State<ApiState>,
    Path(symbol): Path<String>,
) -> ApiResult<crate::types::ReserveEntry> {
    let reserve = service
        .reserve(&symbol)
        .await
        .map_err(|e| ApiError::reserve(e, &symbol))?;
    Ok(Json(ApiResponse::ok(reserve)))
}
