use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stock-status", get(stock_status))
        .route("/daily-stock-out", get(daily_stock_out))
}

pub async fn stock_status(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.stock_status().await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn daily_stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::DailyParams>,
) -> axum::response::Response {
    match services.daily_stock_out(params.date).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
