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
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_stock_in).post(create_stock_in))
}

pub async fn create_stock_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::StockInRequest>,
) -> axum::response::Response {
    match services.record_stock_in(body.into()).await {
        Ok(entry) => {
            tracing::info!(stock_in_id = %entry.id, by = principal.username(), "stock-in created");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": entry.id.to_string() })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_stock_in(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListingParams>,
) -> axum::response::Response {
    match services.stock_in(params.limit).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
