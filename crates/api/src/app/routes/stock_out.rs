use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use smis_core::StockOutId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock_out).post(create_stock_out))
        .route("/:id", put(update_stock_out).delete(delete_stock_out))
}

pub async fn create_stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::StockOutRequest>,
) -> axum::response::Response {
    match services.record_stock_out(body.into()).await {
        Ok(entry) => {
            tracing::info!(stock_out_id = %entry.id, by = principal.username(), "stock-out created");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": entry.id.to_string() })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListingParams>,
) -> axum::response::Response {
    match services.stock_out(params.limit).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StockOutRequest>,
) -> axum::response::Response {
    let id: StockOutId = match dto::parse_id(&id, "stock-out") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.revise_stock_out(id, body.into()).await {
        Ok(_) => {
            tracing::info!(stock_out_id = %id, by = principal.username(), "stock-out updated");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "message": "Stock out updated successfully" })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StockOutId = match dto::parse_id(&id, "stock-out") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.remove_stock_out(id).await {
        Ok(_) => {
            tracing::info!(stock_out_id = %id, by = principal.username(), "stock-out deleted");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "message": "Stock out deleted successfully" })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
