use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use smis_core::SparePartId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_spare_parts).post(create_spare_part))
        .route("/:id", get(get_spare_part))
}

pub async fn create_spare_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateSparePartRequest>,
) -> axum::response::Response {
    match services.register_spare_part(body.into()).await {
        Ok(part) => {
            tracing::info!(spare_part_id = %part.id, by = principal.username(), "spare part created");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": part.id.to_string() })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_spare_parts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.spare_parts().await {
        Ok(parts) => (StatusCode::OK, Json(parts)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_spare_part(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SparePartId = match dto::parse_id(&id, "spare part") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.spare_part(id).await {
        Ok(part) => (StatusCode::OK, Json(part)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
