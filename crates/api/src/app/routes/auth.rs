use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use smis_auth::Registration;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Public account routes (no bearer token required).
pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CredentialsRequest>,
) -> axum::response::Response {
    let registration = Registration {
        username: body.username,
        password: body.password,
    };

    match services.register(registration).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": user.id.to_string(),
                "username": user.username,
            })),
        )
            .into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CredentialsRequest>,
) -> axum::response::Response {
    match services.login(&body.username, &body.password).await {
        Ok(session) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "token": session.token.token,
                "username": session.user.username,
                "expires_at": session.token.claims.expires_at,
            })),
        )
            .into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}
