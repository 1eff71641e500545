use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use smis_infra::{AccountError, LedgerError, StoreError};

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        LedgerError::Rejected(msg) => json_error(StatusCode::BAD_REQUEST, "rejected", msg),
        LedgerError::StoreFailure(e) => store_error_to_response(e),
    }
}

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    match err {
        AccountError::Rejected(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AccountError::DuplicateUsername => json_error(
            StatusCode::BAD_REQUEST,
            "duplicate_username",
            "username already exists",
        ),
        AccountError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        ),
        AccountError::Auth(e) => {
            tracing::error!(error = %e, "authentication backend failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "auth_error", "internal error")
        }
        AccountError::Store(e) => store_error_to_response(e),
    }
}

/// Store details are logged, never returned to the client.
fn store_error_to_response(err: StoreError) -> axum::response::Response {
    if err.is_retryable() {
        tracing::warn!(error = %err, "store contention");
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_busy",
            "the request could not be completed; please retry",
        );
    }
    tracing::error!(error = %err, "store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal store error")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
