use axum::{routing::get, Router};

pub mod auth;
pub mod reports;
pub mod spare_parts;
pub mod stock_in;
pub mod stock_out;
pub mod system;

/// Router for all authenticated ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/spare-parts", spare_parts::router())
        .nest("/stock-in", stock_in::router())
        .nest("/stock-out", stock_out::router())
        .nest("/reports", reports::router())
}
