use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use smis_core::SparePartId;
use smis_inventory::{NewSparePart, NewStockIn, NewStockOut, StockOutRevision};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSparePartRequest {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl From<CreateSparePartRequest> for NewSparePart {
    fn from(body: CreateSparePartRequest) -> Self {
        NewSparePart {
            name: body.name,
            category: body.category,
            quantity: body.quantity,
            unit_price: body.unit_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockInRequest {
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub date: NaiveDate,
}

impl From<StockInRequest> for NewStockIn {
    fn from(body: StockInRequest) -> Self {
        NewStockIn {
            spare_part_id: body.spare_part_id,
            quantity: body.quantity,
            date: body.date,
        }
    }
}

/// Body of both `POST /stock-out` and `PUT /stock-out/:id`.
#[derive(Debug, Deserialize)]
pub struct StockOutRequest {
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub date: NaiveDate,
}

impl From<StockOutRequest> for NewStockOut {
    fn from(body: StockOutRequest) -> Self {
        NewStockOut {
            spare_part_id: body.spare_part_id,
            quantity: body.quantity,
            unit_price: body.unit_price,
            date: body.date,
        }
    }
}

impl From<StockOutRequest> for StockOutRevision {
    fn from(body: StockOutRequest) -> Self {
        StockOutRevision {
            spare_part_id: body.spare_part_id,
            quantity: body.quantity,
            unit_price: body.unit_price,
            date: body.date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

// -------------------------
// Query parameters
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DailyParams {
    pub date: NaiveDate,
}

// -------------------------
// Helpers
// -------------------------

pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
