//! Reporting read layer.
//!
//! Listings and the stock-status report. Reads only; nothing here locks a row
//! or writes. The pure builders below are what the in-memory store runs over
//! its tables; the Postgres store computes the same shapes in SQL.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use smis_core::{DomainError, SparePartId};
use smis_inventory::{SparePart, StockInEntry, StockOutEntry};

use crate::reconciliation::LedgerError;
use crate::store::LedgerReader;

/// Listing filter: optional exact date, optional row cap.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub date: Option<NaiveDate>,
    pub limit: Option<u32>,
}

impl ListingQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn on(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }
}

/// A catalog row with its derived valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparePartListing {
    #[serde(flatten)]
    pub part: SparePart,
    pub total_price: Decimal,
}

impl From<SparePart> for SparePartListing {
    fn from(part: SparePart) -> Self {
        Self {
            total_price: part.total_price(),
            part,
        }
    }
}

/// A stock-in row joined with its part's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInListing {
    #[serde(flatten)]
    pub entry: StockInEntry,
    pub spare_part_name: String,
}

/// A stock-out row joined with its part's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOutListing {
    #[serde(flatten)]
    pub entry: StockOutEntry,
    pub total_price: Decimal,
    pub spare_part_name: String,
}

impl StockOutListing {
    pub fn new(entry: StockOutEntry, spare_part_name: String) -> Self {
        Self {
            total_price: entry.total_price(),
            entry,
            spare_part_name,
        }
    }
}

/// One line of the stock-status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockStatusRow {
    pub id: SparePartId,
    pub name: String,
    pub category: String,
    pub stored_quantity: i64,
    pub total_in: i64,
    pub total_out: i64,
    /// Equal to `stored_quantity`; the stored counter is authoritative.
    pub remaining_quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    /// Quantity the part was registered with: `stored - total_in + total_out`.
    pub opening_quantity: i64,
}

impl StockStatusRow {
    pub fn new(part: &SparePart, total_in: i64, total_out: i64) -> Self {
        Self {
            id: part.id,
            name: part.name.clone(),
            category: part.category.clone(),
            stored_quantity: part.quantity,
            total_in,
            total_out,
            remaining_quantity: part.quantity,
            unit_price: part.unit_price,
            total_price: part.total_price(),
            opening_quantity: part.quantity.saturating_sub(total_in).saturating_add(total_out),
        }
    }
}

fn part_names(parts: &[SparePart]) -> HashMap<SparePartId, &str> {
    parts.iter().map(|p| (p.id, p.name.as_str())).collect()
}

fn take_limit<T>(rows: Vec<T>, limit: Option<u32>) -> Vec<T> {
    match limit {
        Some(n) => rows.into_iter().take(n as usize).collect(),
        None => rows,
    }
}

/// Stock-in rows newest first (`date DESC, id DESC`).
pub fn stock_in_listing<'a>(
    parts: &[SparePart],
    entries: impl IntoIterator<Item = &'a StockInEntry>,
    query: ListingQuery,
) -> Vec<StockInListing> {
    let names = part_names(parts);
    let mut rows: Vec<StockInListing> = entries
        .into_iter()
        .filter(|e| query.date.map_or(true, |d| e.date == d))
        .filter_map(|e| {
            names.get(&e.spare_part_id).map(|name| StockInListing {
                entry: e.clone(),
                spare_part_name: (*name).to_string(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.entry
            .date
            .cmp(&a.entry.date)
            .then_with(|| b.entry.id.cmp(&a.entry.id))
    });
    take_limit(rows, query.limit)
}

/// Stock-out rows newest first (`date DESC, id DESC`).
pub fn stock_out_listing<'a>(
    parts: &[SparePart],
    entries: impl IntoIterator<Item = &'a StockOutEntry>,
    query: ListingQuery,
) -> Vec<StockOutListing> {
    let names = part_names(parts);
    let mut rows: Vec<StockOutListing> = entries
        .into_iter()
        .filter(|e| query.date.map_or(true, |d| e.date == d))
        .filter_map(|e| {
            names
                .get(&e.spare_part_id)
                .map(|name| StockOutListing::new(e.clone(), (*name).to_string()))
        })
        .collect();
    rows.sort_by(|a, b| {
        b.entry
            .date
            .cmp(&a.entry.date)
            .then_with(|| b.entry.id.cmp(&a.entry.id))
    });
    take_limit(rows, query.limit)
}

/// Per-part totals, summed independently for each ledger side.
pub fn stock_status<'a>(
    parts: &[SparePart],
    stock_in: impl IntoIterator<Item = &'a StockInEntry>,
    stock_out: impl IntoIterator<Item = &'a StockOutEntry>,
) -> Vec<StockStatusRow> {
    let mut totals_in: BTreeMap<SparePartId, i64> = BTreeMap::new();
    for e in stock_in {
        let total = totals_in.entry(e.spare_part_id).or_default();
        *total = total.saturating_add(e.quantity);
    }
    let mut totals_out: BTreeMap<SparePartId, i64> = BTreeMap::new();
    for e in stock_out {
        let total = totals_out.entry(e.spare_part_id).or_default();
        *total = total.saturating_add(e.quantity);
    }

    let mut rows: Vec<StockStatusRow> = parts
        .iter()
        .map(|p| {
            StockStatusRow::new(
                p,
                totals_in.get(&p.id).copied().unwrap_or(0),
                totals_out.get(&p.id).copied().unwrap_or(0),
            )
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    rows
}

/// Read-side facade used by the HTTP layer.
#[derive(Debug, Clone)]
pub struct ReportingService<R> {
    reader: R,
}

impl<R: LedgerReader> ReportingService<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    #[instrument(skip(self), err)]
    pub async fn spare_parts(&self) -> Result<Vec<SparePartListing>, LedgerError> {
        let parts = self.reader.spare_parts().await?;
        Ok(parts.into_iter().map(SparePartListing::from).collect())
    }

    #[instrument(skip(self), fields(spare_part_id = %id), err)]
    pub async fn spare_part(&self, id: SparePartId) -> Result<SparePartListing, LedgerError> {
        self.reader
            .spare_part(id)
            .await?
            .map(SparePartListing::from)
            .ok_or_else(|| DomainError::not_found("spare part").into())
    }

    #[instrument(skip(self), err)]
    pub async fn stock_in(&self, limit: Option<u32>) -> Result<Vec<StockInListing>, LedgerError> {
        Ok(self
            .reader
            .stock_in_listing(ListingQuery::all().with_limit(limit))
            .await?)
    }

    #[instrument(skip(self), err)]
    pub async fn stock_out(&self, limit: Option<u32>) -> Result<Vec<StockOutListing>, LedgerError> {
        Ok(self
            .reader
            .stock_out_listing(ListingQuery::all().with_limit(limit))
            .await?)
    }

    #[instrument(skip(self), err)]
    pub async fn daily_stock_out(&self, date: NaiveDate) -> Result<Vec<StockOutListing>, LedgerError> {
        Ok(self.reader.stock_out_listing(ListingQuery::on(date)).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn stock_status(&self) -> Result<Vec<StockStatusRow>, LedgerError> {
        Ok(self.reader.stock_status().await?)
    }
}
