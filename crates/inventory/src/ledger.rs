//! Inbound and outbound ledger entries.
//!
//! Stock-in entries are append-only. Stock-out entries can be revised or
//! removed, which is why the reconciliation plan needs the original row.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use smis_core::{DomainError, DomainResult, Entity, SparePartId, StockInId, StockOutId};

use crate::part::{ensure_quantity_within_limit, ensure_unit_price};

/// Receipt of `quantity` units of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInEntry {
    pub id: StockInId,
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub date: NaiveDate,
}

impl Entity for StockInEntry {
    type Id = StockInId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Withdrawal of `quantity` units of a part at `unit_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOutEntry {
    pub id: StockOutId,
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub date: NaiveDate,
}

impl StockOutEntry {
    pub fn total_price(&self) -> Decimal {
        Decimal::from(self.quantity).saturating_mul(self.unit_price)
    }
}

impl Entity for StockOutEntry {
    type Id = StockOutId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Input: record a stock-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockIn {
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub date: NaiveDate,
}

impl NewStockIn {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)
    }

    pub fn into_entry(self, id: StockInId) -> StockInEntry {
        StockInEntry {
            id,
            spare_part_id: self.spare_part_id,
            quantity: self.quantity,
            date: self.date,
        }
    }
}

/// Input: record a stock-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockOut {
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub date: NaiveDate,
}

impl NewStockOut {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)?;
        ensure_unit_price(self.unit_price)
    }

    pub fn into_entry(self, id: StockOutId) -> StockOutEntry {
        StockOutEntry {
            id,
            spare_part_id: self.spare_part_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            date: self.date,
        }
    }
}

/// Input: replace every editable field of an existing stock-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOutRevision {
    pub spare_part_id: SparePartId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub date: NaiveDate,
}

impl StockOutRevision {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)?;
        ensure_unit_price(self.unit_price)
    }

    /// The entry as it reads once the revision is persisted.
    pub fn apply_to(&self, original: &StockOutEntry) -> StockOutEntry {
        StockOutEntry {
            id: original.id,
            spare_part_id: self.spare_part_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            date: self.date,
        }
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    ensure_quantity_within_limit(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn zero_quantity_stock_in_is_rejected() {
        let input = NewStockIn {
            spare_part_id: SparePartId::new(),
            quantity: 0,
            date: day(),
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn negative_price_stock_out_is_rejected() {
        let input = NewStockOut {
            spare_part_id: SparePartId::new(),
            quantity: 1,
            unit_price: dec!(-0.01),
            date: day(),
        };
        assert_eq!(
            input.validate(),
            Err(DomainError::validation("unit_price cannot be negative"))
        );
    }

    #[test]
    fn oversized_ledger_quantity_is_rejected() {
        let input = NewStockIn {
            spare_part_id: SparePartId::new(),
            quantity: i64::MAX,
            date: day(),
        };
        assert_eq!(
            input.validate(),
            Err(DomainError::validation("quantity cannot exceed 1000000000000"))
        );
    }

    #[test]
    fn stock_out_price_must_fit_two_decimals() {
        let mut input = NewStockOut {
            spare_part_id: SparePartId::new(),
            quantity: 1,
            unit_price: dec!(0.125),
            date: day(),
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        input.unit_price = dec!(10000000000.00);
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        input.unit_price = dec!(0.13);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn revision_keeps_the_entry_id() {
        let original = StockOutEntry {
            id: StockOutId::new(),
            spare_part_id: SparePartId::new(),
            quantity: 5,
            unit_price: dec!(3),
            date: day(),
        };
        let revision = StockOutRevision {
            spare_part_id: SparePartId::new(),
            quantity: 2,
            unit_price: dec!(4),
            date: day().succ_opt().unwrap(),
        };

        let revised = revision.apply_to(&original);
        assert_eq!(revised.id, original.id);
        assert_eq!(revised.spare_part_id, revision.spare_part_id);
        assert_eq!(revised.total_price(), dec!(8));
    }
}
