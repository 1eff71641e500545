use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use smis_core::{DomainError, DomainResult, Entity, SparePartId};

/// Largest on-hand quantity a part may hold, and the largest single ledger
/// quantity. Keeps every quantity sum and valuation far from overflow.
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Prices are stored as `NUMERIC(12, 2)`.
pub const PRICE_SCALE: u32 = 2;

/// `9_999_999_999.99`, the largest `NUMERIC(12, 2)` value.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, PRICE_SCALE);

pub(crate) fn ensure_quantity_within_limit(quantity: i64) -> DomainResult<()> {
    if quantity > MAX_QUANTITY {
        return Err(DomainError::validation(format!(
            "quantity cannot exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_unit_price(unit_price: Decimal) -> DomainResult<()> {
    if unit_price < Decimal::ZERO {
        return Err(DomainError::validation("unit_price cannot be negative"));
    }
    if unit_price.normalize().scale() > PRICE_SCALE {
        return Err(DomainError::validation(format!(
            "unit_price cannot have more than {PRICE_SCALE} decimal places"
        )));
    }
    if unit_price > MAX_UNIT_PRICE {
        return Err(DomainError::validation(format!(
            "unit_price cannot exceed {MAX_UNIT_PRICE}"
        )));
    }
    Ok(())
}

/// Catalog row for a spare part.
///
/// `quantity` is the on-hand counter. After creation it only changes through
/// the reconciliation engine, in the same transaction as the ledger entry
/// that causes the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparePart {
    pub id: SparePartId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl SparePart {
    /// Stock valuation: `quantity × unit_price`.
    ///
    /// Saturates rather than panicking; validated rows never get near the
    /// `Decimal` range.
    pub fn total_price(&self) -> Decimal {
        Decimal::from(self.quantity).saturating_mul(self.unit_price)
    }
}

impl Entity for SparePart {
    type Id = SparePartId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Input for registering a part (direct insertion, no ledger effect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSparePart {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl NewSparePart {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        ensure_quantity_within_limit(self.quantity)?;
        ensure_unit_price(self.unit_price)
    }

    /// Materialize the catalog row under a freshly assigned id.
    pub fn into_part(self, id: SparePartId) -> SparePart {
        SparePart {
            id,
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}
