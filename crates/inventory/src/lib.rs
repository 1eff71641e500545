//! Spare-parts inventory domain.
//!
//! Business rules for parts, stock-in/stock-out ledger entries and the
//! quantity reconciliation plan, implemented as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod ledger;
pub mod part;
pub mod reconcile;

pub use ledger::{NewStockIn, NewStockOut, StockInEntry, StockOutEntry, StockOutRevision};
pub use part::{MAX_QUANTITY, MAX_UNIT_PRICE, NewSparePart, PRICE_SCALE, SparePart};
pub use reconcile::{
    QuantityDelta, RevisionPlan, ensure_capacity, plan_revision, receipt, reversal, withdrawal,
};
