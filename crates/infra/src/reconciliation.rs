//! Quantity reconciliation engine.
//!
//! Every ledger mutation and the matching change to `SparePart::quantity`
//! happen in one store transaction:
//!
//! ```text
//! begin
//!   ↓
//! lock rows        stock-out row first, then part rows in ascending id order
//!   ↓
//! plan + check     pure decision from smis_inventory::reconcile
//!   ↓
//! write            ledger row + quantity deltas
//!   ↓
//! settle           commit on Ok, rollback on Err
//! ```
//!
//! The engine keeps no state of its own. Two requests touching the same part
//! serialize on that part's row lock; the second one sees the first one's
//! committed quantity.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, instrument, warn};

use smis_core::{DomainError, SparePartId, StockInId, StockOutId};
use smis_inventory::{
    ensure_capacity, plan_revision, receipt, reversal, withdrawal, NewSparePart, NewStockIn,
    NewStockOut, SparePart, StockInEntry, StockOutEntry, StockOutRevision,
};

use crate::store::{LedgerStore, LedgerTx, StoreError};

/// Outcome taxonomy for ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced part or entry does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Request refused by a business rule (validation, insufficient stock).
    #[error("{0}")]
    Rejected(String),

    /// Transaction, connection or lock failure. Nothing was committed.
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StoreFailure(e) if e.is_retryable())
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound(_) => LedgerError::NotFound(value.to_string()),
            _ => LedgerError::Rejected(value.to_string()),
        }
    }
}

fn part_not_found() -> LedgerError {
    DomainError::not_found("spare part").into()
}

fn stock_out_not_found() -> LedgerError {
    DomainError::not_found("stock-out entry").into()
}

/// Commit on success, roll back on error.
///
/// A failed rollback is only logged: the transaction is dropped either way,
/// which releases its locks without applying anything.
async fn settle<T, Tx: LedgerTx>(tx: Tx, outcome: Result<T, LedgerError>) -> Result<T, LedgerError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed; transaction dropped");
            }
            Err(err)
        }
    }
}

/// Applies ledger mutations and their quantity effects atomically.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine<S> {
    store: S,
}

impl<S: LedgerStore> ReconciliationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Insert a catalog row. No ledger effect.
    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn register_spare_part(&self, input: NewSparePart) -> Result<SparePart, LedgerError> {
        input.validate()?;
        let part = input.into_part(SparePartId::new());

        let mut tx = self.store.begin().await?;
        let outcome = tx
            .insert_spare_part(&part)
            .await
            .map(|()| part)
            .map_err(LedgerError::from);
        let part = settle(tx, outcome).await?;

        info!(spare_part_id = %part.id, quantity = part.quantity, "spare part registered");
        Ok(part)
    }

    /// Record a receipt and raise the part's quantity.
    #[instrument(skip(self, input), fields(spare_part_id = %input.spare_part_id, quantity = input.quantity), err)]
    pub async fn record_stock_in(&self, input: NewStockIn) -> Result<StockInEntry, LedgerError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let outcome = Self::apply_stock_in(&mut tx, input).await;
        let entry = settle(tx, outcome).await?;

        info!(stock_in_id = %entry.id, "stock-in recorded");
        Ok(entry)
    }

    /// Record a withdrawal; rejected when the part cannot cover it.
    #[instrument(skip(self, input), fields(spare_part_id = %input.spare_part_id, quantity = input.quantity), err)]
    pub async fn record_stock_out(&self, input: NewStockOut) -> Result<StockOutEntry, LedgerError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let outcome = Self::apply_stock_out(&mut tx, input).await;
        let entry = settle(tx, outcome).await?;

        info!(stock_out_id = %entry.id, "stock-out recorded");
        Ok(entry)
    }

    /// Replace every editable field of a stock-out and compensate quantities.
    #[instrument(skip(self, revision), fields(stock_out_id = %id), err)]
    pub async fn revise_stock_out(
        &self,
        id: StockOutId,
        revision: StockOutRevision,
    ) -> Result<StockOutEntry, LedgerError> {
        revision.validate()?;

        let mut tx = self.store.begin().await?;
        let outcome = Self::apply_revision(&mut tx, id, revision).await;
        let entry = settle(tx, outcome).await?;

        info!(spare_part_id = %entry.spare_part_id, quantity = entry.quantity, "stock-out revised");
        Ok(entry)
    }

    /// Delete a stock-out and return its quantity to the part.
    #[instrument(skip(self), fields(stock_out_id = %id), err)]
    pub async fn remove_stock_out(&self, id: StockOutId) -> Result<StockOutEntry, LedgerError> {
        let mut tx = self.store.begin().await?;
        let outcome = Self::apply_removal(&mut tx, id).await;
        let entry = settle(tx, outcome).await?;

        info!(spare_part_id = %entry.spare_part_id, quantity = entry.quantity, "stock-out removed");
        Ok(entry)
    }

    async fn apply_stock_in(tx: &mut S::Tx, input: NewStockIn) -> Result<StockInEntry, LedgerError> {
        // Taking the row lock serializes receipts with concurrent withdrawals.
        let part = tx
            .lock_spare_part(input.spare_part_id)
            .await?
            .ok_or_else(part_not_found)?;

        let delta = receipt(&part, &input)?;
        let entry = input.into_entry(StockInId::new());
        tx.insert_stock_in(&entry).await?;
        tx.adjust_quantity(delta.spare_part_id, delta.delta).await?;
        Ok(entry)
    }

    async fn apply_stock_out(tx: &mut S::Tx, input: NewStockOut) -> Result<StockOutEntry, LedgerError> {
        let part = tx
            .lock_spare_part(input.spare_part_id)
            .await?
            .ok_or_else(part_not_found)?;

        let delta = withdrawal(&part, &input)?;
        let entry = input.into_entry(StockOutId::new());
        tx.insert_stock_out(&entry).await?;
        tx.adjust_quantity(delta.spare_part_id, delta.delta).await?;
        Ok(entry)
    }

    async fn apply_revision(
        tx: &mut S::Tx,
        id: StockOutId,
        revision: StockOutRevision,
    ) -> Result<StockOutEntry, LedgerError> {
        let original = tx.lock_stock_out(id).await?.ok_or_else(stock_out_not_found)?;
        let plan = plan_revision(&original, &revision);

        let mut on_hand = HashMap::new();
        for part_id in plan.parts(&original) {
            let part = tx.lock_spare_part(part_id).await?.ok_or_else(part_not_found)?;
            on_hand.insert(part_id, part.quantity);
        }
        plan.ensure_stock_covers(|part_id| on_hand.get(&part_id).copied())?;

        for delta in plan.deltas() {
            tx.adjust_quantity(delta.spare_part_id, delta.delta).await?;
        }
        let revised = revision.apply_to(&original);
        tx.update_stock_out(&revised).await?;
        Ok(revised)
    }

    async fn apply_removal(tx: &mut S::Tx, id: StockOutId) -> Result<StockOutEntry, LedgerError> {
        let entry = tx.lock_stock_out(id).await?.ok_or_else(stock_out_not_found)?;
        let part = tx
            .lock_spare_part(entry.spare_part_id)
            .await?
            .ok_or_else(part_not_found)?;

        let delta = reversal(&entry);
        ensure_capacity(part.quantity, delta)?;
        tx.adjust_quantity(delta.spare_part_id, delta.delta).await?;
        tx.delete_stock_out(entry.id).await?;
        Ok(entry)
    }
}
