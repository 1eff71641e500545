//! Ledger store boundary.
//!
//! The store is the only holder of shared mutable state. It is injected into
//! the reconciliation engine, the reporting layer and the account service;
//! there is no process-wide handle.
//!
//! ## Transactions
//!
//! `LedgerStore::begin` hands out an owned transaction. Every write goes
//! through it, and nothing is visible to other transactions until `commit`.
//! Dropping a transaction without committing rolls it back, so an early
//! return or a cancelled request can never leave a half-applied mutation.
//!
//! ## Row locks
//!
//! `lock_spare_part` / `lock_stock_out` are pessimistic locking reads
//! (`SELECT … FOR UPDATE`). A lock is held until the transaction ends. Lock
//! waits are bounded by the store's lock timeout; a timed-out wait surfaces
//! as `StoreError::LockTimeout` and is safe to retry.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use smis_auth::{NewUser, User};
use smis_core::{SparePartId, StockOutId};
use smis_inventory::{SparePart, StockInEntry, StockOutEntry};

use crate::reporting::{ListingQuery, StockInListing, StockOutListing, StockStatusRow};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryLedgerStore, InMemoryTx};
pub use postgres::{PostgresLedgerStore, PostgresTx};

/// Store operation names (used for fault injection and error context).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertSparePart,
    InsertStockIn,
    InsertStockOut,
    UpdateStockOut,
    DeleteStockOut,
    AdjustQuantity,
    Commit,
}

impl core::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            StoreOp::InsertSparePart => "insert_spare_part",
            StoreOp::InsertStockIn => "insert_stock_in",
            StoreOp::InsertStockOut => "insert_stock_out",
            StoreOp::UpdateStockOut => "update_stock_out",
            StoreOp::DeleteStockOut => "delete_stock_out",
            StoreOp::AdjustQuantity => "adjust_quantity",
            StoreOp::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Store operation error.
///
/// Infrastructure failures only. Business outcomes (missing part,
/// insufficient stock) are decided by the engine before any write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Row-lock wait exceeded the configured timeout.
    #[error("lock wait timed out: {0}")]
    LockTimeout(String),

    /// Deadlock or serialization failure detected by the backend.
    #[error("transaction aborted by contention: {0}")]
    Contention(String),

    /// A write targeted a row that does not exist.
    #[error("row not found: {0}")]
    RowNotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key violated: {0}")]
    ForeignKey(String),

    /// Check constraint violated (e.g. negative on-hand quantity).
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Simulated fault armed on the in-memory store.
    #[error("injected fault in {0}")]
    Injected(StoreOp),

    /// Connection, protocol or other backend failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the caller can retry: nothing was committed and the failure
    /// came from lock contention rather than from the request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_) | StoreError::Contention(_))
    }
}

/// Transactional write access to the ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}

/// One open transaction.
///
/// Reads through a transaction observe its own uncommitted writes.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock a part row for update and return its current state.
    async fn lock_spare_part(&mut self, id: SparePartId) -> Result<Option<SparePart>, StoreError>;

    /// Lock a stock-out row for update and return its current state.
    async fn lock_stock_out(&mut self, id: StockOutId) -> Result<Option<StockOutEntry>, StoreError>;

    async fn insert_spare_part(&mut self, part: &SparePart) -> Result<(), StoreError>;

    async fn insert_stock_in(&mut self, entry: &StockInEntry) -> Result<(), StoreError>;

    async fn insert_stock_out(&mut self, entry: &StockOutEntry) -> Result<(), StoreError>;

    /// Overwrite every editable field of an existing stock-out.
    async fn update_stock_out(&mut self, entry: &StockOutEntry) -> Result<(), StoreError>;

    async fn delete_stock_out(&mut self, id: StockOutId) -> Result<(), StoreError>;

    /// `quantity = quantity + delta` on a part row (locks the row if needed).
    async fn adjust_quantity(&mut self, id: SparePartId, delta: i64) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Read-only queries backing listings and reports (no locking).
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn spare_parts(&self) -> Result<Vec<SparePart>, StoreError>;

    async fn spare_part(&self, id: SparePartId) -> Result<Option<SparePart>, StoreError>;

    async fn stock_in_listing(&self, query: ListingQuery) -> Result<Vec<StockInListing>, StoreError>;

    async fn stock_out_listing(&self, query: ListingQuery) -> Result<Vec<StockOutListing>, StoreError>;

    async fn stock_status(&self) -> Result<Vec<StockStatusRow>, StoreError>;
}

#[async_trait]
impl<S> LedgerReader for Arc<S>
where
    S: LedgerReader + ?Sized,
{
    async fn spare_parts(&self) -> Result<Vec<SparePart>, StoreError> {
        (**self).spare_parts().await
    }

    async fn spare_part(&self, id: SparePartId) -> Result<Option<SparePart>, StoreError> {
        (**self).spare_part(id).await
    }

    async fn stock_in_listing(&self, query: ListingQuery) -> Result<Vec<StockInListing>, StoreError> {
        (**self).stock_in_listing(query).await
    }

    async fn stock_out_listing(&self, query: ListingQuery) -> Result<Vec<StockOutListing>, StoreError> {
        (**self).stock_out_listing(query).await
    }

    async fn stock_status(&self) -> Result<Vec<StockStatusRow>, StoreError> {
        (**self).stock_status().await
    }
}

/// User accounts (registration/login).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken username is `StoreError::UniqueViolation`.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        (**self).insert_user(user).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        (**self).find_user_by_username(username).await
    }
}
