//! Infrastructure layer: stores, reconciliation engine, reporting, accounts, config.

pub mod accounts;
pub mod config;
pub mod reconciliation;
pub mod reporting;
pub mod store;


pub use accounts::{AccountError, AccountService, Session};
pub use config::{AppConfig, ConfigError, StoreBackend};
pub use reconciliation::{LedgerError, ReconciliationEngine};
pub use reporting::{
    ListingQuery, ReportingService, SparePartListing, StockInListing, StockOutListing,
    StockStatusRow,
};
pub use store::{
    InMemoryLedgerStore, LedgerReader, LedgerStore, LedgerTx, PostgresLedgerStore, StoreError,
    StoreOp, UserStore,
};
