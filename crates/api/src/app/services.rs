//! Service wiring: one store backend shared by the engine, reporting and accounts.

use chrono::NaiveDate;

use smis_auth::{Hs256TokenIssuer, Registration, User};
use smis_core::{SparePartId, StockOutId};
use smis_infra::{
    AccountError, AccountService, AppConfig, InMemoryLedgerStore, LedgerError, PostgresLedgerStore,
    ReconciliationEngine, ReportingService, Session, SparePartListing, StockInListing,
    StockOutListing, StockStatusRow, StoreBackend, StoreError,
};
use smis_inventory::{
    NewSparePart, NewStockIn, NewStockOut, SparePart, StockInEntry, StockOutEntry, StockOutRevision,
};

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        engine: ReconciliationEngine<InMemoryLedgerStore>,
        reporting: ReportingService<InMemoryLedgerStore>,
        accounts: AccountService<InMemoryLedgerStore>,
    },
    Persistent {
        engine: ReconciliationEngine<PostgresLedgerStore>,
        reporting: ReportingService<PostgresLedgerStore>,
        accounts: AccountService<PostgresLedgerStore>,
    },
}

// Both variants expose the same services; forward to whichever is active.
macro_rules! delegate {
    ($self:ident, $field:ident, |$svc:ident| $body:expr) => {
        match $self {
            AppServices::InMemory { $field: $svc, .. } => $body,
            AppServices::Persistent { $field: $svc, .. } => $body,
        }
    };
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let issuer = Hs256TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl);

    match &config.store {
        StoreBackend::InMemory => {
            tracing::info!("using in-memory stores");
            Ok(AppServices::in_memory(
                InMemoryLedgerStore::with_lock_timeout(config.lock_timeout),
                issuer,
            ))
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let store =
                PostgresLedgerStore::connect(database_url, *max_connections, config.lock_timeout)
                    .await?;
            store.migrate().await?;
            tracing::info!("using postgres stores");
            Ok(AppServices::persistent(store, issuer))
        }
    }
}

impl AppServices {
    pub fn in_memory(store: InMemoryLedgerStore, issuer: Hs256TokenIssuer) -> Self {
        AppServices::InMemory {
            engine: ReconciliationEngine::new(store.clone()),
            reporting: ReportingService::new(store.clone()),
            accounts: AccountService::new(store, issuer),
        }
    }

    pub fn persistent(store: PostgresLedgerStore, issuer: Hs256TokenIssuer) -> Self {
        AppServices::Persistent {
            engine: ReconciliationEngine::new(store.clone()),
            reporting: ReportingService::new(store.clone()),
            accounts: AccountService::new(store, issuer),
        }
    }

    // Ledger writes

    pub async fn register_spare_part(&self, input: NewSparePart) -> Result<SparePart, LedgerError> {
        delegate!(self, engine, |engine| engine.register_spare_part(input).await)
    }

    pub async fn record_stock_in(&self, input: NewStockIn) -> Result<StockInEntry, LedgerError> {
        delegate!(self, engine, |engine| engine.record_stock_in(input).await)
    }

    pub async fn record_stock_out(&self, input: NewStockOut) -> Result<StockOutEntry, LedgerError> {
        delegate!(self, engine, |engine| engine.record_stock_out(input).await)
    }

    pub async fn revise_stock_out(
        &self,
        id: StockOutId,
        revision: StockOutRevision,
    ) -> Result<StockOutEntry, LedgerError> {
        delegate!(self, engine, |engine| engine.revise_stock_out(id, revision).await)
    }

    pub async fn remove_stock_out(&self, id: StockOutId) -> Result<StockOutEntry, LedgerError> {
        delegate!(self, engine, |engine| engine.remove_stock_out(id).await)
    }

    // Reads

    pub async fn spare_parts(&self) -> Result<Vec<SparePartListing>, LedgerError> {
        delegate!(self, reporting, |reporting| reporting.spare_parts().await)
    }

    pub async fn spare_part(&self, id: SparePartId) -> Result<SparePartListing, LedgerError> {
        delegate!(self, reporting, |reporting| reporting.spare_part(id).await)
    }

    pub async fn stock_in(&self, limit: Option<u32>) -> Result<Vec<StockInListing>, LedgerError> {
        delegate!(self, reporting, |reporting| reporting.stock_in(limit).await)
    }

    pub async fn stock_out(&self, limit: Option<u32>) -> Result<Vec<StockOutListing>, LedgerError> {
        delegate!(self, reporting, |reporting| reporting.stock_out(limit).await)
    }

    pub async fn daily_stock_out(&self, date: NaiveDate) -> Result<Vec<StockOutListing>, LedgerError> {
        delegate!(self, reporting, |reporting| reporting.daily_stock_out(date).await)
    }

    pub async fn stock_status(&self) -> Result<Vec<StockStatusRow>, LedgerError> {
        delegate!(self, reporting, |reporting| reporting.stock_status().await)
    }

    // Accounts

    pub async fn register(&self, registration: Registration) -> Result<User, AccountError> {
        delegate!(self, accounts, |accounts| accounts.register(registration).await)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AccountError> {
        delegate!(self, accounts, |accounts| accounts.login(username, password).await)
    }
}
