//! In-memory ledger store.
//!
//! Intended for tests/dev. Tables sit behind one `RwLock`; row locks are
//! per-row tokio mutexes so a transaction can hold them across awaits.
//! A transaction stages its writes and applies them to the tables in one
//! step at commit, while it still holds every row lock it took.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use smis_auth::{NewUser, User};
use smis_core::{SparePartId, StockInId, StockOutId, UserId};
use smis_inventory::{MAX_QUANTITY, SparePart, StockInEntry, StockOutEntry};

use super::{LedgerReader, LedgerStore, LedgerTx, StoreError, StoreOp, UserStore};
use crate::reporting::{self, ListingQuery, StockInListing, StockOutListing, StockStatusRow};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Part(SparePartId),
    StockOut(StockOutId),
}

#[derive(Debug, Default)]
struct Tables {
    parts: BTreeMap<SparePartId, SparePart>,
    stock_in: BTreeMap<StockInId, StockInEntry>,
    stock_out: BTreeMap<StockOutId, StockOutEntry>,
    users: BTreeMap<UserId, User>,
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    faults: Mutex<HashSet<StoreOp>>,
    lock_timeout: Duration,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn quantity_out_of_range(id: SparePartId) -> StoreError {
    StoreError::Constraint(format!(
        "spare part {id} quantity must stay within 0..={MAX_QUANTITY}"
    ))
}

/// In-memory implementation of every store trait.
///
/// Cloning is cheap and every clone sees the same tables.
#[derive(Debug, Clone)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                faults: Mutex::new(HashSet::new()),
                lock_timeout,
            }),
        }
    }

    /// Arm a one-shot failure: the next transaction that reaches `op` fails
    /// with `StoreError::Injected(op)`.
    pub fn inject_fault(&self, op: StoreOp) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.insert(op);
        }
    }

    fn snapshot<T>(&self, read: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(read(&tables))
    }

    #[cfg(test)]
    fn row_lock_count(&self) -> usize {
        self.shared.row_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StoreError> {
        Ok(InMemoryTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            new_parts: BTreeMap::new(),
            deltas: BTreeMap::new(),
            stock_in: BTreeMap::new(),
            stock_out: BTreeMap::new(),
        })
    }
}

/// Open in-memory transaction. Dropping it discards staged writes and
/// releases its row locks.
pub struct InMemoryTx {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    new_parts: BTreeMap<SparePartId, SparePart>,
    deltas: BTreeMap<SparePartId, i64>,
    stock_in: BTreeMap<StockInId, StockInEntry>,
    // `None` marks a deleted row.
    stock_out: BTreeMap<StockOutId, Option<StockOutEntry>>,
}

impl InMemoryTx {
    fn check_fault(&self, op: StoreOp) -> Result<(), StoreError> {
        let mut faults = self.shared.faults.lock().map_err(|_| poisoned())?;
        if faults.remove(&op) {
            return Err(StoreError::Injected(op));
        }
        Ok(())
    }

    async fn acquire(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let mutex = {
            let mut locks = self.shared.row_locks.lock().map_err(|_| poisoned())?;
            locks.entry(key).or_default().clone()
        };
        let guard = tokio::time::timeout(self.shared.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| {
                StoreError::LockTimeout(format!(
                    "{key:?} not acquired within {}ms",
                    self.shared.lock_timeout.as_millis()
                ))
            })?;
        self.held.insert(key, guard);
        Ok(())
    }

    /// Part as this transaction sees it (committed row + staged writes).
    fn current_part(&self, id: SparePartId) -> Result<Option<SparePart>, StoreError> {
        let base = match self.new_parts.get(&id) {
            Some(p) => Some(p.clone()),
            None => {
                let tables = self.shared.tables.read().map_err(|_| poisoned())?;
                tables.parts.get(&id).cloned()
            }
        };
        match base {
            Some(mut p) => {
                let delta = self.deltas.get(&id).copied().unwrap_or(0);
                p.quantity = p
                    .quantity
                    .checked_add(delta)
                    .ok_or_else(|| quantity_out_of_range(id))?;
                Ok(Some(p))
            }
            None => Ok(None),
        }
    }

    fn current_stock_out(&self, id: StockOutId) -> Result<Option<StockOutEntry>, StoreError> {
        if let Some(staged) = self.stock_out.get(&id) {
            return Ok(staged.clone());
        }
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(tables.stock_out.get(&id).cloned())
    }

    fn ensure_part_exists(&self, id: SparePartId) -> Result<(), StoreError> {
        match self.current_part(id)? {
            Some(_) => Ok(()),
            None => Err(StoreError::ForeignKey(format!("spare part {id} does not exist"))),
        }
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn lock_spare_part(&mut self, id: SparePartId) -> Result<Option<SparePart>, StoreError> {
        self.acquire(RowKey::Part(id)).await?;
        self.current_part(id)
    }

    async fn lock_stock_out(&mut self, id: StockOutId) -> Result<Option<StockOutEntry>, StoreError> {
        self.acquire(RowKey::StockOut(id)).await?;
        self.current_stock_out(id)
    }

    async fn insert_spare_part(&mut self, part: &SparePart) -> Result<(), StoreError> {
        self.check_fault(StoreOp::InsertSparePart)?;
        if self.current_part(part.id)?.is_some() {
            return Err(StoreError::UniqueViolation(format!("spare part {}", part.id)));
        }
        self.acquire(RowKey::Part(part.id)).await?;
        self.new_parts.insert(part.id, part.clone());
        Ok(())
    }

    async fn insert_stock_in(&mut self, entry: &StockInEntry) -> Result<(), StoreError> {
        self.check_fault(StoreOp::InsertStockIn)?;
        self.ensure_part_exists(entry.spare_part_id)?;
        let exists = self.stock_in.contains_key(&entry.id)
            || self
                .shared
                .tables
                .read()
                .map_err(|_| poisoned())?
                .stock_in
                .contains_key(&entry.id);
        if exists {
            return Err(StoreError::UniqueViolation(format!("stock-in {}", entry.id)));
        }
        self.stock_in.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn insert_stock_out(&mut self, entry: &StockOutEntry) -> Result<(), StoreError> {
        self.check_fault(StoreOp::InsertStockOut)?;
        self.ensure_part_exists(entry.spare_part_id)?;
        if self.current_stock_out(entry.id)?.is_some() {
            return Err(StoreError::UniqueViolation(format!("stock-out {}", entry.id)));
        }
        self.acquire(RowKey::StockOut(entry.id)).await?;
        self.stock_out.insert(entry.id, Some(entry.clone()));
        Ok(())
    }

    async fn update_stock_out(&mut self, entry: &StockOutEntry) -> Result<(), StoreError> {
        self.check_fault(StoreOp::UpdateStockOut)?;
        self.acquire(RowKey::StockOut(entry.id)).await?;
        if self.current_stock_out(entry.id)?.is_none() {
            return Err(StoreError::RowNotFound(format!("stock-out {}", entry.id)));
        }
        self.ensure_part_exists(entry.spare_part_id)?;
        self.stock_out.insert(entry.id, Some(entry.clone()));
        Ok(())
    }

    async fn delete_stock_out(&mut self, id: StockOutId) -> Result<(), StoreError> {
        self.check_fault(StoreOp::DeleteStockOut)?;
        self.acquire(RowKey::StockOut(id)).await?;
        if self.current_stock_out(id)?.is_none() {
            return Err(StoreError::RowNotFound(format!("stock-out {id}")));
        }
        self.stock_out.insert(id, None);
        Ok(())
    }

    async fn adjust_quantity(&mut self, id: SparePartId, delta: i64) -> Result<(), StoreError> {
        self.check_fault(StoreOp::AdjustQuantity)?;
        self.acquire(RowKey::Part(id)).await?;
        let part = self
            .current_part(id)?
            .ok_or_else(|| StoreError::RowNotFound(format!("spare part {id}")))?;
        // Mirrors the CHECK on spare_parts.quantity.
        let in_range = part
            .quantity
            .checked_add(delta)
            .is_some_and(|next| (0..=MAX_QUANTITY).contains(&next));
        if !in_range {
            return Err(quantity_out_of_range(id));
        }
        *self.deltas.entry(id).or_default() += delta;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.check_fault(StoreOp::Commit)?;
        {
            let mut tables = self.shared.tables.write().map_err(|_| poisoned())?;
            // Resolve every new quantity before touching the tables so a bad
            // delta cannot leave a half-applied commit.
            let mut quantities = Vec::with_capacity(self.deltas.len());
            for (id, delta) in &self.deltas {
                let base = self.new_parts.get(id).or_else(|| tables.parts.get(id));
                if let Some(part) = base {
                    let next = part
                        .quantity
                        .checked_add(*delta)
                        .ok_or_else(|| quantity_out_of_range(*id))?;
                    quantities.push((*id, next));
                }
            }
            for (id, part) in &self.new_parts {
                tables.parts.insert(*id, part.clone());
            }
            for (id, quantity) in quantities {
                if let Some(part) = tables.parts.get_mut(&id) {
                    part.quantity = quantity;
                }
            }
            for (id, entry) in &self.stock_in {
                tables.stock_in.insert(*id, entry.clone());
            }
            for (id, entry) in &self.stock_out {
                match entry {
                    Some(entry) => {
                        tables.stock_out.insert(*id, entry.clone());
                    }
                    None => {
                        tables.stock_out.remove(id);
                    }
                }
            }
        }
        // Row locks are released here, after the tables reflect the commit.
        drop(self);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        drop(self);
        Ok(())
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.held.keys().copied().collect();
        self.held.clear();
        // Forget row mutexes no other transaction holds or waits on; a waiter
        // always owns a clone of the Arc.
        if let Ok(mut locks) = self.shared.row_locks.lock() {
            for key in keys {
                if locks.get(&key).is_some_and(|m| Arc::strong_count(m) == 1) {
                    locks.remove(&key);
                }
            }
        }
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedgerStore {
    async fn spare_parts(&self) -> Result<Vec<SparePart>, StoreError> {
        self.snapshot(|t| t.parts.values().cloned().collect())
    }

    async fn spare_part(&self, id: SparePartId) -> Result<Option<SparePart>, StoreError> {
        self.snapshot(|t| t.parts.get(&id).cloned())
    }

    async fn stock_in_listing(&self, query: ListingQuery) -> Result<Vec<StockInListing>, StoreError> {
        self.snapshot(|t| {
            let parts: Vec<SparePart> = t.parts.values().cloned().collect();
            reporting::stock_in_listing(&parts, t.stock_in.values(), query)
        })
    }

    async fn stock_out_listing(&self, query: ListingQuery) -> Result<Vec<StockOutListing>, StoreError> {
        self.snapshot(|t| {
            let parts: Vec<SparePart> = t.parts.values().cloned().collect();
            reporting::stock_out_listing(&parts, t.stock_out.values(), query)
        })
    }

    async fn stock_status(&self) -> Result<Vec<StockStatusRow>, StoreError> {
        self.snapshot(|t| {
            let parts: Vec<SparePart> = t.parts.values().cloned().collect();
            reporting::stock_status(&parts, t.stock_in.values(), t.stock_out.values())
        })
    }
}

#[async_trait]
impl UserStore for InMemoryLedgerStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.shared.tables.write().map_err(|_| poisoned())?;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation(format!(
                "username '{}' is taken",
                user.username
            )));
        }
        let user = user.into_user();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.snapshot(|t| t.users.values().find(|u| u.username == username).cloned())
    }
}
