//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `ForeignKey` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (numeric value out of range) | `22003` | `Constraint` |
//! | Database (lock not available) | `55P03` | `LockTimeout` |
//! | Database (deadlock / serialization) | `40P01` / `40001` | `Contention` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Backend` |
//!
//! ## Locking
//!
//! Every transaction starts with `SET LOCAL lock_timeout`, so a `FOR UPDATE`
//! that waits longer than the configured bound fails with `55P03` and the
//! whole transaction rolls back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument};

use smis_auth::{NewUser, User};
use smis_core::{SparePartId, StockInId, StockOutId, UserId};
use smis_inventory::{SparePart, StockInEntry, StockOutEntry};

use super::{LedgerReader, LedgerStore, LedgerTx, StoreError, UserStore};
use crate::reporting::{ListingQuery, StockInListing, StockOutListing, StockStatusRow};

const SCHEMA: &str = include_str!("../../migrations/0001_smis_schema.sql");

/// Postgres implementation of every store trait.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        info!(max_connections, "postgres pool ready");
        Ok(Self::new(pool, lock_timeout))
    }

    /// Apply the schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        // SET does not take bind parameters; the value is an integer we format.
        let stmt = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&stmt)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTx { tx })
    }
}

/// Open Postgres transaction. sqlx rolls it back when dropped uncommitted.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PostgresTx {
    async fn lock_spare_part(&mut self, id: SparePartId) -> Result<Option<SparePart>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, category, quantity, unit_price
            FROM spare_parts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_spare_part", e))?;

        row.as_ref().map(spare_part_from_row).transpose()
    }

    async fn lock_stock_out(&mut self, id: StockOutId) -> Result<Option<StockOutEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, spare_part_id, quantity, unit_price, date
            FROM stock_out
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock_out", e))?;

        row.as_ref().map(stock_out_from_row).transpose()
    }

    async fn insert_spare_part(&mut self, part: &SparePart) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO spare_parts (id, name, category, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(part.id.as_uuid())
        .bind(&part.name)
        .bind(&part.category)
        .bind(part.quantity)
        .bind(part.unit_price)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_spare_part", e))?;
        Ok(())
    }

    async fn insert_stock_in(&mut self, entry: &StockInEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_in (id, spare_part_id, quantity, date)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.spare_part_id.as_uuid())
        .bind(entry.quantity)
        .bind(entry.date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_in", e))?;
        Ok(())
    }

    async fn insert_stock_out(&mut self, entry: &StockOutEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_out (id, spare_part_id, quantity, unit_price, date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.spare_part_id.as_uuid())
        .bind(entry.quantity)
        .bind(entry.unit_price)
        .bind(entry.date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_out", e))?;
        Ok(())
    }

    async fn update_stock_out(&mut self, entry: &StockOutEntry) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_out
            SET spare_part_id = $2, quantity = $3, unit_price = $4, date = $5
            WHERE id = $1
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.spare_part_id.as_uuid())
        .bind(entry.quantity)
        .bind(entry.unit_price)
        .bind(entry.date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock_out", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("stock-out {}", entry.id)));
        }
        Ok(())
    }

    async fn delete_stock_out(&mut self, id: StockOutId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM stock_out WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_stock_out", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("stock-out {id}")));
        }
        Ok(())
    }

    async fn adjust_quantity(&mut self, id: SparePartId, delta: i64) -> Result<(), StoreError> {
        // The CHECK (quantity >= 0) constraint backs up the engine's own check.
        let result = sqlx::query("UPDATE spare_parts SET quantity = quantity + $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(delta)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("adjust_quantity", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("spare part {id}")));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl LedgerReader for PostgresLedgerStore {
    async fn spare_parts(&self) -> Result<Vec<SparePart>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, category, quantity, unit_price
            FROM spare_parts
            ORDER BY name ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("spare_parts", e))?;

        rows.iter().map(spare_part_from_row).collect()
    }

    async fn spare_part(&self, id: SparePartId) -> Result<Option<SparePart>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, category, quantity, unit_price
            FROM spare_parts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("spare_part", e))?;

        row.as_ref().map(spare_part_from_row).transpose()
    }

    async fn stock_in_listing(&self, query: ListingQuery) -> Result<Vec<StockInListing>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT si.id, si.spare_part_id, si.quantity, si.date, sp.name AS spare_part_name
            FROM stock_in si
            JOIN spare_parts sp ON sp.id = si.spare_part_id
            WHERE ($1::date IS NULL OR si.date = $1)
            ORDER BY si.date DESC, si.id DESC
            LIMIT $2
            "#,
        )
        .bind(query.date)
        .bind(query.limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_in_listing", e))?;

        rows.iter()
            .map(|row| {
                Ok(StockInListing {
                    entry: stock_in_from_row(row)?,
                    spare_part_name: get(row, "spare_part_name")?,
                })
            })
            .collect()
    }

    async fn stock_out_listing(&self, query: ListingQuery) -> Result<Vec<StockOutListing>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT so.id, so.spare_part_id, so.quantity, so.unit_price, so.date,
                   sp.name AS spare_part_name
            FROM stock_out so
            JOIN spare_parts sp ON sp.id = so.spare_part_id
            WHERE ($1::date IS NULL OR so.date = $1)
            ORDER BY so.date DESC, so.id DESC
            LIMIT $2
            "#,
        )
        .bind(query.date)
        .bind(query.limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_out_listing", e))?;

        rows.iter()
            .map(|row| Ok(StockOutListing::new(stock_out_from_row(row)?, get(row, "spare_part_name")?)))
            .collect()
    }

    async fn stock_status(&self) -> Result<Vec<StockStatusRow>, StoreError> {
        // Each side is summed in its own sub-aggregate so the two joins
        // cannot multiply each other's rows.
        let rows = sqlx::query(
            r#"
            SELECT sp.id, sp.name, sp.category, sp.quantity, sp.unit_price,
                   COALESCE(si.total_in, 0)::BIGINT AS total_in,
                   COALESCE(so.total_out, 0)::BIGINT AS total_out
            FROM spare_parts sp
            LEFT JOIN (
                SELECT spare_part_id, SUM(quantity) AS total_in
                FROM stock_in GROUP BY spare_part_id
            ) si ON si.spare_part_id = sp.id
            LEFT JOIN (
                SELECT spare_part_id, SUM(quantity) AS total_out
                FROM stock_out GROUP BY spare_part_id
            ) so ON so.spare_part_id = sp.id
            ORDER BY sp.name ASC, sp.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_status", e))?;

        rows.iter()
            .map(|row| {
                let part = spare_part_from_row(row)?;
                let total_in: i64 = get(row, "total_in")?;
                let total_out: i64 = get(row, "total_out")?;
                Ok(StockStatusRow::new(&part, total_in, total_out))
            })
            .collect()
    }
}

#[async_trait]
impl UserStore for PostgresLedgerStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(user.into_user())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_username", e))?;

        row.as_ref()
            .map(|row| {
                Ok(User {
                    id: UserId::from_uuid(get(row, "id")?),
                    username: get(row, "username")?,
                    password_hash: get(row, "password_hash")?,
                    created_at: get(row, "created_at")?,
                })
            })
            .transpose()
    }
}

// Row decoding

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read {column}: {e}")))
}

fn spare_part_from_row(row: &PgRow) -> Result<SparePart, StoreError> {
    let unit_price: Decimal = get(row, "unit_price")?;
    Ok(SparePart {
        id: SparePartId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        category: get(row, "category")?,
        quantity: get(row, "quantity")?,
        unit_price,
    })
}

fn stock_in_from_row(row: &PgRow) -> Result<StockInEntry, StoreError> {
    let date: NaiveDate = get(row, "date")?;
    Ok(StockInEntry {
        id: StockInId::from_uuid(get(row, "id")?),
        spare_part_id: SparePartId::from_uuid(get(row, "spare_part_id")?),
        quantity: get(row, "quantity")?,
        date,
    })
}

fn stock_out_from_row(row: &PgRow) -> Result<StockOutEntry, StoreError> {
    Ok(StockOutEntry {
        id: StockOutId::from_uuid(get(row, "id")?),
        spare_part_id: SparePartId::from_uuid(get(row, "spare_part_id")?),
        quantity: get(row, "quantity")?,
        unit_price: get(row, "unit_price")?,
        date: get(row, "date")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::ForeignKey(msg),
                Some("23514") | Some("22003") => StoreError::Constraint(msg),
                Some("55P03") => StoreError::LockTimeout(msg),
                Some("40P01") | Some("40001") => StoreError::Contention(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Backend(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::RowNotFound(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
