//! [`AccountStore`] backed by PostgreSQL through `sqlx`.
//!
//! The store owns a Tokio runtime and blocks on it from the calling thread,
//! so the synchronous worker threads of a benchmark each drive their own
//! pooled connection. Expects the table
//! `accounts(accno BIGINT PRIMARY KEY, balance BIGINT NOT NULL)`, which
//! [`PostgresStore::create_schema`] creates when missing.

use std::time::Duration;

use log::{debug, info};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use tokio::runtime::Runtime;

use crate::errors::{Result, StoreError, StoreResult};
use crate::store::{baseline_balance, AccountId, AccountStore, BalanceMutation, SOURCE_ACCOUNT};
use crate::TransactionIsolation;

/// SQLSTATE `serialization_failure`.
pub const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE `deadlock_detected`.
pub const DEADLOCK_DETECTED: &str = "40P01";

const DEBIT_SQL: &str = "UPDATE accounts SET balance = balance - 1 WHERE accno = $1";
const CREDIT_SQL: &str = "UPDATE accounts SET balance = balance + 1 WHERE accno = $1";

/// Classifies a failure by its SQLSTATE rather than by its message text.
pub fn classify_sqlstate(code: Option<&str>, message: String) -> StoreError {
    match code {
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => StoreError::Conflict(message),
        _ => StoreError::Other(message),
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned());
    classify_sqlstate(code.as_deref(), err.to_string())
}

/// PostgreSQL implementation of the AccountStore trait
pub struct PostgresStore {
    runtime: Runtime,
    pool: PgPool,
}

impl PostgresStore {
    /// Connects a pool of up to `max_connections` sessions to `url`.
    ///
    /// Size the pool to the largest number of concurrent workers a sweep
    /// launches; a smaller pool makes workers queue for connections and
    /// skews the latency numbers.
    pub fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(url),
            )
            .map_err(classify)?;
        info!("Connected to PostgreSQL with up to {} connections", max_connections);
        Ok(Self { runtime, pool })
    }

    /// Creates the `accounts` table if it does not exist yet.
    pub fn create_schema(&self) -> Result<()> {
        self.runtime
            .block_on(
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS accounts \
                     (accno BIGINT PRIMARY KEY, balance BIGINT NOT NULL)",
                )
                .execute(&self.pool),
            )
            .map_err(classify)?;
        Ok(())
    }

    async fn reset(&self, universe: &[AccountId]) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM accounts").execute(&mut *tx).await?;
        sqlx::query("INSERT INTO accounts (accno, balance) VALUES ($1, $2)")
            .bind(SOURCE_ACCOUNT)
            .bind(baseline_balance(universe))
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO accounts (accno, balance) \
             SELECT accno, 0 FROM UNNEST($1::BIGINT[]) AS s(accno)",
        )
        .bind(universe)
        .execute(&mut *tx)
        .await?;
        tx.commit().await
    }

    async fn transfer(
        &self,
        isolation: TransactionIsolation,
        mutations: &[BalanceMutation],
    ) -> std::result::Result<(), sqlx::Error> {
        let mut tx: sqlx::Transaction<'_, Postgres> = self.pool.begin().await?;
        // `as_sql` only ever yields one of the allow-listed level names.
        let set_isolation = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        sqlx::query(&set_isolation).execute(&mut *tx).await?;
        for mutation in mutations {
            let sql = match mutation {
                BalanceMutation::Debit(_) => DEBIT_SQL,
                BalanceMutation::Credit(_) => CREDIT_SQL,
            };
            let updated = sqlx::query(sql)
                .bind(mutation.account())
                .execute(&mut *tx)
                .await?;
            if updated.rows_affected() == 0 {
                return Err(sqlx::Error::RowNotFound);
            }
        }
        tx.commit().await
    }
}

impl AccountStore for PostgresStore {
    fn reset_to_baseline(&self, universe: &[AccountId]) -> StoreResult<()> {
        self.runtime.block_on(self.reset(universe)).map_err(classify)?;
        debug!("Reset {} accounts to baseline", universe.len() + 1);
        Ok(())
    }

    fn read_balance(&self, account: AccountId) -> StoreResult<i64> {
        self.runtime
            .block_on(
                sqlx::query_scalar::<_, i64>("SELECT balance FROM accounts WHERE accno = $1")
                    .bind(account)
                    .fetch_one(&self.pool),
            )
            .map_err(classify)
    }

    fn execute(
        &self,
        isolation: TransactionIsolation,
        mutations: &[BalanceMutation],
    ) -> StoreResult<()> {
        self.runtime
            .block_on(self.transfer(isolation, mutations))
            .map_err(classify)
    }
}
