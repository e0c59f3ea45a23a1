// src/transaction/postgres.rs

//! PostgreSQL-backed transactions on top of a `sqlx` pool.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::{CurrentTransaction, IsolationLevel, Transaction, TransactionManager};
use crate::error::ServiceError;

/// SQLSTATE for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";

pub struct PgTransaction {
    pool: PgPool,
    isolation_level: IsolationLevel,
    depth: AtomicUsize,
    session: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl PgTransaction {
    fn new(pool: PgPool, isolation_level: IsolationLevel) -> Self {
        Self {
            pool,
            isolation_level,
            depth: AtomicUsize::new(0),
            session: Mutex::new(None),
        }
    }

    /// Locks the open session for a query.
    ///
    /// The guard must be dropped before calling another repository method,
    /// which would lock it again.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, PgConnection>, ServiceError> {
        let guard = self.session.lock().await;
        MutexGuard::try_map(guard, |session| session.as_deref_mut())
            .map_err(|_| ServiceError::TransactionClosed)
    }

    /// Decrements the depth and hands back the session if this was the last scope.
    async fn leave(&self) -> Option<sqlx::Transaction<'static, Postgres>> {
        let mut session = self.session.lock().await;
        let remaining = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1))
            .map(|previous| previous - 1)
            .unwrap_or(0);
        if remaining == 0 { session.take() } else { None }
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn begin(&self) -> Result<(), ServiceError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            let mut tx = self.pool.begin().await?;
            let statement = format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                self.isolation_level.as_sql()
            );
            sqlx::query(&statement).execute(&mut *tx).await?;
            tracing::debug!(isolation = self.isolation_level.as_sql(), "transaction opened");
            *session = Some(tx);
        }
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), ServiceError> {
        if let Some(tx) = self.leave().await {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ServiceError> {
        if let Some(tx) = self.leave().await {
            tx.rollback().await?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.depth.load(Ordering::SeqCst) == 0
    }
}

/// One manager per unit of work; the pool underneath is shared.
pub struct PgTransactionManager {
    pool: PgPool,
    current: CurrentTransaction<PgTransaction>,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            current: CurrentTransaction::new(),
        }
    }

    /// Concrete handle for repositories that need the session.
    pub fn current(&self, isolation_level: IsolationLevel) -> Arc<PgTransaction> {
        self.current
            .get_or_open(|| PgTransaction::new(self.pool.clone(), isolation_level))
    }
}

impl TransactionManager for PgTransactionManager {
    fn transaction(&self, isolation_level: IsolationLevel) -> Arc<dyn Transaction> {
        self.current(isolation_level)
    }

    fn is_retriable(&self, err: &ServiceError) -> bool {
        match err {
            ServiceError::Database(db_err) => db_err
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == SERIALIZATION_FAILURE),
            _ => false,
        }
    }
}
