// src/transaction/mod.rs

//! Scoped transactions with nesting and conflict-driven retries.
//!
//! A [`TransactionManager`] hands out one logical [`Transaction`] at a time.
//! Every `begin` on that handle bumps a nesting counter; only the outermost
//! `commit`/`rollback` touches the underlying session. Repositories and
//! services can therefore wrap their own work in `begin`/`commit` without
//! caring whether a caller already opened the transaction.

pub mod memory;
pub mod postgres;
pub mod retry;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ServiceError;

pub use retry::{RetryParams, transactional};

/// Isolation levels understood by the store.
///
/// Applied once, when the physical transaction is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[async_trait]
pub trait Transaction: Send + Sync {
    /// Enters a scope. Opens the session on the outermost call only.
    async fn begin(&self) -> Result<(), ServiceError>;

    /// Leaves a scope. Commits and closes the session when the last scope exits.
    async fn commit(&self) -> Result<(), ServiceError>;

    /// Leaves a scope. Rolls back and closes the session when the last scope exits.
    async fn rollback(&self) -> Result<(), ServiceError>;

    /// True once every scope opened with `begin` has been left.
    fn is_closed(&self) -> bool;
}

pub trait TransactionManager: Send + Sync {
    /// Returns the open transaction, or a fresh one if the previous handle is closed.
    fn transaction(&self, isolation_level: IsolationLevel) -> Arc<dyn Transaction>;

    /// Whether `err` is a store-reported conflict worth re-running the operation for.
    fn is_retriable(&self, err: &ServiceError) -> bool;
}

/// Leaves the scope opened by a matching `begin`: commits on success, rolls back on failure.
///
/// A rollback failure is logged and the original error is returned.
pub async fn finish<T>(
    tx: &dyn Transaction,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed after {}: {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

/// Holds the manager's current handle and replaces it once closed.
pub(crate) struct CurrentTransaction<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T: Transaction> CurrentTransaction<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn get_or_open(&self, open: impl FnOnce() -> T) -> Arc<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) if !tx.is_closed() => Arc::clone(tx),
            _ => {
                let tx = Arc::new(open());
                *slot = Some(Arc::clone(&tx));
                tx
            }
        }
    }
}
