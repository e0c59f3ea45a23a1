// src/transaction/memory.rs

//! Transaction manager for the in-memory store.
//!
//! Only the nesting bookkeeping is real: the in-memory repositories write
//! through immediately, so commit and rollback have no storage effect.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use super::{CurrentTransaction, IsolationLevel, Transaction, TransactionManager};
use crate::error::ServiceError;

#[derive(Debug, Default)]
pub struct InMemoryTransaction {
    depth: AtomicUsize,
}

impl InMemoryTransaction {
    fn leave(&self) {
        // Saturates at zero so an unmatched commit cannot wrap around.
        let _ = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn begin(&self) -> Result<(), ServiceError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), ServiceError> {
        self.leave();
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ServiceError> {
        self.leave();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.depth.load(Ordering::SeqCst) == 0
    }
}

pub struct InMemoryTransactionManager {
    current: CurrentTransaction<InMemoryTransaction>,
}

impl InMemoryTransactionManager {
    pub fn new() -> Self {
        Self {
            current: CurrentTransaction::new(),
        }
    }
}

impl Default for InMemoryTransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager for InMemoryTransactionManager {
    fn transaction(&self, _isolation_level: IsolationLevel) -> Arc<dyn Transaction> {
        self.current.get_or_open(InMemoryTransaction::default)
    }

    fn is_retriable(&self, _err: &ServiceError) -> bool {
        false
    }
}
