// src/transaction/retry.rs

//! Re-runs an operation in a fresh transaction when the store reports a
//! serialization conflict.

use std::{future::Future, time::Duration};

use rand::Rng;

use super::{IsolationLevel, TransactionManager, finish};
use crate::error::ServiceError;

/// Retry budget and the uniform backoff window between attempts.
#[derive(Debug, Clone)]
pub struct RetryParams {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryParams {
    /// Draws a delay uniformly from `[min_delay, max_delay]`.
    pub fn backoff(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let secs = rand::thread_rng()
            .gen_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Runs `operation` inside a transaction at `isolation_level`.
///
/// Errors the manager does not consider retriable are returned as-is after
/// rollback. Retriable errors are retried up to `params.max_retries` times;
/// the error of the last attempt is returned once the budget is spent. With
/// a zero budget a retriable error is wrapped in [`ServiceError::MaxRetries`].
pub async fn transactional<T, F, Fut>(
    manager: &dyn TransactionManager,
    isolation_level: IsolationLevel,
    params: &RetryParams,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let tx = manager.transaction(isolation_level);
        tx.begin().await?;
        let result = operation().await;
        let err = match finish(tx.as_ref(), result).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !manager.is_retriable(&err) {
            return Err(err);
        }
        if params.max_retries == 0 {
            return Err(ServiceError::MaxRetries(Box::new(err)));
        }
        if attempt > params.max_retries {
            tracing::warn!(attempt, "Giving up after repeated conflicts: {}", err);
            return Err(err);
        }

        let delay = params.backoff();
        tracing::warn!(attempt, ?delay, "Serialization conflict, retrying: {}", err);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;
    use crate::transaction::{Transaction, memory::InMemoryTransactionManager};

    /// Treats protocol errors as conflicts so tests can script them, and
    /// keeps every handle it gives out.
    struct ConflictingManager {
        inner: InMemoryTransactionManager,
        handed_out: Mutex<Vec<Arc<dyn Transaction>>>,
    }

    impl ConflictingManager {
        fn handed_out(&self) -> Vec<Arc<dyn Transaction>> {
            self.handed_out.lock().unwrap().clone()
        }
    }

    impl TransactionManager for ConflictingManager {
        fn transaction(&self, isolation_level: IsolationLevel) -> Arc<dyn Transaction> {
            let tx = self.inner.transaction(isolation_level);
            self.handed_out.lock().unwrap().push(Arc::clone(&tx));
            tx
        }

        fn is_retriable(&self, err: &ServiceError) -> bool {
            matches!(err, ServiceError::Database(sqlx::Error::Protocol(_)))
        }
    }

    fn manager() -> ConflictingManager {
        ConflictingManager {
            inner: InMemoryTransactionManager::new(),
            handed_out: Mutex::new(Vec::new()),
        }
    }

    fn conflict() -> ServiceError {
        ServiceError::Database(sqlx::Error::Protocol("could not serialize access".into()))
    }

    fn no_delay(max_retries: u32) -> RetryParams {
        RetryParams {
            max_retries,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflicts() {
        let manager = manager();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = transactional(&manager, IsolationLevel::Serializable, &no_delay(3), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= 3 { Err(conflict()) } else { Ok(n) }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // Every attempt ran in its own transaction, and each was closed afterwards.
        let handles = manager.handed_out();
        assert_eq!(handles.len(), 4);
        for (i, tx) in handles.iter().enumerate() {
            assert!(tx.is_closed());
            for other in &handles[i + 1..] {
                assert!(!Arc::ptr_eq(tx, other));
            }
        }
    }

    #[tokio::test]
    async fn nested_calls_share_the_attempt_transaction() {
        let manager = manager();
        let inner = &manager;

        let result = transactional(&manager, IsolationLevel::Serializable, &no_delay(0), move || async move {
            let tx = inner.transaction(IsolationLevel::ReadCommitted);
            tx.begin().await?;
            finish(tx.as_ref(), Ok(())).await
        })
        .await;

        assert!(result.is_ok());
        let handles = manager.handed_out();
        assert_eq!(handles.len(), 2);
        assert!(Arc::ptr_eq(&handles[0], &handles[1]));
        assert!(handles[0].is_closed());
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let manager = manager();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> =
            transactional(&manager, IsolationLevel::Serializable, &no_delay(3), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::QuizValidation(vec!["bad".into()]))
            })
            .await;

        assert!(matches!(result, Err(ServiceError::QuizValidation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_budget_wraps_conflict() {
        let manager = manager();

        let result: Result<(), _> =
            transactional(&manager, IsolationLevel::Serializable, &no_delay(0), || async {
                Err(conflict())
            })
            .await;

        match result {
            Err(ServiceError::MaxRetries(cause)) => {
                assert!(matches!(*cause, ServiceError::Database(_)))
            }
            other => panic!("expected MaxRetries, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn last_conflict_propagates_when_budget_is_spent() {
        let manager = manager();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> =
            transactional(&manager, IsolationLevel::Serializable, &no_delay(2), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_stays_inside_window() {
        let params = RetryParams::default();
        for _ in 0..100 {
            let delay = params.backoff();
            assert!(delay >= params.min_delay && delay <= params.max_delay);
        }
    }
}
