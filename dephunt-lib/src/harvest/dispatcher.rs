//! Bounded parallel execution of a per-item handler.

use super::{Progress, Tally};
use crate::Result;
use core::future::Future;
use core::sync::atomic::{AtomicU64, Ordering};
use ohno::app_err;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

const LOG_TARGET: &str = "dispatcher";

/// An item whose handler did not succeed.
#[derive(Debug)]
pub struct Failure<T> {
    pub item: T,
    pub error: ohno::AppError,
}

/// Every dispatched item, split by whether its handler succeeded.
#[derive(Debug)]
pub struct DispatchReport<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<Failure<T>>,
}

impl<T> Default for DispatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> DispatchReport<T> {
    /// Total number of items that were handled.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }
}

/// Run `handler` once for every item, with at most `concurrency` invocations in flight.
///
/// A handler that returns an error or panics is recorded as a failure for its
/// item and does not disturb any other invocation. Both halves of the report
/// are in completion order. `concurrency` is clamped to what a semaphore can hold.
pub async fn dispatch<T, F, Fut>(items: Vec<T>, concurrency: usize, progress: &dyn Progress, handler: F) -> DispatchReport<T>
where
    T: Clone + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let concurrency = concurrency.clamp(1, Semaphore::MAX_PERMITS);
    let total = items.len() as u64;
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let completed = Arc::new(AtomicU64::new(0));
    let handler = Arc::new(handler);

    log::debug!(target: LOG_TARGET, "Dispatching {total} item(s) with concurrency {concurrency}");

    {
        let completed = Arc::clone(&completed);
        progress.set_determinate(Box::new(move || {
            let done = completed.load(Ordering::Relaxed);
            Tally {
                total,
                done,
                message: format!("{done}/{total} packages"),
            }
        }));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<(T, Result<()>)>();

    for item in items {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        let handler = Arc::clone(&handler);
        let completed = Arc::clone(&completed);
        let tx = tx.clone();

        drop(tokio::spawn(async move {
            let work = {
                let item = item.clone();
                tokio::spawn(async move { handler(item).await })
            };

            let result = match work.await {
                Ok(result) => result,
                Err(e) => Err(app_err!("handler did not complete: {e}")),
            };

            drop(permit);
            _ = completed.fetch_add(1, Ordering::Relaxed);
            _ = tx.send((item, result));
        }));
    }

    // The collector finishes once every worker has dropped its sender.
    drop(tx);

    let mut report = DispatchReport::default();
    while let Some((item, result)) = rx.recv().await {
        match result {
            Ok(()) => report.succeeded.push(item),
            Err(error) => report.failures.push(Failure { item, error }),
        }
    }

    report
}
