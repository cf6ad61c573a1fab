//! Concurrent batch processing
//!
//! Inputs are processed in sub-batches with a concurrency cap and a
//! per-unit timeout. One outcome is produced per input, at the input's
//! index: unit failures, timeouts, and worker panics are isolated and
//! never abort the batch. After cancellation no new sub-batch starts;
//! in-flight units run to completion and unstarted units are reported
//! as cancelled.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::BatchConfig;

/// Per-unit result of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome<T> {
    /// Index of the input this outcome belongs to
    pub index: usize,

    /// Unit output, when the unit succeeded
    pub value: Option<T>,

    /// Unit failure, when it did not
    pub error: Option<String>,
}

impl<T> BatchOutcome<T> {
    fn ok(index: usize, value: T) -> Self {
        Self {
            index,
            value: Some(value),
            error: None,
        }
    }

    fn err(index: usize, error: String) -> Self {
        Self {
            index,
            value: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }
}

/// Sub-batched, semaphore-bounded runner
pub struct BatchProcessor {
    batch_size: usize,
    max_concurrent: usize,
    unit_timeout: Duration,
}

impl BatchProcessor {
    pub fn new(config: &BatchConfig, unit_timeout: Duration) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_concurrent: config.max_concurrent_operations.max(1),
            unit_timeout,
        }
    }

    /// Run `op` over every input. The output vector always has one
    /// outcome per input, in input order.
    pub async fn run<T, F, Fut>(
        &self,
        inputs: Vec<String>,
        cancel: CancellationToken,
        op: F,
    ) -> Vec<BatchOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(String) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = crate::error::Result<T>> + Send + 'static,
    {
        let total = inputs.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut outcomes: Vec<Option<BatchOutcome<T>>> = Vec::with_capacity(total);
        outcomes.resize_with(total, || None);

        let mut offset = 0usize;
        for batch in inputs.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                warn!(remaining = total - offset, "batch cancelled, skipping remaining units");
                break;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for (i, input) in batch.iter().enumerate() {
                let index = offset + i;
                let input = input.clone();
                let op = op.clone();
                let semaphore = Arc::clone(&semaphore);
                let unit_timeout = self.unit_timeout;
                handles.push(tokio::spawn(async move {
                    // Semaphore is never closed while the batch runs
                    let _permit = semaphore.acquire_owned().await.ok();
                    match timeout(unit_timeout, op(input)).await {
                        Ok(Ok(value)) => BatchOutcome::ok(index, value),
                        Ok(Err(e)) => BatchOutcome::err(index, e.to_string()),
                        Err(_) => BatchOutcome::err(
                            index,
                            format!("unit timed out after {:?}", unit_timeout),
                        ),
                    }
                }));
            }

            for result in join_all(handles).await {
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(error = %e, "batch worker panicked");
                        continue;
                    }
                };
                let index = outcome.index;
                outcomes[index] = Some(outcome);
            }

            // A panicked worker leaves a hole at its index
            for index in offset..offset + batch.len() {
                if outcomes[index].is_none() {
                    outcomes[index] =
                        Some(BatchOutcome::err(index, "worker panicked".to_string()));
                }
            }

            offset += batch.len();
        }

        let produced: Vec<BatchOutcome<T>> = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    BatchOutcome::err(index, "cancelled before execution".to_string())
                })
            })
            .collect();
        debug!(
            total,
            failed = produced.iter().filter(|o| !o.is_ok()).count(),
            "batch complete"
        );
        produced
    }
}
