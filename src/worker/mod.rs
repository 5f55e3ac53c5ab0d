//! Background job queue for provider tasks.
//!
//! A bounded mpsc queue with a single consumer loop: provider info fetches
//! and backfill fulfillment steps run one at a time, which also serializes
//! cursor advancement per backfill request. Delivery is at-least-once from
//! the caller's perspective; a failed retryable step is re-enqueued once by
//! the loop, anything else is logged and surfaced through tracing.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backfill::engine::run_fulfillment_step;
use crate::backfill::BackfillSource;
use crate::client::ClientConfig;
use crate::provider::ProviderRegistry;
use crate::store::{BackfillStore, ProviderStore};
use crate::types::{FaspError, Result};

/// Asynchronous task kinds the bridge schedules
#[derive(Debug, Clone)]
pub enum Job {
    /// Fetch /provider_info and apply it to the provider record
    FetchProviderInfo { provider_id: Uuid },
    /// Run one backfill fulfillment step (announce page, advance cursor)
    FulfillBackfill { request_id: Uuid, attempt: u32 },
}

/// A retryable fulfillment failure is re-enqueued until this many attempts
/// have run; further continuation comes from the provider callback.
const MAX_FULFILL_ATTEMPTS: u32 = 2;

/// Sending half of the job queue, cheap to clone
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Create a queue with the given capacity, returning the sender and the
    /// receiver the worker loop consumes.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Fire-and-forget enqueue. Fails only when the queue is full or the
    /// worker has shut down.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        self.tx.try_send(job).map_err(|_| FaspError::QueueClosed)
    }
}

/// Everything the worker loop needs to execute jobs
pub struct WorkerContext {
    pub registry: Arc<ProviderRegistry>,
    pub providers: Arc<ProviderStore>,
    pub backfills: Arc<BackfillStore>,
    pub source: Arc<dyn BackfillSource>,
    pub client_config: ClientConfig,
    pub queue: JobQueue,
}

/// Spawn the single-consumer worker loop.
pub fn spawn_worker(context: WorkerContext, mut rx: mpsc::Receiver<Job>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Provider job worker started");
        while let Some(job) = rx.recv().await {
            process_job(&context, job).await;
        }
        info!("Provider job worker stopped");
    })
}

async fn process_job(context: &WorkerContext, job: Job) {
    match job {
        Job::FetchProviderInfo { provider_id } => {
            debug!(provider_id = %provider_id, "Fetching provider info");
            match context.registry.fetch_provider_info(provider_id).await {
                Ok(_) => {
                    debug!(provider_id = %provider_id, "Provider info updated");
                }
                Err(e) => {
                    warn!(provider_id = %provider_id, error = %e, "Provider info fetch failed");
                }
            }
        }
        Job::FulfillBackfill { request_id, attempt } => {
            let result = run_fulfillment_step(
                &context.providers,
                &context.backfills,
                context.source.as_ref(),
                &context.client_config,
                request_id,
            )
            .await;

            match result {
                Ok(outcome) => {
                    debug!(request_id = %request_id, outcome = ?outcome, "Backfill step done");
                }
                Err(FaspError::Request(e)) if e.is_retryable() && attempt + 1 < MAX_FULFILL_ATTEMPTS => {
                    // Cursor was not mutated, so the step can run again
                    warn!(request_id = %request_id, error = %e, attempt = attempt, "Transient backfill failure, re-enqueueing");
                    if context
                        .queue
                        .enqueue(Job::FulfillBackfill { request_id, attempt: attempt + 1 })
                        .is_err()
                    {
                        error!(request_id = %request_id, "Failed to re-enqueue backfill step");
                    }
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "Backfill step failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_receive() {
        let (queue, mut rx) = JobQueue::new(4);
        let id = Uuid::new_v4();
        queue
            .enqueue(Job::FulfillBackfill { request_id: id, attempt: 0 })
            .unwrap();

        match rx.try_recv().unwrap() {
            Job::FulfillBackfill { request_id, attempt } => {
                assert_eq!(request_id, id);
                assert_eq!(attempt, 0);
            }
            other => panic!("Unexpected job: {:?}", other),
        }
    }

    #[test]
    fn test_enqueue_full_queue_fails() {
        let (queue, _rx) = JobQueue::new(1);
        queue
            .enqueue(Job::FetchProviderInfo { provider_id: Uuid::new_v4() })
            .unwrap();
        let result = queue.enqueue(Job::FetchProviderInfo { provider_id: Uuid::new_v4() });
        assert!(matches!(result, Err(FaspError::QueueClosed)));
    }

    #[test]
    fn test_enqueue_after_receiver_dropped_fails() {
        let (queue, rx) = JobQueue::new(4);
        drop(rx);
        let result = queue.enqueue(Job::FetchProviderInfo { provider_id: Uuid::new_v4() });
        assert!(matches!(result, Err(FaspError::QueueClosed)));
    }
}
