use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};

use crate::errors::RepoThreadError;
use crate::generator::Generator;
use crate::models::{Job, ServerConfig};
use crate::storage::JobStore;

/// Attempts to record a terminal result before the job is abandoned as stuck.
const COMPLETE_RETRY_ATTEMPTS: u32 = 3;
const COMPLETE_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Dispatches accepted jobs onto background run tasks.
///
/// A bounded mpsc queue provides backpressure at submission time and a
/// semaphore caps how many Generator calls run at once. Run tasks are
/// fire-and-forget: no request handler ever awaits one.
#[derive(Clone)]
pub struct Dispatcher {
    queue_tx: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Spawn the dispatch loop and return a handle for submitting jobs.
    pub fn start(
        store: Arc<dyn JobStore>,
        generator: Arc<dyn Generator>,
        config: &ServerConfig,
    ) -> Self {
        let (queue_tx, mut queue_rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let timeout_secs = config.generation_timeout_secs;

        tokio::spawn(async move {
            while let Some(job) = queue_rx.recv().await {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let store = Arc::clone(&store);
                let generator = Arc::clone(&generator);
                tokio::spawn(async move {
                    run_job(store, generator, job, timeout_secs).await;
                    drop(permit);
                });
            }
            tracing::debug!("Dispatch queue closed, dispatcher loop exiting");
        });

        Self { queue_tx }
    }

    /// Reserve a queue slot, rejecting when the queue is full.
    ///
    /// Reservation happens before the job record is created, so a rejected
    /// submission can never leave a pending record with no runner.
    pub fn try_reserve(&self) -> Result<mpsc::Permit<'_, Job>, RepoThreadError> {
        self.queue_tx.try_reserve().map_err(|_| {
            RepoThreadError::Overloaded("Job queue is full, retry later".to_string())
        })
    }
}

/// Execute the Generator for one job and record the outcome.
///
/// Every failure mode is absorbed into a terminal `failed` state; nothing
/// propagates, since the submitting request has already returned.
async fn run_job(
    store: Arc<dyn JobStore>,
    generator: Arc<dyn Generator>,
    job: Job,
    timeout_secs: u64,
) {
    tracing::info!("Job {} started ({:?})", job.id, job.kind);

    let generation = generator.generate(job.kind, &job.input, &job.params);
    let outcome = if timeout_secs > 0 {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), generation).await {
            Ok(result) => result,
            Err(_) => Err(RepoThreadError::Timeout(format!(
                "Generation exceeded the {}s deadline",
                timeout_secs
            ))
            .into()),
        }
    } else {
        generation.await
    };

    let (result, failed) = match outcome {
        Ok(text) => {
            tracing::info!("Job {} completed", job.id);
            (text, false)
        }
        Err(e) => {
            tracing::warn!("Job {} failed: {:#}", job.id, e);
            (format!("Error: {:#}", e), true)
        }
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        match store.complete_job(job.id, result.clone(), failed).await {
            Ok(_) => break,
            Err(e) if attempt < COMPLETE_RETRY_ATTEMPTS => {
                tracing::warn!(
                    "Failed to record result for job {} (attempt {}/{}): {}",
                    job.id,
                    attempt,
                    COMPLETE_RETRY_ATTEMPTS,
                    e
                );
                tokio::time::sleep(COMPLETE_RETRY_BACKOFF).await;
            }
            Err(e) => {
                // Unrecoverable: the job stays pending. Known limitation.
                tracing::error!(
                    "Giving up recording result for job {} after {} attempts: {}",
                    job.id,
                    COMPLETE_RETRY_ATTEMPTS,
                    e
                );
                break;
            }
        }
    }
}
