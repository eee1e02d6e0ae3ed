//! Worker pool that runs orchestrator jobs off a bounded queue.
//!
//! [`ClaimScheduler::schedule`] places a [`ClaimJob`] on a
//! [`tokio::sync::mpsc`] channel. A fixed number of worker tasks take jobs
//! off the shared receiver and run each one in its own spawned task, so a
//! panic inside one run is caught at the worker boundary and the claim is
//! settled at zero instead of being left in `PROCESSING`.
//!
//! Jobs are never cancelled once queued: [`ClaimScheduler::shutdown`] closes
//! the queue but workers drain what is already on it. The queue lives in
//! memory only, so claims still `PROCESSING` after a restart are re-queued
//! through [`crate::BatchTrigger::resume_processing`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use index_claims_models::Resolution;
use serde::Deserialize;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;

use crate::orchestrator::{ClaimJob, Orchestrator};
use crate::{PipelineError, Step};

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of concurrent orchestrator runs.
    pub workers: usize,
    /// Jobs that may wait in the queue before `schedule` applies
    /// backpressure.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 1024,
        }
    }
}

/// Counts queued plus running jobs and wakes waiters when it reaches zero.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Fans claim jobs out to a fixed pool of workers.
pub struct ClaimScheduler {
    tx: Mutex<Option<mpsc::Sender<ClaimJob>>>,
    in_flight: Arc<InFlight>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ClaimScheduler {
    /// Spawns the worker tasks. Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(orchestrator: Arc<Orchestrator>, config: &SchedulerConfig) -> Self {
        let worker_count = config.workers.max(1);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let in_flight = Arc::new(InFlight::default());

        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    rx.clone(),
                    orchestrator.clone(),
                    in_flight.clone(),
                ))
            })
            .collect();

        log::info!(
            "Claim scheduler started: {worker_count} workers, queue capacity {}",
            config.queue_capacity.max(1)
        );

        Self {
            tx: Mutex::new(Some(tx)),
            in_flight,
            workers: Mutex::new(workers),
        }
    }

    /// Queues a job, waiting for room if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SchedulerClosed`] after
    /// [`ClaimScheduler::shutdown`] or if every worker has exited.
    pub async fn schedule(&self, job: ClaimJob) -> Result<(), PipelineError> {
        let Some(tx) = self.tx.lock().await.clone() else {
            return Err(PipelineError::SchedulerClosed);
        };
        self.in_flight.start();
        if tx.send(job).await.is_err() {
            self.in_flight.finish();
            return Err(PipelineError::SchedulerClosed);
        }
        Ok(())
    }

    /// Number of jobs queued or running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Waits until no job is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Closes the queue and waits for the workers to drain it. Later calls
    /// to [`ClaimScheduler::schedule`] fail.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().await.take());
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                log::error!("Claim worker exited abnormally: {e}");
            }
        }
        log::info!("Claim scheduler stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<ClaimJob>>>,
    orchestrator: Arc<Orchestrator>,
    in_flight: Arc<InFlight>,
) {
    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            log::debug!("Claim worker {worker_id}: queue closed");
            return;
        };

        run_job(&orchestrator, job).await;
        in_flight.finish();
    }
}

async fn run_job(orchestrator: &Arc<Orchestrator>, job: ClaimJob) {
    let claim_id = job.claim_id;
    let task_orchestrator = orchestrator.clone();

    let result = tokio::spawn(async move { task_orchestrator.run(&job).await }).await;

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::error!("Claim {claim_id}: could not be resolved: {e}");
        }
        Err(join_error) => {
            log::error!("Claim {claim_id}: orchestrator run aborted: {join_error}");
            if let Err(e) = orchestrator
                .settle(claim_id, Resolution::InternalError, Step::Internal)
                .await
            {
                log::error!("Claim {claim_id}: could not be settled after abort: {e}");
            }
        }
    }
}
