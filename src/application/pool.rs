use super::engine::TransferEngine;
use crate::config::PoolConfig;
use crate::domain::transaction::TransferRequest;
use crate::error::PoolError;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Unit of work flowing through the pool's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub request: TransferRequest,
}

impl TransferJob {
    pub fn new(request: TransferRequest) -> Self {
        Self { request }
    }
}

struct PoolInner {
    sender: Option<mpsc::Sender<TransferJob>>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
}

/// Bounded queue of transfer jobs drained by a fixed set of workers.
///
/// [`submit`](WorkerPool::submit) never waits: a full queue is reported back
/// as a rejection so the caller can surface backpressure. Workers share one
/// receiver, so jobs leave the queue in submission order, but jobs handled by
/// different workers may complete in any order.
pub struct WorkerPool {
    engine: Arc<TransferEngine>,
    capacity: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TransferJob>>>,
    inner: StdMutex<PoolInner>,
    // Handles still to be joined; every shutdown caller waits on this.
    joining: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Creates a pool whose queue holds at most `capacity` jobs. No worker
    /// runs until [`start`](WorkerPool::start).
    pub fn new(capacity: usize, engine: Arc<TransferEngine>) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        let (sender, receiver) = mpsc::channel(capacity);
        Ok(Self {
            engine,
            capacity,
            receiver: Arc::new(Mutex::new(receiver)),
            inner: StdMutex::new(PoolInner {
                sender: Some(sender),
                workers: Vec::new(),
                started: false,
            }),
            joining: Mutex::new(Vec::new()),
        })
    }

    /// Creates the pool and starts its workers in one step.
    pub fn spawn(config: PoolConfig, engine: Arc<TransferEngine>) -> Result<Self, PoolError> {
        config.validate()?;
        let pool = Self::new(config.queue_capacity, engine)?;
        pool.start(config.workers)?;
        Ok(pool)
    }

    fn inner(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs currently waiting in the queue.
    pub fn queued(&self) -> usize {
        match &self.inner().sender {
            Some(sender) => self.capacity - sender.capacity(),
            None => 0,
        }
    }

    /// Launches `workers` executors. Must be called from within a Tokio runtime.
    pub fn start(&self, workers: usize) -> Result<(), PoolError> {
        if workers == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }
        let mut inner = self.inner();
        if inner.sender.is_none() {
            return Err(PoolError::ShutDown);
        }
        if inner.started {
            return Err(PoolError::AlreadyStarted);
        }
        inner.started = true;

        for worker in 0..workers {
            let jobs = Arc::clone(&self.receiver);
            let engine = Arc::clone(&self.engine);
            inner.workers.push(tokio::spawn(run_worker(worker, jobs, engine)));
        }
        info!(workers, capacity = self.capacity, "worker pool started");
        Ok(())
    }

    /// Tries to enqueue `job` without waiting.
    ///
    /// Returns `false` when the queue is full or the pool has been shut down;
    /// the job is dropped in that case.
    pub fn submit(&self, job: TransferJob) -> bool {
        let inner = self.inner();
        let Some(sender) = &inner.sender else {
            debug!(request_id = %job.request.request_id, "submit after shutdown rejected");
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                debug!(request_id = %job.request.request_id, "queue full, job rejected");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                debug!(request_id = %job.request.request_id, "queue closed, job rejected");
                false
            }
        }
    }

    /// Closes the queue, lets the workers drain what is already queued, and
    /// waits for all of them to return. A transfer in progress is never
    /// interrupted.
    ///
    /// Concurrent callers all wait for the same drain, and a cancelled call
    /// leaves the remaining handles for the next one.
    pub async fn shutdown(&self) {
        let mut joining = self.joining.lock().await;
        {
            let mut inner = self.inner();
            inner.sender = None;
            joining.append(&mut inner.workers);
        }

        while let Some(handle) = joining.last_mut() {
            if let Err(e) = handle.await {
                error!(error = %e, "worker terminated abnormally");
            }
            joining.pop();
        }
        info!("worker pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<TransferJob>>>,
    engine: Arc<TransferEngine>,
) {
    debug!(worker, "worker started");
    loop {
        // Only the receive happens under the lock; the transfer runs unlocked.
        let job = {
            let mut receiver = jobs.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            break;
        };

        if let Err(e) = engine.transfer(&job.request).await {
            error!(
                worker,
                request_id = %job.request.request_id,
                error = %e,
                "transfer processing failed"
            );
        }
    }
    debug!(worker, "worker stopped");
}
