use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::JobOrchestrator;
use crate::status::InFlightRegistry;
use crate::worker::job::{JobResult, TranscriptionTask};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Finished results kept for `recv_result*` callers. Once full, the oldest
/// unread result is dropped; job state is always available from the store.
pub const RESULT_BACKLOG: usize = 256;

/// Fixed set of OS threads, each driving its own single-threaded tokio
/// runtime, pulling tasks from a shared bounded queue.
///
/// Workers settle the in-flight registry themselves when a run ends, so the
/// registry stays bounded whether or not anyone reads results.
pub struct WorkerPool {
    task_sender: Sender<TranscriptionTask>,
    task_receiver: Receiver<TranscriptionTask>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(
        orchestrator: Arc<JobOrchestrator>,
        worker_count: usize,
        in_flight: InFlightRegistry,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (task_sender, task_receiver) = bounded::<TranscriptionTask>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(RESULT_BACKLOG);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let results = ResultOutlet {
                sender: result_sender.clone(),
                receiver: result_receiver.clone(),
            };
            let registry = in_flight.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_orchestrator = Arc::clone(&orchestrator);

            let handle = thread::Builder::new()
                .name(format!("transcriber-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        task_rx,
                        results,
                        registry,
                        shutdown_flag,
                        worker_orchestrator,
                    );
                })
                .map_err(|e| {
                    shutdown.store(true, Ordering::Relaxed);
                    WorkerError::SpawnFailed(e.to_string())
                })?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            task_sender,
            task_receiver,
            result_receiver,
            workers,
            shutdown,
        })
    }

    /// Queues a task. Blocks while the queue is full.
    pub fn submit(&self, task: TranscriptionTask) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.task_sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Stops workers from taking new tasks. Jobs already running finish.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Removes tasks that were queued but never picked up.
    pub fn drain_pending(&self) -> Vec<TranscriptionTask> {
        self.task_receiver.try_iter().collect()
    }

    pub fn wait(self) {
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Sending side of the result backlog. Holds a receiver too so a full
/// backlog can shed its oldest entry.
struct ResultOutlet {
    sender: Sender<JobResult>,
    receiver: Receiver<JobResult>,
}

impl ResultOutlet {
    /// Returns false once the pool is gone.
    fn publish(&self, mut result: JobResult) -> bool {
        loop {
            match self.sender.try_send(result) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    if let Ok(stale) = self.receiver.try_recv() {
                        debug!(job_id = %stale.job_id, "Result backlog full, dropping oldest");
                    }
                    result = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<TranscriptionTask>,
    results: ResultOutlet,
    in_flight: InFlightRegistry,
    shutdown: Arc<AtomicBool>,
    orchestrator: Arc<JobOrchestrator>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Worker {} failed to start runtime: {}", worker_id, e);
            return;
        }
    };

    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(task) => {
                debug!("Worker {} processing job {}", worker_id, task.job_id);

                let result = match runtime.block_on(orchestrator.run(task.clone())) {
                    Ok(job) => JobResult::from_job(&job),
                    Err(e) => {
                        error!("Worker {} could not record job {}: {}", worker_id, task.job_id, e);
                        JobResult::unrecorded(&task)
                    }
                };

                if result.persisted {
                    in_flight.finish(&result.job_id);
                } else {
                    in_flight.abandon(&result.job_id);
                }

                if !results.publish(result) {
                    error!("Worker {} result channel closed", worker_id);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
