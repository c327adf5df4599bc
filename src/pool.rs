//! Bounded worker pool used for the per-year cleaning stage.
//!
//! Tasks go through a channel whose capacity equals the worker count. The
//! submitting thread blocks while that channel is full, draining finished
//! results in the meantime, so at most `workers` tasks run at once and at
//! most `workers` results are waiting to be collected. Results are consumed
//! only on the submitting thread.

use anyhow::{Result, anyhow, bail};
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::thread;
use tracing::{debug, warn};

/// Called once on each worker thread before it takes its first task.
pub type WorkerHook = Box<dyn Fn(usize) + Send + Sync>;

pub struct WorkerPool {
    workers: usize,
    on_start: Option<WorkerHook>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            on_start: None,
        }
    }

    /// Installs a hook run by every worker when it starts (e.g. a CPU cap).
    pub fn with_start_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Runs `work` over every task and hands each result to `collect`.
    ///
    /// The first failing task, failing `collect` call or panicking worker
    /// aborts the run; no further tasks are submitted.
    pub fn run<T, R, F, C>(
        &self,
        tasks: impl IntoIterator<Item = T>,
        work: F,
        mut collect: C,
    ) -> Result<()>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
        C: FnMut(R) -> Result<()>,
    {
        let (task_tx, task_rx) = sync_channel::<T>(self.workers);
        let (result_tx, result_rx) = sync_channel::<Result<R>>(self.workers);
        let task_rx = Mutex::new(task_rx);

        thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(self.workers);
            for id in 0..self.workers {
                let task_rx = &task_rx;
                let result_tx = result_tx.clone();
                let work = &work;
                let on_start = self.on_start.as_ref();
                let handle = thread::Builder::new()
                    .name(format!("pool-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        if let Some(hook) = on_start {
                            hook(id);
                        }
                        loop {
                            let next = match task_rx.lock() {
                                Ok(rx) => rx.recv(),
                                Err(_) => break,
                            };
                            let Ok(task) = next else { break };
                            if result_tx.send(work(task)).is_err() {
                                break;
                            }
                        }
                        debug!(worker = id, "Worker exiting");
                    })?;
                handles.push(handle);
            }
            drop(result_tx);

            let outcome = submit_all(tasks, task_tx, &result_rx, &mut collect);
            drop(result_rx);

            let mut panicked = 0;
            for handle in handles {
                if handle.join().is_err() {
                    panicked += 1;
                }
            }
            if panicked > 0 {
                warn!(panicked, "Pool workers panicked");
                bail!("{panicked} pool worker(s) panicked");
            }
            outcome
        })
    }
}

fn submit_all<T, R>(
    tasks: impl IntoIterator<Item = T>,
    task_tx: SyncSender<T>,
    result_rx: &Receiver<Result<R>>,
    collect: &mut impl FnMut(R) -> Result<()>,
) -> Result<()> {
    let mut outstanding = 0usize;

    for mut task in tasks {
        loop {
            match task_tx.try_send(task) {
                Ok(()) => {
                    outstanding += 1;
                    break;
                }
                Err(TrySendError::Full(returned)) => {
                    task = returned;
                    drain_one(result_rx, &mut outstanding, collect)?;
                }
                Err(TrySendError::Disconnected(_)) => bail!("all pool workers exited early"),
            }
        }
    }
    drop(task_tx);

    while outstanding > 0 {
        drain_one(result_rx, &mut outstanding, collect)?;
    }
    Ok(())
}

fn drain_one<R>(
    result_rx: &Receiver<Result<R>>,
    outstanding: &mut usize,
    collect: &mut impl FnMut(R) -> Result<()>,
) -> Result<()> {
    let result = result_rx
        .recv()
        .map_err(|_| anyhow!("pool workers exited with {outstanding} task(s) unfinished"))?;
    *outstanding -= 1;
    collect(result?)
}
