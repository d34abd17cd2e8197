use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, warn};

use super::{default_pool, TaskPool};
use crate::schedule::{LoopHandle, ScheduleThread};
use crate::work::{TaskHandle, WorkItem};
use crate::{PoolError, Result};

/// Configuration for a [`DefaultTaskPool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum number of worker threads; `None` means unbounded.
    pub max_threads: Option<usize>,
    /// Pre-spawn the full thread complement at prepare time instead of
    /// growing the pool lazily as load requires.
    pub exclusive: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_threads: None,
            exclusive: false,
        }
    }
}

/// The default task pool: a bounded-or-unbounded worker-thread backend.
///
/// Workers pull work items from a shared queue. A non-exclusive pool spawns
/// workers lazily as load requires, up to the configured bound; an exclusive
/// pool spawns its full complement up front at prepare time. Dispatch order
/// among queued items is not FIFO-guaranteed; items are assumed independent.
pub struct DefaultTaskPool {
    config: PoolConfig,
    backend: Mutex<Option<Backend>>,
    schedule: ScheduleThread,
}

impl DefaultTaskPool {
    /// Creates an unprepared pool with the default configuration
    /// (unbounded, non-exclusive).
    pub fn new() -> Self {
        DefaultTaskPool::with_config(PoolConfig::default())
    }

    /// Creates an unprepared pool with an explicit configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        DefaultTaskPool {
            config,
            backend: Mutex::new(None),
            schedule: ScheduleThread::new("taskpool"),
        }
    }

    /// Creates an unprepared pool bounded to `max_threads` workers.
    pub fn bounded(max_threads: usize, exclusive: bool) -> Self {
        DefaultTaskPool::with_config(PoolConfig {
            max_threads: Some(max_threads),
            exclusive,
        })
    }

    fn is_default(&self) -> bool {
        // Checking identity instantiates the singleton on first use, same as
        // the guard in the original design.
        ptr::eq(self, Arc::as_ptr(&default_pool()))
    }
}

impl Default for DefaultTaskPool {
    fn default() -> Self {
        DefaultTaskPool::new()
    }
}

impl TaskPool for DefaultTaskPool {
    fn prepare(&self) -> Result<()> {
        let fresh = Backend::new(self.config)?;
        // Swap under the lock, drain outside it: a worker of the old backend
        // may itself call push, which takes the lock.
        let old = self.backend.lock().unwrap().replace(fresh);
        if let Some(old) = old {
            debug!("re-preparing pool, draining previous backend");
            old.shutdown();
        }
        Ok(())
    }

    fn cleanup(&self) {
        // Take the backend out under the lock so new pushes are refused
        // immediately, then drain outside the lock.
        let backend = self.backend.lock().unwrap().take();
        if let Some(backend) = backend {
            backend.shutdown();
        }
    }

    fn push(&self, item: WorkItem) -> Result<Option<TaskHandle>> {
        let mut slot = self.backend.lock().unwrap();
        match slot.as_mut() {
            Some(backend) => {
                backend.push(item)?;
                Ok(None)
            }
            None => {
                // Inherited best-effort behavior: an unprepared pool drops
                // the item without running it and without failing the call.
                warn!("work item pushed to an unprepared pool, dropping it");
                drop(item);
                Ok(None)
            }
        }
    }

    fn join(&self, _handle: TaskHandle) {
        // Individual items cannot be joined in a generic worker pool.
    }

    fn acquire_schedule_thread(&self) -> bool {
        if self.is_default() {
            warn!("the default task pool cannot own a schedule thread");
            return false;
        }
        self.schedule.acquire()
    }

    fn release_schedule_thread(&self) -> bool {
        self.schedule.release()
    }

    fn schedule_context(&self) -> Option<LoopHandle> {
        self.schedule.context()
    }
}

/// The live worker set behind a prepared pool.
struct Backend {
    tx: Sender<WorkItem>,
    rx: Receiver<WorkItem>,
    busy: Arc<AtomicUsize>,
    workers: Vec<thread::JoinHandle<()>>,
    next_id: u32,
    bound: Option<usize>,
}

impl Backend {
    fn new(config: PoolConfig) -> Result<Backend> {
        let (tx, rx) = channel::unbounded();
        let mut backend = Backend {
            tx,
            rx,
            busy: Arc::new(AtomicUsize::new(0)),
            workers: Vec::new(),
            next_id: 0,
            bound: config.max_threads,
        };

        if config.exclusive {
            // An exclusive pool runs a fixed complement; with no explicit
            // bound that complement is the CPU count.
            let complement = config.max_threads.unwrap_or_else(num_cpus::get);
            backend.bound = Some(complement);
            for _ in 0..complement {
                backend.spawn_worker()?;
            }
        }

        Ok(backend)
    }

    fn push(&mut self, item: WorkItem) -> Result<()> {
        self.tx
            .send(item)
            .map_err(|_| PoolError::BackendAllocation("work queue closed".to_string()))?;

        let spawned = self.workers.len();
        let within_bound = self.bound.map_or(true, |max| spawned < max);
        if within_bound {
            // Grow only when every existing worker is accounted for: busy
            // running items or outpaced by the queue.
            let outstanding = self.busy.load(Ordering::SeqCst) + self.tx.len();
            if outstanding > spawned {
                match self.spawn_worker() {
                    Ok(()) => {}
                    // With no workers at all the item would never run.
                    Err(e) if spawned == 0 => return Err(e),
                    Err(e) => warn!("could not grow worker pool: {e}"),
                }
            }
        }

        Ok(())
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let id = self.next_id;
        self.next_id += 1;

        let rx = self.rx.clone();
        let busy = Arc::clone(&self.busy);
        let handle = thread::Builder::new()
            .name(format!("pool-worker-{id}"))
            .spawn(move || worker_loop(id, rx, busy))
            .map_err(|e| {
                PoolError::BackendAllocation(format!("failed to spawn worker thread: {e}"))
            })?;

        self.workers.push(handle);
        Ok(())
    }

    /// Closes the queue and blocks until every accepted item has run.
    fn shutdown(self) {
        // Dropping the sender closes the channel once the queue drains, so
        // workers finish everything already accepted before exiting.
        drop(self.tx);
        drop(self.rx);
        for worker in self.workers {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

/// Runs work items off the shared queue until the queue closes.
fn worker_loop(id: u32, rx: Receiver<WorkItem>, busy: Arc<AtomicUsize>) {
    while let Ok(item) = rx.recv() {
        debug!("worker {id} running work item");
        busy.fetch_add(1, Ordering::SeqCst);
        // Catch panics so one bad item doesn't take the worker down
        if panic::catch_unwind(AssertUnwindSafe(|| item.run())).is_err() {
            error!("worker {id}: work item panicked, continuing");
        }
        busy.fetch_sub(1, Ordering::SeqCst);
    }
    debug!("worker {id}: queue closed, shutting down");
}
