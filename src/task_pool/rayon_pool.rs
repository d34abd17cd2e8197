use std::sync::Mutex;

use log::{error, warn};

use super::{PoolConfig, TaskPool};
use crate::work::{TaskHandle, WorkItem};
use crate::{PoolError, Result};

/// A task pool backed by rayon's work-stealing scheduler.
///
/// Implements the same contract as [`DefaultTaskPool`](super::DefaultTaskPool)
/// on an entirely different execution strategy, which is the point: the
/// pipeline engine driving it cannot tell the difference.
pub struct RayonTaskPool {
    config: PoolConfig,
    pool: Mutex<Option<rayon::ThreadPool>>,
}

impl RayonTaskPool {
    /// Creates an unprepared pool with the default configuration.
    pub fn new() -> Self {
        RayonTaskPool::with_config(PoolConfig::default())
    }

    /// Creates an unprepared pool with an explicit configuration.
    ///
    /// Rayon always runs a fixed complement, so `exclusive` is effectively
    /// always on and an unbounded pool resolves to the CPU count.
    pub fn with_config(config: PoolConfig) -> Self {
        RayonTaskPool {
            config,
            pool: Mutex::new(None),
        }
    }
}

impl Default for RayonTaskPool {
    fn default() -> Self {
        RayonTaskPool::new()
    }
}

impl TaskPool for RayonTaskPool {
    fn prepare(&self) -> Result<()> {
        let threads = self.config.max_threads.unwrap_or_else(num_cpus::get);
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rayon-task-{i}"))
            .panic_handler(|_| error!("work item panicked, continuing"))
            .build()
            .map_err(|e| PoolError::BackendAllocation(e.to_string()))?;
        *self.pool.lock().unwrap() = Some(built);
        Ok(())
    }

    fn cleanup(&self) {
        let pool = self.pool.lock().unwrap().take();
        // Dropping the rayon pool waits for spawned items and joins its
        // workers.
        drop(pool);
    }

    fn push(&self, item: WorkItem) -> Result<Option<TaskHandle>> {
        let slot = self.pool.lock().unwrap();
        match slot.as_ref() {
            Some(pool) => {
                pool.spawn(move || item.run());
                Ok(None)
            }
            None => {
                warn!("work item pushed to an unprepared pool, dropping it");
                drop(item);
                Ok(None)
            }
        }
    }
}
