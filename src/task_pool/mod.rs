use std::sync::Arc;

use log::error;
use once_cell::sync::OnceCell;

use crate::schedule::LoopHandle;
use crate::work::{TaskHandle, WorkItem};
use crate::{PoolError, Result};

mod default_pool;
mod rayon_pool;

pub use self::default_pool::{DefaultTaskPool, PoolConfig};
pub use self::rayon_pool::RayonTaskPool;

/// The polymorphic task pool contract.
///
/// A pipeline engine hands opaque work items to a `TaskPool` without knowing
/// what executes them. The provided method bodies model a pool with no
/// backend at all: lifecycle calls are accepted as no-ops, but submitting
/// work fails with [`PoolError::NotSupported`] rather than silently
/// succeeding. Custom pools embed a [`DefaultTaskPool`] or a
/// [`ScheduleThread`](crate::ScheduleThread) and delegate, or replace the
/// execution strategy wholesale.
pub trait TaskPool: Send + Sync {
    /// Allocates the execution backend, making the pool ready for
    /// [`push`](TaskPool::push).
    ///
    /// Preparing an already-prepared pool discards the old backend and
    /// installs a fresh one; callers must not rely on in-flight work
    /// surviving a re-prepare. On error the pool is left unprepared and the
    /// call may be retried.
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Stops accepting new work, waits for every accepted item to finish
    /// running, and releases the backend.
    ///
    /// Idempotent: cleaning up an unprepared pool is a no-op.
    fn cleanup(&self) {}

    /// Submits one work item for execution.
    ///
    /// On success the item will run exactly once, concurrently with other
    /// items and in no guaranteed order. The returned handle may be `None`
    /// when the backend cannot track individual items.
    fn push(&self, item: WorkItem) -> Result<Option<TaskHandle>> {
        drop(item);
        Err(PoolError::NotSupported)
    }

    /// Waits for the item behind `handle`, where the backend supports that.
    ///
    /// Best-effort: the default backend has no way to join an individual
    /// item and does nothing here.
    fn join(&self, handle: TaskHandle) {
        let _ = handle;
    }

    /// Takes a reference on this pool's shared scheduling thread.
    ///
    /// Pools without schedule-thread support refuse with `false`, as does
    /// the process-wide default pool, which must not carry a dedicated
    /// thread on behalf of one caller.
    fn acquire_schedule_thread(&self) -> bool {
        false
    }

    /// Drops a reference on this pool's shared scheduling thread.
    ///
    /// Must balance a successful
    /// [`acquire_schedule_thread`](TaskPool::acquire_schedule_thread);
    /// an unbalanced release returns `false` and tears nothing down.
    fn release_schedule_thread(&self) -> bool {
        false
    }

    /// Returns a handle to the pool's running event loop.
    ///
    /// Only valid between a successful acquire and the matching release.
    fn schedule_context(&self) -> Option<LoopHandle> {
        None
    }
}

static DEFAULT_POOL: OnceCell<Arc<DefaultTaskPool>> = OnceCell::new();

/// Returns the process-wide default task pool.
///
/// The first caller constructs and prepares the pool; every caller receives
/// a shared reference to the same instance. The singleton is never torn
/// down: dropping the returned reference does not destroy it, and it lives
/// until process exit.
pub fn default_pool() -> Arc<DefaultTaskPool> {
    DEFAULT_POOL
        .get_or_init(|| {
            let pool = Arc::new(DefaultTaskPool::new());
            if let Err(e) = pool.prepare() {
                // Published unprepared; callers may prepare again.
                error!("failed to prepare the default task pool: {e}");
            }
            pool
        })
        .clone()
}
