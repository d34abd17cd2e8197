use std::fmt;

/// One opaque unit of work submitted to a task pool.
///
/// A work item wraps a function and whatever context it captures. It is
/// owned by the pool from the moment `push` accepts it until the function
/// has run exactly once, after which it is dropped.
pub struct WorkItem {
    func: Box<dyn FnOnce() + Send + 'static>,
}

impl WorkItem {
    /// Wraps a closure as a work item.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        WorkItem {
            func: Box::new(func),
        }
    }

    /// Consumes the item and runs its function.
    pub(crate) fn run(self) {
        (self.func)()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem").finish_non_exhaustive()
    }
}

/// Opaque token optionally returned from a successful `push`.
///
/// The default backend has no way to join or cancel an individual item and
/// returns no handle at all. Backends that do track items can issue handles
/// and honor them in [`TaskPool::join`](crate::TaskPool::join).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Creates a handle with a backend-chosen identifier.
    pub fn new(id: u64) -> Self {
        TaskHandle(id)
    }

    /// Returns the backend-chosen identifier.
    pub fn id(&self) -> u64 {
        self.0
    }
}
