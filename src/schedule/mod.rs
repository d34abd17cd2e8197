//! Schedule-thread management.
//!
//! Some pipeline components need deterministic, timer/idle-style scheduling
//! rather than the unordered parallel execution a worker pool provides. The
//! [`ScheduleThread`] manager hands all such consumers one shared dedicated
//! thread running a cooperative event loop, created lazily on the first
//! acquire and torn down on the last release.

mod event_loop;

pub use self::event_loop::LoopHandle;

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::{debug, warn};

use self::event_loop::ScheduleLoop;

/// A lazily created, reference-counted dedicated scheduling thread.
///
/// The physical thread and its event loop exist exactly while the reference
/// count is above zero: only the 0→1 [`acquire`](ScheduleThread::acquire)
/// spawns, and only the release dropping the count back to zero tears down.
/// Every caller must balance its acquires with releases.
pub struct ScheduleThread {
    inner: Arc<Inner>,
    name: String,
}

struct Inner {
    state: Mutex<ScheduleState>,
    ready: Condvar,
}

#[derive(Default)]
struct ScheduleState {
    refcount: usize,
    running: bool,
    handle: Option<LoopHandle>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScheduleThread {
    /// Creates an idle manager. `name` prefixes the spawned thread's name.
    pub fn new(name: impl Into<String>) -> Self {
        ScheduleThread {
            inner: Arc::new(Inner {
                state: Mutex::new(ScheduleState::default()),
                ready: Condvar::new(),
            }),
            name: name.into(),
        }
    }

    /// Takes a reference on the shared scheduling thread, spawning it if this
    /// is the first reference.
    ///
    /// On the 0→1 transition this blocks until the new loop has demonstrably
    /// started pumping events: the spawned thread's first action is an
    /// immediate callback on its own loop that flips the running flag and
    /// signals the waiting acquirer. Work attached to the loop after a
    /// successful acquire is therefore guaranteed to be picked up.
    ///
    /// Returns `false` if the thread could not be spawned; the reference
    /// count is left unchanged and the call may be retried.
    pub fn acquire(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();

        if state.refcount == 0 {
            let sched_loop = ScheduleLoop::new();
            let handle = sched_loop.handle();

            let inner = Arc::clone(&self.inner);
            let loop_handle = handle.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-schedule", self.name))
                .spawn(move || {
                    // Rendezvous: prove the loop is pumping before the
                    // acquirer is allowed to attach work to it.
                    loop_handle.schedule(move || {
                        let mut state = inner.state.lock().unwrap();
                        state.running = true;
                        inner.ready.notify_all();
                    });
                    sched_loop.run();
                });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    warn!("failed to spawn schedule thread: {e}");
                    return false;
                }
            };

            state.handle = Some(handle);
            state.thread = Some(thread);
        }

        // Take the reference before waiting: the condvar wait releases the
        // lock, and a second acquirer arriving during the rendezvous must
        // see a non-zero count or it would spawn a second loop thread.
        state.refcount += 1;

        while !state.running {
            state = self.inner.ready.wait(state).unwrap();
        }

        true
    }

    /// Drops a reference on the shared scheduling thread, tearing it down if
    /// this was the last reference.
    ///
    /// Callbacks still scheduled on the loop are not cancelled; they are
    /// dropped unrun when the loop exits. Callers must withdraw their own
    /// scheduled work before the final release.
    ///
    /// Returns `false` without any teardown if the reference count is
    /// already zero.
    pub fn release(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();

        if state.refcount == 0 {
            warn!("unbalanced schedule thread release");
            return false;
        }

        state.refcount -= 1;
        if state.refcount == 0 {
            if let Some(handle) = state.handle.take() {
                handle.quit();
            }
            if let Some(thread) = state.thread.take() {
                if thread.join().is_err() {
                    warn!("schedule thread panicked during shutdown");
                }
            }
            state.running = false;
            debug!("schedule thread stopped");
        }

        true
    }

    /// Returns a handle to the running event loop.
    ///
    /// Only valid between a successful [`acquire`](ScheduleThread::acquire)
    /// and the matching [`release`](ScheduleThread::release); returns `None`
    /// while the reference count is zero.
    pub fn context(&self) -> Option<LoopHandle> {
        let state = self.inner.state.lock().unwrap();
        if state.refcount == 0 {
            return None;
        }
        state.handle.clone()
    }
}

impl Default for ScheduleThread {
    fn default() -> Self {
        ScheduleThread::new("schedule")
    }
}
