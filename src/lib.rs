#![deny(missing_docs)]

//! A pluggable task execution pool for streaming pipelines.
//!
//! This library lets a pipeline engine hand off units of work to a pool of
//! worker threads without knowing what runs them: the [`TaskPool`] trait is
//! the polymorphic contract, [`DefaultTaskPool`] is the bounded-or-unbounded
//! worker-thread backend behind it, and [`RayonTaskPool`] swaps in a
//! work-stealing scheduler under the same contract.
//!
//! Pipeline startup calls [`TaskPool::prepare`], streaming work is repeatedly
//! [`TaskPool::push`]ed, and shutdown calls [`TaskPool::cleanup`], which
//! drains every accepted item before returning. Components that need
//! deterministic timer/idle scheduling instead of raw parallelism share one
//! lazily created dedicated thread through the [`schedule`] module. Callers
//! with no particular requirements use the process-wide [`default_pool`].

mod error;
pub mod schedule;
mod task_pool;
mod work;

pub use error::{PoolError, Result};
pub use schedule::{LoopHandle, ScheduleThread};
pub use task_pool::{default_pool, DefaultTaskPool, PoolConfig, RayonTaskPool, TaskPool};
pub use work::{TaskHandle, WorkItem};
