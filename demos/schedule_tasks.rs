//! Drives a small pool the way a streaming pipeline would: a bounded,
//! non-exclusive pool handles the parallel handoffs while the shared
//! schedule thread ticks off timing on its own cooperative loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use streampool::{DefaultTaskPool, TaskPool, WorkItem};

fn main() {
    env_logger::init();

    let pool = DefaultTaskPool::bounded(2, false);
    pool.prepare().expect("failed to prepare pool");

    // Timing side: five ticks on the dedicated schedule thread.
    assert!(pool.acquire_schedule_thread());
    let context = pool.schedule_context().expect("schedule context");
    let (done_tx, done_rx) = channel::bounded(1);
    let ticks = Arc::new(AtomicUsize::new(0));
    let tick_counter = Arc::clone(&ticks);
    context.schedule_interval(Duration::from_millis(100), move || {
        let n = tick_counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("tick {n} on {:?}", std::thread::current().name());
        if n < 5 {
            true
        } else {
            let _ = done_tx.send(());
            false
        }
    });

    // Streaming side: ten handoffs across the two workers.
    for i in 0..10 {
        pool.push(WorkItem::new(move || {
            println!(
                "handoff {i} on {:?}",
                std::thread::current().name()
            );
            std::thread::sleep(Duration::from_millis(30));
        }))
        .expect("failed to push work item");
    }

    done_rx.recv().expect("schedule loop quit early");
    assert!(pool.release_schedule_thread());
    pool.cleanup();
    println!("all handoffs done, {} ticks fired", ticks.load(Ordering::SeqCst));
}
