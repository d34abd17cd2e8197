use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use streampool::{default_pool, DefaultTaskPool, PoolError, RayonTaskPool, TaskPool, WorkItem};

#[test]
fn prepare_push_cleanup_runs_everything() {
    let pool = DefaultTaskPool::new();
    pool.prepare().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let counter = Arc::clone(&counter);
        pool.push(WorkItem::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.cleanup();
    assert_eq!(counter.load(Ordering::SeqCst), 20);
}

#[test]
fn prepare_then_cleanup_with_no_work() {
    let pool = DefaultTaskPool::new();
    pool.prepare().unwrap();
    pool.cleanup();
}

#[test]
fn push_before_prepare_drops_item() {
    let pool = DefaultTaskPool::new();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ran);
    let result = pool.push(WorkItem::new(move || {
        flag.store(true, Ordering::SeqCst);
    }));

    assert!(matches!(result, Ok(None)));
    thread::sleep(Duration::from_millis(50));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn push_after_cleanup_drops_item() {
    let pool = DefaultTaskPool::new();
    pool.prepare().unwrap();
    pool.cleanup();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let result = pool.push(WorkItem::new(move || {
        flag.store(true, Ordering::SeqCst);
    }));

    assert!(matches!(result, Ok(None)));
    thread::sleep(Duration::from_millis(50));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn cleanup_is_idempotent() {
    let pool = DefaultTaskPool::new();

    // Without a prior prepare, cleanup is a no-op.
    pool.cleanup();

    pool.prepare().unwrap();
    pool.cleanup();
    pool.cleanup();
}

#[test]
fn singleton_identity_across_threads() {
    let first = default_pool();
    let second = default_pool();
    assert!(Arc::ptr_eq(&first, &second));

    let handle = thread::spawn(default_pool);
    let from_thread = handle.join().unwrap();
    assert!(Arc::ptr_eq(&first, &from_thread));
}

#[test]
fn bounded_lazy_pool_runs_all_items_exactly_once() {
    // max_threads = 2, exclusive = false, five independent items.
    let pool = DefaultTaskPool::bounded(2, false);
    pool.prepare().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let flags: Arc<Vec<AtomicBool>> = Arc::new((0..5).map(|_| AtomicBool::new(false)).collect());

    for i in 0..5 {
        let counter = Arc::clone(&counter);
        let flags = Arc::clone(&flags);
        pool.push(WorkItem::new(move || {
            let seen_before = flags[i].swap(true, Ordering::SeqCst);
            assert!(!seen_before, "item {i} ran more than once");
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.cleanup();
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
}

#[test]
fn bounded_pool_never_exceeds_its_thread_limit() {
    let pool = DefaultTaskPool::bounded(2, true);
    pool.prepare().unwrap();

    let (release_tx, release_rx) = channel::unbounded::<()>();
    let started = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let started = Arc::clone(&started);
        let release_rx = release_rx.clone();
        pool.push(WorkItem::new(move || {
            started.fetch_add(1, Ordering::SeqCst);
            let _ = release_rx.recv();
        }))
        .unwrap();
    }

    // Two workers exist; the third item has to wait for a free worker.
    thread::sleep(Duration::from_millis(200));
    assert_eq!(started.load(Ordering::SeqCst), 2);

    for _ in 0..3 {
        release_tx.send(()).unwrap();
    }
    pool.cleanup();
    assert_eq!(started.load(Ordering::SeqCst), 3);
}

#[test]
fn reprepare_installs_a_fresh_backend() {
    let pool = DefaultTaskPool::bounded(2, false);
    pool.prepare().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let counter = Arc::clone(&counter);
        pool.push(WorkItem::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    // Re-prepare drains the old backend; the pool keeps accepting work.
    pool.prepare().unwrap();
    for _ in 0..4 {
        let counter = Arc::clone(&counter);
        pool.push(WorkItem::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.cleanup();
    assert_eq!(counter.load(Ordering::SeqCst), 8);
}

#[test]
fn reprepare_does_not_deadlock_with_resubmitting_items() {
    let pool = Arc::new(DefaultTaskPool::bounded(1, false));
    pool.prepare().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    {
        // A streaming task resubmits itself: the in-flight item calls push
        // on the same pool while a re-prepare is draining its backend.
        let resubmit_pool = Arc::clone(&pool);
        let outer = Arc::clone(&counter);
        pool.push(WorkItem::new(move || {
            thread::sleep(Duration::from_millis(150));
            let inner = Arc::clone(&outer);
            resubmit_pool
                .push(WorkItem::new(move || {
                    inner.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
            outer.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    thread::sleep(Duration::from_millis(50));
    pool.prepare().unwrap();
    pool.cleanup();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn panicking_item_does_not_poison_the_pool() {
    let pool = DefaultTaskPool::bounded(1, false);
    pool.prepare().unwrap();

    pool.push(WorkItem::new(|| panic!("bad item"))).unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    pool.push(WorkItem::new(move || {
        flag.store(true, Ordering::SeqCst);
    }))
    .unwrap();

    pool.cleanup();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn concurrent_pushers_all_get_their_work_run() {
    let pool = Arc::new(DefaultTaskPool::bounded(4, false));
    pool.prepare().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    crossbeam_utils::thread::scope(|s| {
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            let counter = Arc::clone(&counter);
            s.spawn(move |_| {
                for _ in 0..25 {
                    let counter = Arc::clone(&counter);
                    pool.push(WorkItem::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }))
                    .unwrap();
                }
            });
        }
    })
    .unwrap();

    pool.cleanup();
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn rayon_pool_runs_items_to_completion() {
    let pool = RayonTaskPool::new();
    pool.prepare().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        pool.push(WorkItem::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.cleanup();
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

/// A pool that relies entirely on the trait's provided defaults.
struct BackendlessPool;

impl TaskPool for BackendlessPool {}

#[test]
fn backendless_pool_refuses_work() {
    let pool = BackendlessPool;
    assert!(pool.prepare().is_ok());

    let result = pool.push(WorkItem::new(|| {}));
    assert!(matches!(result, Err(PoolError::NotSupported)));

    assert!(!pool.acquire_schedule_thread());
    assert!(!pool.release_schedule_thread());
    assert!(pool.schedule_context().is_none());
    pool.cleanup();
}
