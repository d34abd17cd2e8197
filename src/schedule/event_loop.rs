use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, trace};

/// Messages posted to a running schedule loop.
enum Msg {
    /// Run a callback as soon as the loop gets to it.
    Call(Box<dyn FnOnce() + Send + 'static>),
    /// Run a callback once, after a delay.
    After(Duration, Box<dyn FnOnce() + Send + 'static>),
    /// Run a callback every `period` until it returns `false`.
    Every(Duration, Box<dyn FnMut() -> bool + Send + 'static>),
    /// Exit the loop after the current callback.
    Quit,
}

/// A pending timer, ordered so the binary heap pops the earliest deadline.
struct Timer {
    due: Instant,
    seq: u64,
    kind: TimerKind,
}

enum TimerKind {
    Once(Box<dyn FnOnce() + Send + 'static>),
    Every(Duration, Box<dyn FnMut() -> bool + Send + 'static>),
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that BinaryHeap::pop yields the earliest deadline.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A shared handle for posting callbacks to a running schedule loop.
///
/// Handles are cheap to clone and may be sent to other threads. Posting to a
/// loop that has already quit is a silent no-op; callers are expected to
/// withdraw their scheduled work before releasing the schedule thread.
#[derive(Clone)]
pub struct LoopHandle {
    tx: Sender<Msg>,
}

impl LoopHandle {
    /// Schedules a callback to run on the loop thread as soon as possible.
    pub fn schedule<F>(&self, func: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Msg::Call(Box::new(func)));
    }

    /// Schedules a one-shot callback to run after `delay`.
    pub fn schedule_after<F>(&self, delay: Duration, func: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Msg::After(delay, Box::new(func)));
    }

    /// Schedules a repeating callback fired every `period`.
    ///
    /// The callback keeps firing until it returns `false`.
    pub fn schedule_interval<F>(&self, period: Duration, func: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let _ = self.tx.send(Msg::Every(period, Box::new(func)));
    }

    /// Asks the loop to exit once the callback currently running finishes.
    pub fn quit(&self) {
        let _ = self.tx.send(Msg::Quit);
    }
}

/// A cooperative event loop multiplexing scheduled callbacks on one thread.
///
/// Distinct from the parallel worker pool: everything posted here runs on the
/// single thread that calls [`ScheduleLoop::run`], in a deterministic order.
pub(crate) struct ScheduleLoop {
    rx: Receiver<Msg>,
    tx: Sender<Msg>,
}

impl ScheduleLoop {
    pub(crate) fn new() -> ScheduleLoop {
        let (tx, rx) = channel::unbounded();
        ScheduleLoop { rx, tx }
    }

    /// Returns a handle for posting work to this loop.
    pub(crate) fn handle(&self) -> LoopHandle {
        LoopHandle {
            tx: self.tx.clone(),
        }
    }

    /// Pumps messages and timers until `quit` is received.
    ///
    /// Callbacks still queued when the loop exits are dropped unrun.
    pub(crate) fn run(self) {
        // Drop the loop's own sender so the channel can disconnect once every
        // external handle is gone.
        let ScheduleLoop { rx, tx } = self;
        drop(tx);

        let mut timers: BinaryHeap<Timer> = BinaryHeap::new();
        let mut next_seq: u64 = 0;

        loop {
            // Fire everything that has come due before blocking again.
            let now = Instant::now();
            while timers.peek().map_or(false, |t| t.due <= now) {
                let Some(timer) = timers.pop() else { break };
                match timer.kind {
                    TimerKind::Once(func) => func(),
                    TimerKind::Every(period, mut func) => {
                        if func() {
                            timers.push(Timer {
                                due: Instant::now() + period,
                                seq: next_seq,
                                kind: TimerKind::Every(period, func),
                            });
                            next_seq += 1;
                        } else {
                            trace!("interval callback finished, removing timer");
                        }
                    }
                }
            }

            let msg = match timers.peek() {
                Some(timer) => match rx.recv_deadline(timer.due) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };

            match msg {
                Msg::Call(func) => func(),
                Msg::After(delay, func) => {
                    timers.push(Timer {
                        due: Instant::now() + delay,
                        seq: next_seq,
                        kind: TimerKind::Once(func),
                    });
                    next_seq += 1;
                }
                Msg::Every(period, func) => {
                    timers.push(Timer {
                        due: Instant::now() + period,
                        seq: next_seq,
                        kind: TimerKind::Every(period, func),
                    });
                    next_seq += 1;
                }
                Msg::Quit => {
                    debug!("schedule loop quitting");
                    break;
                }
            }
        }
    }
}
