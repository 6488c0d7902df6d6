//! Defines the `Scheduler` seam and `EventLoop`, the reference host that implements it.
//!
//! Every deferred in this crate bottoms out in a `Scheduler`: a host primitive that runs
//! a callback on a later turn, optionally after a delay, can cancel that callback before
//! it fires, and drives continuation futures. The crate never assumes a particular
//! runtime; any single-threaded executor with a timer can implement the trait.
//!
//! `EventLoop` is a small host built on `futures::executor::LocalPool`. It interleaves
//! continuation futures and timers the way a browser event loop interleaves microtasks
//! and timeouts: all ready continuations run until stalled, then one due timer fires.
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    thread,
    time::{Duration, Instant},
};

use futures::{
    FutureExt,
    executor::{LocalPool, LocalSpawner},
    future::LocalBoxFuture,
    task::LocalSpawnExt,
};
use tracing::{trace, warn};

use crate::task::Deferred;

/// A unit of work handed to [`Scheduler::schedule`].
pub type Callback = Box<dyn FnOnce()>;

/// Identifies a callback scheduled with [`Scheduler::schedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Wraps a host-specific timer identifier.
    pub fn new(raw: u64) -> Self {
        TimerId(raw)
    }

    /// Returns the raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// The host scheduling primitive.
///
/// Implementations must run everything on one logical thread. The contract for
/// [`cancel`](Scheduler::cancel) is strict: if it is called before the callback fires,
/// the callback never fires. Cancelling a timer that already fired, or was already
/// cancelled, is a no-op.
pub trait Scheduler {
    /// Runs `callback` on a later turn, no sooner than `delay` from now.
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerId;

    /// Prevents a scheduled callback from firing if it has not fired yet.
    fn cancel(&self, timer: TimerId);

    /// Drives `future` to completion on this host.
    fn spawn(&self, future: LocalBoxFuture<'static, ()>);
}

#[derive(Default)]
struct Timers {
    next_id: u64,
    queue: BTreeMap<(Instant, u64), Callback>,
    deadlines: HashMap<u64, Instant>,
    // Timers whose deadline is past what `Instant` can represent. They never fire
    // but can still be cancelled.
    parked: HashMap<u64, Callback>,
}

impl Timers {
    fn insert(&mut self, delay: Duration, callback: Callback) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        match Instant::now().checked_add(delay) {
            Some(deadline) => {
                // Ties on the deadline fire in scheduling order.
                self.queue.insert((deadline, id), callback);
                self.deadlines.insert(id, deadline);
            }
            None => {
                trace!(id, ?delay, "deadline out of range, timer parked");
                self.parked.insert(id, callback);
            }
        }
        TimerId(id)
    }

    fn remove(&mut self, timer: TimerId) -> bool {
        match self.deadlines.remove(&timer.0) {
            Some(deadline) => self.queue.remove(&(deadline, timer.0)).is_some(),
            None => self.parked.remove(&timer.0).is_some(),
        }
    }

    fn len(&self) -> usize {
        self.queue.len() + self.parked.len()
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    fn pop_first(&mut self) -> Option<Callback> {
        let ((_, id), callback) = self.queue.pop_first()?;
        self.deadlines.remove(&id);
        Some(callback)
    }
}

/// A single-threaded event loop implementing [`Scheduler`].
///
/// Work is only performed inside [`run`](EventLoop::run) or
/// [`run_until`](EventLoop::run_until). Neither may be called from inside a callback
/// or continuation running on the same loop.
///
/// # Example
/// ```
/// # use std::rc::Rc;
/// # use deferred_flow::{EventLoop, Flow};
/// let event_loop = Rc::new(EventLoop::new());
/// let flow = Flow::new(event_loop.clone());
///
/// let sum = flow
///     .next(|| Ok::<_, String>(2))
///     .next(|value| Ok(value + 3));
///
/// assert_eq!(event_loop.run_until(&sum), Some(Ok(5)));
/// ```
pub struct EventLoop {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    timers: RefCell<Timers>,
}

impl EventLoop {
    /// Creates an idle event loop.
    #[must_use]
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        EventLoop {
            pool: RefCell::new(pool),
            spawner,
            timers: RefCell::new(Timers::default()),
        }
    }

    /// Runs turns until no continuation can make progress and no timer can come due.
    ///
    /// Blocks the calling thread while waiting for the next timer deadline.
    pub fn run(&self) {
        loop {
            self.pool.borrow_mut().run_until_stalled();
            if !self.fire_next() {
                break;
            }
        }
    }

    /// Runs turns until `deferred` settles and returns its result.
    ///
    /// Returns `None` if the loop became idle while `deferred` was still pending, which
    /// is what happens to work that was cancelled before it settled.
    pub fn run_until<T, E>(&self, deferred: &Deferred<T, E>) -> Option<Result<T, E>>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        loop {
            self.pool.borrow_mut().run_until_stalled();
            if let Some(result) = deferred.clone().now_or_never() {
                return Some(result);
            }
            if !self.fire_next() {
                return deferred.clone().now_or_never();
            }
        }
    }

    /// Returns the number of timers that are scheduled and have not fired.
    ///
    /// Includes timers whose delay is too large to ever come due; those never keep
    /// [`run`](EventLoop::run) busy.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    // Fires the earliest timer, sleeping until its deadline if needed.
    // Returns `false` when no timer is scheduled.
    fn fire_next(&self) -> bool {
        let Some(deadline) = self.timers.borrow().next_deadline() else {
            return false;
        };
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        // The borrow must end before the callback runs, it may schedule more timers.
        let callback = self.timers.borrow_mut().pop_first();
        if let Some(callback) = callback {
            trace!("timer fired");
            callback();
        }
        true
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerId {
        self.timers.borrow_mut().insert(delay, callback)
    }

    fn cancel(&self, timer: TimerId) {
        if self.timers.borrow_mut().remove(timer) {
            trace!(timer = timer.get(), "timer cancelled");
        }
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(future) {
            warn!(?err, "event loop is shut down, dropping spawned work");
        }
    }
}
