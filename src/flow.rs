//! Defines `Flow`, the entry point that builds deferreds on a given host.
//!
//! A `Flow` only holds the host [`Scheduler`]; it is cheap to clone and every
//! [`Deferred`] keeps one so its continuations run on the same host. The factories in
//! this module create handles from nothing ([`pending`](Flow::pending)), from an
//! existing future ([`from_future`](Flow::from_future)) or from a function to run on
//! the next turn ([`next`](Flow::next)). The combinators live in their own modules as
//! further `impl Flow` blocks.
use std::{fmt, rc::Rc, time::Duration};

use futures::{FutureExt, future};
use tracing::debug;

use crate::{
    scheduler::Scheduler,
    task::{Deferred, Forward, IntoOutcome, Outcome, Resolver},
};

/// Builds deferreds and runs combinators on one host.
#[derive(Clone)]
pub struct Flow {
    scheduler: Rc<dyn Scheduler>,
}

impl Flow {
    /// Creates a flow over the given host.
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Flow { scheduler }
    }

    /// Returns the host scheduling primitive.
    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    /// Creates an unsettled deferred together with its [`Resolver`].
    pub fn pending<T, E>(&self) -> (Resolver<T, E>, Deferred<T, E>)
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        Deferred::pair(self.clone())
    }

    /// Wraps an existing future in a deferred.
    ///
    /// The future is driven on the host right away, so its side effects happen whether
    /// or not anything is attached to the returned handle.
    pub fn from_future<T, E, F>(&self, future: F) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: Future<Output = Result<T, E>> + 'static,
    {
        let (resolver, deferred) = self.pending();
        self.spawn(Forward::new(future, resolver));
        deferred
    }

    /// Runs `task` on the next scheduler turn.
    ///
    /// The returned deferred resolves with the task's value, rejects with its error,
    /// or adopts the deferred it returned. Cancelling it before the turn comes clears
    /// the scheduled callback, so the task never runs.
    pub fn next<T, E, R, F>(&self, task: F) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce() -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        let (resolver, deferred) = self.pending();
        let flow = self.clone();
        let timer = self.scheduler.schedule(
            Duration::ZERO,
            Box::new(move || match task().into_outcome() {
                Outcome::Ready(result) => {
                    resolver.settle(result);
                }
                Outcome::Later(inner) => flow.spawn(Forward::new(inner, resolver)),
            }),
        );
        let scheduler = Rc::clone(&self.scheduler);
        deferred.with_canceller(move || scheduler.cancel(timer))
    }

    /// Same as [`next`](Flow::next).
    pub fn then<T, E, R, F>(&self, task: F) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce() -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.next(task)
    }

    /// Resolves with `()` on the next scheduler turn.
    pub fn next_turn<E>(&self) -> Deferred<(), E>
    where
        E: Clone + 'static,
    {
        self.next(|| Ok(()))
    }

    /// Runs `task(args)` on the next scheduler turn, see [`next`](Flow::next).
    pub fn call<A, T, E, R, F>(&self, task: F, args: A) -> Deferred<T, E>
    where
        A: 'static,
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce(A) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.next(move || task(args))
    }

    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.scheduler.spawn(future.boxed_local());
    }

    // Drives `driver` on the host behind an abort handle. Cancelling the returned
    // deferred drops the driver at its next suspension point, together with any timer
    // it is waiting on, and leaves the deferred pending.
    pub(crate) fn drive<T, E>(
        &self,
        driver: impl Future<Output = Result<T, E>> + 'static,
    ) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        let (resolver, deferred) = self.pending();
        let (driver, handle) = future::abortable(driver);
        self.spawn(async move {
            if let Ok(result) = driver.await {
                resolver.settle(result);
            }
        });
        deferred.with_canceller(move || {
            debug!("aborting driver");
            handle.abort();
        })
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow").finish_non_exhaustive()
    }
}
