//! Timing utilities built on the host [`Scheduler`].
//!
//! Provides [`Sleep`], the future every time-based combinator waits on, and the
//! [`Flow::wait`] combinator.

use std::{
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use futures::{FutureExt, channel::oneshot};

use crate::{
    flow::Flow,
    scheduler::{Scheduler, TimerId},
    task::Deferred,
};

/// A future that completes once the host fires its timer.
///
/// The timer is scheduled when the `Sleep` is created, ***not*** when it is first
/// polled. Dropping the future before it completes cancels the timer, so abandoned
/// sleeps never wake anything up. A zero delay completes on the next scheduler turn,
/// which is how the looping combinators hand control back to the host between
/// iterations.
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct Sleep {
    receiver: oneshot::Receiver<()>,
    timer: Option<TimerId>,
    scheduler: Rc<dyn Scheduler>,
}

impl Sleep {
    pub(crate) fn new(scheduler: Rc<dyn Scheduler>, delay: Duration) -> Self {
        let (sender, receiver) = oneshot::channel();
        let timer = scheduler.schedule(
            delay,
            Box::new(move || {
                let _ = sender.send(());
            }),
        );
        Sleep {
            receiver,
            timer: Some(timer),
            scheduler,
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(())) => {
                self.timer = None;
                Poll::Ready(())
            }
            // The host dropped the callback without running it. Nothing will ever
            // fire, so the sleep stays pending.
            Poll::Ready(Err(_)) => {
                self.timer = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.scheduler.cancel(timer);
        }
    }
}

impl Flow {
    /// Returns a future that completes after `delay` on this flow's host.
    pub fn sleep(&self, delay: Duration) -> Sleep {
        Sleep::new(Rc::clone(self.scheduler()), delay)
    }

    /// Returns a deferred that resolves after `delay` with the elapsed wall-clock time
    /// in milliseconds.
    ///
    /// Cancelling the deferred clears the pending timer; it then never settles.
    /// Racing a `wait` against other work with [`Flow::earlier`] is the way to express
    /// a timeout with a fallback.
    pub fn wait<E>(&self, delay: Duration) -> Deferred<u64, E>
    where
        E: Clone + 'static,
    {
        let (resolver, deferred) = self.pending();
        let started = Instant::now();
        let timer = self.scheduler().schedule(
            delay,
            Box::new(move || {
                resolver.resolve(elapsed_millis(started));
            }),
        );
        let scheduler = Rc::clone(self.scheduler());
        deferred.with_canceller(move || scheduler.cancel(timer))
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
